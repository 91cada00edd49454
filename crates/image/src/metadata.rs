//! Loosely-typed document metadata trees.
//!
//! An unpacked document stores one YAML tree per section under `Index/`. Each
//! tree is `chunks[].archives[].objects[]`, where every object is a mapping
//! tagged by its `_pbtype`. Only a few kinds matter here; everything else is
//! carried as an opaque payload and written back untouched.

use crate::{ImageError, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Key holding an object's kind.
const KIND_KEY: &str = "_pbtype";

/// Object kinds the pipeline understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// An image placed on a slide, with its authored size.
    ImageArchive,
    /// A master/slide style whose fill may be an image.
    SlideStyleArchive,
    /// Any other kind (or an object with no kind at all).
    Other(String),
}

impl RecordKind {
    fn parse(tag: &str) -> Self {
        match tag {
            "TSD.ImageArchive" => RecordKind::ImageArchive,
            "KN.SlideStyleArchive" => RecordKind::SlideStyleArchive,
            other => RecordKind::Other(other.to_string()),
        }
    }
}

/// Position of an object (and optionally one of its `datas` entries) inside
/// a set of trees. This is a back-reference, not ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef {
    /// Index of the tree within the document's tree set
    pub tree: usize,
    /// Chunk index
    pub chunk: usize,
    /// Archive index within the chunk
    pub archive: usize,
    /// Object index within the archive
    pub object: usize,
    /// Entry within the object's `datas` list, for asset declarations
    pub data: Option<usize>,
}

/// Follow `path` through nested mappings, returning `None` as soon as a key
/// is missing or a value is not a mapping.
pub fn lookup<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

fn seq<'v>(value: &'v Value, key: &str) -> &'v [Value] {
    value
        .get(key)
        .and_then(Value::as_sequence)
        .map_or(&[][..], Vec::as_slice)
}

/// A borrowed view of one metadata object.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    value: &'a Value,
}

impl<'a> Record<'a> {
    /// Wrap a raw value.
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Classified kind of this object.
    pub fn kind(&self) -> RecordKind {
        match self.value.get(KIND_KEY).and_then(Value::as_str) {
            Some(tag) => RecordKind::parse(tag),
            None => RecordKind::Other(String::new()),
        }
    }

    /// Nested field, absent on any missing key.
    pub fn get(&self, path: &[&str]) -> Option<&'a Value> {
        lookup(self.value, path)
    }

    /// Nested string field.
    pub fn str(&self, path: &[&str]) -> Option<&'a str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Nested numeric field, accepting integers and floats.
    pub fn number(&self, path: &[&str]) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    /// The `datas` asset declarations carried by this object.
    pub fn datas(&self) -> impl Iterator<Item = (usize, Record<'a>)> {
        seq(self.value, "datas").iter().map(Record::new).enumerate()
    }

    /// Raw value.
    pub fn value(&self) -> &'a Value {
        self.value
    }
}

/// One parsed metadata tree and the file it came from.
#[derive(Debug, Clone)]
pub struct MetadataTree {
    path: PathBuf,
    root: Value,
    dirty: bool,
}

impl MetadataTree {
    /// Parse a tree from disk.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ImageError::Metadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::parse(path, &text)
    }

    /// Parse a tree from YAML text; `path` is where `save` writes it.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let root: Value = serde_yaml::from_str(text).map_err(|e| ImageError::Metadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if !root.is_mapping() {
            return Err(ImageError::Metadata {
                path,
                message: "top level is not a mapping".to_string(),
            });
        }
        Ok(Self { path, root, dirty: false })
    }

    /// File this tree persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any field was changed since loading.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Visit every object with its position (`tree` is filled in by the caller's index).
    pub fn objects(&self, tree: usize) -> impl Iterator<Item = (RecordRef, Record<'_>)> {
        seq(&self.root, "chunks").iter().enumerate().flat_map(move |(chunk, c)| {
            seq(c, "archives").iter().enumerate().flat_map(move |(archive, a)| {
                seq(a, "objects").iter().enumerate().map(move |(object, o)| {
                    let at = RecordRef { tree, chunk, archive, object, data: None };
                    (at, Record::new(o))
                })
            })
        })
    }

    fn object_mut(&mut self, at: RecordRef) -> Option<&mut Value> {
        let object = self
            .root
            .get_mut("chunks")?
            .get_mut(at.chunk)?
            .get_mut("archives")?
            .get_mut(at.archive)?
            .get_mut("objects")?
            .get_mut(at.object)?;
        match at.data {
            Some(index) => object.get_mut("datas")?.get_mut(index),
            None => Some(object),
        }
    }

    /// Point an asset declaration at a renamed artifact.
    ///
    /// Returns `false` when `at` does not resolve to a mapping in this tree.
    pub fn rename_asset(&mut self, at: RecordRef, preferred_file_name: &str, file_name: &str) -> bool {
        let Some(Value::Mapping(record)) = self.object_mut(at) else {
            return false;
        };
        record.insert("preferredFileName".into(), preferred_file_name.into());
        record.insert("fileName".into(), file_name.into());
        self.dirty = true;
        true
    }

    /// Serialize back to `path()`.
    pub fn save(&mut self) -> Result<()> {
        let text = serde_yaml::to_string(&self.root).map_err(|e| ImageError::Metadata {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, text)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "saved metadata tree");
        Ok(())
    }

    /// Read a field of the object at `at`.
    pub fn record(&self, at: RecordRef) -> Option<Record<'_>> {
        let object = self
            .root
            .get("chunks")?
            .get(at.chunk)?
            .get("archives")?
            .get(at.archive)?
            .get("objects")?
            .get(at.object)?;
        let value = match at.data {
            Some(index) => object.get("datas")?.get(index)?,
            None => object,
        };
        Some(Record::new(value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const METADATA_YAML: &str = r#"
chunks:
  - archives:
      - objects:
          - _pbtype: TSP.PackageMetadata
            datas:
              - identifier: 101
                fileName: scan.tiff
                preferredFileName: Scan of whiteboard.tiff
              - identifier: 102
                fileName: ''
                preferredFileName: placeholder.png
"#;

    pub(crate) const SLIDE_YAML: &str = r#"
chunks:
  - archives:
      - objects:
          - _pbtype: TSD.ImageArchive
            data:
              identifier: 101
            originalSize:
              width: 400.0
              height: 300.0
          - _pbtype: TSD.ImageArchive
            style: {}
          - _pbtype: KN.SlideStyleArchive
            slideProperties:
              fill:
                image:
                  imagedata:
                    identifier: 101
          - _pbtype: KN.SlideStyleArchive
            slideProperties:
              fill:
                color: {r: 1.0}
          - plain: object without kind
"#;

    #[test]
    fn test_record_kinds() {
        let tree = MetadataTree::parse("Slide.iwa.yaml", SLIDE_YAML).unwrap();
        let kinds: Vec<_> = tree.objects(0).map(|(_, r)| r.kind()).collect();
        assert_eq!(kinds[0], RecordKind::ImageArchive);
        assert_eq!(kinds[2], RecordKind::SlideStyleArchive);
        assert_eq!(kinds[4], RecordKind::Other(String::new()));
    }

    #[test]
    fn test_lookup_tolerates_missing_keys() {
        let tree = MetadataTree::parse("Slide.iwa.yaml", SLIDE_YAML).unwrap();
        let records: Vec<_> = tree.objects(0).collect();

        let (_, image) = records[0];
        assert_eq!(image.number(&["originalSize", "height"]), Some(300.0));

        let (_, no_data) = records[1];
        assert!(no_data.get(&["data", "identifier"]).is_none());

        let (_, color_fill) = records[3];
        assert!(color_fill.get(&["slideProperties", "fill", "image", "imagedata", "identifier"]).is_none());
    }

    #[test]
    fn test_tree_without_chunks_has_no_objects() {
        let tree = MetadataTree::parse("Empty.iwa.yaml", "version: 1\n").unwrap();
        assert_eq!(tree.objects(0).count(), 0);
    }

    #[test]
    fn test_rejects_non_mapping_root() {
        assert!(MetadataTree::parse("Broken.iwa.yaml", "- just\n- a list\n").is_err());
        assert!(MetadataTree::parse("Broken.iwa.yaml", "chunks: [unclosed").is_err());
    }

    #[test]
    fn test_rename_asset_marks_dirty_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Metadata.iwa.yaml");
        std::fs::write(&path, METADATA_YAML).unwrap();

        let mut tree = MetadataTree::load(&path).unwrap();
        let at = RecordRef { tree: 0, chunk: 0, archive: 0, object: 0, data: Some(0) };
        assert!(tree.rename_asset(at, "Scan of whiteboard.png", "scan.png"));
        assert!(tree.is_dirty());
        tree.save().unwrap();

        let reloaded = MetadataTree::load(&path).unwrap();
        let record = reloaded.record(at).unwrap();
        assert_eq!(record.str(&["fileName"]), Some("scan.png"));
        assert_eq!(record.str(&["preferredFileName"]), Some("Scan of whiteboard.png"));
        assert_eq!(record.number(&["identifier"]), Some(101.0));
    }

    #[test]
    fn test_rename_out_of_range_is_rejected() {
        let mut tree = MetadataTree::parse("Metadata.iwa.yaml", METADATA_YAML).unwrap();
        let at = RecordRef { tree: 0, chunk: 3, archive: 0, object: 0, data: Some(0) };
        assert!(!tree.rename_asset(at, "a.png", "a.png"));
        assert!(!tree.is_dirty());
    }
}
