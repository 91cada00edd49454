//! Reference resolution: where in the document each asset is used.

use crate::asset::{AssetId, ContentReference, StyleReference};
use crate::metadata::{MetadataTree, RecordKind};
use crate::registry::AssetRegistry;

const CONTENT_IDENTIFIER: &[&str] = &["data", "identifier"];
const CONTENT_HEIGHT: &[&str] = &["originalSize", "height"];
const STYLE_IDENTIFIER: &[&str] = &["slideProperties", "fill", "image", "imagedata", "identifier"];

/// Counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReferenceStats {
    /// Content usages attached to known assets
    pub content: usize,
    /// Style/background usages attached to known assets
    pub style: usize,
    /// Usages naming identifiers the registry does not hold
    pub unknown: usize,
}

/// Attach every content and style usage found in `trees` to the registry.
///
/// Tree indices in the attached references are positions in `trees`.
/// Objects missing any key along the way simply carry no reference.
pub fn resolve_references(trees: &[MetadataTree], registry: &mut AssetRegistry) -> ReferenceStats {
    let mut stats = ReferenceStats::default();

    for (index, tree) in trees.iter().enumerate() {
        for (at, record) in tree.objects(index) {
            let (path, is_content) = match record.kind() {
                RecordKind::ImageArchive => (CONTENT_IDENTIFIER, true),
                RecordKind::SlideStyleArchive => (STYLE_IDENTIFIER, false),
                RecordKind::Other(_) => continue,
            };
            let Some(id) = record.get(path).and_then(AssetId::from_value) else {
                continue;
            };
            let Some(asset) = registry.get_mut(&id) else {
                stats.unknown += 1;
                continue;
            };

            if is_content {
                asset.add_slide_reference(ContentReference {
                    record: at,
                    declared_height: record.number(CONTENT_HEIGHT),
                });
                stats.content += 1;
            } else {
                asset.add_slide_style_reference(StyleReference { record: at });
                stats.style += 1;
            }
        }
    }

    tracing::debug!(
        trees = trees.len(),
        content = stats.content,
        style = stats.style,
        unknown = stats.unknown,
        "references resolved"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ImageAsset;
    use crate::metadata::tests::SLIDE_YAML;
    use crate::metadata::RecordRef;

    fn registry_with(dir: &std::path::Path, ids: &[&str]) -> AssetRegistry {
        AssetRegistry::from_assets(ids.iter().map(|id| {
            let path = dir.join(format!("{id}.png"));
            std::fs::write(&path, b"png").unwrap();
            let origin = RecordRef { tree: 0, chunk: 0, archive: 0, object: 0, data: Some(0) };
            ImageAsset::new(AssetId::new(*id), origin, format!("{id}.png"), path).unwrap()
        }))
    }

    #[test]
    fn test_content_and_style_references() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry_with(dir.path(), &["101", "202"]);
        let trees = vec![
            MetadataTree::parse("Document.iwa.yaml", "chunks: []\n").unwrap(),
            MetadataTree::parse("Slide-1.iwa.yaml", SLIDE_YAML).unwrap(),
        ];

        let stats = resolve_references(&trees, &mut registry);
        assert_eq!(stats, ReferenceStats { content: 1, style: 1, unknown: 0 });

        let asset = registry.get(&AssetId::new("101")).unwrap();
        assert_eq!(asset.slide_references().len(), 1);
        assert_eq!(asset.slide_references()[0].declared_height, Some(300.0));
        assert_eq!(asset.slide_references()[0].record.tree, 1);
        assert_eq!(asset.slide_style_references().len(), 1);
        assert_eq!(asset.slide_style_references()[0].record.object, 2);
    }

    #[test]
    fn test_unreferenced_asset_gets_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry_with(dir.path(), &["101", "202"]);
        let trees = vec![MetadataTree::parse("Slide-1.iwa.yaml", SLIDE_YAML).unwrap()];

        resolve_references(&trees, &mut registry);
        let lonely = registry.get(&AssetId::new("202")).unwrap();
        assert!(lonely.slide_references().is_empty());
        assert!(lonely.slide_style_references().is_empty());
        assert!(!lonely.has_references());
    }

    #[test]
    fn test_unknown_identifiers_are_ignored() {
        let mut registry = AssetRegistry::default();
        let trees = vec![MetadataTree::parse("Slide-1.iwa.yaml", SLIDE_YAML).unwrap()];

        let stats = resolve_references(&trees, &mut registry);
        assert_eq!(stats.unknown, 2);
        assert_eq!(stats.content + stats.style, 0);
    }

    #[test]
    fn test_references_accumulate_across_trees() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry_with(dir.path(), &["101"]);
        let trees = vec![
            MetadataTree::parse("Slide-1.iwa.yaml", SLIDE_YAML).unwrap(),
            MetadataTree::parse("Slide-2.iwa.yaml", SLIDE_YAML).unwrap(),
        ];

        resolve_references(&trees, &mut registry);
        let asset = registry.get(&AssetId::new("101")).unwrap();
        let trees_seen: Vec<_> = asset.slide_references().iter().map(|r| r.record.tree).collect();
        assert_eq!(trees_seen, [0, 1]);
        assert_eq!(asset.slide_style_references().len(), 2);
    }
}
