//! Asset registry: every image a document declares, keyed by identifier.

use crate::asset::{AssetId, ImageAsset};
use crate::error::{Diagnostic, Stage};
use crate::metadata::{MetadataTree, RecordRef};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::path::Path;

/// Insertion-ordered collection of assets.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: IndexMap<AssetId, ImageAsset>,
}

impl AssetRegistry {
    /// Index the asset declarations (`datas` entries) of the primary tree.
    ///
    /// Entries with an empty `fileName` are skipped. Entries whose artifact
    /// is missing from `data_dir` are dropped and reported as diagnostics.
    pub fn build(tree: &MetadataTree, tree_index: usize, data_dir: &Path) -> (Self, Vec<Diagnostic>) {
        let mut assets = IndexMap::new();
        let mut diagnostics = Vec::new();

        for (at, object) in tree.objects(tree_index) {
            for (data, record) in object.datas() {
                let file_name = record.str(&["fileName"]).unwrap_or_default();
                if file_name.is_empty() {
                    continue;
                }
                let Some(identifier) = record.get(&["identifier"]).and_then(AssetId::from_value) else {
                    tracing::debug!(file_name, "asset declaration without identifier");
                    continue;
                };
                let preferred = record.str(&["preferredFileName"]).unwrap_or(file_name);
                let origin = RecordRef { data: Some(data), ..at };

                match ImageAsset::new(identifier.clone(), origin, preferred, data_dir.join(file_name)) {
                    Ok(asset) => {
                        if assets.insert(identifier.clone(), asset).is_some() {
                            tracing::warn!(asset = %identifier, "identifier declared twice, keeping the last");
                        }
                    }
                    Err(err) => diagnostics.push(Diagnostic::raise(&identifier, Stage::Registry, &err)),
                }
            }
        }

        tracing::debug!(count = assets.len(), "asset registry built");
        (Self { assets }, diagnostics)
    }

    /// Build a registry from ready-made assets.
    pub fn from_assets(assets: impl IntoIterator<Item = ImageAsset>) -> Self {
        Self {
            assets: assets.into_iter().map(|a| (a.identifier().clone(), a)).collect(),
        }
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether no asset was registered.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Asset by identifier.
    pub fn get(&self, id: &AssetId) -> Option<&ImageAsset> {
        self.assets.get(id)
    }

    /// Mutable asset by identifier.
    pub fn get_mut(&mut self, id: &AssetId) -> Option<&mut ImageAsset> {
        self.assets.get_mut(id)
    }

    /// Whether `id` names a registered asset.
    pub fn contains(&self, id: &AssetId) -> bool {
        self.assets.contains_key(id)
    }

    /// Assets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageAsset> {
        self.assets.values()
    }

    /// Mutable assets in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImageAsset> {
        self.assets.values_mut()
    }

    /// Parallel mutable access for per-asset stages.
    pub fn par_iter_mut(&mut self) -> impl ParallelIterator<Item = &mut ImageAsset> {
        self.assets.par_values_mut()
    }
}
