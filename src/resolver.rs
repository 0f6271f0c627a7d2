use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::GenerationApi;
use crate::error::{GenError, Result};
use crate::types::ResolvedAsset;

/// Turns a completed job's asset reference into the full asset record.
///
/// Each asset is fetched at most once; later resolutions for the same id
/// are served from memory. A fetch failure is reported as
/// [`GenError::Resolution`]; the generation itself succeeded, so it is
/// never conflated with a generation failure.
pub struct ResultResolver<A> {
    api: Arc<A>,
    resolved: Mutex<HashMap<String, ResolvedAsset>>,
}

impl<A: GenerationApi> ResultResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the asset, or return the copy resolved earlier.
    pub async fn resolve(&self, asset_id: &str) -> Result<ResolvedAsset> {
        if let Some(asset) = self.cached(asset_id) {
            return Ok(asset);
        }

        let asset = self
            .api
            .fetch_asset(asset_id)
            .await
            .map_err(|e| GenError::Resolution(format!("asset {}: {}", asset_id, e)))?;

        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(asset.id.clone(), asset.clone());
        }
        Ok(asset)
    }

    /// The already-resolved copy of an asset, if any.
    pub fn cached(&self, asset_id: &str) -> Option<ResolvedAsset> {
        self.resolved
            .lock()
            .ok()
            .and_then(|resolved| resolved.get(asset_id).cloned())
    }
}
