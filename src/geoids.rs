// src/geoids.rs
//
// Static geography-to-identifier reference document and its process-wide
// one-time-fetch cache.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::wire::GEOIDS_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LevelIds {
    #[serde(rename = "id-fields")]
    id_fields: Vec<String>,
}

/// The reference document: geography-level name → vintage → ordered list of
/// the component field names composing that level's identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceMap {
    #[serde(flatten)]
    levels: HashMap<String, HashMap<String, LevelIds>>,
}

impl ReferenceMap {
    /// Identifier component fields for `level` at `vintage`, in concatenation
    /// order, or `None` when the document knows neither.
    pub fn id_fields(&self, level: &str, vintage: u32) -> Option<&[String]> {
        self.levels
            .get(level)?
            .get(&vintage.to_string())
            .map(|ids| ids.id_fields.as_slice())
    }
}

/// One mutable cell holding the reference map, fetched at most once per
/// successful resolution. Reads never block behind the fetch: concurrent
/// cold-start callers may each fetch the document, and whichever write lands
/// last stores the same content. A failed fetch leaves the cell empty so a
/// later call can retry.
#[derive(Debug, Default)]
pub struct ReferenceMapCache {
    cell: RwLock<Option<Arc<ReferenceMap>>>,
}

static PROCESS_CACHE: Lazy<ReferenceMapCache> = Lazy::new(ReferenceMapCache::new);

impl ReferenceMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide cache. Staleness over a process lifetime is
    /// accepted; embedders needing isolation hold their own instance.
    pub fn process_wide() -> &'static ReferenceMapCache {
        &PROCESS_CACHE
    }

    /// Return the cached map, fetching and parsing the reference document
    /// first if the cell is empty.
    pub async fn resolve<T: Transport>(&self, transport: &T) -> Result<Arc<ReferenceMap>> {
        {
            let cell = self.cell.read().unwrap();
            if let Some(map) = cell.as_ref() {
                debug!("reference map served from cache");
                return Ok(Arc::clone(map));
            }
        }

        let body = transport.fetch(GEOIDS_URL).await?;
        let map: ReferenceMap = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("malformed reference map document: {}", e)))?;
        info!(levels = map.levels.len(), "reference map fetched");

        let map = Arc::new(map);
        *self.cell.write().unwrap() = Some(Arc::clone(&map));
        Ok(map)
    }
}
