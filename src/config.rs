// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// One level of a geography hierarchy: a level name (internal identifier form,
/// e.g. "county" or "combined-statistical-area") and its filter values.
/// Only the final (finest) level of a hierarchy may carry more than one value;
/// `"*"` is passed through to the remote API as a wildcard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeoLevel {
    pub name: String,
    pub values: Vec<String>,
}

impl GeoLevel {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        GeoLevel {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

/// Immutable description of one statistics query. Owned by the caller and
/// passed by value into the pipeline.
///
/// Serde aliases accept the remote vocabulary's camelCase field names, so a
/// foreign-shaped JSON config normalizes here once; the pipeline never branches
/// on input representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestConfig {
    /// Dataset reference year.
    pub vintage: u32,
    /// Ordered path segments selecting the dataset, e.g. ["acs", "acs5"].
    #[serde(alias = "sourcePath")]
    pub source_path: Vec<String>,
    /// Requested statistic field names, in response-column order.
    pub values: Vec<String>,
    /// Ordered field-name → filter-value constraints.
    #[serde(default)]
    pub predicates: Vec<(String, String)>,
    /// Geography hierarchy, coarsest level first, finest last.
    #[serde(alias = "geoHierarchy")]
    pub geo_hierarchy: Vec<GeoLevel>,
    /// API access key, appended to the query when present.
    #[serde(default, alias = "statsKey")]
    pub key: Option<String>,
}

impl RequestConfig {
    /// Check the invariants the builders rely on. Runs before any I/O; a
    /// violation is `InvalidConfig`, never a downstream decode surprise.
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(Error::InvalidConfig("no values requested".into()));
        }
        if self.geo_hierarchy.is_empty() {
            return Err(Error::InvalidConfig("empty geography hierarchy".into()));
        }
        for level in &self.geo_hierarchy {
            if level.values.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "geography level `{}` has no value",
                    level.name
                )));
            }
        }
        let coarser = &self.geo_hierarchy[..self.geo_hierarchy.len() - 1];
        if let Some(bad) = coarser.iter().find(|l| l.values.len() > 1) {
            return Err(Error::InvalidConfig(format!(
                "only the finest geography level may name multiple values, `{}` has {}",
                bad.name,
                bad.values.len()
            )));
        }
        Ok(())
    }

    /// The finest-grained level of the hierarchy. Callers must `validate()`
    /// first; an empty hierarchy never reaches here.
    pub fn finest_level(&self) -> Result<&GeoLevel> {
        self.geo_hierarchy
            .last()
            .ok_or_else(|| Error::InvalidConfig("empty geography hierarchy".into()))
    }

    /// Number of statistic fields expected per stats row: requested values
    /// plus predicate columns. The remote API appends geography-identifying
    /// columns after these.
    pub fn vars_count(&self) -> usize {
        self.values.len() + self.predicates.len()
    }

    /// Parse a config from JSON text, accepting either snake_case or the
    /// remote vocabulary's camelCase field names, then validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let cfg: RequestConfig = serde_json::from_str(text)
            .map_err(|e| Error::InvalidConfig(format!("unparseable config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::InvalidConfig(format!(
                "cannot read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json_str(&text)
    }
}
