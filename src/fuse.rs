// src/fuse.rs
//
// Fusion orchestrator: resolve identifier fields, run both fetch stages
// concurrently, key both collections by the derived geographic identifier,
// merge, and wrap the result as a FeatureCollection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::config::RequestConfig;
use crate::decode::Record;
use crate::error::{Error, Result};
use crate::fetch::{fetch_geo, fetch_stats};
use crate::geoids::ReferenceMapCache;
use crate::merge::{merge_keyed, Indicators, KeyedEntry};
use crate::transport::Transport;

/// The final output: either complete and fully joined, or never produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Value>) -> Self {
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Run the full pipeline for one query: stats and geo fetched concurrently,
/// joined by identifier, partial matches dropped.
///
/// Both fetches always run to completion before either side's failure is
/// surfaced (a join, not a race); the caller receives either a complete
/// collection or the first error, never partial data.
#[instrument(level = "info", skip(transport, cache), fields(vintage = config.vintage))]
pub async fn fuse<T: Transport>(
    transport: &T,
    cache: &ReferenceMapCache,
    config: RequestConfig,
) -> Result<FeatureCollection> {
    config.validate()?;

    // The identifier composition must be known before geo features can be
    // keyed, so the reference map resolves ahead of the concurrent fetches.
    let reference = cache.resolve(transport).await?;
    let finest = config.finest_level()?;
    let ids: Vec<String> = reference
        .id_fields(&finest.name, config.vintage)
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "no identifier fields known for level `{}` at vintage {}",
                finest.name, config.vintage
            ))
        })?
        .to_vec();
    let vars = config.vars_count();
    debug!(level = %finest.name, ids = ids.len(), vars, "identifier fields resolved");

    let (stats, geo) = tokio::join!(fetch_stats(transport, &config), fetch_geo(transport, &config));
    let (stats, geo) = (stats?, geo?);

    let mut entries: Vec<KeyedEntry> = Vec::with_capacity(stats.len() + geo.len());
    for record in stats {
        entries.push(key_stats_record(record, vars, &ids)?);
    }
    for feature in geo {
        if let Some(entry) = key_feature(feature, &ids) {
            entries.push(entry);
        }
    }

    let indicators = Indicators {
        stats_value: config.values[0].clone(),
        stats_predicate: config.predicates.first().map(|(name, _)| name.clone()),
        geo_id: ids[0].clone(),
    };
    let features = merge_keyed(entries, &indicators);
    info!(features = features.len(), "fusion complete");
    Ok(FeatureCollection::new(features))
}

/// Key one stats record by concatenating the identifier columns the remote
/// API appends after the requested variables. The row shape is checked
/// against that convention instead of trusted: a record that is not exactly
/// `vars` statistic fields plus one field per identifier component fails fast.
fn key_stats_record(record: Record, vars: usize, ids: &[String]) -> Result<KeyedEntry> {
    if record.len() != vars + ids.len() {
        return Err(Error::Decode(format!(
            "stats record has {} fields, expected {} variables plus {} identifier columns",
            record.len(),
            vars,
            ids.len()
        )));
    }
    let identifier: String = record
        .values()
        .skip(vars)
        .map(key_fragment)
        .collect();
    Ok((identifier, json!({ "properties": Value::Object(record) })))
}

/// Key one feature by concatenating its `properties` values at the identifier
/// component fields, in order. A feature missing a component can never join,
/// and a partial key could alias a different geography, so it is skipped.
fn key_feature(feature: Value, ids: &[String]) -> Option<KeyedEntry> {
    let props = feature.get("properties")?;
    let mut identifier = String::new();
    for id in ids {
        match props.get(id) {
            Some(value) if !value.is_null() => identifier.push_str(&key_fragment(value)),
            _ => {
                debug!(field = %id, "feature missing identifier component, skipped");
                return None;
            }
        }
    }
    Some((identifier, feature))
}

fn key_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoLevel;
    use crate::transport::StaticTransport;
    use crate::wire::{geo_url, stats_url, GEOIDS_URL};
    use anyhow::Result;
    use serde_json::json;

    fn init_tracing() {
        use tracing_subscriber::{fmt, EnvFilter};
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    }

    fn county_config() -> RequestConfig {
        RequestConfig {
            vintage: 2019,
            source_path: vec!["acs".into(), "acs5".into()],
            values: vec!["B01001_001E".into()],
            predicates: vec![("PORT".into(), "1201".into())],
            geo_hierarchy: vec![GeoLevel::new("state", "01"), GeoLevel::new("county", "*")],
            key: None,
        }
    }

    fn geoids_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "county": {"2019": {"id-fields": ["state", "county"]}}
        }))
        .unwrap()
    }

    fn stats_body() -> Vec<u8> {
        serde_json::to_vec(&json!([
            ["B01001_001E", "PORT", "state", "county"],
            ["4874747", "1201", "01", "000"],
        ]))
        .unwrap()
    }

    fn geo_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "properties": {"NAME": "Alabama", "state": "01", "county": "000"},
                    "geometry": {"type": "Point", "coordinates": [-86.9, 32.8]},
                },
                {
                    // No stats counterpart: must be dropped, not null-padded.
                    "properties": {"NAME": "Alaska", "state": "02", "county": "000"},
                    "geometry": {"type": "Point", "coordinates": [-152.0, 64.0]},
                },
            ],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn fuses_matching_stats_and_geo_into_one_feature() -> Result<()> {
        init_tracing();
        let cfg = county_config();
        let transport = StaticTransport::new()
            .ok(GEOIDS_URL, geoids_body())
            .ok(stats_url(&cfg), stats_body())
            .ok(geo_url(&cfg), geo_body());

        let collection = fuse(&transport, &ReferenceMapCache::new(), cfg).await?;

        assert_eq!(collection.kind, "FeatureCollection");
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature["properties"]["NAME"], json!("Alabama"));
        assert_eq!(feature["properties"]["B01001_001E"], json!(4874747));
        assert_eq!(feature["properties"]["PORT"], json!(1201));
        assert_eq!(feature["properties"]["state"], json!("01"));
        assert_eq!(feature["geometry"]["type"], json!("Point"));
        Ok(())
    }

    #[tokio::test]
    async fn geo_failure_fails_the_whole_call_after_both_complete() {
        init_tracing();
        let cfg = county_config();
        let transport = StaticTransport::new()
            .ok(GEOIDS_URL, geoids_body())
            .ok(stats_url(&cfg), stats_body())
            .err(geo_url(&cfg), "boundary host unreachable");

        let err = fuse(&transport, &ReferenceMapCache::new(), cfg)
            .await
            .unwrap_err();
        match err {
            Error::Transport { url, message } => {
                assert!(url.ends_with(".json"));
                assert!(message.contains("unreachable"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        // Reference map, stats and geo were all driven to completion: the
        // stats fetch is not cancelled when its sibling fails.
        assert_eq!(transport.hits(), 3);
    }

    #[tokio::test]
    async fn unknown_vintage_is_invalid_config_before_any_data_fetch() {
        let mut cfg = county_config();
        cfg.vintage = 1999;
        let transport = StaticTransport::new().ok(GEOIDS_URL, geoids_body());

        let err = fuse(&transport, &ReferenceMapCache::new(), cfg)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test]
    async fn misshapen_stats_row_fails_the_identity_convention_check() {
        let cfg = county_config();
        // Only one identifier column where the reference map promises two.
        let short = serde_json::to_vec(&json!([
            ["B01001_001E", "PORT", "state"],
            ["4874747", "1201", "01"],
        ]))
        .unwrap();
        let transport = StaticTransport::new()
            .ok(GEOIDS_URL, geoids_body())
            .ok(stats_url(&cfg), short)
            .ok(geo_url(&cfg), geo_body());

        let err = fuse(&transport, &ReferenceMapCache::new(), cfg)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn feature_missing_an_id_component_is_skipped_not_miskeyed() -> Result<()> {
        let cfg = county_config();
        let geo = serde_json::to_vec(&json!({
            "features": [
                {"properties": {"NAME": "Alabama", "state": "01", "county": "000"}, "geometry": null},
                {"properties": {"NAME": "Nowhere", "state": "01"}, "geometry": null},
            ],
        }))
        .unwrap();
        let transport = StaticTransport::new()
            .ok(GEOIDS_URL, geoids_body())
            .ok(stats_url(&cfg), stats_body())
            .ok(geo_url(&cfg), geo);

        let collection = fuse(&transport, &ReferenceMapCache::new(), cfg).await?;
        assert_eq!(collection.features.len(), 1);
        assert_eq!(
            collection.features[0]["properties"]["NAME"],
            json!("Alabama")
        );
        Ok(())
    }

    #[test]
    fn collection_serializes_with_the_wire_type_tag() {
        let collection = FeatureCollection::new(vec![]);
        let doc = serde_json::to_value(&collection).unwrap();
        assert_eq!(doc, json!({"type": "FeatureCollection", "features": []}));
    }
}
