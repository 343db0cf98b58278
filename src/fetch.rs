// src/fetch.rs
//
// The two fetch stages: build the request, drive it through the transport,
// decode the body, and emit the whole decoded collection as one unit. Errors
// travel out as values; the orchestrator decides that they are fatal.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::RequestConfig;
use crate::decode::{decode_feature_collection, decode_raw_rows, Record, RowDecoder};
use crate::error::Result;
use crate::transport::Transport;
use crate::wire;

/// Fetch and decode one stats response: raw rows in, one ordered record
/// collection out. Numeric coercion covers the requested value and predicate
/// columns; the appended geography-identifier columns stay strings.
#[instrument(level = "info", skip_all, fields(vintage = config.vintage))]
pub async fn fetch_stats<T: Transport>(
    transport: &T,
    config: &RequestConfig,
) -> Result<Vec<Record>> {
    let url = wire::stats_url(config);
    let body = transport.fetch(&url).await?;
    let rows = decode_raw_rows(&body)?;
    let records = RowDecoder::new(0..config.vars_count()).decode_rows(rows)?;
    debug!(records = records.len(), "stats decoded");
    Ok(records)
}

/// Fetch the boundary document for the finest geography level and extract its
/// feature list, each feature passed through unmodified.
#[instrument(level = "info", skip_all, fields(vintage = config.vintage))]
pub async fn fetch_geo<T: Transport>(transport: &T, config: &RequestConfig) -> Result<Vec<Value>> {
    let url = wire::geo_url(config);
    let body = transport.fetch(&url).await?;
    let features = decode_feature_collection(&body)?;
    debug!(features = features.len(), "geo decoded");
    Ok(features)
}
