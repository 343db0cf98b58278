// src/lib.rs
//
// geofuse: fetch tabular statistics and geographic boundaries from two remote
// sources concurrently, decode them, and deep-merge the record sets into one
// enriched FeatureCollection keyed by a derived geographic identifier.
//
// The pipeline is: `fuse::fuse` resolves the identifier composition through
// `geoids::ReferenceMapCache`, drives the stats and geo stages in `fetch`
// concurrently over a `transport::Transport`, decodes with `decode`, and joins
// with `merge`. `wire` holds the pure request formatting.

pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod fuse;
pub mod geoids;
pub mod merge;
pub mod transport;
pub mod wire;

pub use config::{GeoLevel, RequestConfig};
pub use decode::{Record, RowDecoder};
pub use error::{Error, Result};
pub use fuse::{fuse, FeatureCollection};
pub use geoids::{ReferenceMap, ReferenceMapCache};
pub use merge::{deep_merge, Indicators};
pub use transport::{HttpTransport, StaticTransport, Transport};
