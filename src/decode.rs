// src/decode.rs
//
// Stateful row decoding for the stats response (header row then data rows) and
// shape-checked extraction of the geo response's feature list.

use serde_json::{Map, Number, Value};
use std::ops::Range;
use tracing::trace;

use crate::error::{Error, Result};
use crate::wire::to_internal_name;

/// One decoded data row: field name → string value, or number where the cell
/// was coerced.
pub type Record = Map<String, Value>;

/// Stream transform turning a header row plus N data rows into N records.
///
/// State is the explicit `header` field, absent until the first row arrives.
/// The header row itself never emits a record; a header-only or empty input
/// yields nothing and is not an error.
#[derive(Debug)]
pub struct RowDecoder {
    header: Option<Vec<String>>,
    /// Positions whose cells are coerced to numbers when lexically numeric.
    coerce: Range<usize>,
    symbolic_keys: bool,
}

impl RowDecoder {
    pub fn new(coerce: Range<usize>) -> Self {
        RowDecoder {
            header: None,
            coerce,
            symbolic_keys: false,
        }
    }

    /// Normalize header strings to internal identifier form, for callers that
    /// key records symbolically rather than by the remote's verbatim names.
    pub fn with_symbolic_keys(mut self) -> Self {
        self.symbolic_keys = true;
        self
    }

    /// The captured header, once the first row has been fed.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Feed one raw row. The first row is captured as the header and emits
    /// nothing; every later row zips against it positionally. A data row whose
    /// length differs from the header is a `Decode` error, never a silent
    /// misalignment.
    pub fn feed(&mut self, row: Vec<String>) -> Result<Option<Record>> {
        let header = match &self.header {
            None => {
                let header = if self.symbolic_keys {
                    row.iter().map(|name| to_internal_name(name)).collect()
                } else {
                    row
                };
                trace!(fields = header.len(), "captured header row");
                self.header = Some(header);
                return Ok(None);
            }
            Some(header) => header,
        };

        if row.len() != header.len() {
            return Err(Error::Decode(format!(
                "row has {} fields, header has {}",
                row.len(),
                header.len()
            )));
        }

        let mut record = Record::new();
        for (idx, (name, cell)) in header.iter().zip(row).enumerate() {
            let value = if self.coerce.contains(&idx) {
                coerce_numeric(cell)
            } else {
                Value::String(cell)
            };
            record.insert(name.clone(), value);
        }
        Ok(Some(record))
    }

    /// Decode a whole response body worth of rows, preserving input order.
    pub fn decode_rows(&mut self, rows: Vec<Vec<String>>) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(rows.len().saturating_sub(1));
        for row in rows {
            if let Some(record) = self.feed(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Coerce a cell to a JSON number if and only if it is lexically one
/// (optional sign, digits, optional decimal point/exponent); anything else
/// stays a string. `inf`/`nan` spellings are not lexically numeric here.
fn coerce_numeric(cell: String) -> Value {
    if !is_lexical_number(&cell) {
        return Value::String(cell);
    }
    if let Ok(n) = cell.parse::<i64>() {
        return Value::Number(n.into());
    }
    match cell.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell),
    }
}

fn is_lexical_number(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let (mantissa, exponent) = match s.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match frac {
        // "1.", ".5" and "1.5" are all lexically numeric; "." is not.
        Some(f) => (digits(int) && f.is_empty()) || (int.is_empty() && digits(f)) || (digits(int) && digits(f)),
        None => digits(int),
    };
    let exponent_ok = match exponent {
        Some(e) => {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            digits(e)
        }
        None => true,
    };
    mantissa_ok && exponent_ok
}

/// Extract the `features` array from a geo response body. Each element passes
/// through unmodified, but must at least carry a `properties` mapping.
pub fn decode_feature_collection(body: &[u8]) -> Result<Vec<Value>> {
    let doc: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("geo body is not valid JSON: {}", e)))?;
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Decode("geo body has no `features` array".into()))?;
    for (idx, feature) in features.iter().enumerate() {
        if !feature.get("properties").map_or(false, Value::is_object) {
            return Err(Error::Decode(format!(
                "feature {} has no `properties` mapping",
                idx
            )));
        }
    }
    Ok(features.clone())
}

/// Parse a stats response body into raw rows: a nested array of string arrays,
/// first inner array the header.
pub fn decode_raw_rows(body: &[u8]) -> Result<Vec<Vec<String>>> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("stats body is not an array of string rows: {}", e)))
}
