// src/wire.rs
//
// Pure wire formatting: stats/geo request URLs and the geography-level name
// transform between internal identifier form and the remote vocabulary.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::RequestConfig;

/// Base of the tabular statistics API.
pub static STATS_BASE: &str = "https://api.census.gov/data";

/// Base of the boundary (GeoJSON) endpoint.
pub static GEO_BASE: &str = "https://geodata.census.gov/geojson/500k";

/// Fixed location of the static geography-to-identifier reference document.
pub static GEOIDS_URL: &str = "https://geodata.census.gov/reference/geoids.json";

/// Query escaping per the wire contract: spaces become `%20` (never `+`), and
/// characters that would break query structure are escaped. `:`, `,`, `*` and
/// `/` are part of the remote vocabulary and pass through literally.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

fn escape(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

/// Map an internal geography-level identifier to the remote vocabulary.
/// Reserved tokens, longest first: `-_` → ` (`, `_` → `)`, `!` → `/`, `-` → ` `.
pub fn to_api_name(name: &str) -> String {
    name.replace("-_", " (")
        .replace('_', ")")
        .replace('!', "/")
        .replace('-', " ")
}

/// Inverse of [`to_api_name`]: recover internal identifier form from a remote
/// string. ` (` must be handled before the bare space.
pub fn to_internal_name(name: &str) -> String {
    name.replace(" (", "-_")
        .replace(')', "_")
        .replace('/', "!")
        .replace(' ', "-")
}

/// Build the stats query URL. Deterministic and pure; config invariants are a
/// precondition (checked by `RequestConfig::validate` before any builder runs).
///
/// Shape: `<base>/<vintage>/<path>?get=..[&pred=val..][&in=lvl:val%20..]
/// &for=lvl:val[,val..][&key=k]` — exactly one `for` clause for the finest
/// level, all coarser levels space-separated inside a single `in` clause.
pub fn stats_url(config: &RequestConfig) -> String {
    let mut url = format!(
        "{}/{}/{}?get={}",
        STATS_BASE,
        config.vintage,
        config.source_path.join("/"),
        config
            .values
            .iter()
            .map(|v| escape(v))
            .collect::<Vec<_>>()
            .join(","),
    );

    for (name, value) in &config.predicates {
        url.push('&');
        url.push_str(&escape(name));
        url.push('=');
        url.push_str(&escape(value));
    }

    let (finest, coarser) = match config.geo_hierarchy.split_last() {
        Some(split) => split,
        None => return url,
    };

    if !coarser.is_empty() {
        let clauses = coarser
            .iter()
            .map(|level| {
                let value = level.values.first().map(String::as_str).unwrap_or("");
                format!("{}:{}", escape(&to_api_name(&level.name)), escape(value))
            })
            .collect::<Vec<_>>()
            .join("%20");
        url.push_str("&in=");
        url.push_str(&clauses);
    }

    url.push_str("&for=");
    url.push_str(&escape(&to_api_name(&finest.name)));
    url.push(':');
    url.push_str(
        &finest
            .values
            .iter()
            .map(|v| escape(v))
            .collect::<Vec<_>>()
            .join(","),
    );

    if let Some(key) = &config.key {
        url.push_str("&key=");
        url.push_str(&escape(key));
    }

    url
}

/// Build the boundary URL for the finest geography level of the hierarchy.
pub fn geo_url(config: &RequestConfig) -> String {
    let level = config
        .geo_hierarchy
        .last()
        .map(|l| l.name.as_str())
        .unwrap_or_default();
    format!(
        "{}/{}/{}.json",
        GEO_BASE,
        config.vintage,
        escape(&to_api_name(level))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeoLevel, RequestConfig};
    use std::collections::HashMap;
    use url::Url;

    fn config() -> RequestConfig {
        RequestConfig {
            vintage: 2019,
            source_path: vec!["acs".into(), "acs5".into()],
            values: vec!["NAME".into(), "B01001_001E".into()],
            predicates: vec![("PORT".into(), "1201".into())],
            geo_hierarchy: vec![GeoLevel::new("state", "01"), GeoLevel::new("county", "*")],
            key: Some("secret".into()),
        }
    }

    #[test]
    fn level_name_transform_round_trips() {
        for internal in [
            "county",
            "combined-statistical-area",
            "metropolitan-statistical-area!micropolitan-statistical-area",
            "state-_or-part_",
        ] {
            let api = to_api_name(internal);
            assert_eq!(to_internal_name(&api), internal, "via `{}`", api);
        }
        assert_eq!(to_api_name("state-_or-part_"), "state (or part)");
    }

    #[test]
    fn stats_url_recovers_config_on_parse_back() {
        let cfg = config();
        let url = Url::parse(&stats_url(&cfg)).unwrap();

        assert_eq!(
            url.path(),
            format!("/data/{}/acs/acs5", cfg.vintage).as_str()
        );
        let pairs: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs["get"], "NAME,B01001_001E");
        assert_eq!(pairs["PORT"], "1201");
        assert_eq!(pairs["in"], "state:01");
        assert_eq!(pairs["for"], "county:*");
        assert_eq!(pairs["key"], "secret");
    }

    #[test]
    fn coarser_levels_join_inside_one_in_clause() {
        let mut cfg = config();
        cfg.geo_hierarchy = vec![
            GeoLevel::new("state", "01"),
            GeoLevel::new("county", "001"),
            GeoLevel::new("tract", "*"),
        ];
        let url = stats_url(&cfg);
        assert!(url.contains("&in=state:01%20county:001"));
        assert!(url.contains("&for=tract:*"));
        assert_eq!(url.matches("&in=").count(), 1);
        assert_eq!(url.matches("&for=").count(), 1);
    }

    #[test]
    fn multi_value_finest_level_joins_with_commas() {
        let mut cfg = config();
        cfg.geo_hierarchy[1].values = vec!["001".into(), "003".into()];
        assert!(stats_url(&cfg).ends_with("&for=county:001,003&key=secret"));
    }

    #[test]
    fn geo_url_uses_remote_level_vocabulary() {
        let mut cfg = config();
        cfg.geo_hierarchy = vec![GeoLevel::new("combined-statistical-area", "*")];
        assert_eq!(
            geo_url(&cfg),
            format!("{}/2019/combined%20statistical%20area.json", GEO_BASE)
        );
    }
}
