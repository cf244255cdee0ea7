use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ContainerError, ContainerResult};

/// Keyword options passed to a reader, as a JSON object.
pub type OpenOptions = Map<String, Value>;

/// Reader options that can be loaded from [`OpenOptions`].
pub trait ReaderOptions: DeserializeOwned {
    /// The keys the reader understands. Other keys are ignored with a warning.
    const ALLOWED_KEYS: &'static [&'static str];
}

pub fn load_options<T: ReaderOptions>(reader: &str, options: &OpenOptions) -> ContainerResult<T> {
    let mut known = Map::new();
    for (key, value) in options {
        if T::ALLOWED_KEYS.contains(&key.as_str()) {
            known.insert(key.clone(), value.clone());
        } else {
            warn!("ignoring option `{key}` not understood by the {reader} reader");
        }
    }
    serde_json::from_value(Value::Object(known))
        .map_err(|e| ContainerError::invalid(format!("{reader} options: {e}")))
}

/// Merges option layers into one. Later layers override earlier ones per key.
pub fn merge_options(options: Vec<OpenOptions>) -> OpenOptions {
    let mut merged = Map::new();
    for layer in options {
        merged.extend(layer);
    }
    merged
}

/// Converts a JSON storage options object into the string pairs used to build object stores.
pub fn storage_options(value: Option<&Value>) -> ContainerResult<Vec<(String, String)>> {
    match value {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()),
        Some(other) => Err(ContainerError::invalid(format!(
            "storage options must be an object: {other}"
        ))),
    }
}

#[cfg(test)]
pub fn build_options(value: Value) -> OpenOptions {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct TestOptions {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        band_as_variable: bool,
    }

    impl ReaderOptions for TestOptions {
        const ALLOWED_KEYS: &'static [&'static str] = &["group", "band_as_variable"];
    }

    #[test]
    fn test_merge_options_empty() {
        let result = merge_options(vec![]);
        assert_eq!(result, Map::new());
    }

    #[test]
    fn test_merge_options_override() {
        let options = vec![
            build_options(json!({"engine": "zarr", "consolidated": false, "chunks": {}})),
            build_options(json!({"consolidated": true, "group": "a"})),
            build_options(json!({"group": "b"})),
        ];
        let result = merge_options(options);
        assert_eq!(result["engine"], "zarr");
        assert_eq!(result["consolidated"], true);
        assert_eq!(result["chunks"], json!({}));
        assert_eq!(result["group"], "b");
    }

    #[test]
    fn test_load_options_ignores_unknown_keys() {
        let options = build_options(json!({"group": "g", "decode_times": false}));
        let loaded: TestOptions = load_options("test", &options).unwrap();
        assert_eq!(loaded.group.as_deref(), Some("g"));
        assert!(!loaded.band_as_variable);
    }

    #[test]
    fn test_load_options_invalid_value() {
        let options = build_options(json!({"band_as_variable": "yes"}));
        assert!(load_options::<TestOptions>("test", &options).is_err());
    }

    #[test]
    fn test_storage_options() {
        let value = json!({"account_name": "acct", "anon": true, "skip": null});
        let options = storage_options(Some(&value)).unwrap();
        assert_eq!(
            options,
            vec![
                ("account_name".to_string(), "acct".to_string()),
                ("anon".to_string(), "true".to_string()),
            ]
        );
        assert!(storage_options(None).unwrap().is_empty());
        assert!(storage_options(Some(&json!("x"))).is_err());
    }
}
