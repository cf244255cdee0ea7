use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The extra field holding per-asset open options for the array container.
pub const XARRAY_OPEN_KWARGS: &str = "xarray:open_kwargs";
/// The extra field holding per-asset storage options for table readers.
pub const TABLE_STORAGE_OPTIONS: &str = "table:storage_options";

/// A file referenced by an item, described by href, media type and roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

impl Asset {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: None,
            title: None,
            description: None,
            roles: vec![],
            extra_fields: Map::new(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_fields.insert(key.into(), value);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the object-valued extra field `key`, if present.
    pub(crate) fn extra_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.extra_fields.get(key).and_then(|v| v.as_object())
    }
}
