use std::collections::HashSet;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::{ContainerError, ContainerResult};
use crate::http::{get_json, post_json};
use crate::model::{Item, ItemCollection};

/// A handle to a catalog query that can be materialized into items.
pub trait ItemSearch {
    /// Returns every matching item, in the order the service returns them.
    fn items(&self) -> ContainerResult<ItemCollection>;
}

/// A search against the `/search` endpoint of a STAC API.
///
/// Pages are followed through `rel="next"` links until none is left, or until
/// a link asks for a page that was already requested.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSearch {
    pub url: String,
    pub body: Map<String, Value>,
}

impl ApiSearch {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }
}

enum PageRequest {
    Get(String),
    Post(String, Value),
}

impl PageRequest {
    fn key(&self) -> String {
        match self {
            PageRequest::Get(url) => format!("GET {url}"),
            PageRequest::Post(url, body) => format!("POST {url} {body}"),
        }
    }
}

impl ItemSearch for ApiSearch {
    fn items(&self) -> ContainerResult<ItemCollection> {
        let mut items = Vec::new();
        let mut request = Some(PageRequest::Post(
            self.url.clone(),
            Value::Object(self.body.clone()),
        ));
        let mut pages = 0usize;
        let mut visited = HashSet::new();
        while let Some(current) = request.take() {
            if !visited.insert(current.key()) {
                warn!("search page {} was already requested, stopping", current.key());
                break;
            }
            let page = match &current {
                PageRequest::Get(url) => get_json(url)?,
                PageRequest::Post(url, body) => post_json(url, body)?,
            };
            pages += 1;
            let features = page
                .get("features")
                .and_then(|f| f.as_array())
                .ok_or_else(|| ContainerError::invalid_data("search page has no `features`"))?;
            for feature in features {
                items.push(serde_json::from_value::<Item>(feature.clone())?);
            }
            request = next_request(&page, &current);
        }
        debug!("search returned {} item(s) in {pages} page(s)", items.len());
        Ok(ItemCollection::new(items))
    }
}

fn next_request(page: &Value, current: &PageRequest) -> Option<PageRequest> {
    let link = page
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(|r| r.as_str()) == Some("next"))?;
    let href = link.get("href")?.as_str()?.to_string();
    let method = link.get("method").and_then(|m| m.as_str()).unwrap_or("GET");
    if !method.eq_ignore_ascii_case("POST") {
        return Some(PageRequest::Get(href));
    }
    let link_body = link.get("body").cloned().unwrap_or(Value::Object(Map::new()));
    let merge = link.get("merge").and_then(|m| m.as_bool()).unwrap_or(false);
    let body = match (merge, current, link_body) {
        (true, PageRequest::Post(_, Value::Object(previous)), Value::Object(next)) => {
            let mut body = previous.clone();
            body.extend(next);
            Value::Object(body)
        }
        (_, _, body) => body,
    };
    Some(PageRequest::Post(href, body))
}
