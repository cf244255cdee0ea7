use std::ops::Range;

use bytes::Bytes;
use log::debug;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{ContainerError, ContainerResult};
use crate::globals::GlobalState;

/// Fetches a URL and parses the body as JSON.
///
/// Non-success status codes fail with the upstream request error.
pub(crate) fn get_json(url: &str) -> ContainerResult<Value> {
    let state = GlobalState::instance()?;
    debug!("GET {url}");
    let value = state.block_on(async {
        state
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    })?;
    Ok(value)
}

pub(crate) fn post_json(url: &str, body: &Value) -> ContainerResult<Value> {
    let state = GlobalState::instance()?;
    debug!("POST {url}");
    let value = state.block_on(async {
        state
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    })?;
    Ok(value)
}

/// Fetches a URL, or a byte range of it.
///
/// Servers that ignore the `Range` header are handled by slicing the full body.
pub(crate) fn get_bytes(url: &str, range: Option<Range<usize>>) -> ContainerResult<Bytes> {
    if let Some(range) = &range {
        if range.is_empty() {
            return Ok(Bytes::new());
        }
    }
    let state = GlobalState::instance()?;
    debug!("GET {url}");
    let (status, body) = state.block_on(async {
        let mut request = state.http.get(url);
        if let Some(range) = &range {
            request = request.header(RANGE, format!("bytes={}-{}", range.start, range.end - 1));
        }
        let response = request.send().await?.error_for_status()?;
        let status = response.status();
        Ok::<_, reqwest::Error>((status, response.bytes().await?))
    })?;
    match range {
        Some(range) if status != StatusCode::PARTIAL_CONTENT => {
            if range.end > body.len() {
                return Err(ContainerError::invalid_data(format!(
                    "range {}..{} is out of bounds for {url} ({} bytes)",
                    range.start,
                    range.end,
                    body.len()
                )));
            }
            Ok(body.slice(range))
        }
        _ => Ok(body),
    }
}

pub(crate) fn is_http(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
