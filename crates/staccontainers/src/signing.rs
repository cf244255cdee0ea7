use std::fmt::Debug;

use crate::error::ContainerResult;

/// Rewrites a URL so that the storage service accepts it.
pub trait Signer: Debug + Send + Sync {
    fn sign_url(&self, url: &str) -> ContainerResult<String>;
}

/// A signer that leaves URLs untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSigner;

impl Signer for NoopSigner {
    fn sign_url(&self, url: &str) -> ContainerResult<String> {
        Ok(url.to_string())
    }
}

#[cfg(feature = "signing")]
pub use planetary_computer::PlanetaryComputerSigner;

#[cfg(feature = "signing")]
mod planetary_computer {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use log::debug;
    use staccontainers_common::config::SigningConfig;
    use url::Url;

    use super::Signer;
    use crate::error::{ContainerError, ContainerResult};
    use crate::http::get_json;

    const BLOB_HOST_SUFFIX: &str = ".blob.core.windows.net";

    /// Signs Azure Blob Storage URLs with SAS tokens from a token endpoint.
    ///
    /// Tokens are requested once per (account, container) for the lifetime of the signer.
    #[derive(Debug)]
    pub struct PlanetaryComputerSigner {
        token_endpoint: String,
        tokens: Mutex<HashMap<(String, String), String>>,
    }

    impl PlanetaryComputerSigner {
        pub fn new(config: &SigningConfig) -> Self {
            Self {
                token_endpoint: config.token_endpoint.trim_end_matches('/').to_string(),
                tokens: Mutex::new(HashMap::new()),
            }
        }

        fn token(&self, account: &str, container: &str) -> ContainerResult<String> {
            let key = (account.to_string(), container.to_string());
            {
                let tokens = self
                    .tokens
                    .lock()
                    .map_err(|e| ContainerError::internal(e.to_string()))?;
                if let Some(token) = tokens.get(&key) {
                    return Ok(token.clone());
                }
            }
            let endpoint = format!("{}/{account}/{container}", self.token_endpoint);
            debug!("requesting SAS token for {account}/{container}");
            let response = get_json(&endpoint)?;
            let token = response
                .get("token")
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    ContainerError::invalid_data(format!("no token in response from {endpoint}"))
                })?
                .to_string();
            self.tokens
                .lock()
                .map_err(|e| ContainerError::internal(e.to_string()))?
                .insert(key, token.clone());
            Ok(token)
        }
    }

    impl Signer for PlanetaryComputerSigner {
        fn sign_url(&self, url: &str) -> ContainerResult<String> {
            let Some((account, container)) = blob_location(url) else {
                return Ok(url.to_string());
            };
            if is_signed(url) {
                return Ok(url.to_string());
            }
            let token = self.token(&account, &container)?;
            let separator = if url.contains('?') { '&' } else { '?' };
            Ok(format!("{url}{separator}{token}"))
        }
    }

    /// Extracts the storage account and container of an Azure Blob Storage URL.
    pub(super) fn blob_location(url: &str) -> Option<(String, String)> {
        let parsed = Url::parse(url).ok()?;
        if parsed.scheme() != "https" {
            return None;
        }
        let account = parsed.host_str()?.strip_suffix(BLOB_HOST_SUFFIX)?;
        let container = parsed.path_segments()?.next().filter(|s| !s.is_empty())?;
        Some((account.to_string(), container.to_string()))
    }

    fn is_signed(url: &str) -> bool {
        Url::parse(url)
            .map(|u| {
                let mut keys = u.query_pairs().map(|(k, _)| k.into_owned());
                keys.any(|k| k == "sig")
            })
            .unwrap_or(false)
    }

}
