//! Error types shared by the platform adapters
//!
//! Nothing here is fatal to the hosting page. The watcher and the clearer
//! log these and carry on.

/// Failures raised by storage, network, or response parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Version endpoint returned HTTP {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Parse(err.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl CacheError {
    /// Wrap a JS exception thrown by a storage call
    pub fn storage(err: wasm_bindgen::JsValue) -> Self {
        CacheError::Storage(format!("{:?}", err))
    }

    /// Wrap a JS exception thrown by `fetch` or a body reader
    pub fn network(err: wasm_bindgen::JsValue) -> Self {
        CacheError::Network(format!("{:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CacheError = err.into();
        assert!(matches!(err, CacheError::Parse(_)));
    }

    #[test]
    fn test_http_error_message() {
        assert_eq!(
            CacheError::Http(503).to_string(),
            "Version endpoint returned HTTP 503"
        );
    }
}
