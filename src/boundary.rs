use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AtlasError;

pub trait BoundaryClient: Send + Sync {
    fn fetch_document(&self, url: &str) -> Result<Value, AtlasError>;
}

#[derive(Clone)]
pub struct BoundaryHttpClient {
    client: Client,
}

impl BoundaryHttpClient {
    pub fn new(insecure: bool) -> Result<Self, AtlasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("lpa/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AtlasError::HttpClient(err.to_string()))?,
        );
        if insecure {
            tracing::warn!("certificate validation disabled for boundary downloads");
        }
        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|err| AtlasError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl BoundaryClient for BoundaryHttpClient {
    fn fetch_document(&self, url: &str) -> Result<Value, AtlasError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AtlasError::BoundaryHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .status()
                .canonical_reason()
                .unwrap_or("boundary request failed")
                .to_string();
            return Err(AtlasError::BoundaryStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| AtlasError::BoundaryHttp(err.to_string()))?;
        serde_json::from_str(&body).map_err(|err| AtlasError::BoundaryParse(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Value>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn feature_names(&self, limit: usize) -> Vec<Option<String>> {
        self.features
            .iter()
            .take(limit)
            .map(|feature| {
                feature
                    .get("properties")
                    .and_then(|props| props.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }
}

pub fn extract_features(area: &str, mut document: Value) -> Result<Vec<Value>, AtlasError> {
    match document.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => Ok(features),
        _ => Err(AtlasError::MissingFeatures(area.to_string())),
    }
}
