use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ========== EVENT ==========
/// Lambda@Edge event as delivered by CloudFront
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CloudFrontEvent {
    #[serde(rename = "Records")]
    pub records: Vec<CloudFrontRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CloudFrontRecord {
    pub cf: CloudFrontPayload,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CloudFrontPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    pub request: CloudFrontRequest,
    // Absent for viewer/origin request triggers
    #[serde(default)]
    pub response: CloudFrontResponse,
}

// ========== HEADERS ==========
/// CloudFront header map: lower-cased name -> entries carrying the original casing
pub type Headers = BTreeMap<String, Vec<HeaderEntry>>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HeaderEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

// ========== REQUEST ==========
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CloudFrontRequest {
    pub uri: String,
    /// Raw query string without the leading `?`
    #[serde(default)]
    pub querystring: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CloudFrontRequest {
    pub fn new(uri: impl Into<String>, querystring: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            querystring: querystring.into(),
            extra: Map::new(),
        }
    }
}

// ========== RESPONSE ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    Text,
    Base64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CloudFrontResponse {
    #[serde(default)]
    pub status: String,
    #[serde(
        rename = "statusDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status_description: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(
        rename = "bodyEncoding",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub body_encoding: Option<BodyEncoding>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CloudFrontResponse {
    /// Replace a header, keeping CloudFront's lower-case map key convention
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(
            name.to_ascii_lowercase(),
            vec![HeaderEntry {
                key: Some(name.to_string()),
                value: value.into(),
            }],
        );
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|entries| entries.first())
            .map(|entry| entry.value.as_str())
    }
}
