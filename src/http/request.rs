use std::collections::BTreeMap;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::http::types::{Method, parse_url};
use crate::{ApiChainError, Result};

/// Authentication attached to a request.
///
/// Every field may hold `{{variable}}` placeholders while it sits in a saved
/// definition; by the time it reaches the client it is fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    Bearer { token: String },
    Basic { username: String, password: String },
    ApiKey { header: String, value: String },
}

/// A fully resolved request, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub query_params: BTreeMap<String, String>,
    pub auth: Option<Auth>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            query_params: BTreeMap::new(),
            auth: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query_params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// URL with query parameters appended.
    pub fn full_url(&self) -> Result<url::Url> {
        let mut url = parse_url(&self.url)?;
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query_params.iter());
        }
        Ok(url)
    }

    /// Header map for the wire. A JSON body without an explicit content type
    /// is sent as `application/json`.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ApiChainError::ParseError(format!("invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiChainError::ParseError(format!("invalid value for header '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        if let Some(Auth::ApiKey { header, value }) = &self.auth {
            let name = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
                ApiChainError::ParseError(format!("invalid API key header '{}': {}", header, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ApiChainError::ParseError(format!("invalid API key value: {}", e))
            })?;
            headers.insert(name, value);
        }

        if !headers.contains_key(CONTENT_TYPE) && self.has_json_body() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(headers)
    }

    fn has_json_body(&self) -> bool {
        self.body
            .as_deref()
            .is_some_and(|b| serde_json::from_str::<serde_json::Value>(b).is_ok())
    }

    /// Size of the request payload in bytes.
    pub fn size(&self) -> u64 {
        self.body.as_ref().map_or(0, |b| b.len() as u64)
    }
}
