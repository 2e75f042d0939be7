use crate::errors::MailChimpError;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

const MEDIA_TYPE: &str = "application/vnd.api+json";

/// A MailChimp API key such as `0123456789abcdef-us6`.
///
/// The segment after the first `-` names the data center that serves the
/// account and therefore determines the API host.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    key: String,
    data_center: String,
}

impl ApiKey {
    pub fn parse(key: &str) -> Result<Self, MailChimpError> {
        let Some((_, data_center)) = key.split_once('-') else {
            return Err(MailChimpError::InvalidApiKey(
                "API key must contain a data center suffix separated by '-'".to_string(),
            ));
        };
        if data_center.is_empty() {
            return Err(MailChimpError::InvalidApiKey(
                "API key has an empty data center suffix".to_string(),
            ));
        }

        Ok(Self {
            key: key.to_string(),
            data_center: data_center.to_string(),
        })
    }

    pub fn data_center(&self) -> &str {
        &self.data_center
    }

    /// `https://{dc}.api.mailchimp.com/3.0`
    pub fn base_url(&self) -> String {
        format!("https://{}.api.mailchimp.com/3.0", self.data_center)
    }

    fn authorization(&self) -> String {
        format!("apikey {}", self.key)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"[REDACTED]")
            .field("data_center", &self.data_center)
            .finish()
    }
}

/// Client for the MailChimp v3 REST API.
///
/// One HTTP round trip per call. There are no retries; every failure goes
/// straight back to the caller.
#[derive(Clone, Debug)]
pub struct MailChimpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl MailChimpClient {
    /// Creates a client for the data center encoded in `api_key`.
    ///
    /// # Arguments
    ///
    /// * `api_key` - The raw API key; must contain a `-` separator.
    /// * `timeout` - Per-request timeout enforced by the HTTP engine.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, MailChimpError> {
        let api_key = ApiKey::parse(api_key)?;
        let base_url = api_key.base_url();
        Self::build(api_key, base_url, timeout)
    }

    /// Same as [`MailChimpClient::new`] but talks to `base_url` instead of the
    /// derived endpoint. The key is still validated.
    pub fn with_base_url(
        api_key: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailChimpError> {
        let api_key = ApiKey::parse(api_key)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self::build(api_key, base_url, timeout)
    }

    fn build(api_key: ApiKey, base_url: String, timeout: Duration) -> Result<Self, MailChimpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                MailChimpError::ApiError(format!("Failed to create MailChimp client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        arguments: Option<&Value>,
    ) -> Result<T, MailChimpError> {
        self.request(Method::GET, resource, arguments).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        resource: &str,
        arguments: Option<&Value>,
    ) -> Result<T, MailChimpError> {
        self.request(Method::PUT, resource, arguments).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        resource: &str,
        arguments: Option<&Value>,
    ) -> Result<T, MailChimpError> {
        self.request(Method::PATCH, resource, arguments).await
    }

    /// Sends one request to `{base_url}/{resource}` and decodes the response.
    ///
    /// GET arguments become the query string, any other method sends them as
    /// a JSON body. 404 maps to `ResourceNotFound`, every other non-2xx
    /// status to `ApiError`, both carrying the provider's `detail`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        arguments: Option<&Value>,
    ) -> Result<T, MailChimpError> {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        tracing::info!("MailChimp {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, MEDIA_TYPE)
            .header(CONTENT_TYPE, MEDIA_TYPE)
            .header(AUTHORIZATION, self.api_key.authorization());

        if let Some(arguments) = arguments {
            if method == Method::GET {
                request = request.query(&query_pairs(arguments));
            } else {
                let body = serde_json::to_vec(arguments).map_err(|e| {
                    MailChimpError::ApiError(format!("Failed to encode request body: {}", e))
                })?;
                request = request.body(body);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailChimpError::ApiError(format!("MailChimp request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            MailChimpError::ApiError(format!("Failed to read MailChimp response: {}", e))
        })?;

        if status.is_success() {
            let body = if body.trim().is_empty() { "null" } else { body.as_str() };
            return serde_json::from_str(body).map_err(|e| {
                MailChimpError::ApiError(format!("Failed to parse MailChimp response: {}", e))
            });
        }

        let detail = error_detail(&body);
        tracing::warn!("MailChimp returned {} for {} {}: {}", status, method, url, detail);

        if status == reqwest::StatusCode::NOT_FOUND {
            Err(MailChimpError::ResourceNotFound(detail))
        } else {
            Err(MailChimpError::ApiError(detail))
        }
    }
}

/// Flattens a JSON object into query pairs, skipping `null` entries.
fn query_pairs(arguments: &Value) -> Vec<(String, String)> {
    let Some(object) = arguments.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_key_data_center() {
        let key = ApiKey::parse("0123456789abcdef-us6").unwrap();
        assert_eq!(key.data_center(), "us6");
        assert_eq!(key.base_url(), "https://us6.api.mailchimp.com/3.0");
    }

    #[test]
    fn test_api_key_uses_segment_after_first_separator() {
        let key = ApiKey::parse("abc-us1-extra").unwrap();
        assert_eq!(key.data_center(), "us1-extra");
    }

    #[test]
    fn test_api_key_without_separator_is_rejected() {
        let err = ApiKey::parse("0123456789abcdef").unwrap_err();
        assert!(matches!(err, MailChimpError::InvalidApiKey(_)));

        let err = ApiKey::parse("0123456789abcdef-").unwrap_err();
        assert!(matches!(err, MailChimpError::InvalidApiKey(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = ApiKey::parse("secret-us2").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("us2"));
    }

    #[test]
    fn test_client_creation() {
        let client = MailChimpClient::new("key-us3", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://us3.api.mailchimp.com/3.0");
        assert!(MailChimpClient::new("key", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_query_pairs_skip_null() {
        let pairs = query_pairs(&json!({"offset": 10, "count": null, "status": "subscribed"}));
        assert_eq!(
            pairs,
            vec![
                ("offset".to_string(), "10".to_string()),
                ("status".to_string(), "subscribed".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_detail_fallback() {
        assert_eq!(error_detail(r#"{"detail": "Nope"}"#), "Nope");
        assert_eq!(error_detail(r#"{"title": "Nope"}"#), "Unknown error");
        assert_eq!(error_detail("<html>"), "Unknown error");
    }
}
