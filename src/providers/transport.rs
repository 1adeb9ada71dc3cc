use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::RequestBuilder;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::providers::AskRequest;
use crate::providers::error::{ProviderError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const ERROR_BODY_LIMIT: usize = 700;

pub(crate) fn default_http_client(input: Option<reqwest::Client>) -> reqwest::Client {
    if let Some(client) = input {
        return client;
    }
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "reqwest client build failed; falling back to default client");
            reqwest::Client::new()
        })
}

/// Serializes `payload` as the JSON body of `request`.
pub(crate) fn with_json_body<P: Serialize + ?Sized>(
    request: RequestBuilder,
    payload: &P,
) -> Result<RequestBuilder> {
    let body = serde_json::to_vec(payload).map_err(ProviderError::Encode)?;
    Ok(request
        .header(CONTENT_TYPE, "application/json")
        .body(body))
}

/// Sends `request`, classifies error statuses and decodes the JSON body.
///
/// An empty success body decodes to `T::default()`.
pub(crate) async fn send_json<T: DeserializeOwned + Default>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Request {
            context: "http request failed",
            source,
        })?;

    let status = response.status();
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|source| ProviderError::Request {
            context: "read response",
            source,
        })?;
    tracing::debug!(%url, %status, bytes = body.len(), "provider response");

    if status.is_client_error() || status.is_server_error() {
        return Err(ProviderError::Status {
            status,
            body: truncate(&String::from_utf8_lossy(&body), ERROR_BODY_LIMIT),
        });
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&body).map_err(|source| ProviderError::Decode {
        source,
        body: truncate(&String::from_utf8_lossy(&body), ERROR_BODY_LIMIT),
    })
}

/// Builds the static header set for one client. `fixed` entries are applied
/// last so they cannot be overridden by user-supplied `extra` headers.
pub(crate) fn build_headers(
    extra: &BTreeMap<String, String>,
    fixed: &[(&str, &str, bool)],
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in extra {
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let (name, value) = parse_header(name, value)?;
        headers.insert(name, value);
    }
    for (name, value, sensitive) in fixed {
        let (name, mut value) = parse_header(name, value)?;
        value.set_sensitive(*sensitive);
        headers.insert(name, value);
    }
    Ok(headers)
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ProviderError::configuration(format!("invalid header name {name:?}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| ProviderError::configuration(format!("invalid value for header {name:?}")))?;
    Ok((header_name, header_value))
}

/// Decodes a JSON `null` as the field's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn validate_ask_request(request: &AskRequest) -> Result<()> {
    if request.model.trim().is_empty() {
        return Err(ProviderError::validation("model is required"));
    }
    if request.question.trim().is_empty() {
        return Err(ProviderError::validation("question is required"));
    }
    Ok(())
}

pub(crate) fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim();
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{base}{}", ensure_leading_slash(path))
}

pub(crate) fn ensure_leading_slash(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Entry {
        #[serde(default, deserialize_with = "null_as_default")]
        id: String,
        #[serde(default, deserialize_with = "null_as_default")]
        tags: Vec<String>,
    }

    #[test]
    fn null_fields_decode_as_default() {
        let entry: Entry = serde_json::from_str(r#"{"id": null, "tags": null}"#).unwrap();
        assert_eq!(entry.id, "");
        assert!(entry.tags.is_empty());
        let entry: Entry = serde_json::from_str(r#"{"tags": ["a"]}"#).unwrap();
        assert_eq!(entry.id, "");
        assert_eq!(entry.tags, vec!["a"]);
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://x.test/v1/", "models"), "https://x.test/v1/models");
        assert_eq!(join_url("https://x.test/v1", "/models"), "https://x.test/v1/models");
        assert_eq!(join_url("https://x.test/v1", ""), "https://x.test/v1");
        assert_eq!(
            join_url("https://x.test/v1", "https://other.test/chat"),
            "https://other.test/chat"
        );
    }

    #[test]
    fn truncate_caps_length_on_char_boundary() {
        assert_eq!(truncate("short", 700), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate("aé", 2), "a...");
    }

    #[test]
    fn validation_requires_model_and_question() {
        let mut request = AskRequest {
            model: " ".to_string(),
            prompt: String::new(),
            question: "hi".to_string(),
            expect_json: false,
        };
        assert!(matches!(
            validate_ask_request(&request),
            Err(ProviderError::Validation(_))
        ));
        request.model = "m".to_string();
        request.question = "\n".to_string();
        let err = validate_ask_request(&request).unwrap_err();
        assert_eq!(err.to_string(), "question is required");
    }

    #[test]
    fn fixed_headers_override_extra_headers() {
        let mut extra = BTreeMap::new();
        extra.insert("anthropic-version".to_string(), "1999-01-01".to_string());
        extra.insert("X-Client".to_string(), "ask".to_string());
        extra.insert(" ".to_string(), "skipped".to_string());

        let headers = build_headers(&extra, &[("anthropic-version", "2023-06-01", false)]).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["anthropic-version"], "2023-06-01");
        assert_eq!(headers["x-client"], "ask");
    }

    #[test]
    fn invalid_header_name_is_a_configuration_error() {
        let mut extra = BTreeMap::new();
        extra.insert("bad header".to_string(), "v".to_string());
        assert!(matches!(
            build_headers(&extra, &[]),
            Err(ProviderError::Configuration(_))
        ));
    }
}
