use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::providers::error::{ProviderError, Result};
use crate::providers::transport::{
    build_headers, default_http_client, join_url, normalize_base, null_as_default, send_json,
    validate_ask_request, with_json_body,
};
use crate::providers::{
    AskRequest, AskResponse, BuiltinProvider, Client, ClientOptions, Model, sort_models,
};

const NAME: &str = "gemini";
const MODEL_PREFIX: &str = "models/";
const JSON_MIME_TYPE: &str = "application/json";
const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Clone)]
pub(crate) struct GeminiClient {
    api_key: String,
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl GeminiClient {
    pub(crate) fn new(options: ClientOptions) -> Result<Self> {
        let api_key = options.api_key.trim().to_string();
        let base_url = if options.base_url.trim().is_empty() {
            BuiltinProvider::Gemini.default_base_url()
        } else {
            options.base_url.as_str()
        };
        let headers = build_headers(
            &options.headers,
            &[("x-goog-api-key", api_key.as_str(), true)],
        )?;
        Ok(Self {
            base_url: normalize_base(base_url),
            api_key,
            headers,
            http: default_http_client(options.http_client),
        })
    }

    fn ensure_api_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ProviderError::missing_api_key(NAME));
        }
        Ok(())
    }

    async fn generate(
        &self,
        url: &str,
        payload: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!(
            %url,
            json_mime = payload.generation_config.response_mime_type.is_some(),
            "POST generateContent"
        );
        let builder = self.http.post(url).headers(self.headers.clone());
        send_json(with_json_body(builder, payload)?).await
    }
}

/// Strips one leading `models/` prefix from a Gemini model id.
pub(crate) fn normalize_model_id(model: &str) -> &str {
    let model = model.trim();
    model.strip_prefix(MODEL_PREFIX).unwrap_or(model)
}

fn supports_generate_content(methods: &[String]) -> bool {
    methods
        .iter()
        .any(|method| method.trim().eq_ignore_ascii_case("generateContent"))
}

#[async_trait]
impl Client for GeminiClient {
    fn name(&self) -> &str {
        NAME
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = NAME))]
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.ensure_api_key()?;
        let url = join_url(&self.base_url, "/models");
        tracing::debug!(%url, "GET models");

        let body: ModelListResponse =
            send_json(self.http.get(&url).headers(self.headers.clone())).await?;
        let mut models = body
            .models
            .into_iter()
            .filter(|entry| supports_generate_content(&entry.supported_generation_methods))
            .filter_map(|entry| {
                let id = normalize_model_id(&entry.name);
                (!id.is_empty()).then(|| Model::new(id, entry.display_name.as_deref()))
            })
            .collect::<Vec<_>>();
        sort_models(&mut models);
        Ok(models)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = NAME, model = %request.model))]
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        validate_ask_request(request)?;
        self.ensure_api_key()?;

        let model = normalize_model_id(&request.model);
        if model.is_empty() {
            return Err(ProviderError::validation("model is required"));
        }
        let url = join_url(&self.base_url, &format!("/models/{model}:generateContent"));

        let mut payload = GenerateContentRequest {
            system_instruction: Instruction {
                parts: [Part {
                    text: &request.prompt,
                }],
            },
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: &request.question,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type: request.expect_json.then_some(JSON_MIME_TYPE),
            },
        };

        let first = self.generate(&url, &payload).await;
        let body = match first {
            Ok(body) => body,
            Err(err) if request.expect_json && err.format_likely_unsupported() => {
                tracing::warn!(%err, "retrying without responseMimeType");
                payload.generation_config.response_mime_type = None;
                self.generate(&url, &payload).await?
            }
            Err(err) => return Err(err),
        };

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::content("no candidates returned by Gemini"))?;
        let parts = candidate
            .content
            .parts
            .iter()
            .filter(|part| !part.text.trim().is_empty())
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return Err(ProviderError::content("Gemini response had no text parts"));
        }
        Ok(AskResponse {
            text: parts.join("\n").trim().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Instruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Instruction<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default, deserialize_with = "null_as_default")]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default, deserialize_with = "null_as_default")]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ModelListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    supported_generation_methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefix_is_stripped_once() {
        assert_eq!(normalize_model_id("models/gemini-2.0-flash"), "gemini-2.0-flash");
        assert_eq!(normalize_model_id(" gemini-2.0-flash "), "gemini-2.0-flash");
        assert_eq!(normalize_model_id("models/models/x"), "models/x");
        assert_eq!(normalize_model_id("models/"), "");
    }

    #[test]
    fn generate_content_support_is_case_insensitive() {
        assert!(supports_generate_content(&[
            "countTokens".to_string(),
            " GENERATECONTENT ".to_string(),
        ]));
        assert!(!supports_generate_content(&["embedContent".to_string()]));
        assert!(!supports_generate_content(&[]));
    }

    #[test]
    fn generation_config_serializes_camel_case() {
        let config = GenerationConfig {
            temperature: TEMPERATURE,
            response_mime_type: Some(JSON_MIME_TYPE),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["responseMimeType"], "application/json");

        let config = GenerationConfig {
            temperature: TEMPERATURE,
            response_mime_type: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, serde_json::json!({"temperature": 0.2}));
    }
}
