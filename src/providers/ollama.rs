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

const NAME: &str = "ollama";

/// Client for a local Ollama daemon. No authentication is sent.
#[derive(Debug, Clone)]
pub(crate) struct OllamaClient {
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl OllamaClient {
    pub(crate) fn new(options: ClientOptions) -> Result<Self> {
        let base_url = if options.base_url.trim().is_empty() {
            BuiltinProvider::Ollama.default_base_url()
        } else {
            options.base_url.as_str()
        };
        Ok(Self {
            base_url: normalize_base(base_url),
            headers: build_headers(&options.headers, &[])?,
            http: default_http_client(options.http_client),
        })
    }
}

#[async_trait]
impl Client for OllamaClient {
    fn name(&self) -> &str {
        NAME
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = NAME))]
    async fn list_models(&self) -> Result<Vec<Model>> {
        let url = join_url(&self.base_url, "/api/tags");
        tracing::debug!(%url, "GET tags");

        let body: TagsResponse = send_json(self.http.get(&url).headers(self.headers.clone())).await?;
        let mut models = body
            .models
            .into_iter()
            .map(|entry| entry.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(|name| Model::new(name, None))
            .collect::<Vec<_>>();
        sort_models(&mut models);
        Ok(models)
    }

    // Local models either honor `format` or ignore it, so there is no fallback retry.
    #[tracing::instrument(level = "debug", skip_all, fields(provider = NAME, model = %request.model))]
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        validate_ask_request(request)?;
        let url = join_url(&self.base_url, "/api/chat");

        let payload = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.question,
                },
            ],
            stream: false,
            format: request.expect_json.then_some("json"),
        };
        tracing::debug!(%url, "POST chat");
        let builder = self.http.post(&url).headers(self.headers.clone());
        let body: ChatResponse = send_json(with_json_body(builder, &payload)?).await?;

        let text = body.message.content.trim();
        if text.is_empty() {
            return Err(ProviderError::content("ollama response had empty content"));
        }
        Ok(AskResponse {
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct TagsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
}
