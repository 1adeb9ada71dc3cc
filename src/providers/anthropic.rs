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

const NAME: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub(crate) struct AnthropicClient {
    api_key: String,
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub(crate) fn new(options: ClientOptions) -> Result<Self> {
        let api_key = options.api_key.trim().to_string();
        let base_url = if options.base_url.trim().is_empty() {
            BuiltinProvider::Anthropic.default_base_url()
        } else {
            options.base_url.as_str()
        };
        let headers = build_headers(
            &options.headers,
            &[
                ("x-api-key", api_key.as_str(), true),
                ("anthropic-version", ANTHROPIC_VERSION, false),
            ],
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
}

#[async_trait]
impl Client for AnthropicClient {
    fn name(&self) -> &str {
        NAME
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = NAME))]
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.ensure_api_key()?;
        let url = join_url(&self.base_url, "/v1/models");
        tracing::debug!(%url, "GET models");

        let body: ModelListResponse =
            send_json(self.http.get(&url).headers(self.headers.clone())).await?;
        let mut models = body
            .data
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id.trim();
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
        let url = join_url(&self.base_url, "/v1/messages");

        // No JSON-mode switch exists for messages; expect_json has no wire effect.
        let payload = MessagesRequest {
            model: &request.model,
            max_tokens: MAX_TOKENS,
            system: &request.prompt,
            messages: [UserMessage {
                role: "user",
                content: [TextBlock {
                    kind: "text",
                    text: &request.question,
                }],
            }],
        };
        tracing::debug!(%url, "POST messages");
        let builder = self.http.post(&url).headers(self.headers.clone());
        let body: MessagesResponse = send_json(with_json_body(builder, &payload)?).await?;

        let parts = body
            .content
            .iter()
            .filter(|block| block.kind == "text" && !block.text.trim().is_empty())
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return Err(ProviderError::content("no text content returned by Anthropic"));
        }
        Ok(AskResponse {
            text: parts.join("\n").trim().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Default, Deserialize)]
struct MessagesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ModelListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}
