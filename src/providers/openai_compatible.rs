use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::content::extract_message_content;
use crate::providers::error::{ProviderError, Result};
use crate::providers::transport::{
    build_headers, default_http_client, ensure_leading_slash, join_url, normalize_base,
    null_as_default, send_json, validate_ask_request, with_json_body,
};
use crate::providers::{
    AskRequest, AskResponse, BuiltinProvider, Client, ClientOptions, Model,
    OpenAiCompatibleSettings, normalize_name, sort_models,
};

const DEFAULT_MODELS_PATH: &str = "/models";
const DEFAULT_CHAT_PATH: &str = "/chat/completions";
const DEFAULT_AUTH_HEADER: &str = "Authorization";
const DEFAULT_AUTH_PREFIX: &str = "Bearer ";
const TEMPERATURE: f64 = 0.2;

pub(crate) fn openai(options: ClientOptions) -> Result<OpenAiCompatibleClient> {
    builtin(BuiltinProvider::Openai, options)
}

pub(crate) fn openrouter(options: ClientOptions) -> Result<OpenAiCompatibleClient> {
    builtin(BuiltinProvider::Openrouter, options)
}

fn builtin(provider: BuiltinProvider, mut options: ClientOptions) -> Result<OpenAiCompatibleClient> {
    if options.base_url.trim().is_empty() {
        options.base_url = provider.default_base_url().to_string();
    }
    let settings = OpenAiCompatibleSettings {
        name: provider.as_str().to_string(),
        require_api_key: true,
        ..Default::default()
    };
    OpenAiCompatibleClient::new(settings, options)
}

/// Client for any API shaped like OpenAI chat completions.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiCompatibleClient {
    name: String,
    api_key: String,
    base_url: String,
    models_path: String,
    chat_path: String,
    require_api_key: bool,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub(crate) fn new(settings: OpenAiCompatibleSettings, options: ClientOptions) -> Result<Self> {
        let models_path = or_default(&settings.models_path, DEFAULT_MODELS_PATH);
        let chat_path = or_default(&settings.chat_path, DEFAULT_CHAT_PATH);
        let auth_header = or_default(&settings.auth_header, DEFAULT_AUTH_HEADER);
        let auth_prefix = if settings.auth_prefix.is_empty() {
            DEFAULT_AUTH_PREFIX
        } else {
            settings.auth_prefix.as_str()
        };

        let api_key = options.api_key.trim().to_string();
        let auth_value = format!("{auth_prefix}{api_key}");
        let mut fixed = Vec::new();
        if !api_key.is_empty() {
            fixed.push((auth_header, auth_value.as_str(), true));
        }
        let headers = build_headers(&options.headers, &fixed)?;

        Ok(Self {
            name: normalize_name(&settings.name),
            api_key,
            base_url: normalize_base(&options.base_url),
            models_path: ensure_leading_slash(models_path),
            chat_path: ensure_leading_slash(chat_path),
            require_api_key: settings.require_api_key,
            headers,
            http: default_http_client(options.http_client),
        })
    }

    fn ensure_api_key(&self) -> Result<()> {
        if self.require_api_key && self.api_key.is_empty() {
            return Err(ProviderError::missing_api_key(&self.name));
        }
        Ok(())
    }

    async fn send_chat(
        &self,
        url: &str,
        request: &AskRequest,
        include_response_format: bool,
    ) -> Result<ChatCompletionResponse> {
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: [
                ChatMessage::system(&request.prompt),
                ChatMessage::user(&request.question),
            ],
            temperature: TEMPERATURE,
            response_format: (request.expect_json && include_response_format)
                .then_some(ResponseFormat { kind: "json_object" }),
        };
        tracing::debug!(
            provider = %self.name,
            %url,
            response_format = payload.response_format.is_some(),
            "POST chat completion"
        );
        let builder = self.http.post(url).headers(self.headers.clone());
        send_json(with_json_body(builder, &payload)?).await
    }
}

#[async_trait]
impl Client for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = %self.name))]
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.ensure_api_key()?;
        let url = join_url(&self.base_url, &self.models_path);
        tracing::debug!(%url, "GET models");

        let body: ModelListResponse = send_json(self.http.get(&url).headers(self.headers.clone())).await?;
        let mut models = body
            .data
            .into_iter()
            .map(|entry| entry.id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| Model::new(id, None))
            .collect::<Vec<_>>();
        sort_models(&mut models);
        Ok(models)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(provider = %self.name, model = %request.model))]
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        validate_ask_request(request)?;
        self.ensure_api_key()?;
        let url = join_url(&self.base_url, &self.chat_path);

        let mut result = self.send_chat(&url, request, true).await;
        if let Err(err) = &result {
            if request.expect_json && err.format_likely_unsupported() {
                tracing::warn!(provider = %self.name, %err, "retrying without response_format");
                result = self.send_chat(&url, request, false).await;
            }
        }
        let body = result?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::content(format!("no choices returned by {}", self.name)))?;
        let text = extract_message_content(&choice.message.content).map_err(|err| {
            ProviderError::content(format!("decode {} response content: {err}", self.name))
        })?;
        if text.is_empty() {
            return Err(ProviderError::content(format!(
                "empty response content from {}",
                self.name
            )));
        }
        Ok(AskResponse { text })
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value.trim()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatMessage<'a> {
    fn system(content: &'a str) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    message: AssistantMessage,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Value,
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
}
