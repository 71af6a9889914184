use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use chronicle_core::errors::GenerationError;
use chronicle_core::injection::ChatMessage;

use crate::generator::{GenerateOptions, Generator};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Non-streaming client for an OpenAI-compatible chat-completions backend.
/// The extraction cycle needs the whole response before parsing, so there is
/// no value in streaming here.
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

impl HttpGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::NetworkError(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, messages: &[ChatMessage], options: &GenerateOptions) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(p) = options.top_p {
            body["top_p"] = json!(p);
        }
        if let Some(k) = options.top_k {
            body["top_k"] = json!(k);
        }
        if let Some(m) = options.max_tokens {
            body["max_tokens"] = json!(m);
        }

        body
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model))]
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        let body = self.build_body(messages, options);

        let resp = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(REQUEST_TIMEOUT)
                } else {
                    GenerationError::NetworkError(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status, body));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::NetworkError(format!("decode response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::injection::ChatMessage;

    fn generator() -> HttpGenerator {
        HttpGenerator::new(
            "https://example.invalid/v1/",
            SecretString::from("test-key"),
            "test-model",
        )
        .unwrap()
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let g = generator();
        assert_eq!(g.endpoint(), "https://example.invalid/v1/chat/completions");
    }

    #[test]
    fn body_includes_only_set_options() {
        let g = generator();
        let messages = vec![ChatMessage::user("hi")];

        let body = g.build_body(&messages, &GenerateOptions::default());
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert!(body.get("temperature").is_none());

        let opts = GenerateOptions {
            temperature: Some(0.7),
            top_p: None,
            top_k: Some(40),
            max_tokens: None,
        };
        let body = g.build_body(&messages, &opts);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["top_k"], 40);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn messages_serialize_with_roles() {
        let g = generator();
        let messages = vec![ChatMessage::user("q"), ChatMessage::assistant("a")];
        let body = g.build_body(&messages, &GenerateOptions::default());
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "a");
    }

    #[test]
    fn generator_properties() {
        let g = generator();
        assert_eq!(g.name(), "http");
        assert_eq!(g.model(), "test-model");
    }

    #[test]
    fn completion_response_decodes() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"keywords\":[]}"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, r#"{"keywords":[]}"#);
    }
}
