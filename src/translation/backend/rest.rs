//! REST 翻译后端（LibreTranslate 兼容接口）

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BackendKind, TranslationBackend, TranslationOutcome};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};

pub struct RestBackend {
    client: Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct RestRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    alternatives: u32,
    api_key: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RestResponse {
    translated_text: Option<String>,
    #[serde(default)]
    alternatives: Vec<String>,
    detected_language: Option<DetectedLanguage>,
}

/// 检测语言可能是字符串或带置信度的对象
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum DetectedLanguage {
    Code(String),
    Detailed {
        language: String,
        #[allow(dead_code)]
        #[serde(default)]
        confidence: Option<f64>,
    },
}

impl DetectedLanguage {
    fn into_code(self) -> String {
        match self {
            DetectedLanguage::Code(code) => code,
            DetectedLanguage::Detailed { language, .. } => language,
        }
    }
}

impl RestBackend {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &TranslationConfig, client: Client) -> Self {
        Self::new(client, config.service_url.clone(), config.api_key.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, text: &str, source: &str, target: &str) -> TranslationResult<TranslationOutcome> {
        if self.url.trim().is_empty() {
            return Err(TranslationError::ConfigError("未配置翻译服务地址".to_string()));
        }

        let body = RestRequest {
            q: text,
            source,
            target,
            format: constants::REST_FORMAT,
            alternatives: constants::REST_ALTERNATIVES,
            api_key: &self.api_key,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::http_status(status.as_u16()));
        }

        let parsed: RestResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(format!("无效的响应: {}", e)))?;

        let translated = parsed
            .translated_text
            .ok_or_else(|| TranslationError::ParseError("响应缺少 translatedText".to_string()))?;

        let mut outcome = TranslationOutcome::success(BackendKind::Rest, translated);
        outcome.alternatives = parsed
            .alternatives
            .into_iter()
            .filter(|alt| !alt.trim().is_empty())
            .take(constants::MAX_ALTERNATIVES)
            .collect();
        outcome.detected_language = parsed.detected_language.map(DetectedLanguage::into_code);
        Ok(outcome)
    }
}

#[async_trait]
impl TranslationBackend for RestBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    async fn translate_one(&self, text: &str, source: &str, target: &str) -> TranslationOutcome {
        match self.request(text, source, target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("REST 翻译失败: {}", e);
                TranslationOutcome::failure(BackendKind::Rest, e.message())
            }
        }
    }

    async fn test_connection(&self, target: &str) -> TranslationResult<String> {
        let sample = "Hello, world!";
        let outcome = self.request(sample, "auto", target).await?;
        Ok(format!(
            "\"{}\" -> \"{}\"",
            sample,
            outcome.translated_text.unwrap_or_default()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> RestBackend {
        RestBackend::new(Client::new(), format!("{}/translate", server.uri()), "secret")
    }

    #[tokio::test]
    async fn test_request_shape_and_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(json!({
                "q": "Hello",
                "source": "auto",
                "target": "de",
                "format": "text",
                "alternatives": 3,
                "api_key": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translatedText": "Hallo",
                "alternatives": ["Servus", "Grüß dich", "Moin", "Tach"],
                "detectedLanguage": {"confidence": 90.0, "language": "en"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = backend(&server).translate_one("Hello", "auto", "de").await;
        assert!(outcome.success);
        assert_eq!(outcome.text(), Some("Hallo"));
        assert_eq!(outcome.alternatives.len(), 3);
        assert_eq!(outcome.detected_language.as_deref(), Some("en"));
        assert_eq!(outcome.backend_kind, BackendKind::Rest);
    }

    #[tokio::test]
    async fn test_detected_language_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translatedText": "Bonjour",
                "detectedLanguage": "en"
            })))
            .mount(&server)
            .await;

        let outcome = backend(&server).translate_one("Hello", "auto", "fr").await;
        assert_eq!(outcome.detected_language.as_deref(), Some("en"));
        assert!(outcome.alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = backend(&server).translate_one("Hello", "auto", "de").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("HTTP 503"));

        let error = backend(&server).request("Hello", "auto", "de").await.unwrap_err();
        assert_eq!(error.status(), Some(503));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_translation_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let outcome = backend(&server).translate_one("Hello", "auto", "de").await;
        assert!(!outcome.success);
        assert!(outcome.translated_text.is_none());
    }

    #[tokio::test]
    async fn test_connection_reports_sample() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"q": "Hello, world!", "source": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translatedText": "Hallo, Welt!"})))
            .mount(&server)
            .await;

        let report = backend(&server).test_connection("de").await.unwrap();
        assert!(report.contains("Hallo, Welt!"));
    }
}
