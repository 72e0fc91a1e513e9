//! 翻译后端
//!
//! 两种后端（REST 翻译接口和 LLM chat-completion 接口）实现同一个
//! [`TranslationBackend`] 契约。[`BackendClient`] 按配置选定一次主后端，
//! 并负责 LLM → REST 的回退，调用方不再区分后端类型。
//!
//! 网络和服务端错误不会以 `Err` 返回，而是转换为失败的 [`TranslationOutcome`]。

pub mod llm;
pub mod prompts;
pub mod rest;
pub mod usage;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};

pub use llm::LlmBackend;
pub use rest::RestBackend;
pub use usage::{NullUsage, UsageSink, UsageTotals, UsageTracker};

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rest,
    Llm,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Rest => "rest",
            BackendKind::Llm => "llm",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条翻译结果
///
/// `success` 为 true 时 `translated_text` 必有值，否则 `error` 必有值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub backend_kind: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub fallback_used: bool,
}

impl TranslationOutcome {
    pub fn success(kind: BackendKind, translated_text: impl Into<String>) -> Self {
        Self {
            success: true,
            translated_text: Some(translated_text.into()),
            alternatives: Vec::new(),
            context_notes: None,
            detected_language: None,
            backend_kind: kind,
            tokens_used: None,
            error: None,
            fallback_used: false,
        }
    }

    pub fn failure(kind: BackendKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            translated_text: None,
            alternatives: Vec::new(),
            context_notes: None,
            detected_language: None,
            backend_kind: kind,
            tokens_used: None,
            error: Some(error.into()),
            fallback_used: false,
        }
    }

    /// 成功时的译文
    pub fn text(&self) -> Option<&str> {
        if self.success {
            self.translated_text.as_deref()
        } else {
            None
        }
    }

    /// 转为 Result，失败时携带错误信息
    pub fn into_result(self) -> TranslationResult<String> {
        match (self.success, self.translated_text, self.error) {
            (true, Some(text), _) => Ok(text),
            (_, _, Some(error)) => Err(TranslationError::TranslationServiceError(error)),
            _ => Err(TranslationError::InternalError("结果缺少译文".to_string())),
        }
    }
}

/// 批量翻译条目，与输入一一对应
///
/// 失败的条目以原文作为译文，并在 `error` 中说明原因。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub original: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn from_outcome(original: &str, outcome: TranslationOutcome) -> Self {
        match outcome.translated_text {
            Some(text) if outcome.success => Self {
                original: original.to_string(),
                translation: text,
                error: None,
            },
            _ => Self {
                original: original.to_string(),
                translation: original.to_string(),
                error: Some(outcome.error.unwrap_or_else(|| "翻译失败".to_string())),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 翻译后端契约
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 翻译单条文本，失败以结果返回
    async fn translate_one(&self, text: &str, source: &str, target: &str) -> TranslationOutcome;

    /// 批量翻译，结果顺序与输入一致
    ///
    /// 默认实现逐条调用 [`translate_one`](Self::translate_one) 并按原顺序重组。
    async fn translate_batch(&self, texts: &[String], source: &str, target: &str) -> Vec<BatchItem> {
        let outcomes = join_all(
            texts
                .iter()
                .map(|text| self.translate_one(text, source, target)),
        )
        .await;

        texts
            .iter()
            .zip(outcomes)
            .map(|(text, outcome)| BatchItem::from_outcome(text, outcome))
            .collect()
    }

    /// 连接测试，成功时返回简短描述
    async fn test_connection(&self, target: &str) -> TranslationResult<String>;

    /// 可用模型列表
    async fn list_models(&self) -> TranslationResult<Vec<String>> {
        Err(TranslationError::InvalidState(format!(
            "{} 后端不支持模型列表",
            self.kind()
        )))
    }
}

/// 构建带超时的 HTTP 客户端
pub fn http_client(config: &TranslationConfig) -> TranslationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("smart-web-translator/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TranslationError::ConfigError(format!("无法创建 HTTP 客户端: {}", e)))
}

/// 后端客户端：主后端加可选的 REST 回退
#[derive(Clone)]
pub struct BackendClient {
    primary: Arc<dyn TranslationBackend>,
    fallback: Option<Arc<dyn TranslationBackend>>,
}

impl BackendClient {
    pub fn new(
        primary: Arc<dyn TranslationBackend>,
        fallback: Option<Arc<dyn TranslationBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// 按配置选择后端
    pub fn from_config(
        config: &TranslationConfig,
        usage: Arc<dyn UsageSink>,
    ) -> TranslationResult<Self> {
        let client = http_client(config)?;
        let rest: Arc<dyn TranslationBackend> =
            Arc::new(RestBackend::from_config(config, client.clone()));

        let backend = match config.backend {
            BackendKind::Rest => Self::new(rest, None),
            BackendKind::Llm => {
                let llm: Arc<dyn TranslationBackend> =
                    Arc::new(LlmBackend::from_config(config, client, usage));
                let fallback = config.llm.fallback_to_rest.then_some(rest);
                Self::new(llm, fallback)
            }
        };

        tracing::debug!(
            "翻译后端: {}，回退: {}",
            backend.kind(),
            backend.fallback.is_some()
        );
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        self.primary.kind()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// 翻译单条文本，主后端失败时尝试回退一次
    pub async fn translate_one(&self, text: &str, source: &str, target: &str) -> TranslationOutcome {
        let outcome = self.primary.translate_one(text, source, target).await;
        if outcome.success {
            return outcome;
        }

        match &self.fallback {
            Some(fallback) => {
                tracing::warn!(
                    "{} 翻译失败，回退到 {}: {}",
                    self.primary.kind(),
                    fallback.kind(),
                    outcome.error.as_deref().unwrap_or_default()
                );
                let mut retried = fallback.translate_one(text, source, target).await;
                retried.fallback_used = true;
                retried
            }
            None => outcome,
        }
    }

    /// 批量翻译，失败的条目逐条回退
    pub async fn translate_batch(&self, texts: &[String], source: &str, target: &str) -> Vec<BatchItem> {
        let mut items = self.primary.translate_batch(texts, source, target).await;

        // 后端返回的条目数与输入不一致时按输入对齐
        if items.len() != texts.len() {
            tracing::warn!("批量结果数量不符: {} != {}", items.len(), texts.len());
            items = texts
                .iter()
                .enumerate()
                .map(|(i, text)| match items.get(i) {
                    Some(item) if item.original == *text => item.clone(),
                    _ => BatchItem::from_outcome(
                        text,
                        TranslationOutcome::failure(self.kind(), "批量结果缺失"),
                    ),
                })
                .collect();
        }

        let Some(fallback) = &self.fallback else {
            return items;
        };

        let failed: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_ok())
            .map(|(i, _)| i)
            .collect();
        if failed.is_empty() {
            return items;
        }

        tracing::warn!("{} 条批量翻译失败，回退到 {}", failed.len(), fallback.kind());
        let retried = join_all(
            failed
                .iter()
                .map(|&i| fallback.translate_one(&texts[i], source, target)),
        )
        .await;

        for (i, outcome) in failed.into_iter().zip(retried) {
            items[i] = BatchItem::from_outcome(&texts[i], outcome);
        }
        items
    }

    /// 连接测试
    pub async fn test_connection(&self, target: &str) -> TranslationResult<String> {
        tokio::time::timeout(
            constants::CONNECTION_TEST_TIMEOUT,
            self.primary.test_connection(target),
        )
        .await?
    }

    pub async fn list_models(&self) -> TranslationResult<Vec<String>> {
        self.primary.list_models().await
    }
}
