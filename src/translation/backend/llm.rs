//! 本地 LLM 后端（OpenAI 兼容的 chat-completion 接口）
//!
//! 通过 `response_format: json_schema` 约束模型输出结构化结果。
//! 模型返回的内容无法解析为 JSON 时，直接把去空白后的文本当作译文。

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::prompts::{self, PromptDomain};
use super::usage::UsageSink;
use super::{BackendKind, BatchItem, TranslationBackend, TranslationOutcome};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};

pub struct LlmBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    domain: PromptDomain,
    custom_prompt: String,
    single_call_batch: bool,
    usage: Arc<dyn UsageSink>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    total_tokens: Option<u64>,
}

impl ChatUsage {
    fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.prompt_tokens + self.completion_tokens)
    }
}

#[derive(Deserialize, Debug)]
struct StructuredTranslation {
    translation: String,
    #[serde(default)]
    alternatives: Vec<String>,
    #[serde(default)]
    context_notes: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Deserialize, Debug)]
struct ModelInfo {
    id: String,
}

fn single_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "translation",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "translation": {"type": "string"},
                    "alternatives": {"type": "array", "items": {"type": "string"}},
                    "context_notes": {"type": "string"}
                },
                "required": ["translation"],
                "additionalProperties": false
            }
        }
    })
}

fn batch_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "batch_translation",
            "strict": true,
            "schema": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "original": {"type": "string"},
                        "translation": {"type": "string"}
                    },
                    "required": ["original", "translation"],
                    "additionalProperties": false
                }
            }
        }
    })
}

/// 去掉模型有时包裹在外面的 ``` 代码块
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标记所在的第一行
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// 解析单条结果，非 JSON 时退化为原始文本；译文为空时保留原文
fn parse_single(content: &str, original: &str) -> (String, Vec<String>, Option<String>) {
    let body = strip_code_fences(content);
    match serde_json::from_str::<StructuredTranslation>(body) {
        Ok(parsed) if parsed.translation.trim().is_empty() => {
            tracing::debug!("模型返回了空译文，保留原文");
            (original.to_string(), Vec::new(), None)
        }
        Ok(parsed) => {
            let alternatives = parsed
                .alternatives
                .into_iter()
                .filter(|alt| !alt.trim().is_empty())
                .take(constants::MAX_ALTERNATIVES)
                .collect();
            let notes = parsed.context_notes.filter(|n| !n.trim().is_empty());
            (parsed.translation, alternatives, notes)
        }
        _ => {
            tracing::debug!("模型响应不是预期的 JSON，按纯文本处理");
            (body.to_string(), Vec::new(), None)
        }
    }
}

/// 解析批量结果，长度必须与输入一致
fn parse_batch(content: &str, texts: &[String]) -> TranslationResult<Vec<BatchItem>> {
    let value: Value = serde_json::from_str(strip_code_fences(content))?;

    // 有的模型会把数组包在对象里
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| TranslationError::ParseError("批量响应中没有数组".to_string()))?,
        _ => return Err(TranslationError::ParseError("批量响应不是数组".to_string())),
    };

    if array.len() != texts.len() {
        return Err(TranslationError::ParseError(format!(
            "批量结果数量不符: {} != {}",
            array.len(),
            texts.len()
        )));
    }

    array
        .into_iter()
        .zip(texts)
        .map(|(item, original)| {
            let translation = match &item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("translation").and_then(Value::as_str),
                _ => None,
            }
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TranslationError::ParseError("批量条目缺少 translation".to_string()))?;

            Ok(BatchItem {
                original: original.clone(),
                translation: translation.to_string(),
                error: None,
            })
        })
        .collect()
}

impl LlmBackend {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>, usage: Arc<dyn UsageSink>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            domain: PromptDomain::General,
            custom_prompt: String::new(),
            single_call_batch: true,
            usage,
        }
    }

    pub fn from_config(config: &TranslationConfig, client: Client, usage: Arc<dyn UsageSink>) -> Self {
        let llm = &config.llm;
        Self {
            temperature: llm.effective_temperature(),
            max_tokens: llm.effective_max_tokens(),
            domain: llm.domain,
            custom_prompt: llm.custom_prompt.clone(),
            single_call_batch: llm.single_call_batch,
            ..Self::new(client, llm.base_url.clone(), llm.model.clone(), usage)
        }
    }

    pub fn with_domain(mut self, domain: PromptDomain, custom_prompt: impl Into<String>) -> Self {
        self.domain = domain;
        self.custom_prompt = custom_prompt.into();
        self
    }

    pub fn with_single_call_batch(mut self, enabled: bool) -> Self {
        self.single_call_batch = enabled;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn ensure_model(&self) -> TranslationResult<()> {
        if self.model.trim().is_empty() {
            return Err(TranslationError::ConfigError("未选择 LLM 模型".to_string()));
        }
        Ok(())
    }

    /// 发送一次 chat-completion 请求，返回内容和用量
    async fn chat(
        &self,
        system: String,
        user: String,
        max_tokens: u32,
        response_format: Value,
    ) -> TranslationResult<(String, Option<ChatUsage>)> {
        self.ensure_model()?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens,
            response_format,
        };

        let response = self
            .client
            .post(self.endpoint("/v1/chat/completions"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::http_status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(format!("无效的响应: {}", e)))?;

        if let Some(usage) = parsed.usage {
            self.usage
                .on_usage(usage.prompt_tokens, usage.completion_tokens);
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| TranslationError::ParseError("模型返回了空内容".to_string()))?;

        Ok((content, parsed.usage))
    }

    async fn request_one(&self, text: &str, source: &str, target: &str) -> TranslationResult<TranslationOutcome> {
        let system = prompts::single_prompt(self.domain, &self.custom_prompt, source, target);
        let (content, usage) = self
            .chat(system, text.to_string(), self.max_tokens, single_schema())
            .await?;

        let (translation, alternatives, notes) = parse_single(&content, text);
        let mut outcome = TranslationOutcome::success(BackendKind::Llm, translation);
        outcome.alternatives = alternatives;
        outcome.context_notes = notes;
        outcome.tokens_used = usage.map(|u| u.total());
        Ok(outcome)
    }

    /// 单次请求翻译整批文本
    async fn request_batch(&self, texts: &[String], source: &str, target: &str) -> TranslationResult<Vec<BatchItem>> {
        let system = prompts::batch_prompt(self.domain, &self.custom_prompt, source, target);
        let count = u32::try_from(texts.len()).unwrap_or(u32::MAX);
        let max_tokens = count
            .saturating_mul(constants::BATCH_TOKENS_PER_TEXT)
            .min(constants::BATCH_MAX_TOKENS);

        let (content, _) = self
            .chat(system, serde_json::to_string(texts)?, max_tokens, batch_schema())
            .await?;
        parse_batch(&content, texts)
    }

    async fn per_unit(&self, texts: &[String], source: &str, target: &str) -> Vec<BatchItem> {
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
}

#[async_trait]
impl TranslationBackend for LlmBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Llm
    }

    async fn translate_one(&self, text: &str, source: &str, target: &str) -> TranslationOutcome {
        match self.request_one(text, source, target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("LLM 翻译失败: {}", e);
                TranslationOutcome::failure(BackendKind::Llm, e.message())
            }
        }
    }

    async fn translate_batch(&self, texts: &[String], source: &str, target: &str) -> Vec<BatchItem> {
        if texts.is_empty() {
            return Vec::new();
        }

        if self.single_call_batch && texts.len() > 1 && self.ensure_model().is_ok() {
            match self.request_batch(texts, source, target).await {
                Ok(items) => return items,
                Err(e) => tracing::warn!("单次批量翻译失败，改为逐条翻译: {}", e),
            }
        }

        self.per_unit(texts, source, target).await
    }

    async fn test_connection(&self, _target: &str) -> TranslationResult<String> {
        let models = self.list_models().await?;
        if !self.model.is_empty() && !models.iter().any(|m| m == &self.model) {
            return Err(TranslationError::ConfigError(format!(
                "模型 {} 不在服务端列表中",
                self.model
            )));
        }
        Ok(format!("{} 个模型可用", models.len()))
    }

    async fn list_models(&self) -> TranslationResult<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint("/v1/models"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::http_status(status.as_u16()));
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}
