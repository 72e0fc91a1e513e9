//! LLM 系统提示词
//!
//! 按领域选择模板，`{source}` 与 `{target}` 替换为语言显示名称。

use serde::{Deserialize, Serialize};

use crate::translation::languages::display_name;

/// 提示词领域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptDomain {
    #[default]
    General,
    Automotive,
    Technical,
    Medical,
    Legal,
    /// 使用配置中的自定义提示词
    Custom,
}

impl PromptDomain {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "automotive" => PromptDomain::Automotive,
            "technical" => PromptDomain::Technical,
            "medical" => PromptDomain::Medical,
            "legal" => PromptDomain::Legal,
            "custom" => PromptDomain::Custom,
            _ => PromptDomain::General,
        }
    }

    fn template(self) -> &'static str {
        match self {
            PromptDomain::General | PromptDomain::Custom => GENERAL,
            PromptDomain::Automotive => AUTOMOTIVE,
            PromptDomain::Technical => TECHNICAL,
            PromptDomain::Medical => MEDICAL,
            PromptDomain::Legal => LEGAL,
        }
    }
}

const GENERAL: &str = "You are a professional translator. Translate the user's text from {source} to {target}. \
Preserve meaning, tone and formatting. Do not add explanations.";

const AUTOMOTIVE: &str = "You are a professional translator specialised in automotive engineering and workshop \
documentation. Translate the user's text from {source} to {target} using established automotive terminology. \
Keep part numbers, codes and units unchanged.";

const TECHNICAL: &str = "You are a professional translator for software and technical documentation. Translate \
the user's text from {source} to {target}. Keep identifiers, commands, file names and product names unchanged.";

const MEDICAL: &str = "You are a professional medical translator. Translate the user's text from {source} to \
{target} using correct clinical terminology. Keep dosages and units exactly as written.";

const LEGAL: &str = "You are a professional legal translator. Translate the user's text from {source} to \
{target} precisely, preserving the legal meaning and the structure of clauses.";

const SINGLE_FORMAT: &str = "Answer with a JSON object: {\"translation\": string, \"alternatives\": up to 3 \
alternative translations, \"context_notes\": short optional note}.";

const BATCH_FORMAT: &str = "The user sends a JSON array of texts. Answer with a JSON array of objects \
{\"original\": string, \"translation\": string}, one per input text, in the same order and with the same length.";

/// 生成系统提示词
pub fn system_prompt(domain: PromptDomain, custom_prompt: &str, source: &str, target: &str) -> String {
    let source_name = if source.trim().is_empty() || source == "auto" {
        "the detected source language".to_string()
    } else {
        display_name(source)
    };
    let target_name = display_name(target);

    let template = match domain {
        PromptDomain::Custom if !custom_prompt.trim().is_empty() => custom_prompt,
        _ => domain.template(),
    };

    template
        .replace("{source}", &source_name)
        .replace("{target}", &target_name)
}

/// 单条翻译的完整提示词
pub fn single_prompt(domain: PromptDomain, custom_prompt: &str, source: &str, target: &str) -> String {
    format!("{}\n\n{}", system_prompt(domain, custom_prompt, source, target), SINGLE_FORMAT)
}

/// 批量翻译的完整提示词
pub fn batch_prompt(domain: PromptDomain, custom_prompt: &str, source: &str, target: &str) -> String {
    format!("{}\n\n{}", system_prompt(domain, custom_prompt, source, target), BATCH_FORMAT)
}
