//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

use super::constants;
use crate::translation::backend::prompts::PromptDomain;
use crate::translation::backend::BackendKind;
use crate::translation::core::rewrite::{BilingualOrder, TranslationMode};
use crate::translation::error::{TranslationError, TranslationResult};

/// 本地 LLM 配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// 未设置或非数字时使用默认值
    #[serde(deserialize_with = "lenient_f32", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub domain: PromptDomain,
    pub custom_prompt: String,
    /// LLM 单条请求失败后回退到 REST 后端重试一次
    pub fallback_to_rest: bool,
    /// 批量翻译时先尝试单次请求
    pub single_call_batch: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_LLM_URL.to_string(),
            model: String::new(),
            temperature: None,
            max_tokens: None,
            domain: PromptDomain::General,
            custom_prompt: String::new(),
            fallback_to_rest: false,
            single_call_batch: true,
        }
    }
}

impl LlmSettings {
    pub fn effective_temperature(&self) -> f32 {
        self.temperature
            .filter(|t| t.is_finite())
            .unwrap_or(constants::DEFAULT_TEMPERATURE)
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens
            .filter(|t| *t > 0)
            .unwrap_or(constants::DEFAULT_MAX_TOKENS)
    }
}

/// 翻译配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    // 后端选择
    pub backend: BackendKind,
    pub source_lang: String,
    pub target_lang: String,

    // REST 后端
    pub service_url: String,
    pub api_key: String,

    // LLM 后端
    pub llm: LlmSettings,

    // 选择规则
    pub skip_code_blocks: bool,
    pub skip_quotes: bool,
    pub site_strategies: bool,

    // 批次配置
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,

    // 显示方式
    pub default_mode: TranslationMode,
    pub bilingual_position: BilingualOrder,
    pub show_original_on_hover: bool,

    // 历史记录
    pub history_limit: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Rest,
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),

            service_url: constants::DEFAULT_SERVICE_URL.to_string(),
            api_key: String::new(),

            llm: LlmSettings::default(),

            skip_code_blocks: true,
            skip_quotes: false,
            site_strategies: true,

            batch_size: constants::PAGE_BATCH_SIZE,
            batch_delay_ms: constants::BATCH_DELAY_MS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            default_mode: TranslationMode::Replace,
            bilingual_position: BilingualOrder::OriginalFirst,
            show_original_on_hover: true,

            history_limit: constants::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, service_url: Option<&str>) -> Self {
        let mut config = Self::default();
        config.target_lang = target_lang.to_string();
        if let Some(url) = service_url {
            config.service_url = url.to_string();
        }
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时不能为0".to_string()));
        }

        if self.target_lang.trim().is_empty() || self.target_lang == "auto" {
            return Err(TranslationError::ConfigError(
                "目标语言必须是具体的语言代码".to_string(),
            ));
        }

        if self.history_limit == 0 {
            return Err(TranslationError::ConfigError("历史记录上限不能为0".to_string()));
        }

        match self.backend {
            BackendKind::Rest => {
                if url::Url::parse(&self.service_url).is_err() {
                    return Err(TranslationError::ConfigError(format!(
                        "无效的服务地址: {}",
                        self.service_url
                    )));
                }
            }
            BackendKind::Llm => {
                if url::Url::parse(&self.llm.base_url).is_err() {
                    return Err(TranslationError::ConfigError(format!(
                        "无效的 LLM 地址: {}",
                        self.llm.base_url
                    )));
                }
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{llm, translation, EnvVar};

        if let Some(backend) = accept::<translation::Backend, _>() {
            self.backend = if backend == "llm" {
                BackendKind::Llm
            } else {
                BackendKind::Rest
            };
        }

        if let Some(lang) = accept::<translation::SourceLang, _>() {
            self.source_lang = lang;
        }

        if let Some(lang) = accept::<translation::TargetLang, _>() {
            self.target_lang = lang;
        }

        if let Some(url) = accept::<translation::ServiceUrl, _>() {
            tracing::info!("环境变量覆盖服务地址: {}", url);
            self.service_url = url;
        }

        if let Some(key) = accept::<translation::ApiKey, _>() {
            self.api_key = key;
        }

        if let Some(batch_size) = accept::<translation::BatchSize, _>() {
            self.batch_size = batch_size;
        }

        if let Some(timeout) = accept::<translation::RequestTimeout, _>() {
            self.request_timeout_secs = timeout.as_secs();
        }

        if let Some(url) = accept::<llm::BaseUrl, _>() {
            tracing::info!("环境变量覆盖 LLM 地址: {}", url);
            self.llm.base_url = url;
        }

        if let Some(model) = accept::<llm::Model, _>() {
            self.llm.model = model;
        }

        if let Some(temperature) = accept::<llm::Temperature, _>() {
            self.llm.temperature = Some(temperature);
        }

        if let Some(max_tokens) = accept::<llm::MaxTokens, _>() {
            self.llm.max_tokens = Some(max_tokens as u32);
        }

        if let Some(domain) = accept::<llm::Domain, _>() {
            self.llm.domain = PromptDomain::from_name(&domain);
        }

        if let Some(fallback) = accept::<llm::Fallback, _>() {
            self.llm.fallback_to_rest = fallback;
        }

        fn accept<V: EnvVar<T>, T>() -> Option<T> {
            match V::lookup()? {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("忽略无效的环境变量: {}", e);
                    None
                }
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<String>,
}

impl ConfigManager {
    /// 按默认搜索路径加载配置
    pub fn new() -> TranslationResult<Self> {
        Self::load(None)
    }

    /// 加载配置：.env → 配置文件 → 环境变量覆盖 → 校验
    pub fn load(explicit_path: Option<&str>) -> TranslationResult<Self> {
        Self::load_dotenv();

        let (mut config, source) = match explicit_path {
            Some(path) => {
                let expanded = shellexpand::tilde(path);
                (Self::load_from_file(&expanded)?, Some(expanded.to_string()))
            }
            None => Self::search_config()?,
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 实际加载的配置文件
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn search_config() -> TranslationResult<(TranslationConfig, Option<String>)> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                let config = Self::load_from_file(&expanded_path)?;
                return Ok((config, Some(expanded_path.to_string())));
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok((TranslationConfig::default(), None))
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::debug!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let mut config = TranslationConfig::default();
        config.llm.temperature = Some(constants::DEFAULT_TEMPERATURE);
        config.llm.max_tokens = Some(constants::DEFAULT_MAX_TOKENS);

        let content = toml::to_string_pretty(&config)?;
        std::fs::write(shellexpand::tilde(path).as_ref(), content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

// ============================================================================
// 宽松数值解析：数字、数字字符串均可，其他值视为未设置
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl LenientNumber {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            LenientNumber::Number(n) => Some(*n),
            LenientNumber::Text(s) => s.trim().parse::<f64>().ok(),
            LenientNumber::Other(_) => None,
        };
        value.filter(|n| n.is_finite())
    }
}

fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    let value = Option::<LenientNumber>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()).map(|n| n as f32))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<LenientNumber>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|n| *n >= 1.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay(), Duration::from_millis(50));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.service_url, "http://localhost:5000/translate");
        assert_eq!(config.history_limit, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TranslationConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.target_lang = "auto".to_string();
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.backend = BackendKind::Llm;
        config.llm.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lenient_llm_numbers() {
        let config: TranslationConfig = serde_json::from_str(
            r#"{"llm": {"temperature": "warm", "max_tokens": "1500"}}"#,
        )
        .unwrap();
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.llm.effective_temperature(), 0.1);
        assert_eq!(config.llm.max_tokens, Some(1500));

        let config: TranslationConfig =
            serde_json::from_str(r#"{"llm": {"temperature": 0.4, "max_tokens": true}}"#).unwrap();
        assert_eq!(config.llm.temperature, Some(0.4));
        assert_eq!(config.llm.effective_max_tokens(), 2000);
    }

    #[test]
    fn test_toml_partial_config() {
        let config: TranslationConfig = toml::from_str(
            r#"
            backend = "llm"
            target_lang = "fr"
            default_mode = "bilingual"
            bilingual_position = "above"

            [llm]
            model = "qwen2.5-7b-instruct"
            domain = "technical"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Llm);
        assert_eq!(config.target_lang, "fr");
        assert_eq!(config.default_mode, TranslationMode::Bilingual);
        assert_eq!(config.bilingual_position, BilingualOrder::TranslatedFirst);
        assert_eq!(config.llm.model, "qwen2.5-7b-instruct");
        assert_eq!(config.llm.domain, PromptDomain::Technical);
        assert_eq!(config.batch_size, 5);
    }

    #[test]
    fn test_example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swt.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let loaded = ConfigManager::load_from_file(path).unwrap();
        assert_eq!(loaded.llm.effective_temperature(), 0.1);
        assert_eq!(loaded.target_lang, "de");
    }
}
