//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量都以 `SWT_` 为前缀，
//! `NO_COLOR` 遵循通用约定。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回值，未设置时返回 `None`
    fn lookup() -> Option<EnvResult<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Some(Self::parse(&value)),
            _ => None,
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "SWT_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // 任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }

    /// 持久化状态目录（缓存、历史、用量）
    pub struct StateDir;
    impl EnvVar<String> for StateDir {
        const NAME: &'static str = "SWT_STATE_DIR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Directory holding the persistent store (default: ~/.local/share/smart-web-translator)";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("~/.local/share/smart-web-translator".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let dir = value.trim();
            if dir.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "State directory must not be empty".to_string(),
                });
            }
            Ok(dir.to_string())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 后端类型
    pub struct Backend;
    impl EnvVar<String> for Backend {
        const NAME: &'static str = "SWT_BACKEND";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation backend: rest or llm";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                "rest" | "libretranslate" => Ok("rest".to_string()),
                "llm" | "local-llm" => Ok("llm".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid backend '{}'. Use: rest, llm", value),
                }),
            }
        }
    }

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "SWT_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language for translation (ISO 639-1 code)";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim().to_lowercase();
            if lang.len() < 2 || lang == "auto" {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Target language must be a language code, not 'auto'".to_string(),
                });
            }
            Ok(lang)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "SWT_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Source language for translation ('auto' for detection)";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim().to_lowercase();
            if lang == "auto" || lang.len() >= 2 {
                Ok(lang)
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Language code must be 'auto' or an ISO 639-1 code".to_string(),
                })
            }
        }
    }

    /// REST 服务地址
    pub struct ServiceUrl;
    impl EnvVar<String> for ServiceUrl {
        const NAME: &'static str = "SWT_SERVICE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "REST translation endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// REST 服务密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "SWT_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key sent to the REST translation service";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 页面批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "SWT_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Number of text units translated concurrently per batch";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 50)
        }
    }

    /// 请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "SWT_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Backend request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }
}

/// 本地 LLM 相关环境变量
pub mod llm {
    use super::*;

    /// OpenAI 兼容服务地址
    pub struct BaseUrl;
    impl EnvVar<String> for BaseUrl {
        const NAME: &'static str = "SWT_LLM_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible chat service";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 模型标识
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "SWT_LLM_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model identifier used for chat completions";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 采样温度
    pub struct Temperature;
    impl EnvVar<f32> for Temperature {
        const NAME: &'static str = "SWT_LLM_TEMPERATURE";
        const DEFAULT: Option<f32> = Some(0.1);
        const DESCRIPTION: &'static str = "Sampling temperature (0.0 - 2.0)";

        fn parse(value: &str) -> EnvResult<f32> {
            let temperature: f32 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number".to_string(),
            })?;

            if !(0.0..=2.0).contains(&temperature) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Temperature must be between 0.0 and 2.0".to_string(),
                });
            }

            Ok(temperature)
        }
    }

    /// 最大生成 token 数
    pub struct MaxTokens;
    impl EnvVar<usize> for MaxTokens {
        const NAME: &'static str = "SWT_LLM_MAX_TOKENS";
        const DEFAULT: Option<usize> = Some(2000);
        const DESCRIPTION: &'static str = "Maximum tokens generated per single translation";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 32000)
        }
    }

    /// 提示词领域
    pub struct Domain;
    impl EnvVar<String> for Domain {
        const NAME: &'static str = "SWT_LLM_DOMAIN";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Prompt domain: general, automotive, technical, medical, legal, custom";

        fn parse(value: &str) -> EnvResult<String> {
            let domain = value.trim().to_lowercase();
            match domain.as_str() {
                "general" | "automotive" | "technical" | "medical" | "legal" | "custom" => {
                    Ok(domain)
                }
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Unknown prompt domain '{}'", value),
                }),
            }
        }
    }

    /// 失败时回退到 REST 后端
    pub struct Fallback;
    impl EnvVar<bool> for Fallback {
        const NAME: &'static str = "SWT_LLM_FALLBACK";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Retry failed LLM calls once against the REST backend";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let url = value.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&format!("- `{}`: {}\n", core::LogLevel::NAME, core::LogLevel::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {}\n", core::NoColor::NAME, core::NoColor::DESCRIPTION));
    docs.push_str(&format!("- `{}`: {}\n", core::StateDir::NAME, core::StateDir::DESCRIPTION));

    docs.push_str("\n## Translation\n\n");
    for (name, description) in [
        (translation::Backend::NAME, translation::Backend::DESCRIPTION),
        (translation::SourceLang::NAME, translation::SourceLang::DESCRIPTION),
        (translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION),
        (translation::ServiceUrl::NAME, translation::ServiceUrl::DESCRIPTION),
        (translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION),
    ] {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::BatchSize::NAME,
        translation::BatchSize::DESCRIPTION,
        translation::BatchSize::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        translation::RequestTimeout::NAME,
        translation::RequestTimeout::DESCRIPTION,
        translation::RequestTimeout::DEFAULT
    ));

    docs.push_str("\n## Local LLM\n\n");
    for (name, description) in [
        (llm::BaseUrl::NAME, llm::BaseUrl::DESCRIPTION),
        (llm::Model::NAME, llm::Model::DESCRIPTION),
        (llm::Domain::NAME, llm::Domain::DESCRIPTION),
    ] {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        llm::Temperature::NAME,
        llm::Temperature::DESCRIPTION,
        llm::Temperature::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        llm::MaxTokens::NAME,
        llm::MaxTokens::DESCRIPTION,
        llm::MaxTokens::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        llm::Fallback::NAME,
        llm::Fallback::DESCRIPTION,
        llm::Fallback::DEFAULT
    ));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse("warn").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        assert!(llm::Fallback::parse("true").unwrap());
        assert!(llm::Fallback::parse("1").unwrap());
        assert!(llm::Fallback::parse("YES").unwrap());
        assert!(llm::Fallback::parse("on").unwrap());

        assert!(!llm::Fallback::parse("false").unwrap());
        assert!(!llm::Fallback::parse("0").unwrap());
        assert!(!llm::Fallback::parse("off").unwrap());

        assert!(llm::Fallback::parse("maybe").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::ServiceUrl::parse("http://localhost:5000/translate").is_ok());
        assert!(llm::BaseUrl::parse("https://llm.example.com").is_ok());

        assert!(translation::ServiceUrl::parse("ftp://example.com").is_err());
        assert!(llm::BaseUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(translation::Backend::parse("LibreTranslate").unwrap(), "rest");
        assert_eq!(translation::Backend::parse("llm").unwrap(), "llm");
        assert!(translation::Backend::parse("deepl").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::BatchSize::parse("5").unwrap(), 5);
        assert!(translation::BatchSize::parse("0").is_err());
        assert!(translation::BatchSize::parse("many").is_err());

        assert!(llm::Temperature::parse("0.7").is_ok());
        assert!(llm::Temperature::parse("3.5").is_err());

        assert_eq!(
            translation::RequestTimeout::parse("15").unwrap(),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_target_lang_rejects_auto() {
        assert!(translation::TargetLang::parse("auto").is_err());
        assert_eq!(translation::TargetLang::parse(" DE ").unwrap(), "de");
    }

    #[test]
    fn test_env_docs_lists_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("SWT_LOG_LEVEL"));
        assert!(docs.contains("SWT_LLM_MODEL"));
        assert!(docs.contains("SWT_BATCH_SIZE"));
    }
}
