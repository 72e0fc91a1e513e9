//! 消息边界
//!
//! 界面层与翻译核心之间以带 `action` 标签的 JSON 消息通信。
//! 无法识别的消息在反序列化时失败，回复 `{success: false, error}`。

use serde::{Deserialize, Serialize};

use crate::translation::backend::{BatchItem, TranslationOutcome, UsageTotals};
use crate::translation::config::TranslationConfig;
use crate::translation::core::engine::{AlreadyTranslated, PassOutcome};
use crate::translation::core::rewrite::TranslationMode;
use crate::translation::error::TranslationResult;
use crate::translation::storage::{CacheInfo, CacheSummary, HistoryEntry};

/// 请求
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Translate {
        text: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
    },
    TranslateBatch {
        texts: Vec<String>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TranslatePage {
        #[serde(default)]
        mode: Option<TranslationMode>,
        #[serde(default)]
        if_translated: AlreadyTranslated,
    },
    RestorePage,
    ToggleTranslation,
    GetPageInfo,
    LoadCachedTranslation {
        #[serde(default)]
        mode: Option<TranslationMode>,
    },
    GetCacheInfo,
    ClearCache {
        #[serde(default)]
        key: Option<String>,
    },
    GetHistory,
    ClearHistory,
    AddToHistory {
        entry: HistoryEntry,
    },
    GetUsage,
    ResetUsage,
    ListModels,
    TestConnection,
    GetSettings,
}

impl Request {
    pub fn from_json(raw: &str) -> TranslationResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// 页面状态信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub is_translated: bool,
    pub mode: Option<TranslationMode>,
    pub showing_original: bool,
    pub count: usize,
    pub has_cache: bool,
}

/// 缓存信息回复
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfoReply {
    pub size: u64,
    pub entries: Vec<CacheSummary>,
    pub current_page_has_cache: bool,
}

impl From<CacheInfo> for CacheInfoReply {
    fn from(info: CacheInfo) -> Self {
        Self {
            size: info.total_size,
            entries: info.entries,
            current_page_has_cache: info.has_current_page,
        }
    }
}

/// 回复
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Translation(TranslationOutcome),
    Batch {
        items: Vec<BatchItem>,
    },
    Pass {
        success: bool,
        #[serde(flatten)]
        outcome: PassOutcome,
    },
    PageInfo(PageInfo),
    Cached {
        success: bool,
        count: usize,
    },
    CacheInfo(CacheInfoReply),
    History {
        entries: Vec<HistoryEntry>,
    },
    Usage(UsageTotals),
    Models {
        models: Vec<String>,
    },
    Settings(Box<TranslationConfig>),
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn ack() -> Self {
        Response::Ack {
            success: true,
            message: None,
        }
    }

    pub fn ack_with(message: impl Into<String>) -> Self {
        Response::Ack {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Response::Error {
            success: false,
            error: error.into(),
        }
    }

    pub fn pass(outcome: PassOutcome) -> Self {
        Response::Pass {
            success: true,
            outcome,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn to_json(&self) -> TranslationResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::engine::PassSummary;

    #[test]
    fn test_parse_requests() {
        let request = Request::from_json(r#"{"action":"translate","text":"Hello","target":"fr"}"#).unwrap();
        assert_eq!(
            request,
            Request::Translate {
                text: "Hello".to_string(),
                source: None,
                target: Some("fr".to_string()),
            }
        );

        let request =
            Request::from_json(r#"{"action":"translatePage","mode":"bilingual","ifTranslated":"toggle"}"#)
                .unwrap();
        assert_eq!(
            request,
            Request::TranslatePage {
                mode: Some(TranslationMode::Bilingual),
                if_translated: AlreadyTranslated::Toggle,
            }
        );

        assert_eq!(
            Request::from_json(r#"{"action":"restorePage"}"#).unwrap(),
            Request::RestorePage
        );
        assert_eq!(
            Request::from_json(r#"{"action":"clearCache"}"#).unwrap(),
            Request::ClearCache { key: None }
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(Request::from_json(r#"{"action":"selfDestruct"}"#).is_err());
        assert!(Request::from_json(r#"{"text":"no action"}"#).is_err());
    }

    #[test]
    fn test_response_shapes() {
        let json = serde_json::to_value(Response::error("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));

        let json = serde_json::to_value(Response::ack()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));

        let summary = PassSummary {
            total_units: 5,
            translated: 4,
            failed: 1,
            ..PassSummary::default()
        };
        let json = serde_json::to_value(Response::pass(PassOutcome::Completed(summary))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["translated"], 4);

        let info = PageInfo {
            is_translated: true,
            mode: Some(TranslationMode::Replace),
            showing_original: false,
            count: 3,
            has_cache: true,
        };
        let json = serde_json::to_value(Response::PageInfo(info)).unwrap();
        assert_eq!(json["isTranslated"], true);
        assert_eq!(json["mode"], "replace");
        assert_eq!(json["hasCache"], true);
    }
}
