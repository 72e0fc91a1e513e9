//! 翻译历史
//!
//! 最新的记录在最前，超过上限时丢弃最旧的记录。

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kv::KeyValueStore;
use crate::translation::config::constants;
use crate::translation::error::TranslationResult;

/// 历史记录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub original: String,
    pub translated: String,
    #[serde(default)]
    pub source_lang: String,
    #[serde(default)]
    pub target_lang: String,
    #[serde(default)]
    pub backend: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// 整页翻译的来源地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

impl HistoryEntry {
    pub fn new(original: &str, translated: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            original: original.to_string(),
            translated: translated.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            backend: String::new(),
            timestamp: Utc::now(),
            page_url: None,
        }
    }

    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_string();
        self
    }

    pub fn with_page(mut self, page_url: &str) -> Self {
        self.page_url = Some(page_url.to_string());
        self
    }
}

/// 历史记录存储
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    limit: usize,
    // 读改写需要串行
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 全部记录，最新在前
    pub fn list(&self) -> TranslationResult<Vec<HistoryEntry>> {
        match self.store.get(constants::HISTORY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// 插入到最前，超过上限时截断
    pub fn add(&self, entry: HistoryEntry) -> TranslationResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.list().unwrap_or_else(|e| {
            tracing::warn!("历史记录损坏，重新开始: {}", e);
            Vec::new()
        });
        entries.insert(0, entry);
        entries.truncate(self.limit);

        self.store
            .set(constants::HISTORY_KEY, &serde_json::to_string(&entries)?)
    }

    pub fn clear(&self) -> TranslationResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.store.remove(constants::HISTORY_KEY)?;
        Ok(())
    }
}
