//! 页面翻译缓存
//!
//! 每个页面（主机名 + 路径）一个条目，保存 `内容哈希 -> 译文` 的映射。
//! 存储失败只记录警告，翻译流程在没有缓存时照常运行。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kv::KeyValueStore;
use crate::translation::config::constants;

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub page_url: String,
    pub target_lang: String,
    pub saved_at: DateTime<Utc>,
    pub translations: BTreeMap<String, String>,
}

/// 缓存条目摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub key: String,
    pub page_url: String,
    pub target_lang: String,
    pub saved_at: DateTime<Utc>,
    pub count: usize,
}

/// 缓存信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub entries: Vec<CacheSummary>,
    pub total_size: u64,
    pub has_current_page: bool,
}

/// 计算内容哈希：trim 后文本的 blake3 摘要前 16 个十六进制字符
///
/// 64 位前缀在单页范围内冲突概率可忽略；冲突时后写入的译文覆盖前者。
pub fn content_hash(text: &str) -> String {
    let hash = blake3::hash(text.trim().as_bytes());
    hash.to_hex()[..16].to_string()
}

/// 页面缓存键，只取主机名和路径，忽略查询串和片段
pub fn page_key(page_url: &str) -> String {
    match url::Url::parse(page_url) {
        Ok(url) => format!(
            "{}{}{}",
            constants::CACHE_KEY_PREFIX,
            url.host_str().unwrap_or_default(),
            url.path()
        ),
        Err(_) => {
            let bare = page_url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim();
            format!("{}{}", constants::CACHE_KEY_PREFIX, bare)
        }
    }
}

/// 页面缓存
#[derive(Clone)]
pub struct PageCache {
    store: Arc<dyn KeyValueStore>,
}

// ============================================================================
// 实现
// ============================================================================

impl PageCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// 保存页面译文映射，失败时返回 false
    pub fn save(
        &self,
        key: &str,
        page_url: &str,
        target_lang: &str,
        translations: BTreeMap<String, String>,
    ) -> bool {
        let entry = CacheEntry {
            page_url: page_url.to_string(),
            target_lang: target_lang.to_string(),
            saved_at: Utc::now(),
            translations,
        };

        let value = match serde_json::to_string(&entry) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("缓存序列化失败 {}: {}", key, e);
                return false;
            }
        };

        match self.store.set(key, &value) {
            Ok(()) => {
                tracing::debug!("已缓存 {} 条译文: {}", entry.translations.len(), key);
                true
            }
            Err(e) => {
                tracing::warn!("写入缓存失败 {}: {}", key, e);
                false
            }
        }
    }

    /// 读取页面缓存
    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("读取缓存失败 {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("缓存条目损坏 {}: {}", key, e);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.store.get(key), Ok(Some(_)))
    }

    fn cache_keys(&self) -> Vec<String> {
        match self.store.keys_with_prefix(constants::CACHE_KEY_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("列出缓存失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 所有缓存条目摘要，按保存时间倒序
    pub fn list(&self) -> Vec<CacheSummary> {
        let mut summaries: Vec<CacheSummary> = self
            .cache_keys()
            .into_iter()
            .filter_map(|key| {
                let entry = self.load(&key)?;
                Some(CacheSummary {
                    count: entry.translations.len(),
                    key,
                    page_url: entry.page_url,
                    target_lang: entry.target_lang,
                    saved_at: entry.saved_at,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        summaries
    }

    /// 删除指定条目；`None` 时清空整个缓存命名空间，返回删除数量
    ///
    /// 不在缓存命名空间中的键不会被删除。
    pub fn clear(&self, key: Option<&str>) -> usize {
        let keys = match key {
            Some(key) if key.starts_with(constants::CACHE_KEY_PREFIX) => vec![key.to_string()],
            Some(key) => {
                tracing::warn!("拒绝删除缓存命名空间之外的键: {}", key);
                Vec::new()
            }
            None => self.cache_keys(),
        };

        let mut removed = 0;
        for key in keys {
            match self.store.remove(&key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("删除缓存失败 {}: {}", key, e),
            }
        }
        tracing::info!("已清除 {} 个缓存条目", removed);
        removed
    }

    /// 估算占用字节数：(键长 + 序列化值长) × 2
    pub fn total_size_bytes(&self) -> u64 {
        self.cache_keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.store.get(&key).ok()??;
                Some(((key.chars().count() + value.chars().count()) * 2) as u64)
            })
            .sum()
    }

    /// 缓存信息
    pub fn info(&self, current_key: Option<&str>) -> CacheInfo {
        CacheInfo {
            entries: self.list(),
            total_size: self.total_size_bytes(),
            has_current_page: current_key.is_some_and(|key| self.contains(key)),
        }
    }
}
