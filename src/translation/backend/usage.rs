//! Token 用量统计

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::translation::config::constants;
use crate::translation::error::TranslationResult;
use crate::translation::storage::KeyValueStore;

/// 接收后端报告的用量
pub trait UsageSink: Send + Sync {
    fn on_usage(&self, prompt_tokens: u64, completion_tokens: u64);
}

/// 丢弃所有用量
pub struct NullUsage;

impl UsageSink for NullUsage {
    fn on_usage(&self, _prompt_tokens: u64, _completion_tokens: u64) {}
}

/// 累计用量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub requests: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

/// 持久化的用量统计
pub struct UsageTracker {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn totals(&self) -> TranslationResult<UsageTotals> {
        match self.store.get(constants::USAGE_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(UsageTotals::default()),
        }
    }

    pub fn reset(&self) -> TranslationResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.store.remove(constants::USAGE_KEY)?;
        Ok(())
    }

    fn record(&self, prompt_tokens: u64, completion_tokens: u64) -> TranslationResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut totals = self.totals().unwrap_or_default();
        totals.prompt_tokens += prompt_tokens;
        totals.completion_tokens += completion_tokens;
        totals.total_tokens += prompt_tokens + completion_tokens;
        totals.requests += 1;
        totals.since.get_or_insert_with(Utc::now);
        self.store
            .set(constants::USAGE_KEY, &serde_json::to_string(&totals)?)
    }
}

impl UsageSink for UsageTracker {
    fn on_usage(&self, prompt_tokens: u64, completion_tokens: u64) {
        if let Err(e) = self.record(prompt_tokens, completion_tokens) {
            tracing::warn!("记录用量失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::storage::MemoryStore;

    #[test]
    fn test_usage_accumulates_and_resets() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()));
        tracker.on_usage(10, 5);
        tracker.on_usage(3, 2);

        let totals = tracker.totals().unwrap();
        assert_eq!(totals.prompt_tokens, 13);
        assert_eq!(totals.completion_tokens, 7);
        assert_eq!(totals.total_tokens, 20);
        assert_eq!(totals.requests, 2);
        assert!(totals.since.is_some());

        tracker.reset().unwrap();
        assert_eq!(tracker.totals().unwrap(), UsageTotals::default());
    }
}
