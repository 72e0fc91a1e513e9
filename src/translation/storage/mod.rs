//! 存储模块
//!
//! 页面缓存、历史记录，以及它们共用的键值存储

pub mod cache;
pub mod history;
pub mod kv;

pub use cache::{content_hash, page_key, CacheEntry, CacheInfo, CacheSummary, PageCache};
pub use history::{HistoryEntry, HistoryStore};
pub use kv::{KeyValueStore, MemoryStore, RedbStore};
