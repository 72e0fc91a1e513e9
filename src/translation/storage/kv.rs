//! 键值存储
//!
//! 缓存、历史和用量统计都写入同一个字符串键值存储。`MemoryStore`
//! 用于测试和一次性运行，`RedbStore` 把数据持久化到磁盘。

use std::path::Path;

use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition, TableError};

use crate::translation::error::{helpers::storage_error, TranslationResult};

/// 字符串键值存储
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> TranslationResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> TranslationResult<()>;

    /// 返回键是否存在过
    fn remove(&self, key: &str) -> TranslationResult<bool>;

    fn keys(&self) -> TranslationResult<Vec<String>>;

    /// 以指定前缀开头的键
    fn keys_with_prefix(&self, prefix: &str) -> TranslationResult<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> TranslationResult<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("swt_local");

/// 基于 redb 的持久化存储
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// 打开或创建数据库文件
    pub fn open(path: impl AsRef<Path>) -> TranslationResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(storage_error)?;
        tracing::debug!("打开存储: {}", path.display());
        Ok(Self { db })
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, key: &str) -> TranslationResult<Option<String>> {
        let txn = self.db.begin_read().map_err(storage_error)?;
        let table = match txn.open_table(TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        let value = table.get(key).map_err(storage_error)?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> TranslationResult<()> {
        let txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut table = txn.open_table(TABLE).map_err(storage_error)?;
            table.insert(key, value).map_err(storage_error)?;
        }
        txn.commit().map_err(storage_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<bool> {
        let txn = self.db.begin_write().map_err(storage_error)?;
        let existed = {
            let mut table = txn.open_table(TABLE).map_err(storage_error)?;
            let removed = table.remove(key).map_err(storage_error)?;
            removed.is_some()
        };
        txn.commit().map_err(storage_error)?;
        Ok(existed)
    }

    fn keys(&self) -> TranslationResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(storage_error)?;
        let table = match txn.open_table(TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(e)),
        };

        let mut keys = Vec::new();
        for entry in table.iter().map_err(storage_error)? {
            let (key, _) = entry.map_err(storage_error)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
