//! 翻译批次管理器模块
//!
//! 把单元按固定大小分组。批次内并发请求，批次之间串行并短暂停顿，
//! 以限制对后端的并发压力。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::translation::config::{constants, TranslationConfig};

/// 翻译批次
#[derive(Debug, Clone)]
pub struct Batch<T> {
    /// 批次序号，从 0 开始
    pub id: usize,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 批次管理器配置
#[derive(Debug, Clone, Copy)]
pub struct BatchManagerConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for BatchManagerConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::PAGE_BATCH_SIZE,
            batch_delay: Duration::from_millis(constants::BATCH_DELAY_MS),
        }
    }
}

impl From<&TranslationConfig> for BatchManagerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
        }
    }
}

/// 批次统计
#[derive(Debug, Default)]
pub struct BatchStats {
    input_items: AtomicUsize,
    output_batches: AtomicUsize,
}

impl BatchStats {
    pub fn get_input_items(&self) -> usize {
        self.input_items.load(Ordering::Relaxed)
    }

    pub fn get_output_batches(&self) -> usize {
        self.output_batches.load(Ordering::Relaxed)
    }
}

/// 批次管理器
pub struct BatchManager {
    config: BatchManagerConfig,
    stats: BatchStats,
}

impl BatchManager {
    pub fn new(config: BatchManagerConfig) -> Self {
        Self {
            config: BatchManagerConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            stats: BatchStats::default(),
        }
    }

    pub fn config(&self) -> &BatchManagerConfig {
        &self.config
    }

    /// 批次间的停顿
    pub fn delay(&self) -> Duration {
        self.config.batch_delay
    }

    /// 按顺序切分成固定大小的批次，最后一批可能不足
    pub fn create_batches<T>(&self, items: Vec<T>) -> Vec<Batch<T>> {
        let total = items.len();
        let mut batches = Vec::with_capacity(total.div_ceil(self.config.batch_size));
        let mut iter = items.into_iter().peekable();

        while iter.peek().is_some() {
            let chunk: Vec<T> = iter.by_ref().take(self.config.batch_size).collect();
            batches.push(Batch {
                id: batches.len(),
                items: chunk,
            });
        }

        self.stats.input_items.fetch_add(total, Ordering::Relaxed);
        self.stats
            .output_batches
            .fetch_add(batches.len(), Ordering::Relaxed);
        tracing::debug!("{} 个单元分为 {} 个批次", total, batches.len());

        batches
    }

    pub fn get_stats(&self) -> &BatchStats {
        &self.stats
    }
}

impl Default for BatchManager {
    fn default() -> Self {
        Self::new(BatchManagerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_keep_order_and_size() {
        let manager = BatchManager::default();
        let batches = manager.create_batches((0..12).collect::<Vec<_>>());

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].items, vec![0, 1, 2, 3, 4]);
        assert_eq!(batches[1].items, vec![5, 6, 7, 8, 9]);
        assert_eq!(batches[2].items, vec![10, 11]);
        assert_eq!(batches[2].id, 2);

        assert_eq!(manager.get_stats().get_input_items(), 12);
        assert_eq!(manager.get_stats().get_output_batches(), 3);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let manager = BatchManager::new(BatchManagerConfig {
            batch_size: 0,
            batch_delay: Duration::ZERO,
        });
        assert_eq!(manager.create_batches(vec!['a', 'b']).len(), 2);
        assert!(manager.create_batches(Vec::<u8>::new()).is_empty());
    }
}
