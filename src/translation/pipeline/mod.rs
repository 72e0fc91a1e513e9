//! 翻译管道模块
//!
//! 提供文本选择管道，包括过滤、站点策略、收集和批次划分

pub mod batch;
pub mod collector;
pub mod filters;
pub mod strategies;

// 重新导出主要类型
pub use batch::{Batch, BatchManager, BatchManagerConfig};
pub use collector::{
    split_paragraphs, CollectorConfig, PlainTextBlock, Selection, TextCollector, TextSegment,
    TranslatableUnit,
};
pub use filters::{ExclusionReason, FilterOptions, TextFilter};
pub use strategies::{SimpleSelector, SiteStrategy, StrategyRegistry};
