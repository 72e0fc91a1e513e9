//! 翻译核心
//!
//! - `rewrite`: 改写文档并记录撤销信息
//! - `engine`: 单个页面的整页翻译流程
//! - `service`: 后台协调者，持有后端、缓存、历史和用量

pub mod engine;
pub mod rewrite;
pub mod service;

pub use engine::{
    AlreadyTranslated, CancelHandle, PageTranslator, PassOutcome, PassSummary, PipelineState,
    ProgressSink,
};
pub use rewrite::{
    BilingualOrder, MutationRecord, PageState, RestoreReport, RewriteEngine, RewriteOptions,
    TranslationMode,
};
pub use service::{ServiceStats, ServiceStatsSnapshot, TranslationService};
