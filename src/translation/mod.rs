//! 翻译模块
//!
//! - **dom**: 文档读写抽象
//! - **pipeline**: 单元选择（过滤、站点策略、纯文本拆分）与批次划分
//! - **backend**: REST / LLM 翻译后端与回退
//! - **core**: 改写引擎、整页翻译流程和翻译服务
//! - **storage**: 页面缓存、历史记录和键值存储
//! - **config**: 配置管理
//! - **messages**: 与界面层之间的消息
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use smart_web_translator::translation::{
//!     AlreadyTranslated, MemoryStore, PageTranslator, RcDomPage, TranslationConfig,
//!     TranslationMode, TranslationService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::default_with_lang("de", None);
//! let service = Arc::new(TranslationService::new(config, Arc::new(MemoryStore::new()))?);
//!
//! let page = RcDomPage::parse("<p>Hello world</p>").with_url("https://example.com/");
//! let mut translator = PageTranslator::new(page, service);
//! translator
//!     .translate_page(TranslationMode::Replace, AlreadyTranslated::Reject)
//!     .await?;
//! println!("{}", translator.dom().to_html());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod languages;
pub mod messages;
pub mod pipeline;
pub mod storage;

pub use backend::{
    BackendClient, BackendKind, BatchItem, LlmBackend, RestBackend, TranslationBackend,
    TranslationOutcome, UsageSink, UsageTracker,
};
pub use config::{ConfigManager, LlmSettings, TranslationConfig};
pub use self::core::{
    AlreadyTranslated, BilingualOrder, PageTranslator, PassOutcome, PassSummary, RestoreReport,
    TranslationMode, TranslationService,
};
pub use dom::{DomReader, DomWriter, RcDomPage};
pub use error::{TranslationError, TranslationResult};
pub use messages::{Request, Response};
pub use storage::{HistoryEntry, HistoryStore, KeyValueStore, MemoryStore, PageCache, RedbStore};
