//! 翻译服务
//!
//! 后台协调者：持有配置快照、翻译后端、页面缓存、历史记录和用量统计，
//! 处理与具体页面无关的消息。页面相关的操作由 [`PageTranslator`] 负责。
//!
//! [`PageTranslator`]: super::engine::PageTranslator

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::translation::backend::{
    BackendClient, BatchItem, TranslationOutcome, UsageSink, UsageTracker,
};
use crate::translation::config::TranslationConfig;
use crate::translation::core::engine::PassSummary;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::messages::{CacheInfoReply, Request, Response};
use crate::translation::storage::{
    CacheInfo, HistoryEntry, HistoryStore, KeyValueStore, PageCache,
};

/// 翻译服务
pub struct TranslationService {
    config: TranslationConfig,
    backend: BackendClient,
    cache: PageCache,
    history: HistoryStore,
    usage: Arc<UsageTracker>,
    stats: ServiceStats,
}

impl TranslationService {
    /// 按配置创建服务，后端由配置决定
    pub fn new(config: TranslationConfig, store: Arc<dyn KeyValueStore>) -> TranslationResult<Self> {
        config.validate()?;
        let usage = Arc::new(UsageTracker::new(store.clone()));
        let sink: Arc<dyn UsageSink> = usage.clone();
        let backend = BackendClient::from_config(&config, sink)?;
        Ok(Self::assemble(config, store, backend, usage))
    }

    /// 使用外部提供的后端
    pub fn with_backend(
        config: TranslationConfig,
        store: Arc<dyn KeyValueStore>,
        backend: BackendClient,
    ) -> Self {
        let usage = Arc::new(UsageTracker::new(store.clone()));
        Self::assemble(config, store, backend, usage)
    }

    fn assemble(
        config: TranslationConfig,
        store: Arc<dyn KeyValueStore>,
        backend: BackendClient,
        usage: Arc<UsageTracker>,
    ) -> Self {
        let history = HistoryStore::new(store.clone(), config.history_limit);
        Self {
            config,
            backend,
            cache: PageCache::new(store),
            history,
            usage,
            stats: ServiceStats::default(),
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn get_stats(&self) -> &ServiceStats {
        &self.stats
    }

    fn languages<'a>(&'a self, source: Option<&'a str>, target: Option<&'a str>) -> (&'a str, &'a str) {
        (
            source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(&self.config.source_lang),
            target
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(&self.config.target_lang),
        )
    }

    /// 翻译单条文本，成功时写入历史
    pub async fn translate_text(
        &self,
        text: &str,
        source: Option<&str>,
        target: Option<&str>,
    ) -> TranslationOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TranslationOutcome::failure(self.backend.kind(), "文本为空");
        }

        let (source, target) = self.languages(source, target);
        let outcome = self.backend.translate_one(text, source, target).await;
        self.stats.record_outcome(&outcome);

        if let Some(translated) = outcome.text() {
            let entry = HistoryEntry::new(text, translated, source, target)
                .with_backend(outcome.backend_kind.as_str());
            if let Err(e) = self.history.add(entry) {
                tracing::warn!("写入历史失败: {}", e);
            }
        }
        outcome
    }

    /// 批量翻译，顺序与输入一致
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&str>,
        target: Option<&str>,
    ) -> Vec<BatchItem> {
        let (source, target) = self.languages(source, target);
        let items = self.backend.translate_batch(texts, source, target).await;
        for item in &items {
            self.stats.record_item(item.is_ok());
        }
        items
    }

    pub fn cache_info(&self, current_key: Option<&str>) -> CacheInfo {
        self.cache.info(current_key)
    }

    /// 记录一次整页翻译，写入摘要历史
    pub fn record_page_pass(&self, summary: &PassSummary, page_url: Option<&str>, elapsed: Duration) {
        self.stats.pages_translated.fetch_add(1, Ordering::Relaxed);
        self.stats
            .processing_time
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        if summary.translated == 0 {
            return;
        }

        let page = page_url.unwrap_or("(unnamed page)");
        let mut entry = HistoryEntry::new(
            page,
            &format!("{} units", summary.translated),
            &self.config.source_lang,
            &self.config.target_lang,
        )
        .with_backend(self.backend.kind().as_str());
        if let Some(url) = page_url {
            entry = entry.with_page(url);
        }
        if let Err(e) = self.history.add(entry) {
            tracing::warn!("写入历史失败: {}", e);
        }
    }

    /// 处理与页面无关的消息
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => Response::error(e.message()),
        }
    }

    async fn dispatch(&self, request: Request) -> TranslationResult<Response> {
        let response = match request {
            Request::Translate { text, source, target } => Response::Translation(
                self.translate_text(&text, source.as_deref(), target.as_deref())
                    .await,
            ),
            Request::TranslateBatch { texts, source, target } => Response::Batch {
                items: self
                    .translate_batch(&texts, source.as_deref(), target.as_deref())
                    .await,
            },
            Request::GetCacheInfo => {
                Response::CacheInfo(CacheInfoReply::from(self.cache_info(None)))
            }
            Request::ClearCache { key } => {
                let removed = self.cache.clear(key.as_deref());
                Response::ack_with(format!("{} cache entries removed", removed))
            }
            Request::GetHistory => Response::History {
                entries: self.history.list()?,
            },
            Request::ClearHistory => {
                self.history.clear()?;
                Response::ack()
            }
            Request::AddToHistory { entry } => {
                self.history.add(entry)?;
                Response::ack()
            }
            Request::GetUsage => Response::Usage(self.usage.totals()?),
            Request::ResetUsage => {
                self.usage.reset()?;
                Response::ack()
            }
            Request::ListModels => Response::Models {
                models: self.backend.list_models().await?,
            },
            Request::TestConnection => {
                let detail = self.backend.test_connection(&self.config.target_lang).await?;
                Response::ack_with(detail)
            }
            Request::GetSettings => Response::Settings(Box::new(self.config.clone())),
            Request::TranslatePage { .. }
            | Request::RestorePage
            | Request::ToggleTranslation
            | Request::GetPageInfo
            | Request::LoadCachedTranslation { .. } => {
                return Err(TranslationError::InvalidState(
                    "没有打开的页面".to_string(),
                ))
            }
        };
        Ok(response)
    }
}

/// 服务统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub texts_translated: AtomicUsize,
    pub texts_failed: AtomicUsize,
    pub fallback_used: AtomicUsize,
    pub pages_translated: AtomicUsize,
    pub tokens_used: AtomicU64,
    /// 整页翻译耗时，微秒
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    fn record_outcome(&self, outcome: &TranslationOutcome) {
        self.record_item(outcome.success);
        if outcome.fallback_used {
            self.fallback_used.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(tokens) = outcome.tokens_used {
            self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_item(&self, success: bool) {
        if success {
            self.texts_translated.fetch_add(1, Ordering::Relaxed);
        } else {
            self.texts_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            texts_translated: self.texts_translated.load(Ordering::Relaxed),
            texts_failed: self.texts_failed.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
            pages_translated: self.pages_translated.load(Ordering::Relaxed),
            tokens_used: self.tokens_used.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatsSnapshot {
    pub texts_translated: usize,
    pub texts_failed: usize,
    pub fallback_used: usize,
    pub pages_translated: usize,
    pub tokens_used: u64,
    pub processing_time: Duration,
}

impl ServiceStatsSnapshot {
    pub fn success_rate(&self) -> f64 {
        let total = self.texts_translated + self.texts_failed;
        if total == 0 {
            0.0
        } else {
            self.texts_translated as f64 / total as f64
        }
    }
}
