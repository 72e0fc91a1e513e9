//! 整页翻译流程
//!
//! 选择单元 → 分批 → 批次内并发请求后端 → 改写文档 → 写入缓存。
//! 每个页面一个 [`PageTranslator`]，它独占文档的改写记录和流程状态。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::rewrite::{PageState, RestoreReport, RewriteEngine, RewriteOptions, TranslationMode};
use super::service::TranslationService;
use crate::translation::dom::DomWriter;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::messages::{CacheInfoReply, PageInfo, Request, Response};
use crate::translation::pipeline::{BatchManager, BatchManagerConfig, CollectorConfig, TextCollector};
use crate::translation::storage::{content_hash, page_key};

/// 流程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    Idle,
    Selecting,
    Translating { in_flight: usize },
    Rewriting,
    Restoring,
}

/// 页面已翻译时收到翻译请求的处理方式，由调用方指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AlreadyTranslated {
    Restore,
    Toggle,
    #[default]
    Reject,
}

/// 一轮翻译的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub total_units: usize,
    pub translated: usize,
    pub failed: usize,
    /// 译文与原文相同而未改写的单元
    pub unchanged: usize,
    pub batches: usize,
    pub cached: bool,
}

/// 翻译请求的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PassOutcome {
    Completed(PassSummary),
    NothingToTranslate,
    Cancelled(PassSummary),
    Restored(RestoreReport),
    #[serde(rename_all = "camelCase")]
    Toggled { showing_original: bool },
}

/// 进度回调，每个单元完成后调用
pub trait ProgressSink {
    fn on_progress(&self, done: usize, total: usize);
}

impl<F: Fn(usize, usize)> ProgressSink for F {
    fn on_progress(&self, done: usize, total: usize) {
        self(done, total)
    }
}

/// 协作式取消：只在批次之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 单个页面的翻译器
pub struct PageTranslator<D: DomWriter> {
    dom: D,
    service: Arc<TranslationService>,
    collector: TextCollector,
    batches: BatchManager,
    rewrite: RewriteEngine<D::Node>,
    state: PipelineState,
    cancel: CancelHandle,
    progress: Option<Box<dyn ProgressSink>>,
}

impl<D: DomWriter> PageTranslator<D> {
    pub fn new(dom: D, service: Arc<TranslationService>) -> Self {
        let config = service.config();
        let collector = TextCollector::new(CollectorConfig::from(config));
        let batches = BatchManager::new(BatchManagerConfig::from(config));
        let rewrite = RewriteEngine::new(RewriteOptions::from(config));
        Self {
            dom,
            service,
            collector,
            batches,
            rewrite,
            state: PipelineState::Idle,
            cancel: CancelHandle::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn page_state(&self) -> PageState {
        self.rewrite.state()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn page_key(&self) -> Option<String> {
        self.dom.page_url().map(|url| page_key(&url))
    }

    fn ensure_idle(&self) -> TranslationResult<()> {
        if self.state != PipelineState::Idle {
            return Err(TranslationError::InvalidState(format!(
                "翻译流程正忙: {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// 翻译整个页面
    pub async fn translate_page(
        &mut self,
        mode: TranslationMode,
        if_translated: AlreadyTranslated,
    ) -> TranslationResult<PassOutcome> {
        self.ensure_idle()?;

        if self.rewrite.state().is_translated() {
            return match if_translated {
                AlreadyTranslated::Restore => Ok(PassOutcome::Restored(self.restore()?)),
                AlreadyTranslated::Toggle => Ok(PassOutcome::Toggled {
                    showing_original: self.toggle()?,
                }),
                AlreadyTranslated::Reject => {
                    Err(TranslationError::InvalidState("页面已经翻译".to_string()))
                }
            };
        }

        self.cancel.reset();
        let started = Instant::now();
        let result = self.run_pass(mode).await;
        self.state = PipelineState::Idle;

        let outcome = result?;
        if let PassOutcome::Completed(summary) | PassOutcome::Cancelled(summary) = &outcome {
            self.service
                .record_page_pass(summary, self.dom.page_url().as_deref(), started.elapsed());
        }
        Ok(outcome)
    }

    async fn run_pass(&mut self, mode: TranslationMode) -> TranslationResult<PassOutcome> {
        let page_url = self.dom.page_url();
        tracing::info!("开始翻译页面: {}", page_url.as_deref().unwrap_or("-"));

        self.state = PipelineState::Selecting;
        let units = self.collector.collect_units(&mut self.dom)?;
        if units.is_empty() {
            tracing::info!("没有需要翻译的内容");
            return Ok(PassOutcome::NothingToTranslate);
        }

        let total = units.len();
        let batches = self.batches.create_batches(units);
        let mut summary = PassSummary {
            total_units: total,
            batches: batches.len(),
            ..PassSummary::default()
        };

        let config = self.service.config();
        let (source, target) = (config.source_lang.as_str(), config.target_lang.as_str());
        let backend = self.service.backend();
        let done = AtomicUsize::new(0);
        let mut translations = BTreeMap::new();
        let mut cancelled = false;

        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 {
                if self.cancel.is_cancelled() {
                    tracing::info!("翻译已取消，剩余批次不再处理");
                    cancelled = true;
                    break;
                }
                tokio::time::sleep(self.batches.delay()).await;
            }

            tracing::debug!("批次 {}: {} 个单元", batch.id, batch.len());
            self.state = PipelineState::Translating {
                in_flight: batch.len(),
            };

            let progress = self.progress.as_deref();
            let outcomes = join_all(batch.items.iter().map(|unit| {
                let done = &done;
                async move {
                    let outcome = backend.translate_one(&unit.request_text, source, target).await;
                    let settled = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = progress {
                        progress.on_progress(settled, total);
                    }
                    outcome
                }
            }))
            .await;

            self.state = PipelineState::Rewriting;
            for (unit, outcome) in batch.items.iter().zip(outcomes) {
                let Some(translated) = outcome.text().map(str::trim) else {
                    summary.failed += 1;
                    tracing::warn!(
                        "单元翻译失败: {}",
                        outcome.error.as_deref().unwrap_or_default()
                    );
                    continue;
                };

                if translated.is_empty() || translated == unit.text {
                    summary.unchanged += 1;
                    continue;
                }

                match self
                    .rewrite
                    .apply(&mut self.dom, mode, &unit.node, &unit.raw_text, translated)
                {
                    Ok(()) => {
                        summary.translated += 1;
                        translations.insert(content_hash(&unit.text), translated.to_string());
                    }
                    Err(e) => {
                        summary.failed += 1;
                        tracing::warn!("改写节点失败: {}", e);
                    }
                }
            }
        }

        if !translations.is_empty() {
            if let (Some(url), Some(key)) = (page_url.as_deref(), self.page_key()) {
                summary.cached = self.service.cache().save(&key, url, target, translations);
            }
        }

        self.rewrite.commit(mode);
        tracing::info!(
            "页面翻译结束: {}/{} 个单元已翻译，{} 个失败",
            summary.translated,
            summary.total_units,
            summary.failed
        );

        Ok(if cancelled {
            PassOutcome::Cancelled(summary)
        } else {
            PassOutcome::Completed(summary)
        })
    }

    /// 撤销所有改写
    pub fn restore(&mut self) -> TranslationResult<RestoreReport> {
        self.ensure_idle()?;
        self.state = PipelineState::Restoring;
        let report = self.rewrite.restore_all(&mut self.dom);
        self.state = PipelineState::Idle;
        tracing::info!("已恢复 {} 个节点，跳过 {} 个", report.restored, report.skipped);
        Ok(report)
    }

    /// 切换原文/译文显示
    pub fn toggle(&mut self) -> TranslationResult<bool> {
        self.ensure_idle()?;
        self.rewrite.toggle_display(&mut self.dom)
    }

    /// 应用缓存中的译文，返回应用的单元数
    pub fn load_cached_translation(&mut self, mode: TranslationMode) -> TranslationResult<usize> {
        self.ensure_idle()?;
        if self.rewrite.state().is_translated() {
            return Err(TranslationError::InvalidState("页面已经翻译".to_string()));
        }

        let Some(key) = self.page_key() else {
            return Ok(0);
        };
        let Some(entry) = self.service.cache().load(&key) else {
            return Ok(0);
        };
        if entry.target_lang != self.service.config().target_lang {
            tracing::debug!("缓存语言 {} 与目标语言不符", entry.target_lang);
            return Ok(0);
        }

        let units = self.collector.collect_units(&mut self.dom)?;
        self.state = PipelineState::Rewriting;

        let mut applied = 0;
        for unit in units {
            let Some(translated) = entry.translations.get(&content_hash(&unit.text)) else {
                continue;
            };
            match self
                .rewrite
                .apply(&mut self.dom, mode, &unit.node, &unit.raw_text, translated)
            {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!("应用缓存译文失败: {}", e),
            }
        }

        self.rewrite.commit(mode);
        self.state = PipelineState::Idle;
        tracing::info!("从缓存恢复了 {} 个单元", applied);
        Ok(applied)
    }

    pub fn page_info(&self) -> PageInfo {
        let state = self.rewrite.state();
        PageInfo {
            is_translated: state.is_translated(),
            mode: state.mode(),
            showing_original: matches!(
                state,
                PageState::Translated {
                    showing_original: true,
                    ..
                }
            ),
            count: self.rewrite.record_count(),
            has_cache: self
                .page_key()
                .map(|key| self.service.cache().contains(&key))
                .unwrap_or(false),
        }
    }

    /// 处理消息，页面无关的请求交给服务
    pub async fn handle(&mut self, request: Request) -> Response {
        let result = match request {
            Request::TranslatePage {
                mode,
                if_translated,
            } => {
                let mode = mode.unwrap_or(self.service.config().default_mode);
                self.translate_page(mode, if_translated)
                    .await
                    .map(Response::pass)
            }
            Request::RestorePage => self
                .restore()
                .map(|report| Response::pass(PassOutcome::Restored(report))),
            Request::ToggleTranslation => self
                .toggle()
                .map(|showing_original| Response::pass(PassOutcome::Toggled { showing_original })),
            Request::GetPageInfo => Ok(Response::PageInfo(self.page_info())),
            Request::LoadCachedTranslation { mode } => {
                let mode = mode.unwrap_or(self.service.config().default_mode);
                self.load_cached_translation(mode)
                    .map(|count| Response::Cached {
                        success: count > 0,
                        count,
                    })
            }
            Request::GetCacheInfo => {
                let key = self.page_key();
                Ok(Response::CacheInfo(CacheInfoReply::from(
                    self.service.cache_info(key.as_deref()),
                )))
            }
            other => return self.service.handle(other).await,
        };

        result.unwrap_or_else(|e| Response::error(e.message()))
    }
}
