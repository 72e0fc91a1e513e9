//! 页面改写
//!
//! 把译文写回文档，并记录撤销所需的全部信息。每个被改写的位置对应
//! 一条 [`MutationRecord`]，恢复时逐条换回原始文本节点。

use serde::{Deserialize, Serialize};

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::dom::DomWriter;
use crate::translation::error::{TranslationError, TranslationResult};

/// 显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMode {
    /// 原位替换，悬停显示原文
    #[default]
    Replace,
    /// 原文与译文并排
    Bilingual,
}

/// 双语模式下两段文本的顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BilingualOrder {
    /// 译文在原文下方
    #[default]
    #[serde(rename = "below", alias = "original-first")]
    OriginalFirst,
    /// 译文在原文上方
    #[serde(rename = "above", alias = "translated-first")]
    TranslatedFirst,
}

/// 页面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PageState {
    #[default]
    Untranslated,
    #[serde(rename_all = "camelCase")]
    Translated {
        mode: TranslationMode,
        showing_original: bool,
    },
}

impl PageState {
    pub fn is_translated(&self) -> bool {
        matches!(self, PageState::Translated { .. })
    }

    pub fn mode(&self) -> Option<TranslationMode> {
        match self {
            PageState::Translated { mode, .. } => Some(*mode),
            PageState::Untranslated => None,
        }
    }
}

/// 一次改写的撤销记录
#[derive(Debug, Clone)]
pub struct MutationRecord<N> {
    /// 改写前的完整文本（含首尾空白）
    pub original_text: String,
    /// 替换模式下显示的文本
    pub display_text: String,
    pub mode: TranslationMode,
    /// 插入文档的标记元素或容器
    pub anchor: N,
}

/// 恢复结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
    /// 已脱离文档而跳过的记录
    pub skipped: usize,
}

/// 改写选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOptions {
    pub bilingual_order: BilingualOrder,
    pub hover_original: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            bilingual_order: BilingualOrder::OriginalFirst,
            hover_original: true,
        }
    }
}

impl From<&TranslationConfig> for RewriteOptions {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            bilingual_order: config.bilingual_position,
            hover_original: config.show_original_on_hover,
        }
    }
}

/// 拆出首尾空白：(前导, 主体, 尾随)
fn split_edges(text: &str) -> (&str, &str, &str) {
    let core = text.trim();
    if core.is_empty() {
        return (text, "", "");
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    (&text[..start], core, &text[end..])
}

/// 改写引擎
pub struct RewriteEngine<N> {
    options: RewriteOptions,
    records: Vec<MutationRecord<N>>,
    state: PageState,
}

impl<N: Clone> RewriteEngine<N> {
    pub fn new(options: RewriteOptions) -> Self {
        Self {
            options,
            records: Vec::new(),
            state: PageState::Untranslated,
        }
    }

    pub fn options(&self) -> RewriteOptions {
        self.options
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn records(&self) -> &[MutationRecord<N>] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// 按给定模式改写一个文本节点
    pub fn apply<D>(
        &mut self,
        dom: &mut D,
        mode: TranslationMode,
        node: &N,
        original: &str,
        translated: &str,
    ) -> TranslationResult<()>
    where
        D: DomWriter<Node = N>,
    {
        match mode {
            TranslationMode::Replace => self.apply_replace(dom, node, original, translated),
            TranslationMode::Bilingual => self.apply_bilingual(dom, node, original, translated),
        }
    }

    /// 原位替换：标记元素携带原文和译文
    pub fn apply_replace<D>(
        &mut self,
        dom: &mut D,
        node: &N,
        original: &str,
        translated: &str,
    ) -> TranslationResult<()>
    where
        D: DomWriter<Node = N>,
    {
        let (lead, core, trail) = split_edges(original);
        let translated = translated.trim();
        let display = format!("{}{}{}", lead, translated, trail);

        let mut attributes = vec![
            ("class", "smt-translated"),
            (constants::OWN_MARKER_ATTR, translated),
            ("data-smt-original", core),
        ];
        if self.options.hover_original {
            attributes.push(("title", core));
        }

        let marker = dom.create_element("span", &attributes);
        let text = dom.create_text(&display);
        dom.append_child(&marker, &text);
        dom.replace_node(node, &marker)?;

        self.records.push(MutationRecord {
            original_text: original.to_string(),
            display_text: display,
            mode: TranslationMode::Replace,
            anchor: marker,
        });
        Ok(())
    }

    /// 双语：容器内放原文和译文两个 span
    pub fn apply_bilingual<D>(
        &mut self,
        dom: &mut D,
        node: &N,
        original: &str,
        translated: &str,
    ) -> TranslationResult<()>
    where
        D: DomWriter<Node = N>,
    {
        let wrapper = dom.create_element(
            "span",
            &[
                ("class", "smt-bilingual-wrapper"),
                (constants::OWN_MARKER_ATTR, "bilingual"),
            ],
        );

        let original_span = dom.create_element("span", &[("class", "smt-bilingual-original")]);
        let original_text = dom.create_text(original);
        dom.append_child(&original_span, &original_text);

        let translated_span = dom.create_element("span", &[("class", "smt-bilingual-translated")]);
        let translated_text = dom.create_text(translated.trim());
        dom.append_child(&translated_span, &translated_text);

        match self.options.bilingual_order {
            BilingualOrder::OriginalFirst => {
                dom.append_child(&wrapper, &original_span);
                dom.append_child(&wrapper, &translated_span);
            }
            BilingualOrder::TranslatedFirst => {
                dom.append_child(&wrapper, &translated_span);
                dom.append_child(&wrapper, &original_span);
            }
        }

        dom.replace_node(node, &wrapper)?;

        self.records.push(MutationRecord {
            original_text: original.to_string(),
            display_text: translated.trim().to_string(),
            mode: TranslationMode::Bilingual,
            anchor: wrapper,
        });
        Ok(())
    }

    /// 本轮改写结束，有记录时进入已翻译状态
    pub fn commit(&mut self, mode: TranslationMode) -> PageState {
        if !self.records.is_empty() {
            self.state = PageState::Translated {
                mode,
                showing_original: false,
            };
        }
        self.state
    }

    /// 撤销全部改写，没有记录时什么也不做
    pub fn restore_all<D>(&mut self, dom: &mut D) -> RestoreReport
    where
        D: DomWriter<Node = N>,
    {
        let mut report = RestoreReport::default();

        for record in self.records.drain(..) {
            if !dom.is_attached(&record.anchor) {
                report.skipped += 1;
                continue;
            }
            let text = dom.create_text(&record.original_text);
            match dom.replace_node(&record.anchor, &text) {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    tracing::warn!("恢复节点失败: {}", e);
                    report.skipped += 1;
                }
            }
        }

        if report.skipped > 0 {
            tracing::warn!("{} 个节点已不在文档中，跳过恢复", report.skipped);
        }
        self.state = PageState::Untranslated;
        report
    }

    /// 替换模式下在原文和译文之间切换，返回切换后是否显示原文
    pub fn toggle_display<D>(&mut self, dom: &mut D) -> TranslationResult<bool>
    where
        D: DomWriter<Node = N>,
    {
        let showing_original = match self.state {
            PageState::Translated {
                mode: TranslationMode::Replace,
                showing_original,
            } => !showing_original,
            PageState::Translated { .. } => {
                return Err(TranslationError::InvalidState(
                    "双语模式不支持切换显示".to_string(),
                ))
            }
            PageState::Untranslated => {
                return Err(TranslationError::InvalidState("页面尚未翻译".to_string()))
            }
        };

        for record in &self.records {
            if !dom.is_attached(&record.anchor) {
                continue;
            }
            let text = if showing_original {
                &record.original_text
            } else {
                &record.display_text
            };
            dom.set_text(&record.anchor, text);
        }

        self.state = PageState::Translated {
            mode: TranslationMode::Replace,
            showing_original,
        };
        Ok(showing_original)
    }
}
