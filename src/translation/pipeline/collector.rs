//! 文本收集器模块
//!
//! 按文档顺序遍历页面，产出可翻译单元。普通页面的单元是单个文本节点；
//! 纯文本页面（大段 `<pre>`）按空行拆成段落，每段一个单元。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::dom::{DomReader, DomWriter};
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::filters::{FilterOptions, TextFilter};
use crate::translation::pipeline::strategies::{SiteStrategy, StrategyRegistry};

/// 一个可翻译单元
#[derive(Debug, Clone)]
pub struct TranslatableUnit<N> {
    /// 文本节点
    pub node: N,
    /// 节点原文（含首尾空白）
    pub raw_text: String,
    /// 去除首尾空白后的原文，作为缓存哈希的输入
    pub text: String,
    /// 发送给后端的文本（经过站点预处理）
    pub request_text: String,
}

impl<N> TranslatableUnit<N> {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 纯文本页面中的一段
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub translatable: bool,
}

/// 需要拆分的纯文本块
#[derive(Debug, Clone)]
pub struct PlainTextBlock<N> {
    pub text_node: N,
    pub segments: Vec<TextSegment>,
}

impl<N> PlainTextBlock<N> {
    pub fn paragraph_count(&self) -> usize {
        self.segments.iter().filter(|s| s.translatable).count()
    }
}

/// 选择结果
#[derive(Debug, Clone)]
pub enum Selection<N> {
    Nodes(Vec<TranslatableUnit<N>>),
    PlainText(PlainTextBlock<N>),
}

/// 收集器配置
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    pub filter: FilterOptions,
    pub site_strategies: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            filter: FilterOptions::default(),
            site_strategies: true,
        }
    }
}

impl From<&TranslationConfig> for CollectorConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            filter: FilterOptions {
                skip_code: config.skip_code_blocks,
                skip_quotes: config.skip_quotes,
                min_chars: constants::MIN_UNIT_CHARS,
            },
            site_strategies: config.site_strategies,
        }
    }
}

/// 文本收集器
pub struct TextCollector {
    filter: TextFilter,
    config: CollectorConfig,
}

fn paragraph_break_regex() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"\n[ \t\r]*\n\s*").expect("static pattern"))
}

impl TextCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            filter: TextFilter::new(config.filter),
            config,
        }
    }

    pub fn filter(&self) -> &TextFilter {
        &self.filter
    }

    /// 当前页面适用的站点策略
    pub fn strategy_for<D: DomReader>(&self, dom: &D) -> Option<&'static SiteStrategy> {
        if !self.config.site_strategies {
            return None;
        }
        let page_url = dom.page_url();
        let strategy = StrategyRegistry::global().for_url(page_url.as_deref());
        (!strategy.is_passthrough()).then_some(strategy)
    }

    /// 选择可翻译单元
    pub fn select_translatable_units<D: DomReader>(&self, dom: &D) -> Selection<D::Node> {
        if let Some(block) = self.detect_plain_text(dom) {
            tracing::info!("检测到纯文本页面，共 {} 段", block.paragraph_count());
            return Selection::PlainText(block);
        }

        let Some(body) = dom.body() else {
            return Selection::Nodes(Vec::new());
        };

        let strategy = self.strategy_for(dom);
        let roots = match strategy {
            Some(s) => {
                let roots = s.content_roots(dom, &body);
                tracing::debug!("使用站点策略 {}，正文容器 {} 个", s.name, roots.len());
                if roots.is_empty() {
                    vec![body]
                } else {
                    roots
                }
            }
            None => vec![body],
        };

        let mut units = Vec::new();
        for root in &roots {
            if self.filter.exclusion_reason(dom, root, strategy).is_some() {
                continue;
            }
            self.walk(dom, root, strategy, &mut units);
        }

        tracing::debug!("收集到 {} 个可翻译单元", units.len());
        Selection::Nodes(units)
    }

    fn walk<D: DomReader>(
        &self,
        dom: &D,
        node: &D::Node,
        strategy: Option<&SiteStrategy>,
        units: &mut Vec<TranslatableUnit<D::Node>>,
    ) {
        for child in dom.children(node) {
            if let Some(raw_text) = dom.text(&child) {
                if let Some(unit) = self.make_unit(child, raw_text, strategy) {
                    units.push(unit);
                }
                continue;
            }

            if dom.tag_name(&child).is_none() {
                continue;
            }

            if let Some(reason) = self.filter.exclusion_reason(dom, &child, strategy) {
                tracing::trace!("跳过元素 {:?}: {:?}", dom.tag_name(&child), reason);
                continue;
            }

            self.walk(dom, &child, strategy, units);
        }
    }

    fn make_unit<N>(
        &self,
        node: N,
        raw_text: String,
        strategy: Option<&SiteStrategy>,
    ) -> Option<TranslatableUnit<N>> {
        if !self.filter.should_translate(&raw_text) {
            return None;
        }
        let text = raw_text.trim().to_string();
        let request_text = match strategy {
            Some(s) => s.preprocess(&text),
            None => text.clone(),
        };
        if request_text.trim().is_empty() {
            return None;
        }
        Some(TranslatableUnit {
            node,
            raw_text,
            text,
            request_text,
        })
    }

    // ========================================================================
    // 纯文本页面
    // ========================================================================

    /// 检测纯文本页面并返回待拆分的文本块
    pub fn detect_plain_text<D: DomReader>(&self, dom: &D) -> Option<PlainTextBlock<D::Node>> {
        let body = dom.body()?;
        let pres = find_tag(dom, &body, "pre");
        if pres.is_empty() {
            return None;
        }

        let body_len = dom.text_content(&body).trim().chars().count();
        if body_len == 0 {
            return None;
        }

        let forced = is_plain_text_document(dom);
        let pre_len = |pre: &D::Node| dom.text_content(pre).trim().chars().count();

        let candidate = if pres.len() == 1 {
            let len = pre_len(&pres[0]);
            let dominant = len > constants::PLAIN_TEXT_MIN_CHARS
                && len as f64 > constants::PLAIN_TEXT_DOMINANT_RATIO * body_len as f64;
            (forced || dominant).then(|| pres[0].clone())
        } else {
            None
        };

        let candidate = candidate.or_else(|| {
            let largest = pres.iter().max_by_key(|pre| pre_len(pre))?;
            let sparse = count_blocks(dom, &body) < constants::PLAIN_TEXT_MAX_BLOCKS;
            (forced || sparse).then(|| largest.clone())
        })?;

        // 只处理只有一个文本子节点的 pre
        let children = dom.children(&candidate);
        let [text_node] = children.as_slice() else {
            tracing::debug!("纯文本块包含多个子节点，按普通页面处理");
            return None;
        };
        let text = dom.text(text_node)?;

        let segments = split_paragraphs(&text);
        if !segments.iter().any(|s| s.translatable) {
            return None;
        }

        Some(PlainTextBlock {
            text_node: text_node.clone(),
            segments,
        })
    }

    /// 拆分纯文本块并产出单元
    pub fn materialize_plain_text<D: DomWriter>(
        &self,
        dom: &mut D,
        block: PlainTextBlock<D::Node>,
    ) -> TranslationResult<Vec<TranslatableUnit<D::Node>>> {
        let pieces: Vec<String> = block.segments.iter().map(|s| s.text.clone()).collect();
        let nodes = dom.split_text(&block.text_node, &pieces)?;

        let strategy = self.strategy_for(&*dom);
        let units = nodes
            .into_iter()
            .zip(block.segments)
            .filter(|(_, segment)| segment.translatable)
            .filter_map(|(node, segment)| {
                let text = segment.text.trim().to_string();
                let request_text = match strategy {
                    Some(s) => s.preprocess(&text),
                    None => text.clone(),
                };
                (!request_text.trim().is_empty()).then_some(TranslatableUnit {
                    node,
                    raw_text: segment.text,
                    text,
                    request_text,
                })
            })
            .collect();

        Ok(units)
    }

    /// 选择并在需要时拆分纯文本块
    pub fn collect_units<D: DomWriter>(
        &self,
        dom: &mut D,
    ) -> TranslationResult<Vec<TranslatableUnit<D::Node>>> {
        match self.select_translatable_units(&*dom) {
            Selection::Nodes(units) => Ok(units),
            Selection::PlainText(block) => self.materialize_plain_text(dom, block),
        }
    }
}

impl Default for TextCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

/// 按空行拆分段落，分隔符保留为不可翻译的片段，拼接后与原文一致
pub fn split_paragraphs(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut last = 0;

    let push = |piece: &str, separator: bool, segments: &mut Vec<TextSegment>| {
        if piece.is_empty() {
            return;
        }
        segments.push(TextSegment {
            text: piece.to_string(),
            translatable: !separator && !piece.trim().is_empty(),
        });
    };

    for m in paragraph_break_regex().find_iter(text) {
        push(&text[last..m.start()], false, &mut segments);
        push(m.as_str(), true, &mut segments);
        last = m.end();
    }
    push(&text[last..], false, &mut segments);

    segments
}

fn is_plain_text_document<D: DomReader>(dom: &D) -> bool {
    if dom
        .content_type()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/plain"))
    {
        return true;
    }

    let Some(url) = dom.page_url().and_then(|u| url::Url::parse(&u).ok()) else {
        return false;
    };
    let host_match = url
        .host_str()
        .is_some_and(|host| constants::PLAIN_TEXT_HOSTS.contains(&host));
    host_match || url.path().to_ascii_lowercase().ends_with(".txt")
}

fn find_tag<D: DomReader>(dom: &D, node: &D::Node, tag: &str) -> Vec<D::Node> {
    let mut found = Vec::new();
    for child in dom.children(node) {
        if dom.tag_name(&child).as_deref() == Some(tag) {
            found.push(child.clone());
        }
        found.extend(find_tag(dom, &child, tag));
    }
    found
}

/// 统计 pre 之外的普通块级元素
fn count_blocks<D: DomReader>(dom: &D, node: &D::Node) -> usize {
    dom.children(node)
        .iter()
        .map(|child| match dom.tag_name(child).as_deref() {
            Some("pre") | None => 0,
            Some(tag) => {
                let own = usize::from(constants::BLOCK_TAGS.contains(&tag));
                own + count_blocks(dom, child)
            }
        })
        .sum()
}
