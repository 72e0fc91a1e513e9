//! 站点策略
//!
//! 按主机名为特定站点追加排除选择器、限定正文容器，并在发送前清理文本
//! （例如维基百科的引用编号）。未匹配任何站点时使用空策略。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::dom::DomReader;

// ============================================================================
// 简单选择器
// ============================================================================

/// 复合选择器：`tag`、`.class`、`#id`、`[attr]`、`[attr="v"]` 的组合
#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// 由空格连接的后代选择器
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSelector {
    parts: Vec<Compound>,
    source: String,
}

impl SimpleSelector {
    /// 解析选择器，不支持的语法返回 `None`
    pub fn parse(selector: &str) -> Option<Self> {
        let parts = selector
            .split_whitespace()
            .map(parse_compound)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self {
            parts,
            source: selector.trim().to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 节点本身是否匹配（后代部分向上查找祖先）
    pub fn matches<D: DomReader>(&self, dom: &D, node: &D::Node) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !compound_matches(last, dom, node) {
            return false;
        }

        let mut remaining = ancestors.iter().rev().peekable();
        let mut current = dom.parent(node);
        while let Some(wanted) = remaining.peek() {
            let Some(candidate) = current else {
                return false;
            };
            if compound_matches(wanted, dom, &candidate) {
                remaining.next();
            }
            current = dom.parent(&candidate);
        }
        true
    }
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;

    let tag_len = rest
        .find(|c: char| c == '.' || c == '#' || c == '[')
        .unwrap_or(rest.len());
    if tag_len > 0 {
        let tag = &rest[..tag_len];
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        compound.tag = Some(tag.to_ascii_lowercase());
        rest = &rest[tag_len..];
    }

    while let Some(first) = rest.chars().next() {
        match first {
            '.' | '#' => {
                let body = &rest[1..];
                let end = body
                    .find(|c: char| c == '.' || c == '#' || c == '[')
                    .unwrap_or(body.len());
                let name = &body[..end];
                if name.is_empty() {
                    return None;
                }
                if first == '.' {
                    compound.classes.push(name.to_string());
                } else {
                    compound.id = Some(name.to_string());
                }
                rest = &body[end..];
            }
            '[' => {
                let end = rest.find(']')?;
                let inner = &rest[1..end];
                let attr = match inner.split_once('=') {
                    Some((name, value)) => (
                        name.trim().to_ascii_lowercase(),
                        Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                    ),
                    None => (inner.trim().to_ascii_lowercase(), None),
                };
                if attr.0.is_empty() {
                    return None;
                }
                compound.attrs.push(attr);
                rest = &rest[end + 1..];
            }
            _ => return None,
        }
    }

    Some(compound)
}

fn compound_matches<D: DomReader>(compound: &Compound, dom: &D, node: &D::Node) -> bool {
    let Some(tag) = dom.tag_name(node) else {
        return false;
    };
    if compound.tag.as_deref().is_some_and(|wanted| wanted != tag) {
        return false;
    }
    if let Some(id) = &compound.id {
        if dom.attribute(node, "id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes = dom.class_list(node);
        if !compound.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
    }
    compound.attrs.iter().all(|(name, value)| {
        match (dom.attribute(node, name), value) {
            (Some(actual), Some(expected)) => &actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    })
}

// ============================================================================
// 站点策略
// ============================================================================

/// 文本预处理规则
#[derive(Debug, Clone)]
pub struct TextRewrite {
    pattern: Regex,
    replacement: &'static str,
}

/// 某个站点的处理策略
#[derive(Debug, Clone)]
pub struct SiteStrategy {
    pub name: &'static str,
    hosts: &'static [&'static str],
    content_roots: Vec<SimpleSelector>,
    excluded: Vec<SimpleSelector>,
    rewrites: Vec<TextRewrite>,
}

impl SiteStrategy {
    fn build(
        name: &'static str,
        hosts: &'static [&'static str],
        content_roots: &[&str],
        excluded: &[&str],
        rewrites: Vec<TextRewrite>,
    ) -> Self {
        let parse_all = |selectors: &[&str]| {
            selectors
                .iter()
                .filter_map(|s| {
                    let parsed = SimpleSelector::parse(s);
                    if parsed.is_none() {
                        tracing::warn!("忽略无法解析的选择器: {}", s);
                    }
                    parsed
                })
                .collect::<Vec<_>>()
        };

        Self {
            name,
            hosts,
            content_roots: parse_all(content_roots),
            excluded: parse_all(excluded),
            rewrites,
        }
    }

    /// 不追加任何规则的默认策略
    pub fn passthrough() -> Self {
        Self::build("default", &[], &[], &[], Vec::new())
    }

    pub fn is_passthrough(&self) -> bool {
        self.hosts.is_empty()
    }

    /// 主机名等于规则域名，或是它的子域名
    pub fn matches_host(&self, hostname: &str) -> bool {
        let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
        self.hosts.iter().any(|h| {
            hostname
                .strip_suffix(h)
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
        })
    }

    /// 节点是否被站点规则排除
    pub fn excludes<D: DomReader>(&self, dom: &D, node: &D::Node) -> bool {
        self.excluded.iter().any(|s| s.matches(dom, node))
    }

    /// 页面中存在的正文容器；为空时遍历整个 body
    pub fn content_roots<D: DomReader>(&self, dom: &D, body: &D::Node) -> Vec<D::Node> {
        if self.content_roots.is_empty() {
            return Vec::new();
        }
        for selector in &self.content_roots {
            let mut found = Vec::new();
            collect_matching(dom, body, selector, &mut found);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// 发送给后端前清理文本
    pub fn preprocess(&self, text: &str) -> String {
        if self.rewrites.is_empty() {
            return text.to_string();
        }
        let mut out = text.to_string();
        for rewrite in &self.rewrites {
            out = rewrite
                .pattern
                .replace_all(&out, rewrite.replacement)
                .into_owned();
        }
        out.trim().to_string()
    }
}

/// 收集匹配的元素，已匹配元素的后代不再收集
fn collect_matching<D: DomReader>(
    dom: &D,
    node: &D::Node,
    selector: &SimpleSelector,
    found: &mut Vec<D::Node>,
) {
    for child in dom.children(node) {
        if dom.tag_name(&child).is_none() {
            continue;
        }
        if selector.matches(dom, &child) {
            found.push(child);
        } else {
            collect_matching(dom, &child, selector, found);
        }
    }
}

fn rewrite(pattern: &str, replacement: &'static str) -> Option<TextRewrite> {
    match Regex::new(pattern) {
        Ok(pattern) => Some(TextRewrite {
            pattern,
            replacement,
        }),
        Err(e) => {
            tracing::error!("无效的预处理规则 {}: {}", pattern, e);
            None
        }
    }
}

fn builtin_strategies() -> Vec<SiteStrategy> {
    vec![
        SiteStrategy::build(
            "wikipedia",
            &["wikipedia.org", "wikimedia.org", "wiktionary.org"],
            &["#mw-content-text", ".mw-parser-output", "#bodyContent"],
            &[
                ".navbox", ".infobox", ".sidebar", ".ambox", ".mbox", ".reference", ".reflist",
                ".references", ".citation", ".toc", "#toc", ".mw-editsection", ".mw-jump-link",
                ".noprint", ".metadata", ".catlinks", "#catlinks", ".sistersitebox",
                ".portalbox", ".vertical-navbox", ".mw-indicators", ".mw-revision",
                "#coordinates", ".hatnote", ".dablink", ".rellink", "#siteNotice",
                "#contentSub", ".mw-empty-elt",
            ],
            [
                rewrite(r"\[\d+\]", ""),
                rewrite(r"\[[Cc]itation needed\]", ""),
                rewrite(r"\[[Ee]dit\]", ""),
            ]
            .into_iter()
            .flatten()
            .collect(),
        ),
        SiteStrategy::build(
            "github",
            &["github.com", "github.io"],
            &[".markdown-body", ".readme-content", ".Box-body", ".comment-body", ".issue-body"],
            &[
                ".highlight", ".blob-code", ".file-header", ".file-actions", "nav", ".Header",
                ".footer", ".pagehead", ".repository-content .file", ".diff-table",
                ".blob-wrapper",
            ],
            Vec::new(),
        ),
        SiteStrategy::build(
            "stackoverflow",
            &["stackoverflow.com", "stackexchange.com", "askubuntu.com", "superuser.com"],
            &[".s-prose", ".post-text", ".comment-text", ".question-hyperlink"],
            &[
                ".highlight", ".prettyprint", ".post-menu", ".js-post-menu", ".user-info",
                ".user-details", ".comments-link", ".js-comments-container", "nav", "header",
                "footer", ".sidebar",
            ],
            Vec::new(),
        ),
        SiteStrategy::build(
            "medium",
            &["medium.com", "towardsdatascience.com"],
            &["article", ".postArticle-content", ".section-content"],
            &["nav", "header", "footer", ".postActions", ".js-postShareWidget"],
            Vec::new(),
        ),
        SiteStrategy::build(
            "news",
            &[
                "cnn.com", "bbc.com", "bbc.co.uk", "nytimes.com", "theguardian.com",
                "reuters.com", "washingtonpost.com", "spiegel.de", "zeit.de", "faz.net",
                "sueddeutsche.de", "tagesschau.de", "welt.de", "focus.de",
            ],
            &[
                "article", "[itemprop=\"articleBody\"]", ".article-body", ".story-body",
                ".post-content", ".entry-content",
            ],
            &[
                "nav", "header", "footer", "aside", ".ad", ".advertisement", ".social-share",
                ".related-articles", ".recommended", ".author-bio", ".comments-section",
            ],
            Vec::new(),
        ),
    ]
}

/// 站点策略注册表
pub struct StrategyRegistry {
    strategies: Vec<SiteStrategy>,
    fallback: SiteStrategy,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: builtin_strategies(),
            fallback: SiteStrategy::passthrough(),
        }
    }

    /// 全局共享的内置注册表
    pub fn global() -> &'static StrategyRegistry {
        static REGISTRY: OnceLock<StrategyRegistry> = OnceLock::new();
        REGISTRY.get_or_init(StrategyRegistry::new)
    }

    /// 按页面地址选择策略
    pub fn for_url(&self, page_url: Option<&str>) -> &SiteStrategy {
        let host = page_url
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_string));

        match host {
            Some(host) => self
                .strategies
                .iter()
                .find(|s| s.matches_host(&host))
                .unwrap_or(&self.fallback),
            None => &self.fallback,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
