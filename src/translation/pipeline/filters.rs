//! 文本过滤器模块
//!
//! 判断元素是否应整体跳过，以及文本节点是否值得翻译。
//! 元素规则按固定优先级检查，第一个命中的规则决定排除原因。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;
use crate::translation::dom::DomReader;
use crate::translation::pipeline::strategies::SiteStrategy;

/// 排除原因，顺序即优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// script、style、表单控件等
    Structural,
    /// 代码块与语法高亮容器
    Code,
    /// 引用块
    Quote,
    /// 本扩展自身的界面或已改写的节点
    OwnInterface,
    /// 站点策略追加的选择器
    SiteRule,
}

/// 过滤规则开关
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    pub skip_code: bool,
    pub skip_quotes: bool,
    pub min_chars: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            skip_code: true,
            skip_quotes: false,
            min_chars: constants::MIN_UNIT_CHARS,
        }
    }
}

/// 文本过滤器
pub struct TextFilter {
    options: FilterOptions,
}

fn non_word_regex() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"^[\s\d\W]*$").expect("static pattern"))
}

impl TextFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> FilterOptions {
        self.options
    }

    /// 判断文本是否需要翻译：去空白后至少 `min_chars` 个字符，且不能只由
    /// 空白、数字和标点组成
    pub fn should_translate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.chars().count() < self.options.min_chars {
            return false;
        }

        !non_word_regex().is_match(trimmed)
    }

    /// 检查元素本身是否命中排除规则
    pub fn exclusion_reason<D: DomReader>(
        &self,
        dom: &D,
        node: &D::Node,
        strategy: Option<&SiteStrategy>,
    ) -> Option<ExclusionReason> {
        let tag = dom.tag_name(node)?;

        if constants::STRUCTURAL_TAGS.contains(&tag.as_str()) {
            return Some(ExclusionReason::Structural);
        }

        if self.options.skip_code && self.is_code_element(dom, node, &tag) {
            return Some(ExclusionReason::Code);
        }

        if self.options.skip_quotes && constants::QUOTE_TAGS.contains(&tag.as_str()) {
            return Some(ExclusionReason::Quote);
        }

        if is_own_interface(dom, node) {
            return Some(ExclusionReason::OwnInterface);
        }

        if strategy.is_some_and(|s| s.excludes(dom, node)) {
            return Some(ExclusionReason::SiteRule);
        }

        None
    }

    fn is_code_element<D: DomReader>(&self, dom: &D, node: &D::Node, tag: &str) -> bool {
        if constants::CODE_TAGS.contains(&tag) {
            return true;
        }

        if constants::CODE_DATA_ATTRS
            .iter()
            .any(|attr| dom.attribute(node, attr).is_some())
        {
            return true;
        }

        dom.class_list(node).iter().any(|class| {
            let class = class.to_lowercase();
            constants::CODE_CLASS_PATTERNS.iter().any(|pattern| {
                if pattern.ends_with('-') {
                    class.starts_with(pattern)
                } else {
                    class == *pattern || class.starts_with(&format!("{}-", pattern))
                }
            })
        })
    }
}

/// 本扩展的界面元素与改写产物
pub fn is_own_interface<D: DomReader>(dom: &D, node: &D::Node) -> bool {
    if dom.attribute(node, constants::OWN_MARKER_ATTR).is_some() {
        return true;
    }
    dom.class_list(node)
        .iter()
        .any(|class| constants::OWN_UI_CLASSES.contains(&class.as_str()))
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new(FilterOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::find_elements;
    use crate::translation::dom::RcDomPage;

    #[test]
    fn test_should_translate_filters_noise() {
        let filter = TextFilter::default();
        assert!(filter.should_translate("Hello world"));
        assert!(filter.should_translate("  Hey  "));
        assert!(filter.should_translate("Grüße"));

        assert!(!filter.should_translate("Hi"));
        assert!(!filter.should_translate("   "));
        assert!(!filter.should_translate("12345"));
        assert!(!filter.should_translate("--- !!! 2024"));
        assert!(!filter.should_translate("«»—…"));
    }

    #[test]
    fn test_exclusion_priority() {
        let page = RcDomPage::parse(
            r#"<body><script>x()</script><pre class="smt-ui">p</pre><blockquote>q</blockquote><div class="hljs">c</div><div class="smt-ui">u</div><div data-lang="rs">d</div><div class="highlighted-text">ok</div></body>"#,
        );
        let filter = TextFilter::new(FilterOptions {
            skip_quotes: true,
            ..FilterOptions::default()
        });
        let reason = |tag: &str, index: usize| {
            let node = find_elements(page.document(), tag).remove(index);
            filter.exclusion_reason(&page, &node, None)
        };

        assert_eq!(reason("script", 0), Some(ExclusionReason::Structural));
        // pre 同时是代码和本扩展界面，代码规则优先
        assert_eq!(reason("pre", 0), Some(ExclusionReason::Code));
        assert_eq!(reason("blockquote", 0), Some(ExclusionReason::Quote));
        assert_eq!(reason("div", 0), Some(ExclusionReason::Code));
        assert_eq!(reason("div", 1), Some(ExclusionReason::OwnInterface));
        assert_eq!(reason("div", 2), Some(ExclusionReason::Code));
        assert_eq!(reason("div", 3), None);
    }

    #[test]
    fn test_code_rules_follow_option() {
        let page = RcDomPage::parse("<body><code>let x = 1;</code><blockquote>q</blockquote></body>");
        let code = find_elements(page.document(), "code").remove(0);
        let quote = find_elements(page.document(), "blockquote").remove(0);

        let lenient = TextFilter::new(FilterOptions {
            skip_code: false,
            ..FilterOptions::default()
        });
        assert_eq!(lenient.exclusion_reason(&page, &code, None), None);
        assert_eq!(lenient.exclusion_reason(&page, &quote, None), None);
    }
}
