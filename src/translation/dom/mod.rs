//! 文档树抽象
//!
//! 选择器只需要读，改写引擎需要写。两者通过 `DomReader` / `DomWriter`
//! 访问页面，`RcDomPage` 是基于 html5ever rcdom 的实现。

pub mod rcdom;

pub use rcdom::RcDomPage;

use crate::translation::error::TranslationResult;

/// 只读的文档访问
pub trait DomReader {
    /// 节点句柄，克隆只复制引用
    type Node: Clone;

    /// `<body>`，没有时退回文档根节点
    fn body(&self) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// 小写标签名，非元素节点返回 `None`
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// 文本节点的内容，其他节点返回 `None`
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// 节点是否仍挂在文档上
    fn is_attached(&self, node: &Self::Node) -> bool;

    /// 页面地址（用于站点策略和缓存键）
    fn page_url(&self) -> Option<String> {
        None
    }

    /// 文档的 Content-Type
    fn content_type(&self) -> Option<String> {
        None
    }

    /// 递归拼接后代文本
    fn text_content(&self, node: &Self::Node) -> String {
        if let Some(text) = self.text(node) {
            return text;
        }
        self.children(node)
            .iter()
            .map(|child| self.text_content(child))
            .collect()
    }

    /// class 属性按空白拆分
    fn class_list(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// 文档写操作
pub trait DomWriter: DomReader {
    fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// 用新节点替换文档中的旧节点，旧节点已脱离文档时返回错误
    fn replace_node(&mut self, old: &Self::Node, new: &Self::Node) -> TranslationResult<()>;

    /// 文本节点直接改写内容，元素节点替换为单个文本子节点
    fn set_text(&mut self, node: &Self::Node, text: &str);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// 把一个文本节点拆成相邻的多个文本节点，拼接结果与原文相同
    fn split_text(
        &mut self,
        node: &Self::Node,
        segments: &[String],
    ) -> TranslationResult<Vec<Self::Node>>;
}
