use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{DomReader, DomWriter};
use crate::parsers::html::dom::{
    append_child, child_index, create_element_node, create_text_node, find_nodes,
    get_node_attr, get_node_name, get_parent_node, get_text, html_to_dom, replace_node_with,
    set_node_attr,
};
use crate::parsers::html::metadata::{charset_from_content_type, get_charset, get_title};
use crate::parsers::html::serializer::serialize_document;
use crate::translation::error::{helpers::dom_error, TranslationResult};

/// 基于 rcdom 的页面
pub struct RcDomPage {
    dom: RcDom,
    url: Option<String>,
    content_type: Option<String>,
    encoding: String,
}

impl RcDomPage {
    pub fn new(dom: RcDom) -> Self {
        Self {
            dom,
            url: None,
            content_type: None,
            encoding: "utf-8".to_string(),
        }
    }

    pub fn parse(html: &str) -> Self {
        Self::new(html_to_dom(html.as_bytes(), "utf-8"))
    }

    /// 从原始字节解析，编码取自 Content-Type 或文档内的 meta 声明
    pub fn from_bytes(data: &[u8], content_type: Option<&str>) -> Self {
        let declared = content_type.and_then(charset_from_content_type);
        let mut encoding = declared.clone().unwrap_or_else(|| "utf-8".to_string());
        let mut dom = html_to_dom(data, &encoding);

        if declared.is_none() {
            if let Some(charset) = get_charset(&dom.document) {
                if encoding_rs::Encoding::for_label(charset.as_bytes()).is_some()
                    && !charset.eq_ignore_ascii_case(&encoding)
                {
                    dom = html_to_dom(data, &charset);
                    encoding = charset;
                }
            }
        }

        let mut page = Self::new(dom);
        page.encoding = encoding;
        if let Some(content_type) = content_type {
            page.content_type = Some(content_type.to_string());
        }
        page
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// 按文档原编码序列化
    pub fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        Ok(serialize_document(&self.dom, &self.encoding)?)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    /// `<title>` 文本
    pub fn title(&self) -> Option<String> {
        get_title(&self.dom.document).filter(|t| !t.is_empty())
    }

    /// 序列化为 HTML 字符串
    pub fn to_html(&self) -> String {
        match serialize_document(&self.dom, "") {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::error!("序列化文档失败: {}", e);
                String::new()
            }
        }
    }

    /// 从文档中移除节点（模拟页面脚本的改动）
    pub fn remove(&mut self, node: &Handle) -> bool {
        crate::parsers::html::dom::detach_node(node).is_some()
    }
}

impl DomReader for RcDomPage {
    type Node = Handle;

    fn body(&self) -> Option<Handle> {
        find_nodes(&self.dom.document, &["html", "body"])
            .into_iter()
            .next()
            .or_else(|| Some(self.dom.document.clone()))
    }

    fn children(&self, node: &Handle) -> Vec<Handle> {
        node.children.borrow().clone()
    }

    fn parent(&self, node: &Handle) -> Option<Handle> {
        get_parent_node(node)
    }

    fn tag_name(&self, node: &Handle) -> Option<String> {
        get_node_name(node).map(|name| name.to_ascii_lowercase())
    }

    fn attribute(&self, node: &Handle, name: &str) -> Option<String> {
        get_node_attr(node, name)
    }

    fn text(&self, node: &Handle) -> Option<String> {
        get_text(node)
    }

    fn is_attached(&self, node: &Handle) -> bool {
        let mut current = node.clone();
        loop {
            if Rc::ptr_eq(&current, &self.dom.document) {
                return true;
            }
            let Some(parent) = get_parent_node(&current) else {
                return false;
            };
            if child_index(&parent, &current).is_none() {
                return false;
            }
            current = parent;
        }
    }

    fn page_url(&self) -> Option<String> {
        self.url.clone()
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }
}

impl DomWriter for RcDomPage {
    fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> Handle {
        create_element_node(tag, attributes)
    }

    fn create_text(&mut self, text: &str) -> Handle {
        create_text_node(text)
    }

    fn append_child(&mut self, parent: &Handle, child: &Handle) {
        append_child(parent, child);
    }

    fn replace_node(&mut self, old: &Handle, new: &Handle) -> TranslationResult<()> {
        if replace_node_with(old, std::slice::from_ref(new)) {
            Ok(())
        } else {
            Err(dom_error("节点已脱离文档，无法替换"))
        }
    }

    fn set_text(&mut self, node: &Handle, text: &str) {
        match &node.data {
            NodeData::Text { contents } => {
                let mut contents = contents.borrow_mut();
                contents.clear();
                contents.push_slice(text);
            }
            NodeData::Element { .. } => {
                for child in node.children.borrow_mut().drain(..) {
                    child.parent.set(None);
                }
                append_child(node, &create_text_node(text));
            }
            _ => {}
        }
    }

    fn set_attribute(&mut self, node: &Handle, name: &str, value: &str) {
        set_node_attr(node, name, Some(value.to_string()));
    }

    fn split_text(&mut self, node: &Handle, segments: &[String]) -> TranslationResult<Vec<Handle>> {
        let original = get_text(node).ok_or_else(|| dom_error("只能拆分文本节点"))?;
        if segments.concat() != original {
            return Err(dom_error("拆分片段与原文不一致"));
        }

        let nodes: Vec<Handle> = segments.iter().map(|s| create_text_node(s)).collect();
        if !replace_node_with(node, &nodes) {
            return Err(dom_error("节点已脱离文档，无法拆分"));
        }
        Ok(nodes)
    }
}
