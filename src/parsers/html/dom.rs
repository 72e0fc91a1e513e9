use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default()).one(s)
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    if rest.is_empty() {
        if get_node_name(node) == Some(*node_name) {
            found_nodes.push(node.clone());
        }

        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names));
        }
    } else if get_node_name(node) == Some(*node_name) {
        found_nodes.append(&mut find_nodes(node, rest));
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names));
        }
    }

    found_nodes
}

/// 深度优先查找所有指定名称的元素
pub fn find_elements(node: &Handle, tag: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    for child in node.children.borrow().iter() {
        if get_node_name(child) == Some(tag) {
            found.push(child.clone());
        }
        found.append(&mut find_elements(child, tag));
    }
    found
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// rcdom 以 `Cell<Option<Weak>>` 保存父指针，读取后必须放回。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性，`None` 表示删除
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut found_existing_attr = false;

        attrs_mut.retain_mut(|attr| {
            if &*attr.name.local != attr_name {
                return true;
            }
            found_existing_attr = true;
            match &attr_value {
                Some(value) => {
                    attr.value = StrTendril::from_slice(value);
                    true
                }
                None => false,
            }
        });

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 创建游离的元素节点
pub fn create_element_node(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: std::cell::RefCell::new(attrs),
        template_contents: std::cell::RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建游离的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: std::cell::RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 追加子节点并设置父指针
pub fn append_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 子节点在父节点中的位置
pub fn child_index(parent: &Handle, child: &Handle) -> Option<usize> {
    parent
        .children
        .borrow()
        .iter()
        .position(|c| Rc::ptr_eq(c, child))
}

/// 从父节点中移除，返回原位置
pub fn detach_node(node: &Handle) -> Option<usize> {
    let parent = get_parent_node(node)?;
    let index = child_index(&parent, node)?;
    parent.children.borrow_mut().remove(index);
    node.parent.set(None);
    Some(index)
}

/// 用一组新节点替换原节点，原节点被移出文档
pub fn replace_node_with(old: &Handle, replacements: &[Handle]) -> bool {
    let Some(parent) = get_parent_node(old) else {
        return false;
    };
    let Some(index) = child_index(&parent, old) else {
        return false;
    };

    for node in replacements {
        node.parent.set(Some(Rc::downgrade(&parent)));
    }
    parent
        .children
        .borrow_mut()
        .splice(index..=index, replacements.iter().cloned());
    old.parent.set(None);
    true
}

/// 文本节点内容
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 递归收集后代文本
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_pointer_survives_lookup() {
        let dom = html_to_dom(b"<html><body><p>Hello</p></body></html>", "utf-8");
        let p = find_nodes(&dom.document, &["html", "body", "p"]).remove(0);

        let first = get_parent_node(&p).unwrap();
        let second = get_parent_node(&p).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(get_node_name(&first), Some("body"));
    }

    #[test]
    fn test_replace_node_with_keeps_order() {
        let dom = html_to_dom(b"<body><p>a<b>b</b>c</p></body>", "utf-8");
        let p = find_elements(&dom.document, "p").remove(0);
        let bold = find_elements(&p, "b").remove(0);

        let x = create_text_node("x");
        let y = create_text_node("y");
        assert!(replace_node_with(&bold, &[x, y]));

        assert_eq!(text_content(&p), "axyc");
        assert!(get_parent_node(&bold).is_none());
    }

    #[test]
    fn test_set_node_attr_updates_and_removes() {
        let node = create_element_node("span", &[("class", "a")]);
        set_node_attr(&node, "class", Some("b".to_string()));
        set_node_attr(&node, "title", Some("t".to_string()));
        assert_eq!(get_node_attr(&node, "class").as_deref(), Some("b"));
        assert_eq!(get_node_attr(&node, "title").as_deref(), Some("t"));

        set_node_attr(&node, "class", None);
        assert_eq!(get_node_attr(&node, "class"), None);
    }

    #[test]
    fn test_legacy_encoding_is_decoded() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("<p>café</p>");
        let dom = html_to_dom(&bytes, "windows-1252");
        let p = find_elements(&dom.document, "p").remove(0);
        assert_eq!(text_content(&p), "café");
    }
}
