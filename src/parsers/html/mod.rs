//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `metadata`: 文档元数据处理
//! - `serializer`: 序列化功能

pub mod dom;
pub mod metadata;
pub mod serializer;

pub use dom::{
    find_elements, find_nodes, get_node_attr, get_node_name,
    get_parent_node, html_to_dom, set_node_attr,
};
pub use metadata::{charset_from_content_type, get_charset, get_title};
pub use serializer::serialize_document;
