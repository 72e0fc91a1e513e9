//! # Smart Web Translator
//!
//! 网页翻译引擎：从 HTML 文档中选出可翻译文本，分批交给 REST 或本地 LLM
//! 翻译后端，原位改写文档（替换或双语对照），支持撤销，并按页面缓存译文。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量
//! - `parsers` - HTML 解析与序列化
//! - `translation` - 翻译流程、后端、缓存与配置

pub mod env;
pub mod parsers;
pub mod translation;
