// 集成测试公共模块
//
// 内存中的假文档、可编排的翻译后端和测试环境

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use smart_web_translator::translation::backend::{
    BackendClient, BackendKind, TranslationBackend, TranslationOutcome,
};
use smart_web_translator::translation::config::TranslationConfig;
use smart_web_translator::translation::dom::{DomReader, DomWriter};
use smart_web_translator::translation::error::{TranslationError, TranslationResult};
use smart_web_translator::translation::storage::{KeyValueStore, MemoryStore};
use smart_web_translator::translation::TranslationService;

// ============================================================================
// 假文档
// ============================================================================

#[derive(Debug, Clone)]
enum FakeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct FakeNode {
    kind: FakeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// 以下标为句柄的内存文档，根节点是 `<body>`
#[derive(Debug, Clone)]
pub struct FakeDom {
    nodes: Vec<FakeNode>,
    url: Option<String>,
    content_type: Option<String>,
}

pub const BODY: usize = 0;

impl FakeDom {
    pub fn new() -> Self {
        Self {
            nodes: vec![FakeNode {
                kind: FakeKind::Element {
                    tag: "body".to_string(),
                    attrs: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            url: None,
            content_type: None,
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    fn push(&mut self, kind: FakeKind) -> usize {
        self.nodes.push(FakeNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// 在 parent 下追加元素
    pub fn element(&mut self, parent: usize, tag: &str, attrs: &[(&str, &str)]) -> usize {
        let id = self.push(FakeKind::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self.attach(parent, id);
        id
    }

    /// 在 parent 下追加文本
    pub fn text_node(&mut self, parent: usize, text: &str) -> usize {
        let id = self.push(FakeKind::Text(text.to_string()));
        self.attach(parent, id);
        id
    }

    /// 追加一个只含文本的元素
    pub fn block(&mut self, parent: usize, tag: &str, text: &str) -> usize {
        let id = self.element(parent, tag, &[]);
        self.text_node(id, text);
        id
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// 模拟页面脚本把节点移出文档
    pub fn detach(&mut self, node: usize) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
    }

    /// 简单序列化，用于逐字节比较
    pub fn render(&self) -> String {
        self.render_node(BODY)
    }

    fn render_node(&self, id: usize) -> String {
        match &self.nodes[id].kind {
            FakeKind::Text(text) => text.clone(),
            FakeKind::Element { tag, attrs } => {
                let attrs: String = attrs
                    .iter()
                    .map(|(k, v)| format!(" {}=\"{}\"", k, v))
                    .collect();
                let inner: String = self.nodes[id]
                    .children
                    .iter()
                    .map(|&c| self.render_node(c))
                    .collect();
                format!("<{}{}>{}</{}>", tag, attrs, inner, tag)
            }
        }
    }

    /// 正文纯文本
    pub fn body_text(&self) -> String {
        self.text_content(&BODY)
    }
}

impl Default for FakeDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DomReader for FakeDom {
    type Node = usize;

    fn body(&self) -> Option<usize> {
        Some(BODY)
    }

    fn children(&self, node: &usize) -> Vec<usize> {
        self.nodes[*node].children.clone()
    }

    fn parent(&self, node: &usize) -> Option<usize> {
        self.nodes[*node].parent
    }

    fn tag_name(&self, node: &usize) -> Option<String> {
        match &self.nodes[*node].kind {
            FakeKind::Element { tag, .. } => Some(tag.to_lowercase()),
            FakeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: &usize, name: &str) -> Option<String> {
        match &self.nodes[*node].kind {
            FakeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            FakeKind::Text(_) => None,
        }
    }

    fn text(&self, node: &usize) -> Option<String> {
        match &self.nodes[*node].kind {
            FakeKind::Text(text) => Some(text.clone()),
            FakeKind::Element { .. } => None,
        }
    }

    fn is_attached(&self, node: &usize) -> bool {
        let mut current = *node;
        loop {
            if current == BODY {
                return true;
            }
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn page_url(&self) -> Option<String> {
        self.url.clone()
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }
}

impl DomWriter for FakeDom {
    fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> usize {
        self.push(FakeKind::Element {
            tag: tag.to_string(),
            attrs: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    fn create_text(&mut self, text: &str) -> usize {
        self.push(FakeKind::Text(text.to_string()))
    }

    fn append_child(&mut self, parent: &usize, child: &usize) {
        self.detach(*child);
        self.attach(*parent, *child);
    }

    fn replace_node(&mut self, old: &usize, new: &usize) -> TranslationResult<()> {
        let parent = self.nodes[*old]
            .parent
            .ok_or_else(|| TranslationError::DomError("节点已脱离文档".to_string()))?;
        self.detach(*new);
        let slot = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == *old)
            .ok_or_else(|| TranslationError::DomError("父节点中找不到节点".to_string()))?;
        self.nodes[parent].children[slot] = *new;
        self.nodes[*new].parent = Some(parent);
        self.nodes[*old].parent = None;
        Ok(())
    }

    fn set_text(&mut self, node: &usize, text: &str) {
        match &mut self.nodes[*node].kind {
            FakeKind::Text(existing) => *existing = text.to_string(),
            FakeKind::Element { .. } => {
                for child in self.nodes[*node].children.clone() {
                    self.detach(child);
                }
                self.text_node(*node, text);
            }
        }
    }

    fn set_attribute(&mut self, node: &usize, name: &str, value: &str) {
        if let FakeKind::Element { attrs, .. } = &mut self.nodes[*node].kind {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some(attr) => attr.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn split_text(&mut self, node: &usize, segments: &[String]) -> TranslationResult<Vec<usize>> {
        let original = self
            .text(node)
            .ok_or_else(|| TranslationError::DomError("不是文本节点".to_string()))?;
        if segments.concat() != original {
            return Err(TranslationError::DomError("拆分结果与原文不一致".to_string()));
        }
        let parent = self.nodes[*node]
            .parent
            .ok_or_else(|| TranslationError::DomError("节点已脱离文档".to_string()))?;
        let slot = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == *node)
            .ok_or_else(|| TranslationError::DomError("父节点中找不到节点".to_string()))?;

        let pieces: Vec<usize> = segments
            .iter()
            .map(|s| {
                let id = self.push(FakeKind::Text(s.clone()));
                self.nodes[id].parent = Some(parent);
                id
            })
            .collect();
        self.nodes[parent]
            .children
            .splice(slot..=slot, pieces.iter().copied());
        self.nodes[*node].parent = None;
        Ok(pieces)
    }
}

// ============================================================================
// 可编排的后端
// ============================================================================

/// 返回 `prefix + 原文`，记录调用和最大并发数
pub struct EchoBackend {
    prefix: String,
    kind: BackendKind,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// 包含这些片段的文本翻译失败
    fail_on: Vec<String>,
}

impl EchoBackend {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            kind: BackendKind::Rest,
            delay: Duration::from_millis(0),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_on: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for EchoBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn translate_one(&self, text: &str, _source: &str, _target: &str) -> TranslationOutcome {
        self.calls.lock().unwrap().push(text.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.iter().any(|needle| text.contains(needle.as_str())) {
            return TranslationOutcome::failure(self.kind, "scripted failure");
        }
        TranslationOutcome::success(self.kind, format!("{}{}", self.prefix, text))
    }

    async fn test_connection(&self, _target: &str) -> TranslationResult<String> {
        Ok("echo".to_string())
    }
}

/// 原样返回原文
pub struct IdentityBackend;

#[async_trait]
impl TranslationBackend for IdentityBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    async fn translate_one(&self, text: &str, _source: &str, _target: &str) -> TranslationOutcome {
        TranslationOutcome::success(BackendKind::Rest, text)
    }

    async fn test_connection(&self, _target: &str) -> TranslationResult<String> {
        Ok(String::new())
    }
}

// ============================================================================
// 测试环境
// ============================================================================

/// 没有停顿的测试配置
pub fn fast_config() -> TranslationConfig {
    let mut config = TranslationConfig::default();
    config.batch_delay_ms = 0;
    config
}

pub struct TestEnvironment {
    pub store: Arc<dyn KeyValueStore>,
    pub service: Arc<TranslationService>,
}

impl TestEnvironment {
    pub fn with_backend(backend: Arc<dyn TranslationBackend>) -> Self {
        Self::with_config(fast_config(), backend)
    }

    pub fn with_config(config: TranslationConfig, backend: Arc<dyn TranslationBackend>) -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Self::with_store(config, backend, store)
    }

    pub fn with_store(
        config: TranslationConfig,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let service = Arc::new(TranslationService::with_backend(
            config,
            store.clone(),
            BackendClient::new(backend, None),
        ));
        Self { store, service }
    }
}

// ============================================================================
// HTML 样例
// ============================================================================

pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 五段正文的文章
    pub fn article(paragraphs: &[&str]) -> FakeDom {
        let mut dom = FakeDom::new().with_url("https://example.com/blog/post?utm=1#top");
        let article = dom.element(BODY, "article", &[]);
        dom.block(article, "h1", "Release notes");
        for p in paragraphs {
            dom.block(article, "p", p);
        }
        dom
    }

    /// 带脚本、样式、代码和引用的页面
    pub fn mixed_page() -> FakeDom {
        let mut dom = FakeDom::new().with_url("https://example.org/guide");
        dom.block(BODY, "script", "window.secret = 'do not translate';");
        dom.block(BODY, "style", "body { color: red; }");
        dom.block(BODY, "h2", "Getting started");
        dom.block(BODY, "p", "  ");
        dom.block(BODY, "p", "123");
        dom.block(BODY, "p", "!!");
        dom.block(BODY, "p", "Hello");
        let pre = dom.element(BODY, "pre", &[]);
        dom.block(pre, "code", "cargo build --release");
        dom.block(BODY, "blockquote", "Quoted wisdom from elsewhere");
        let ui = dom.element(BODY, "div", &[("class", "smt-ui panel")]);
        dom.block(ui, "span", "Translate this page");
        dom
    }

    /// 长纯文本文档：一个大 pre，没有其他块元素
    pub fn plain_text_page(paragraphs: usize) -> (FakeDom, String) {
        let paragraph = "Plain text paragraph with enough words to matter for detection. ".repeat(4);
        let text = (0..paragraphs)
            .map(|i| format!("{} #{}", paragraph.trim(), i))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut dom = FakeDom::new().with_url("https://www.example.net/rfc.txt");
        dom.block(BODY, "pre", &text);
        (dom, text)
    }
}
