//! 翻译配置管理模块
//!
//! 提供配置管理，支持 .env、配置文件、环境变量和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, LlmSettings, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 默认服务设置
    pub const DEFAULT_SERVICE_URL: &str = "http://localhost:5000/translate";
    pub const DEFAULT_LLM_URL: &str = "http://localhost:1234";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_TARGET_LANG: &str = "de";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);

    // LLM 参数回退值
    pub const DEFAULT_TEMPERATURE: f32 = 0.1;
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;
    pub const BATCH_TOKENS_PER_TEXT: u32 = 300;
    pub const BATCH_MAX_TOKENS: u32 = 8000;
    pub const MAX_ALTERNATIVES: usize = 3;

    // REST 请求固定参数
    pub const REST_ALTERNATIVES: u32 = 3;
    pub const REST_FORMAT: &str = "text";

    // 页面批次处理
    pub const PAGE_BATCH_SIZE: usize = 5;
    pub const BATCH_DELAY_MS: u64 = 50;

    // 文本过滤
    pub const MIN_UNIT_CHARS: usize = 3;

    // 纯文本页面检测
    pub const PLAIN_TEXT_MIN_CHARS: usize = 1000;
    pub const PLAIN_TEXT_DOMINANT_RATIO: f64 = 0.8;
    pub const PLAIN_TEXT_MAX_BLOCKS: usize = 3;
    pub const PLAIN_TEXT_HOSTS: &[&str] = &[
        "raw.githubusercontent.com",
        "gist.githubusercontent.com",
        "raw.githack.com",
    ];

    // 结构性排除元素（始终跳过）
    pub const STRUCTURAL_TAGS: &[&str] = &[
        "script", "style", "noscript", "template", "textarea", "input", "select", "option",
        "svg", "math", "head", "title", "iframe", "object", "canvas",
    ];

    // 代码元素
    pub const CODE_TAGS: &[&str] = &["code", "pre", "kbd", "samp", "var"];

    // 语法高亮类名（小写匹配）
    pub const CODE_CLASS_PATTERNS: &[&str] = &[
        "highlight", "hljs", "prism", "language-", "lang-", "syntax", "sourcecode",
        "codehilite", "prettyprint", "blob-code", "code-block", "codemirror", "monaco",
    ];

    // 标记代码块的 data 属性
    pub const CODE_DATA_ATTRS: &[&str] = &["data-lang", "data-language", "data-code"];

    // 引用元素
    pub const QUOTE_TAGS: &[&str] = &["blockquote"];

    // 本扩展自身的 UI 与改写产物
    pub const OWN_UI_CLASSES: &[&str] = &[
        "smt-ui", "smt-translated", "smt-bilingual-wrapper", "smt-bilingual-original",
        "smt-bilingual-translated",
    ];
    pub const OWN_MARKER_ATTR: &str = "data-smt-translated";

    // 普通块级元素（纯文本检测时计数）
    pub const BLOCK_TAGS: &[&str] = &[
        "p", "div", "article", "section", "main", "aside", "header", "footer", "nav", "h1",
        "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "figure", "dl", "form",
    ];

    // 持久化键
    pub const CACHE_KEY_PREFIX: &str = "swt_page_";
    pub const HISTORY_KEY: &str = "swt_history";
    pub const USAGE_KEY: &str = "swt_usage";
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "swt.toml",
        ".swt.toml",
        "swt.json",
        "~/.config/smart-web-translator/config.toml",
        "/etc/smart-web-translator/config.toml",
    ];
}

/// 是否存在任一配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
