//! 语言代码与显示名称

/// 支持的语言：代码、英文名称
pub const LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto-detect"),
    ("ar", "Arabic"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("hi", "Hindi"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sv", "Swedish"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// 语言显示名称，未知代码原样返回
pub fn display_name(code: &str) -> String {
    let normalized = code.trim().to_ascii_lowercase();
    let primary = normalized.split(['-', '_']).next().unwrap_or_default();
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == primary)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.trim().to_string())
}
