//! 缓存与持久化集成测试
//!
//! 页面缓存、历史记录和用量都落在 redb 文件中，重新打开后仍然可读

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use smart_web_translator::translation::storage::{content_hash, page_key};
use smart_web_translator::translation::{
    AlreadyTranslated, HistoryEntry, HistoryStore, KeyValueStore, PageCache, PageTranslator,
    PassOutcome, RedbStore, Request, TranslationMode,
};
use smart_web_translator::translation::backend::UsageSink;

mod common;

use common::{fast_config, EchoBackend, HtmlTestHelper, TestEnvironment};

fn open_store(dir: &TempDir) -> Arc<dyn KeyValueStore> {
    Arc::new(RedbStore::open(dir.path().join("state.redb")).expect("open redb"))
}

/// save 之后 load 得到相同的译文
#[test]
fn test_cache_round_trip() {
    let dir = TempDir::new().unwrap();
    let cache = PageCache::new(open_store(&dir));
    let key = page_key("https://example.com/greeting?lang=en#top");

    let mut translations = BTreeMap::new();
    translations.insert("h1".to_string(), "Hallo".to_string());
    assert!(cache.save(&key, "https://example.com/greeting", "de", translations));

    let entry = cache.load(&key).expect("entry should exist");
    assert_eq!(entry.translations["h1"], "Hallo");
    assert_eq!(entry.target_lang, "de");
    assert_eq!(entry.page_url, "https://example.com/greeting");
}

/// 缓存键忽略查询串和片段
#[test]
fn test_page_key_identity() {
    assert_eq!(
        page_key("https://example.com/a/b?x=1#frag"),
        page_key("https://example.com/a/b")
    );
    assert_ne!(page_key("https://example.com/a"), page_key("https://example.com/b"));
    assert_ne!(page_key("https://one.example/a"), page_key("https://two.example/a"));
    assert_eq!(content_hash("  Hello  "), content_hash("Hello"));
}

/// 关闭再打开存储后缓存仍然有效
#[test]
fn test_cache_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let key = page_key("https://example.com/persisted");
    {
        let cache = PageCache::new(open_store(&dir));
        let mut translations = BTreeMap::new();
        translations.insert(content_hash("Hello"), "Bonjour".to_string());
        assert!(cache.save(&key, "https://example.com/persisted", "fr", translations));
    }

    let cache = PageCache::new(open_store(&dir));
    assert!(cache.contains(&key));
    let listed = cache.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].count, 1);
    assert!(cache.total_size_bytes() > 0);

    assert_eq!(cache.clear(Some(&key)), 1);
    assert!(!cache.contains(&key));
    assert_eq!(cache.clear(None), 0);
}

#[test]
fn test_clear_all_entries() {
    let dir = TempDir::new().unwrap();
    let cache = PageCache::new(open_store(&dir));
    for path in ["one", "two", "three"] {
        let url = format!("https://example.com/{}", path);
        let mut translations = BTreeMap::new();
        translations.insert(content_hash(path), path.to_uppercase());
        cache.save(&page_key(&url), &url, "de", translations);
    }

    let info = cache.info(Some(&page_key("https://example.com/two")));
    assert_eq!(info.entries.len(), 3);
    assert!(info.has_current_page);

    assert_eq!(cache.clear(None), 3);
    assert_eq!(cache.total_size_bytes(), 0);
}

/// 历史记录最新在前，超过上限时丢弃最旧的
#[test]
fn test_history_ring_buffer() {
    let dir = TempDir::new().unwrap();
    let history = HistoryStore::new(open_store(&dir), 3);

    for i in 0..5 {
        history
            .add(HistoryEntry::new(&format!("text {}", i), &format!("Text {}", i), "en", "de"))
            .unwrap();
    }

    let entries = history.list().unwrap();
    let originals: Vec<&str> = entries.iter().map(|e| e.original.as_str()).collect();
    assert_eq!(originals, vec!["text 4", "text 3", "text 2"]);

    history.clear().unwrap();
    assert!(history.list().unwrap().is_empty());
}

/// 翻译一次页面后，新的翻译器从磁盘缓存恢复译文
#[tokio::test]
async fn test_page_cache_reused_across_runs() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(EchoBackend::new("DE: "));
    let paragraphs = ["Cached paragraph one", "Cached paragraph two"];

    {
        let env = TestEnvironment::with_store(fast_config(), backend.clone(), open_store(&dir));
        let mut translator =
            PageTranslator::new(HtmlTestHelper::article(&paragraphs), env.service.clone());
        let outcome = translator
            .translate_page(TranslationMode::Replace, AlreadyTranslated::Reject)
            .await
            .unwrap();
        assert!(matches!(outcome, PassOutcome::Completed(ref s) if s.cached));
    }
    let calls_after_first_run = backend.calls().len();

    // 同一进程中 redb 文件只能打开一次
    let store = open_store(&dir);
    let env = TestEnvironment::with_store(fast_config(), backend.clone(), store.clone());
    let mut translator =
        PageTranslator::new(HtmlTestHelper::article(&paragraphs), env.service.clone());
    assert!(translator.page_info().has_cache);

    let applied = translator
        .load_cached_translation(TranslationMode::Replace)
        .unwrap();
    assert_eq!(applied, 3);
    assert_eq!(backend.calls().len(), calls_after_first_run);
    assert!(translator.dom().body_text().contains("DE: Cached paragraph two"));

    // 目标语言不同的缓存不会被应用
    let mut config = fast_config();
    config.target_lang = "fr".to_string();
    let env = TestEnvironment::with_store(config, backend, store);
    let mut translator =
        PageTranslator::new(HtmlTestHelper::article(&paragraphs), env.service.clone());
    assert_eq!(
        translator
            .load_cached_translation(TranslationMode::Replace)
            .unwrap(),
        0
    );
}

/// 整页翻译在历史中留下一条摘要
#[tokio::test]
async fn test_page_pass_writes_history_summary() {
    let env = TestEnvironment::with_backend(Arc::new(EchoBackend::new("DE: ")));
    let mut translator = PageTranslator::new(
        HtmlTestHelper::article(&["One paragraph", "Another paragraph"]),
        env.service.clone(),
    );
    translator
        .translate_page(TranslationMode::Replace, AlreadyTranslated::Reject)
        .await
        .unwrap();

    let entries = env.service.history().list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].translated, "3 units");
    assert_eq!(
        entries[0].page_url.as_deref(),
        Some("https://example.com/blog/post?utm=1#top")
    );
    assert_eq!(env.service.get_stats().snapshot().pages_translated, 1);
}

/// clearCache 消息只能删除页面缓存，历史和用量不受影响
#[tokio::test]
async fn test_clear_cache_message_keeps_other_state() {
    let env = TestEnvironment::with_backend(Arc::new(EchoBackend::new("DE: ")));
    env.service
        .history()
        .add(HistoryEntry::new("Hello", "Hallo", "en", "de"))
        .unwrap();
    env.service.usage().on_usage(10, 4);

    for key in ["swt_history", "swt_usage"] {
        let raw = format!(r#"{{"action":"clearCache","key":"{}"}}"#, key);
        let response = env.service.handle(Request::from_json(&raw).unwrap()).await;
        assert!(!response.is_error());
    }

    assert_eq!(env.service.history().list().unwrap().len(), 1);
    assert_eq!(env.service.usage().totals().unwrap().requests, 1);
}
