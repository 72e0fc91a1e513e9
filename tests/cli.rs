//! 命令行集成测试

use std::fs;

use assert_cmd::Command;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SWT_VARS: &[&str] = &[
    "SWT_LOG_LEVEL",
    "SWT_STATE_DIR",
    "SWT_BACKEND",
    "SWT_TARGET_LANG",
    "SWT_SOURCE_LANG",
    "SWT_SERVICE_URL",
    "SWT_API_KEY",
    "SWT_BATCH_SIZE",
    "SWT_REQUEST_TIMEOUT",
    "SWT_LLM_URL",
    "SWT_LLM_MODEL",
    "SWT_LLM_TEMPERATURE",
    "SWT_LLM_MAX_TOKENS",
    "SWT_LLM_DOMAIN",
    "SWT_LLM_FALLBACK",
];

/// 在空目录中运行，不受本机配置和环境变量影响
fn swt(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("swt").expect("binary should be built");
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    for var in SWT_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf-8 output")
}

#[test]
fn test_env_docs() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(swt(&dir).args(["config", "env-docs"]));
    assert!(out.contains("SWT_TARGET_LANG"));
    assert!(out.contains("SWT_LLM_MODEL"));
}

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();
    swt(&dir).args(["config", "init", "swt.toml"]).assert().success();

    let written = fs::read_to_string(dir.path().join("swt.toml")).unwrap();
    assert!(written.contains("target_lang = \"de\""));

    // 当前目录中的 swt.toml 会被自动加载，命令行参数优先
    let out = stdout_of(swt(&dir).args(["--target", "fr", "config", "show"]));
    assert!(out.contains("target_lang = \"fr\""));
}

#[test]
fn test_invalid_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    swt(&dir)
        .args(["--target", "auto", "config", "show"])
        .assert()
        .failure();
}

#[test]
fn test_empty_cache_and_history() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    let state = state.to_str().unwrap();

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "cache", "size"]));
    assert_eq!(out.trim(), "0 bytes");

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "history", "list"]));
    assert!(out.is_empty());

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "usage"]));
    assert!(out.contains("requests: 0"));
}

#[test]
fn test_message_boundary() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    let state = state.to_str().unwrap();

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "message", r#"{"action":"getSettings"}"#]));
    let settings: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(settings["target_lang"], "de");

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "message", r#"{"action":"explode"}"#]));
    let reply: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(reply["success"], false);

    let out = stdout_of(swt(&dir).args(["--state-dir", state, "message", r#"{"action":"getPageInfo"}"#]));
    let reply: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(reply["success"], false);
}

/// 翻译 HTML 文件，再只用缓存恢复
#[tokio::test(flavor = "multi_thread")]
async fn test_page_translation_and_cached_reload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translatedText": "Hallo Welt"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let page = dir.path().join("page.html");
    fs::write(
        &page,
        "<html><head><title>Greeting</title></head><body><p>Hello world</p><script>var x = 1;</script></body></html>",
    )
    .unwrap();
    let state = dir.path().join("state");
    let state = state.to_str().unwrap().to_string();
    let service_url = format!("{}/translate", server.uri());

    let output = swt(&dir)
        .env("SWT_SERVICE_URL", &service_url)
        .args(["--state-dir", &state, "page", "page.html", "-o", "out.html"])
        .assert()
        .success()
        .get_output()
        .clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("1/1 units translated"), "{}", stderr);

    let html = fs::read_to_string(dir.path().join("out.html")).unwrap();
    assert!(html.contains("Hallo Welt"));
    assert!(html.contains("smt-translated"));
    assert!(html.contains("var x = 1;"));

    // 第二次只读缓存，不再请求后端
    let output = swt(&dir)
        .env("SWT_SERVICE_URL", &service_url)
        .args(["--state-dir", &state, "page", "page.html", "--cached", "-m", "bilingual"])
        .assert()
        .success()
        .get_output()
        .clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("1 units restored from cache"), "{}", stderr);
    let html = String::from_utf8(output.stdout).unwrap();
    assert!(html.contains("smt-bilingual-wrapper"));
    assert!(html.contains("Hallo Welt"));

    let out = stdout_of(swt(&dir).args(["--state-dir", &state, "cache", "list"]));
    assert!(out.contains("1 units"));
}
