//! swt 命令行入口

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use smart_web_translator::env::core::{LogLevel, NoColor, StateDir};
use smart_web_translator::env::{generate_env_docs, EnvVar};
use smart_web_translator::translation::{
    AlreadyTranslated, ConfigManager, KeyValueStore, PageTranslator, PassOutcome, RcDomPage,
    RedbStore, Request, Response, TranslationMode, TranslationService,
};

const STATE_FILE: &str = "state.redb";

#[derive(Parser)]
#[command(name = "swt")]
#[command(version, about = "Translate text and HTML pages through a REST or local LLM backend")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory holding cache, history and usage
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Target language, overrides the configuration
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a piece of text
    Translate {
        /// Text to translate
        #[arg(required = true)]
        text: Vec<String>,

        /// Source language
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Translate an HTML file
    Page {
        file: PathBuf,

        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Page address used for site rules and the cache key
        #[arg(short, long)]
        url: Option<String>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Content-Type of the document, e.g. "text/plain"
        #[arg(long)]
        content_type: Option<String>,

        /// Apply cached translations only, without calling the backend
        #[arg(long)]
        cached: bool,
    },

    /// Inspect or clear the page cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect or clear the translation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show token usage of the LLM backend
    Usage {
        #[arg(long)]
        reset: bool,
    },

    /// List models offered by the LLM backend
    Models,

    /// Check that the configured backend answers
    TestConnection,

    /// Send one JSON request through the message boundary
    Message { json: String },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    List,
    Clear { key: Option<String> },
    Size,
}

#[derive(Subcommand)]
enum HistoryAction {
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write an example configuration file
    Init { path: String },
    /// Print the effective configuration
    Show,
    /// Document the supported environment variables
    EnvDocs,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Replace,
    Bilingual,
}

impl From<ModeArg> for TranslationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Replace => TranslationMode::Replace,
            ModeArg::Bilingual => TranslationMode::Bilingual,
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        LogLevel::get_or_default("warn".to_string())
    };
    let filter = EnvFilter::try_new(format!("smart_web_translator={level},swt={level}"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!NoColor::get_or_default(false))
        .with_writer(io::stderr)
        .init();
}

fn open_store(state_dir: Option<&str>) -> Result<Arc<dyn KeyValueStore>, Box<dyn Error>> {
    let dir = match state_dir {
        Some(dir) => dir.to_string(),
        None => StateDir::get()?,
    };
    let dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
    Ok(Arc::new(RedbStore::open(dir.join(STATE_FILE))?))
}

fn file_url(path: &Path) -> Option<String> {
    let absolute = fs::canonicalize(path).ok()?;
    url::Url::from_file_path(absolute).ok().map(String::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 不需要配置和存储的命令
    if let Command::Config { action } = &cli.command {
        match action {
            ConfigAction::Init { path } => {
                ConfigManager::generate_example_config(path)?;
                println!("Wrote {}", path);
                return Ok(());
            }
            ConfigAction::EnvDocs => {
                print!("{}", generate_env_docs());
                return Ok(());
            }
            ConfigAction::Show => {}
        }
    }

    let manager = ConfigManager::load(cli.config.as_deref())?;
    let mut config = manager.into_config();
    if let Some(target) = &cli.target {
        config.target_lang = target.clone();
        config.validate()?;
    }

    if let Command::Config { .. } = &cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let store = open_store(cli.state_dir.as_deref())?;
    let service = Arc::new(TranslationService::new(config, store)?);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Translate { text, source } => {
            let text = text.join(" ");
            let outcome = service.translate_text(&text, source.as_deref(), None).await;
            match outcome.text() {
                Some(translated) => {
                    writeln!(stdout, "{}", translated)?;
                    for alternative in &outcome.alternatives {
                        writeln!(stdout, "  ~ {}", alternative)?;
                    }
                    if let Some(notes) = &outcome.context_notes {
                        writeln!(stdout, "  ({})", notes)?;
                    }
                    if outcome.fallback_used {
                        tracing::info!("使用了回退后端");
                    }
                }
                None => {
                    return Err(outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "translation failed".to_string())
                        .into())
                }
            }
        }

        Command::Page {
            file,
            mode,
            url,
            output,
            content_type,
            cached,
        } => {
            let bytes = fs::read(&file)?;
            let mut page = RcDomPage::from_bytes(&bytes, content_type.as_deref());
            if let Some(url) = url.or_else(|| file_url(&file)) {
                page = page.with_url(url);
            }
            tracing::info!(
                "翻译 {} ({})",
                file.display(),
                page.title().unwrap_or_else(|| "无标题".to_string())
            );

            let mode = mode
                .map(TranslationMode::from)
                .unwrap_or(service.config().default_mode);
            let mut translator = PageTranslator::new(page, service.clone())
                .with_progress(|done, total| tracing::debug!("进度 {}/{}", done, total));

            if cached {
                let applied = translator.load_cached_translation(mode)?;
                eprintln!("{} units restored from cache", applied);
            } else {
                match translator
                    .translate_page(mode, AlreadyTranslated::Reject)
                    .await?
                {
                    PassOutcome::Completed(summary) => eprintln!(
                        "{}/{} units translated, {} failed",
                        summary.translated, summary.total_units, summary.failed
                    ),
                    PassOutcome::NothingToTranslate => eprintln!("Nothing to translate"),
                    other => eprintln!("{:?}", other),
                }
            }

            let html = translator.dom().to_bytes()?;
            match output {
                Some(path) => fs::write(path, html)?,
                None => stdout.write_all(&html)?,
            }
        }

        Command::Cache { action } => match action {
            CacheAction::List => {
                for entry in service.cache().list() {
                    writeln!(
                        stdout,
                        "{}\t{}\t{}\t{} units\t{}",
                        entry.key,
                        entry.target_lang,
                        entry.saved_at.format("%Y-%m-%d %H:%M"),
                        entry.count,
                        entry.page_url
                    )?;
                }
            }
            CacheAction::Clear { key } => {
                let removed = service.cache().clear(key.as_deref());
                writeln!(stdout, "{} entries removed", removed)?;
            }
            CacheAction::Size => {
                writeln!(stdout, "{} bytes", service.cache().total_size_bytes())?;
            }
        },

        Command::History { action } => match action {
            HistoryAction::List { limit } => {
                for entry in service.history().list()?.into_iter().take(limit) {
                    writeln!(
                        stdout,
                        "{}\t{}->{}\t{}\t{}",
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        entry.source_lang,
                        entry.target_lang,
                        entry.original,
                        entry.translated
                    )?;
                }
            }
            HistoryAction::Clear => {
                service.history().clear()?;
                writeln!(stdout, "History cleared")?;
            }
        },

        Command::Usage { reset } => {
            if reset {
                service.usage().reset()?;
            }
            let totals = service.usage().totals()?;
            writeln!(
                stdout,
                "requests: {}\nprompt tokens: {}\ncompletion tokens: {}\ntotal tokens: {}",
                totals.requests, totals.prompt_tokens, totals.completion_tokens, totals.total_tokens
            )?;
        }

        Command::Models => {
            for model in service.backend().list_models().await? {
                writeln!(stdout, "{}", model)?;
            }
        }

        Command::TestConnection => {
            let detail = service
                .backend()
                .test_connection(&service.config().target_lang)
                .await?;
            writeln!(stdout, "OK ({}): {}", service.backend().kind(), detail)?;
        }

        Command::Message { json } => {
            let response = match Request::from_json(&json) {
                Ok(request) => service.handle(request).await,
                Err(e) => Response::error(e.message()),
            };
            writeln!(stdout, "{}", response.to_json()?)?;
        }

        Command::Config { .. } => {}
    }

    Ok(())
}
