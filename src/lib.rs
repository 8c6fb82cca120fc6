pub mod cli;
pub mod direction;
pub mod image;
pub mod playback;
pub mod session;
pub mod settings;
mod shell;
pub mod speech;
pub mod store;
pub mod translation;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;

use cli::CliArgs;
use direction::Direction;
use image::GeminiImageClient;
use playback::RodioPlayer;
use session::{Session, SessionConfig, SessionServices};
use settings::{AppSettings, ImageConfig, SpeechConfig};
use speech::ElevenLabsClient;
use store::SettingsStore;
use translation::HttpTranslationClient;

fn rust_log_set() -> bool {
    std::env::var("RUST_LOG")
        .map(|spec| !spec.trim().is_empty())
        .unwrap_or(false)
}

/// Must run before anything that logs. Without `RUST_LOG`, the logger accepts
/// debug records and the global max level gates them, so `debug_mode` from
/// the store can still raise verbosity once settings are loaded.
fn init_logging(debug: bool) {
    // Logs go to stderr so stdout stays with the shell
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if !rust_log_set() {
        log::set_max_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
}

fn enable_debug_logging() {
    if !rust_log_set() && log::max_level() < log::LevelFilter::Debug {
        log::set_max_level(log::LevelFilter::Debug);
        log::debug!("Debug logging enabled from settings");
    }
}

/// Settings from the store with command-line overrides applied on top.
/// Overrides are not written back.
fn apply_cli_overrides(settings: &mut AppSettings, args: &CliArgs) {
    if let Some(debounce_ms) = args.debounce_ms {
        settings.debounce_ms = debounce_ms;
    }
    if let Some(language) = args.direction {
        settings.direction = Direction::from_source(language);
    }
    if args.debug {
        settings.debug_mode = true;
    }
}

fn build_services(settings: &AppSettings, store: &SettingsStore) -> Result<SessionServices> {
    Ok(SessionServices {
        transport: Arc::new(HttpTranslationClient::new()?),
        speech: Arc::new(ElevenLabsClient::new(SpeechConfig::resolve(settings, store))?),
        player: Arc::new(RodioPlayer::default()),
        image: Arc::new(GeminiImageClient::new(ImageConfig::resolve(settings))?),
    })
}

async fn run_session(args: CliArgs, settings: AppSettings, services: SessionServices) -> Result<()> {
    let (session, events) = Session::new(
        SessionConfig::from_settings(&settings),
        services,
        settings.direction,
    );

    match args.once {
        Some(text) => {
            let output =
                shell::translate_once(&session, events, &text, settings.direction).await?;
            println!("{}", output);
            Ok(())
        }
        None => shell::run_shell(session, events, settings.output_dir.clone()).await,
    }
}

fn try_run(args: CliArgs) -> Result<()> {
    init_logging(args.debug);

    let store_path = args
        .store
        .clone()
        .unwrap_or_else(SettingsStore::default_path);
    let store = SettingsStore::open(store_path);

    let mut settings = settings::load_or_create_app_settings(&store);
    apply_cli_overrides(&mut settings, &args);

    if settings.debug_mode {
        enable_debug_logging();
    }
    log::info!(
        "Emoji translator starting ({}, settings at {:?})",
        settings.direction,
        store.path()
    );

    let services = build_services(&settings, &store)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to start async runtime: {}", e))?;

    runtime.block_on(run_session(args, settings, services))
}

pub fn run() {
    let args = CliArgs::parse();

    if let Err(e) = try_run(args) {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
