use std::io;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use serde_json::json;

use neurossh::commands;
use neurossh::tui::{self, App};
use neurossh::{AppConfig, Cli, Commands, Paths};
use neurossh_logging::{ensure_dir, AppLogger};
use neurossh_store::{CredentialStore, SessionRegistry, Vault};
use neurossh_terminal::{SshConnector, TabManager};
use neurossh_types::SessionConfig;

fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let paths = Paths::from_cli(&cli)?;
    let mut config = AppConfig::load(&paths.config_file)?;
    config.apply_cli(&cli)?;

    let registry = SessionRegistry::new(&paths.sessions_file);
    let mut stdout = io::stdout();

    match cli.command.clone().unwrap_or(Commands::Tui) {
        Commands::List => commands::list_sessions(&registry, &mut stdout),
        Commands::Add {
            name,
            host,
            port,
            folder,
            profile,
        } => {
            let session = SessionConfig::new(name, host)
                .with_port(port)
                .with_folder(folder)
                .with_profile(profile);
            commands::add_session(&registry, session, &mut stdout)
        }
        Commands::Remove { id, folder } => {
            commands::remove_sessions(&registry, id.as_deref(), folder.as_deref(), &mut stdout)
        }
        Commands::Identity { profile, user, secret } => {
            let store = credential_store(&paths)?;
            commands::save_identity(&store, &profile, &user, &secret, &mut stdout)
        }
        Commands::Profiles => commands::list_profiles(&credential_store(&paths)?, &mut stdout),
        Commands::Run { session, script } => {
            let target = registry
                .find(&session)
                .ok_or_else(|| anyhow!("no saved session with id or name '{}'", session))?;
            let script = commands::read_script(&script)?;
            run_headless(&paths, &config, &target, &script)
        }
        Commands::Tui => run_tui(&paths, &config, registry),
    }
}

fn credential_store(paths: &Paths) -> Result<CredentialStore> {
    let vault = Vault::load_or_create(&paths.vault_key)
        .with_context(|| format!("Failed to open vault key {}", paths.vault_key.display()))?;
    Ok(CredentialStore::new(&paths.identities_file, vault))
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("neurossh-bridge")
        .build()
        .context("Failed to start async runtime")
}

fn build_manager(
    runtime: &tokio::runtime::Runtime,
    paths: &Paths,
    config: &AppConfig,
    logger: &Arc<AppLogger>,
) -> Result<TabManager> {
    let connector = Arc::new(SshConnector::new(Arc::clone(logger)));
    let mut manager = TabManager::new(runtime.handle().clone(), connector, Arc::new(credential_store(paths)?))
        .with_options(config.bridge_options())
        .with_command_delay(config.command_delay())
        .with_logger(Arc::clone(logger));
    if config.log_io {
        manager = manager.with_io_log_dir(ensure_dir(&paths.logs_dir.join("sessions"))?);
    }
    Ok(manager)
}

fn run_tui(paths: &Paths, config: &AppConfig, registry: SessionRegistry) -> Result<()> {
    let logger = Arc::new(AppLogger::new(&paths.logs_dir)?);
    logger.info(
        "app",
        "starting terminal UI",
        json!({ "data_dir": paths.data_dir.display().to_string() }),
    );

    let runtime = build_runtime()?;
    let manager = build_manager(&runtime, paths, config, &logger)?;
    let app = App::new(manager, registry, paths.transcript_dir(config), Arc::clone(&logger));
    let result = tui::run(app, config.poll_interval());

    logger.info("app", "terminal UI stopped", json!(null));
    result
}

fn run_headless(paths: &Paths, config: &AppConfig, target: &SessionConfig, script: &str) -> Result<()> {
    let logger = Arc::new(AppLogger::new(&paths.logs_dir)?);
    let runtime = build_runtime()?;
    let mut manager = build_manager(&runtime, paths, config, &logger)?;

    eprintln!("{} {}", "Connecting to".cyan(), target.address());
    let settle = config.command_delay() * 2;
    let outcome = runtime.block_on(commands::run_script(&mut manager, target, script, settle))?;
    drop(manager);

    println!("{}", outcome.screen);
    eprintln!(
        "{} {} line(s), waited {:.1}s",
        "Sent".green(),
        outcome.report.sent,
        outcome.report.waited.as_secs_f64()
    );
    if let Some(error) = outcome.report.error {
        return Err(anyhow!("sequence stopped early: {}", error));
    }
    Ok(())
}
