//! Non-interactive subcommands.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use neurossh_store::{CredentialStore, SessionRegistry};
use neurossh_terminal::{parse_script, SequenceReport, TabManager};
use neurossh_types::{BridgeState, SessionConfig};

/// Print saved sessions grouped by folder
pub fn list_sessions(registry: &SessionRegistry, out: &mut impl Write) -> Result<()> {
    let groups = registry.grouped();
    if groups.is_empty() {
        writeln!(out, "{}", "No saved sessions.".yellow())?;
        return Ok(());
    }
    for (folder, sessions) in groups {
        writeln!(out, "{}", folder.bold().cyan())?;
        for session in sessions {
            writeln!(
                out,
                "  {}  {:<20} {:<28} {}",
                session.id.dimmed(),
                session.display_name(),
                session.address(),
                session.profile.dimmed()
            )?;
        }
    }
    Ok(())
}

pub fn add_session(registry: &SessionRegistry, session: SessionConfig, out: &mut impl Write) -> Result<()> {
    let id = session.id.clone();
    let name = session.display_name().to_string();
    registry
        .upsert(session)
        .with_context(|| format!("Failed to save session '{}'", name))?;
    writeln!(out, "{} {} ({})", "Saved".green(), name, id)?;
    Ok(())
}

/// Remove one session by id, or a whole folder
pub fn remove_sessions(
    registry: &SessionRegistry,
    id: Option<&str>,
    folder: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    match (id, folder) {
        (_, Some(folder)) => {
            let removed = registry.remove_folder(folder)?;
            if removed == 0 {
                bail!("folder '{}' has no sessions", folder);
            }
            writeln!(out, "{} {} session(s) from {}", "Removed".green(), removed, folder)?;
        }
        (Some(id), None) => {
            let removed = registry.remove(id)?;
            writeln!(out, "{} {}", "Removed".green(), removed.display_name())?;
        }
        (None, None) => bail!("nothing to remove: give a session id or --folder"),
    }
    Ok(())
}

pub fn save_identity(
    store: &CredentialStore,
    profile: &str,
    user: &str,
    secret: &str,
    out: &mut impl Write,
) -> Result<()> {
    if secret.is_empty() {
        bail!("secret must not be empty");
    }
    store.save_profile(profile, user, secret)?;
    writeln!(out, "{} profile {} ({})", "Saved".green(), profile.bold(), user)?;
    Ok(())
}

pub fn list_profiles(store: &CredentialStore, out: &mut impl Write) -> Result<()> {
    for profile in store.profiles() {
        writeln!(out, "{}", profile)?;
    }
    Ok(())
}

/// Outcome of a headless script run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: SequenceReport,
    pub screen: String,
}

/// Open `session` in `manager`, wait for the connection, play `script` and
/// return the final screen once output has had `settle` time to arrive.
pub async fn run_script(
    manager: &mut TabManager,
    session: &SessionConfig,
    script: &str,
    settle: Duration,
) -> Result<RunOutcome> {
    let directives = parse_script(script)?;
    let tab = manager.open(session);

    // Connect timeout plus one poll of slack, then the bridge has settled either way
    let options = manager.options().clone();
    let deadline = Instant::now() + options.connect_timeout + options.poll_interval * 4;
    loop {
        manager.tick();
        let bridge = manager
            .bridge(tab)
            .ok_or_else(|| anyhow!("tab {} disappeared", tab))?;
        match bridge.state() {
            BridgeState::Connected => break,
            BridgeState::Failed(reason) => bail!("{}: {}", session.address(), reason),
            BridgeState::Closed => bail!(
                "{}: connection closed ({})",
                session.address(),
                bridge.last_error().unwrap_or_else(|| "no reason given".to_string())
            ),
            BridgeState::Disconnected | BridgeState::Connecting => {}
        }
        if Instant::now() >= deadline {
            bail!("{}: still connecting after {:?}", session.address(), options.connect_timeout);
        }
        tokio::time::sleep(options.poll_interval).await;
    }

    let report = manager
        .run_sequence(tab, directives)?
        .await
        .context("Sequence task panicked")?;
    tokio::time::sleep(settle).await;

    let screen = manager
        .bridge(tab)
        .map(|bridge| bridge.snapshot().text())
        .unwrap_or_default();
    manager.close(tab);
    Ok(RunOutcome { report, screen })
}

/// Read the script file for `run`
pub fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))
}
