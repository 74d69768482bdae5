use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use neurossh_logging::AppLogger;
use neurossh_types::{BridgeState, CredentialSource, KeyEvent, SessionConfig};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::bridge::{Bridge, BridgeContext, BridgeNotice, BridgeOptions};
use crate::error::BridgeError;
use crate::keys::{reserved_command, translate, FocusCommand};
use crate::logger::sanitize;
use crate::screen_buffer::ScreenSnapshot;
use crate::sequencer::{run_sequence, Directive, SequenceReport};
use crate::transport::Connector;
use crate::{TabId, DEFAULT_COMMAND_DELAY_MS};

/// A UI-addressable slot owning exactly one bridge
struct Tab {
    session_id: String,
    title: String,
    bridge: Bridge,
    /// Last state reported through the notice queue
    status: BridgeState,
}

/// Row of the tab bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSummary {
    pub id: TabId,
    pub session_id: String,
    pub title: String,
    pub state: BridgeState,
    pub active: bool,
}

/// What the display loop draws for the active tab
#[derive(Debug, Clone)]
pub struct TabView {
    pub id: TabId,
    pub title: String,
    pub state: BridgeState,
    pub snapshot: Arc<ScreenSnapshot>,
    /// New data on this tab, or a state change on any tab, since the previous tick
    pub changed: bool,
}

/// How a routed key event was handled
#[derive(Debug)]
pub enum RouteOutcome {
    /// Bytes written to the active tab
    Delivered(usize),
    /// Bytes written to this many connected tabs in broadcast mode
    Broadcast(usize),
    /// Reserved chord, handled locally and not forwarded
    Reserved(FocusCommand),
    /// The key has no byte encoding
    Untranslatable,
    /// No tab is active; the event was discarded
    NoActiveTab,
    DeliveryFailed(BridgeError),
}

/// Owns every tab and its bridge; routes focus, input and redraw.
///
/// All methods run on the display thread and never wait on the network.
pub struct TabManager {
    tabs: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: TabId,
    broadcast: bool,
    credentials: Arc<dyn CredentialSource>,
    options: BridgeOptions,
    context: BridgeContext,
    notices: UnboundedReceiver<BridgeNotice>,
    command_delay: Duration,
    logger: Arc<AppLogger>,
}

impl std::fmt::Debug for TabManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabManager")
            .field("tabs", &self.tabs.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("connector", &self.context.connector.connector_name())
            .finish()
    }
}

impl TabManager {
    /// Create a manager whose bridges run on `runtime`
    pub fn new(
        runtime: Handle,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let (notices_tx, notices) = mpsc::unbounded_channel();
        let mut context = BridgeContext::new(runtime, connector);
        context.notices = Some(notices_tx);
        Self {
            tabs: BTreeMap::new(),
            active: None,
            next_id: 1,
            broadcast: false,
            credentials,
            options: BridgeOptions::default(),
            logger: Arc::clone(&context.logger),
            context,
            notices,
            command_delay: Duration::from_millis(DEFAULT_COMMAND_DELAY_MS),
        }
    }

    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_logger(mut self, logger: Arc<AppLogger>) -> Self {
        self.context.logger = Arc::clone(&logger);
        self.logger = logger;
        self
    }

    /// Write a JSONL traffic log per bridge into `dir`
    pub fn with_io_log_dir(mut self, dir: PathBuf) -> Self {
        self.context.io_log_dir = Some(dir);
        self
    }

    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Open a new tab for `config` and start connecting in the background
    pub fn open(&mut self, config: &SessionConfig) -> TabId {
        let id = self.next_id;
        self.next_id += 1;

        let credential = self.credentials.resolve(&config.profile);
        let bridge = Bridge::open(id, config, credential, &self.options, &self.context);
        self.tabs.insert(
            id,
            Tab {
                session_id: config.id.clone(),
                title: config.display_name().to_string(),
                bridge,
                status: BridgeState::Disconnected,
            },
        );
        if self.active.is_none() {
            self.active = Some(id);
        }

        self.logger.info(
            "manager",
            "tab opened",
            json!({ "tab": id, "session": config.id, "address": config.address() }),
        );
        id
    }

    /// Focus the tab already showing `config`, or open one
    pub fn open_or_focus(&mut self, config: &SessionConfig) -> TabId {
        let existing = self
            .tabs
            .iter()
            .find(|(_, tab)| tab.session_id == config.id)
            .map(|(id, _)| *id);
        match existing {
            Some(id) => {
                self.active = Some(id);
                id
            }
            None => {
                let id = self.open(config);
                self.active = Some(id);
                id
            }
        }
    }

    /// Switch the active tab; bridges keep polling either way
    pub fn activate(&mut self, id: TabId) -> Result<(), BridgeError> {
        if !self.tabs.contains_key(&id) {
            return Err(BridgeError::UnknownTab(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Close a tab and its bridge. Returns false if the tab was already gone.
    pub fn close(&mut self, id: TabId) -> bool {
        let Some(mut tab) = self.tabs.remove(&id) else {
            return false;
        };
        tab.bridge.close();

        if self.active == Some(id) {
            // Fall back to the most recently opened tab
            self.active = self.tabs.keys().next_back().copied();
        }

        self.logger.info(
            "manager",
            "tab closed",
            json!({ "tab": id, "session": tab.session_id }),
        );
        true
    }

    pub fn close_all(&mut self) {
        let ids: Vec<TabId> = self.tabs.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    /// Route a key event: reserved chords are handled here, everything else
    /// goes to the active tab (or to every tab in broadcast mode).
    pub fn route(&mut self, event: KeyEvent) -> RouteOutcome {
        if let Some(command) = reserved_command(&event) {
            match command {
                FocusCommand::NextTab => self.next_tab(),
                FocusCommand::PreviousTab => self.prev_tab(),
                FocusCommand::ToggleBroadcast => self.broadcast = !self.broadcast,
                FocusCommand::FocusSidebar | FocusCommand::FocusTerminal => {}
            }
            return RouteOutcome::Reserved(command);
        }

        let Some(bytes) = translate(&event) else {
            return RouteOutcome::Untranslatable;
        };

        if self.broadcast {
            return RouteOutcome::Broadcast(self.broadcast_bytes(&bytes));
        }

        let Some(tab) = self.active.and_then(|id| self.tabs.get(&id)) else {
            return RouteOutcome::NoActiveTab;
        };
        match tab.bridge.send(&bytes) {
            Ok(n) => RouteOutcome::Delivered(n),
            Err(e) => RouteOutcome::DeliveryFailed(e),
        }
    }

    /// Send raw bytes to the active tab
    pub fn send_to_active(&self, bytes: &[u8]) -> Result<usize, BridgeError> {
        let tab = self
            .active
            .and_then(|id| self.tabs.get(&id))
            .ok_or(BridgeError::NotConnected(BridgeState::Disconnected))?;
        tab.bridge.send(bytes)
    }

    /// Deliver bytes to every connected tab; returns how many accepted them
    pub fn broadcast_bytes(&self, bytes: &[u8]) -> usize {
        self.tabs
            .values()
            .filter(|tab| tab.bridge.state().is_connected())
            .filter(|tab| tab.bridge.send(bytes).is_ok())
            .count()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcast
    }

    pub fn set_broadcast(&mut self, enabled: bool) {
        self.broadcast = enabled;
    }

    /// Drain bridge notices and return the active tab's view for redraw.
    ///
    /// Only the active tab's snapshot is requested.
    pub fn tick(&mut self) -> Option<TabView> {
        let mut status_changed = false;
        while let Ok(notice) = self.notices.try_recv() {
            let BridgeNotice::StateChanged { tab: id, state } = notice;
            // Notices for tabs that were closed meanwhile are dropped
            if let Some(tab) = self.tabs.get_mut(&id) {
                tab.status = state;
                // Background tabs still recolour the tab bar
                status_changed = true;
            }
        }

        let id = self.active?;
        let tab = self.tabs.get(&id)?;
        let dirty = tab.bridge.take_dirty();
        Some(TabView {
            id,
            title: tab.title.clone(),
            state: tab.status.clone(),
            snapshot: tab.bridge.snapshot(),
            changed: dirty || status_changed,
        })
    }

    /// Tab bar rows in opening order
    pub fn tabs(&self) -> Vec<TabSummary> {
        self.tabs
            .iter()
            .map(|(id, tab)| TabSummary {
                id: *id,
                session_id: tab.session_id.clone(),
                title: tab.title.clone(),
                state: tab.status.clone(),
                active: self.active == Some(*id),
            })
            .collect()
    }

    pub fn active(&self) -> Option<TabId> {
        self.active
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.contains_key(&id)
    }

    pub fn bridge(&self, id: TabId) -> Option<&Bridge> {
        self.tabs.get(&id).map(|tab| &tab.bridge)
    }

    /// Failure cause of a tab, shown inline until the user closes it
    pub fn failure(&self, id: TabId) -> Option<String> {
        let tab = self.tabs.get(&id)?;
        match tab.bridge.state() {
            BridgeState::Failed(reason) => Some(reason),
            BridgeState::Closed => tab.bridge.last_error(),
            _ => None,
        }
    }

    pub fn next_tab(&mut self) {
        self.active = match self.active {
            Some(current) => self
                .tabs
                .range(current + 1..)
                .next()
                .or_else(|| self.tabs.iter().next())
                .map(|(id, _)| *id),
            None => self.tabs.keys().next().copied(),
        };
    }

    pub fn prev_tab(&mut self) {
        self.active = match self.active {
            Some(current) => self
                .tabs
                .range(..current)
                .next_back()
                .or_else(|| self.tabs.iter().next_back())
                .map(|(id, _)| *id),
            None => self.tabs.keys().next_back().copied(),
        };
    }

    /// Write the tab's current screen as plain text into `dir`
    pub fn save_transcript(&self, id: TabId, dir: &Path) -> Result<PathBuf, BridgeError> {
        let tab = self.tabs.get(&id).ok_or(BridgeError::UnknownTab(id))?;
        std::fs::create_dir_all(dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("session_{}_{}.txt", sanitize(&tab.title), timestamp));
        let mut text = tab.bridge.snapshot().text();
        text.push('\n');
        std::fs::write(&path, text)?;

        self.logger.info(
            "manager",
            "transcript saved",
            json!({ "tab": id, "path": path.display().to_string() }),
        );
        Ok(path)
    }

    /// Run a scripted sequence against a tab in the background
    pub fn run_sequence(
        &self,
        id: TabId,
        directives: Vec<Directive>,
    ) -> Result<JoinHandle<SequenceReport>, BridgeError> {
        let tab = self.tabs.get(&id).ok_or(BridgeError::UnknownTab(id))?;
        Ok(run_sequence(
            &self.context.runtime,
            tab.bridge.handle(),
            directives,
            self.command_delay,
        ))
    }
}

impl Drop for TabManager {
    fn drop(&mut self) {
        // Close all bridges on drop
        self.close_all();
    }
}
