use std::path::PathBuf;
use std::sync::Arc;

use neurossh_logging::AppLogger;
use neurossh_store::SessionRegistry;
use neurossh_terminal::{reserved_command, FocusCommand, RouteOutcome, TabManager, TabView};
use neurossh_types::{KeyEvent, SessionConfig};
use serde_json::json;

use super::keymap::{action_for, Action};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Terminal,
}

/// One row of the sidebar tree
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarEntry {
    Folder(String),
    Session(SessionConfig),
}

/// UI state driven by the display loop
pub struct App {
    pub(crate) manager: TabManager,
    registry: SessionRegistry,
    pub(crate) entries: Vec<SidebarEntry>,
    pub(crate) cursor: usize,
    pub(crate) focus: Focus,
    pub(crate) show_help: bool,
    pub(crate) status: Option<String>,
    pub(crate) view: Option<TabView>,
    transcript_dir: PathBuf,
    logger: Arc<AppLogger>,
    should_quit: bool,
}

impl App {
    pub fn new(
        manager: TabManager,
        registry: SessionRegistry,
        transcript_dir: PathBuf,
        logger: Arc<AppLogger>,
    ) -> Self {
        let mut app = Self {
            manager,
            registry,
            entries: Vec::new(),
            cursor: 0,
            focus: Focus::Sidebar,
            show_help: false,
            status: None,
            view: None,
            transcript_dir,
            logger,
            should_quit: false,
        };
        app.reload();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn manager(&self) -> &TabManager {
        &self.manager
    }

    /// Rebuild the sidebar from the registry file
    pub fn reload(&mut self) {
        if let Err(e) = self.registry.try_load() {
            self.status = Some(format!("Sessions file unreadable: {}", e));
        }
        self.entries = self
            .registry
            .grouped()
            .into_iter()
            .flat_map(|(folder, sessions)| {
                std::iter::once(SidebarEntry::Folder(folder))
                    .chain(sessions.into_iter().map(SidebarEntry::Session))
            })
            .collect();
        self.cursor = self.cursor.min(self.entries.len().saturating_sub(1));
    }

    /// Pull bridge updates; returns true when the screen needs a redraw
    pub fn tick(&mut self) -> bool {
        let view = self.manager.tick();
        let changed = match (&view, &self.view) {
            (Some(view), _) if view.changed => true,
            (Some(view), Some(previous)) => view.id != previous.id,
            (None, None) => false,
            _ => true,
        };
        self.view = view;
        changed
    }

    pub fn handle_key(&mut self, event: KeyEvent) {
        if self.show_help {
            self.show_help = false;
            return;
        }

        if let Some(action) = action_for(&event, self.focus == Focus::Sidebar) {
            self.perform(action);
            return;
        }

        // Reserved chords work from either pane; everything else only reaches
        // a bridge while the terminal has focus
        if self.focus == Focus::Terminal || reserved_command(&event).is_some() {
            let outcome = self.manager.route(event);
            self.apply_route(outcome);
        }
    }

    fn apply_route(&mut self, outcome: RouteOutcome) {
        match outcome {
            RouteOutcome::Reserved(FocusCommand::FocusSidebar) => self.focus = Focus::Sidebar,
            RouteOutcome::Reserved(FocusCommand::FocusTerminal) => {
                if self.manager.active().is_some() {
                    self.focus = Focus::Terminal;
                }
            }
            RouteOutcome::Reserved(FocusCommand::ToggleBroadcast) => {
                self.status = Some(if self.manager.is_broadcasting() {
                    "Broadcast on: input goes to every connected tab".to_string()
                } else {
                    "Broadcast off".to_string()
                });
            }
            RouteOutcome::Reserved(_) | RouteOutcome::Delivered(_) | RouteOutcome::Untranslatable => {}
            RouteOutcome::Broadcast(count) => {
                if count == 0 {
                    self.status = Some("Broadcast reached no connected tab".to_string());
                }
            }
            RouteOutcome::NoActiveTab => self.focus = Focus::Sidebar,
            RouteOutcome::DeliveryFailed(e) => self.status = Some(e.to_string()),
        }
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Connect => self.connect_selected(),
            Action::CursorUp => self.cursor = self.cursor.saturating_sub(1),
            Action::CursorDown => {
                if self.cursor + 1 < self.entries.len() {
                    self.cursor += 1;
                }
            }
            Action::CloseTab => self.close_active(),
            Action::SaveTranscript => self.save_transcript(),
            Action::DeleteEntry => self.delete_selected(),
            Action::Reload => self.reload(),
            Action::ToggleHelp => self.show_help = true,
        }
    }

    pub fn selected(&self) -> Option<&SidebarEntry> {
        self.entries.get(self.cursor)
    }

    fn connect_selected(&mut self) {
        let Some(SidebarEntry::Session(config)) = self.selected().cloned() else {
            return;
        };
        self.manager.open_or_focus(&config);
        self.focus = Focus::Terminal;
        self.status = Some(format!("Connecting to {}", config.address()));
    }

    fn close_active(&mut self) {
        let Some(id) = self.manager.active() else {
            self.status = Some("No open tab".to_string());
            return;
        };
        self.manager.close(id);
        if self.manager.active().is_none() {
            self.focus = Focus::Sidebar;
        }
    }

    fn save_transcript(&mut self) {
        let Some(id) = self.manager.active() else {
            self.status = Some("No active session to save".to_string());
            return;
        };
        self.status = Some(match self.manager.save_transcript(id, &self.transcript_dir) {
            Ok(path) => format!("Saved screen to {}", path.display()),
            Err(e) => format!("Save failed: {}", e),
        });
    }

    fn delete_selected(&mut self) {
        let result = match self.selected().cloned() {
            Some(SidebarEntry::Session(config)) => self
                .registry
                .remove(&config.id)
                .map(|removed| format!("Deleted {}", removed.display_name())),
            Some(SidebarEntry::Folder(folder)) => self
                .registry
                .remove_folder(&folder)
                .map(|count| format!("Deleted folder {} ({} sessions)", folder, count)),
            None => return,
        };
        match result {
            Ok(message) => {
                self.logger.info("ui", &message, json!(null));
                self.status = Some(message);
            }
            Err(e) => self.status = Some(format!("Delete failed: {}", e)),
        }
        self.reload();
    }
}
