use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use neurossh::tui::{App, Focus};
use neurossh_logging::AppLogger;
use neurossh_store::SessionRegistry;
use neurossh_terminal::{
    BridgeError, BridgeOptions, ConnectTarget, Connector, Geometry, ShellChannel, TabManager,
};
use neurossh_types::{BridgeState, Credential, Key, KeyEvent, SessionConfig, StaticCredentials};
use pretty_assertions::assert_eq;
use tokio::runtime::Handle;

/// Records what the UI writes; never produces output
struct RecordingChannel {
    log: Arc<Mutex<Vec<u8>>>,
}

impl ShellChannel for RecordingChannel {
    fn try_read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.log.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {}
}

#[derive(Default)]
struct RecordingConnector {
    log: Arc<Mutex<Vec<u8>>>,
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        _target: &ConnectTarget,
        _credential: &Credential,
        _geometry: Geometry,
    ) -> Result<Box<dyn ShellChannel>, BridgeError> {
        Ok(Box::new(RecordingChannel {
            log: Arc::clone(&self.log),
        }))
    }

    fn connector_name(&self) -> &str {
        "recording"
    }
}

async fn connected_app(dir: &std::path::Path, connector: Arc<RecordingConnector>) -> App {
    let registry = SessionRegistry::new(dir.join("sessions.yaml"));
    registry.upsert(SessionConfig::new("lab", "192.0.2.12")).unwrap();

    let manager = TabManager::new(Handle::current(), connector, Arc::new(StaticCredentials::default()))
        .with_options(BridgeOptions {
            poll_interval: Duration::from_millis(10),
            ..BridgeOptions::default()
        });
    let mut app = App::new(manager, registry, dir.join("transcripts"), Arc::new(AppLogger::disabled()));

    // Root folder, then the session below it
    app.handle_key(KeyEvent::plain(Key::Down));
    app.handle_key(KeyEvent::plain(Key::Enter));
    assert_eq!(app.focus(), Focus::Terminal);

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        app.tick();
        if app.manager().tabs().first().map(|tab| tab.state.clone()) == Some(BridgeState::Connected) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(app.manager().tabs()[0].state, BridgeState::Connected);
    app
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_function_keys_reach_focused_terminal() {
    let tmp = tempfile::tempdir().unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let mut app = connected_app(tmp.path(), Arc::clone(&connector)).await;

    app.handle_key(KeyEvent::plain(Key::F(1)));
    app.handle_key(KeyEvent::plain(Key::BackTab));
    app.handle_key(KeyEvent::char('q'));

    assert_eq!(connector.log.lock().unwrap().as_slice(), b"\x1bOP\x1b[Zq");
    assert!(!app.should_quit());
    assert_eq!(app.focus(), Focus::Terminal);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_focus_chord_returns_function_keys_to_the_ui() {
    let tmp = tempfile::tempdir().unwrap();
    let connector = Arc::new(RecordingConnector::default());
    let mut app = connected_app(tmp.path(), Arc::clone(&connector)).await;

    app.handle_key(KeyEvent::ctrl(Key::Char('h')));
    assert_eq!(app.focus(), Focus::Sidebar);
    app.handle_key(KeyEvent::plain(Key::F(1)));

    assert!(connector.log.lock().unwrap().is_empty());
}
