use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use neurossh_logging::AppLogger;
use neurossh_types::{BridgeState, Credential, SessionConfig};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::logger::SessionLogger;
use crate::screen_buffer::{ScreenBuffer, ScreenSnapshot};
use crate::transport::{ConnectTarget, Connector, Geometry, ShellChannel};
use crate::{
    TabId, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TERM,
    MAX_CHUNKS_PER_POLL, READ_CHUNK_BYTES,
};

/// Tunables for one bridge
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub geometry: Geometry,
    pub term: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            geometry: Geometry::default(),
            term: DEFAULT_TERM.to_string(),
        }
    }
}

/// Notifications posted by bridge tasks for the display loop to drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeNotice {
    StateChanged { tab: TabId, state: BridgeState },
}

/// Everything a bridge needs from its owner, besides the target itself
#[derive(Clone)]
pub struct BridgeContext {
    pub runtime: Handle,
    pub connector: Arc<dyn Connector>,
    pub notices: Option<UnboundedSender<BridgeNotice>>,
    pub logger: Arc<AppLogger>,
    pub io_log_dir: Option<PathBuf>,
}

impl BridgeContext {
    pub fn new(runtime: Handle, connector: Arc<dyn Connector>) -> Self {
        Self {
            runtime,
            connector,
            notices: None,
            logger: Arc::new(AppLogger::disabled()),
            io_log_dir: None,
        }
    }
}

/// Result of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was ready
    Idle,
    /// This many bytes were fed to the screen
    Data(usize),
    /// The remote side went away; the bridge is now terminal
    Lost,
    /// The bridge holds no connection (not yet connected, or already closed)
    Inactive,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between a bridge, its background task and sequencer handles.
/// Bridges never hold a reference to their manager.
struct BridgeShared {
    tab: TabId,
    label: String,
    state: Mutex<BridgeState>,
    screen: Mutex<ScreenBuffer>,
    channel: Mutex<Option<Box<dyn ShellChannel>>>,
    last_error: Mutex<Option<String>>,
    io_log: Option<Mutex<SessionLogger>>,
    dirty: AtomicBool,
    released: AtomicBool,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    notices: Option<UnboundedSender<BridgeNotice>>,
    logger: Arc<AppLogger>,
}

impl BridgeShared {
    fn state(&self) -> BridgeState {
        lock(&self.state).clone()
    }

    fn notify(&self, notice: BridgeNotice) {
        if let Some(notices) = &self.notices {
            // The receiver is gone once the manager is dropped
            let _ = notices.send(notice);
        }
    }

    /// Apply a legal state change; illegal ones are ignored and return false
    fn transition(&self, next: BridgeState) -> bool {
        {
            let mut state = lock(&self.state);
            if !state.can_transition_to(&next) {
                return false;
            }
            *state = next.clone();
        }

        if let BridgeState::Failed(reason) = &next {
            *lock(&self.last_error) = Some(reason.clone());
            self.logger.warn(
                "bridge",
                "bridge failed",
                json!({ "tab": self.tab, "label": self.label, "reason": reason }),
            );
        } else {
            self.logger.info(
                "bridge",
                "state changed",
                json!({ "tab": self.tab, "label": self.label, "state": next.label() }),
            );
        }
        if let Some(io_log) = &self.io_log {
            let _ = lock(io_log).log_state(&next);
        }
        self.notify(BridgeNotice::StateChanged {
            tab: self.tab,
            state: next,
        });
        true
    }

    /// Hand a freshly connected channel to the bridge. If the bridge was
    /// closed while connecting, the channel is released right away.
    fn attach(&self, mut channel: Box<dyn ShellChannel>) -> bool {
        let mut slot = lock(&self.channel);
        if self.released.load(Ordering::SeqCst) {
            channel.close();
            return false;
        }
        *slot = Some(channel);
        drop(slot);
        self.transition(BridgeState::Connected)
    }

    /// Take the channel out of its slot and close it; only the first caller
    /// finds it there.
    fn release_channel(&self) -> bool {
        let taken = lock(&self.channel).take();
        match taken {
            Some(mut channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    fn digest(&self, data: &[u8]) {
        lock(&self.screen).process_output(data);
        if let Some(io_log) = &self.io_log {
            let _ = lock(io_log).log_output(data);
        }
        self.bytes_in.fetch_add(data.len() as u64, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    fn poll(&self) -> PollOutcome {
        let mut slot = lock(&self.channel);
        let Some(channel) = slot.as_mut() else {
            return PollOutcome::Inactive;
        };

        let mut buffer = [0u8; READ_CHUNK_BYTES];
        let mut total = 0;
        let mut lost: Option<Option<String>> = None;

        for _ in 0..MAX_CHUNKS_PER_POLL {
            match channel.try_read(&mut buffer) {
                Ok(0) => {
                    // EOF - remote shell exited
                    lost = Some(None);
                    break;
                }
                Ok(n) => {
                    self.digest(&buffer[..n]);
                    total += n;
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    break;
                }
                Err(e) => {
                    lost = Some(Some(e.to_string()));
                    break;
                }
            }
        }

        match lost {
            None if total > 0 => PollOutcome::Data(total),
            None => PollOutcome::Idle,
            Some(reason) => {
                if let Some(mut channel) = slot.take() {
                    channel.close();
                }
                drop(slot);
                if let Some(reason) = reason {
                    *lock(&self.last_error) = Some(reason);
                }
                self.transition(BridgeState::Closed);
                PollOutcome::Lost
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<usize, BridgeError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(BridgeError::NotConnected(state));
        }

        let result = {
            let mut slot = lock(&self.channel);
            match slot.as_mut() {
                Some(channel) => channel.write_all(data),
                None => return Err(BridgeError::NotConnected(self.state())),
            }
        };

        match result {
            Ok(()) => {
                if let Some(io_log) = &self.io_log {
                    let _ = lock(io_log).log_input(data);
                }
                self.bytes_out.fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(data.len())
            }
            Err(e) => {
                self.release_channel();
                self.transition(BridgeState::Failed(format!("write failed: {}", e)));
                Err(BridgeError::Write(e))
            }
        }
    }
}

/// One remote shell: connection, screen, and the background task that links them.
///
/// Dropping a bridge closes it.
pub struct Bridge {
    shared: Arc<BridgeShared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("tab", &self.shared.tab)
            .field("label", &self.shared.label)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl Bridge {
    /// Start connecting in the background and return immediately.
    ///
    /// The credential is moved into the background task and dropped as soon
    /// as the connection attempt finishes.
    pub fn open(
        tab: TabId,
        config: &SessionConfig,
        credential: Credential,
        options: &BridgeOptions,
        context: &BridgeContext,
    ) -> Self {
        let label = config.display_name().to_string();
        let io_log = context.io_log_dir.as_ref().and_then(|dir| {
            match SessionLogger::new(tab, &label, dir) {
                Ok(logger) => Some(Mutex::new(logger)),
                Err(e) => {
                    context.logger.warn(
                        "bridge",
                        "session log unavailable",
                        json!({ "tab": tab, "error": e.to_string() }),
                    );
                    None
                }
            }
        });

        let shared = Arc::new(BridgeShared {
            tab,
            label,
            state: Mutex::new(BridgeState::Disconnected),
            screen: Mutex::new(ScreenBuffer::new(options.geometry.rows, options.geometry.cols)),
            channel: Mutex::new(None),
            last_error: Mutex::new(None),
            io_log,
            dirty: AtomicBool::new(true),
            released: AtomicBool::new(false),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            notices: context.notices.clone(),
            logger: Arc::clone(&context.logger),
        });

        let mut target = ConnectTarget::from(config);
        target.term = options.term.clone();
        let cancel = CancellationToken::new();
        let task = context.runtime.spawn(run_bridge(
            Arc::clone(&shared),
            Arc::clone(&context.connector),
            target,
            credential,
            options.clone(),
            cancel.clone(),
        ));

        Self {
            shared,
            cancel,
            task: Some(task),
        }
    }

    pub fn tab(&self) -> TabId {
        self.shared.tab
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    /// Human-readable cause of the last failure or connection loss
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Drain ready inbound data into the screen without blocking
    pub fn poll(&self) -> PollOutcome {
        self.shared.poll()
    }

    /// Write bytes to the remote shell; fails unless Connected
    pub fn send(&self, data: &[u8]) -> Result<usize, BridgeError> {
        self.shared.send(data)
    }

    /// Current screen; repeated calls without new data return the same snapshot
    pub fn snapshot(&self) -> Arc<ScreenSnapshot> {
        lock(&self.shared.screen).snapshot()
    }

    /// Whether new data arrived since the last call
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    /// (bytes received, bytes sent)
    pub fn traffic(&self) -> (u64, u64) {
        (
            self.shared.bytes_in.load(Ordering::Relaxed),
            self.shared.bytes_out.load(Ordering::Relaxed),
        )
    }

    /// Cloneable send-only handle, used by the command sequencer
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Stop the background task and release the connection.
    ///
    /// Returns true for the call that actually performed the teardown; every
    /// later call is a no-op returning false.
    pub fn close(&mut self) -> bool {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        // Signal background task to stop
        self.cancel.cancel();
        self.shared.release_channel();
        self.shared.transition(BridgeState::Closed);

        // Detach: the task ends at its next await point
        if let Some(task) = self.task.take() {
            task.abort();
        }
        true
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Send-only view of a bridge that can move to other tasks
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<BridgeShared>,
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("tab", &self.shared.tab)
            .finish()
    }
}

impl BridgeHandle {
    pub fn tab(&self) -> TabId {
        self.shared.tab
    }

    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    pub fn send(&self, data: &[u8]) -> Result<usize, BridgeError> {
        self.shared.send(data)
    }
}

async fn run_bridge(
    shared: Arc<BridgeShared>,
    connector: Arc<dyn Connector>,
    target: ConnectTarget,
    credential: Credential,
    options: BridgeOptions,
    cancel: CancellationToken,
) {
    if !shared.transition(BridgeState::Connecting) {
        return;
    }

    let attempt = tokio::time::timeout(
        options.connect_timeout,
        connector.connect(&target, &credential, options.geometry),
    );
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = attempt => outcome,
    };
    drop(credential);

    let channel = match outcome {
        Ok(Ok(channel)) => channel,
        Ok(Err(e)) => {
            shared.transition(BridgeState::Failed(e.to_string()));
            return;
        }
        Err(_) => {
            let e = BridgeError::Timeout(options.connect_timeout);
            shared.transition(BridgeState::Failed(e.to_string()));
            return;
        }
    };

    if !shared.attach(channel) {
        return;
    }

    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match shared.poll() {
                    PollOutcome::Idle | PollOutcome::Data(_) => {}
                    PollOutcome::Lost | PollOutcome::Inactive => break,
                }
            }
        }
    }
}
