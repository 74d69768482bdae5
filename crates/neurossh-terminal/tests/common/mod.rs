#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use neurossh_terminal::{BridgeError, ConnectTarget, Connector, Geometry, ShellChannel};
use neurossh_types::Credential;

/// In-memory stand-in for one remote shell connection
#[derive(Debug, Default)]
pub struct Wire {
    pub inbound: VecDeque<Vec<u8>>,
    pub eof: bool,
    pub reset: bool,
    pub fail_writes: bool,
    pub written: Vec<u8>,
    pub close_count: usize,
    pub geometry: Option<Geometry>,
    pub username: Option<String>,
}

pub type SharedWire = Arc<Mutex<Wire>>;

pub fn push(wire: &SharedWire, data: &[u8]) {
    wire.lock().unwrap().inbound.push_back(data.to_vec());
}

pub fn written(wire: &SharedWire) -> Vec<u8> {
    wire.lock().unwrap().written.clone()
}

pub fn close_count(wire: &SharedWire) -> usize {
    wire.lock().unwrap().close_count
}

struct MockChannel {
    wire: SharedWire,
}

impl ShellChannel for MockChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        if wire.reset {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        }
        match wire.inbound.pop_front() {
            Some(mut chunk) => {
                let n = buf.len().min(chunk.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    wire.inbound.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
            None if wire.eof => Ok(0),
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        if wire.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        wire.written.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {
        self.wire.lock().unwrap().close_count += 1;
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Accept,
    Refuse(String),
    Hang,
}

/// Connector handing out one wire per host name
pub struct MockConnector {
    behavior: Behavior,
    wires: Mutex<HashMap<String, SharedWire>>,
    connects: Mutex<usize>,
}

impl MockConnector {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            wires: Mutex::new(HashMap::new()),
            connects: Mutex::new(0),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new(Behavior::Accept)
    }

    /// The wire for `host`, created on first use so tests can preload data
    pub fn wire(&self, host: &str) -> SharedWire {
        self.wires
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .clone()
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        credential: &Credential,
        geometry: Geometry,
    ) -> Result<Box<dyn ShellChannel>, BridgeError> {
        *self.connects.lock().unwrap() += 1;
        match &self.behavior {
            Behavior::Accept => {
                let wire = self.wire(&target.host);
                {
                    let mut guard = wire.lock().unwrap();
                    guard.geometry = Some(geometry);
                    guard.username = Some(credential.username.clone());
                }
                Ok(Box::new(MockChannel { wire }))
            }
            Behavior::Refuse(message) => Err(BridgeError::Connect {
                address: target.address(),
                message: message.clone(),
            }),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn connector_name(&self) -> &str {
        "mock"
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
