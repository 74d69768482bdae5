//! SSH transport.
//!
//! Opens an interactive shell over SSH with password authentication. The
//! russh channel is driven by a pump task that moves inbound data onto a
//! queue, so the bridge can drain it with non-blocking reads on its own tick.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use neurossh_logging::AppLogger;
use neurossh_types::Credential;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use serde_json::json;
use tokio::sync::mpsc::{self, error::TryRecvError, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::error::BridgeError;
use crate::transport::{ConnectTarget, Connector, Geometry, ShellChannel};

/// SSH client handler.
struct SshHandler {
    host: String,
    logger: Arc<AppLogger>,
}

#[async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host key verification is out of scope; accept and leave a trace
        self.logger.warn(
            "ssh",
            "host key not verified, accepting",
            json!({ "host": self.host }),
        );
        Ok(true)
    }
}

/// Connector that authenticates with username/password and requests an
/// `xterm` PTY plus a login shell.
pub struct SshConnector {
    keepalive_interval: Duration,
    logger: Arc<AppLogger>,
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("keepalive_interval", &self.keepalive_interval)
            .finish()
    }
}

impl SshConnector {
    pub fn new(logger: Arc<AppLogger>) -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            logger,
        }
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        credential: &Credential,
        geometry: Geometry,
    ) -> Result<Box<dyn ShellChannel>, BridgeError> {
        let address = target.address();
        self.logger.info(
            "ssh",
            "connecting",
            json!({ "address": address, "user": credential.username }),
        );

        let config = Arc::new(client::Config {
            keepalive_interval: Some(self.keepalive_interval),
            keepalive_max: 3,
            ..Default::default()
        });
        let handler = SshHandler {
            host: target.host.clone(),
            logger: Arc::clone(&self.logger),
        };

        let mut handle = client::connect(config, (target.host.as_str(), target.port), handler)
            .await
            .map_err(|e| BridgeError::Connect {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let accepted = handle
            .authenticate_password(credential.username.clone(), credential.secret.clone())
            .await
            .map_err(|e| BridgeError::Connect {
                address: address.clone(),
                message: format!("authentication error: {}", e),
            })?;
        if !accepted {
            return Err(BridgeError::AuthRejected(credential.username.clone()));
        }

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| BridgeError::Shell(format!("failed to open session channel: {}", e)))?;
        channel
            .request_pty(
                false,
                &target.term,
                u32::from(geometry.cols),
                u32::from(geometry.rows),
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| BridgeError::Shell(format!("pty request failed: {}", e)))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| BridgeError::Shell(format!("shell request failed: {}", e)))?;

        self.logger.info("ssh", "shell established", json!({ "address": address }));
        Ok(Box::new(SshChannel::spawn(handle, channel)))
    }

    fn connector_name(&self) -> &str {
        "ssh"
    }
}

/// Inbound messages held between the pump and the bridge. Once full, the
/// pump stops reading the channel and the SSH window closes.
const INBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
enum Inbound {
    Data(Vec<u8>),
    Closed,
    Error(String),
}

fn inbound_queue() -> (Sender<Inbound>, Receiver<Inbound>) {
    mpsc::channel(INBOUND_QUEUE_DEPTH)
}

/// Queue-backed view of a russh channel
struct SshChannel {
    inbound: Receiver<Inbound>,
    outbound: Option<UnboundedSender<Vec<u8>>>,
    pending: Vec<u8>,
    pump: Option<JoinHandle<()>>,
}

impl SshChannel {
    fn new(
        inbound: Receiver<Inbound>,
        outbound: UnboundedSender<Vec<u8>>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            inbound,
            outbound: Some(outbound),
            pending: Vec::new(),
            pump,
        }
    }

    fn spawn(handle: client::Handle<SshHandler>, channel: russh::Channel<client::Msg>) -> Self {
        let (inbound_tx, inbound) = inbound_queue();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(handle, channel, inbound_tx, outbound_rx));
        Self::new(inbound, outbound, Some(pump))
    }
}

impl ShellChannel for SshChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.inbound.try_recv() {
                Ok(Inbound::Data(data)) => self.pending = data,
                Ok(Inbound::Closed) | Err(TryRecvError::Disconnected) => return Ok(0),
                Ok(Inbound::Error(message)) => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, message))
                }
                Err(TryRecvError::Empty) => return Err(io::ErrorKind::WouldBlock.into()),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "ssh channel closed"))?;
        outbound
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "ssh channel closed"))
    }

    fn close(&mut self) {
        // Dropping the sender makes the pump send EOF and disconnect
        self.outbound.take();
        // Detach; the pump finishes on its own once it sees the closed queue
        self.pump.take();
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(
    handle: client::Handle<SshHandler>,
    mut channel: russh::Channel<client::Msg>,
    inbound: Sender<Inbound>,
    mut outbound: UnboundedReceiver<Vec<u8>>,
) {
    // Data read from the channel but not yet queued; the channel is not
    // read again until it has been handed over
    let mut backlog: Option<Vec<u8>> = None;
    loop {
        tokio::select! {
            permit = inbound.reserve(), if backlog.is_some() => match permit {
                Ok(permit) => {
                    if let Some(data) = backlog.take() {
                        permit.send(Inbound::Data(data));
                    }
                }
                Err(_) => break,
            },
            msg = channel.wait(), if backlog.is_none() => match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    backlog = Some(data.to_vec());
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    let _ = inbound.send(Inbound::Closed).await;
                    break;
                }
                Some(_) => {}
            },
            out = outbound.recv() => match out {
                Some(bytes) => {
                    if let Err(e) = channel.data(&bytes[..]).await {
                        if let Some(data) = backlog.take() {
                            let _ = inbound.send(Inbound::Data(data)).await;
                        }
                        let _ = inbound.send(Inbound::Error(e.to_string())).await;
                        break;
                    }
                }
                None => {
                    let _ = channel.eof().await;
                    break;
                }
            },
        }
    }
    let _ = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await;
}
