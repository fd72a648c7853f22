//! Interactive remote-shell transport for one node.
//!
//! A [`SessionHandle`] owns exactly one live connection: the SSH client, the
//! PTY-backed shell channel, and the I/O task pumping that channel into a
//! pair of text channels. At most one handle is ever live at a time because
//! the fleet driver processes nodes strictly sequentially.

use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use log::debug;
use russh::ChannelMsg;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::config::SessionTuning;
use crate::error::BackupError;
use crate::ssh;

const CHANNEL_CAPACITY: usize = 256;

/// Exclusive owner of one live shell session to one host.
///
/// Created when a session opens, destroyed when the orchestrator is done with
/// the node, success or failure. Never shared across nodes.
pub struct SessionHandle {
    /// Underlying SSH client; `None` for in-memory handles used in tests.
    client: Option<Client>,
    sender: Sender<String>,
    recv: Receiver<String>,
    closed: bool,
}

/// The device side of an in-memory session, for tests without SSH.
pub struct LoopbackDevice {
    /// Text the session wrote, one send per message.
    pub input: Receiver<String>,
    /// Chunks the fake device emits into the session's read stream.
    pub output: Sender<String>,
}

impl SessionHandle {
    /// Opens an interactive shell session to `addr` with password auth.
    ///
    /// Fails with [`BackupError::ConnectionTimeout`] when establishment
    /// exceeds the tuning's connect budget and
    /// [`BackupError::ConnectionRefused`] when the host rejects the TCP
    /// connection outright.
    pub async fn open(
        addr: &str,
        port: u16,
        user: &str,
        password: &str,
        tuning: &SessionTuning,
    ) -> Result<SessionHandle, BackupError> {
        let host = format!("{user}@{addr}:{port}");

        let config = Config {
            preferred: ssh::compat_preferred(),
            // Expect timeouts bound the session; the transport must not kill
            // a connection mid settle-delay.
            inactivity_timeout: None,
            ..Default::default()
        };

        let connect = Client::connect_with_config(
            (addr.to_string(), port),
            user,
            AuthMethod::with_password(password),
            ServerCheckMethod::NoCheck,
            config,
        );
        let client = match tokio::time::timeout(tuning.connect_timeout, connect).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => return Err(classify_connect_error(&host, err)),
            Err(_) => return Err(BackupError::ConnectionTimeout(host)),
        };
        debug!("{} TCP connection successful", host);

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", host);

        let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (sender_to_user, receiver_from_shell) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = receiver_from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{} Failed to send data to shell: {:?}", host, e);
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                if let Ok(s) = std::str::from_utf8(data)
                                    && sender_to_user.send(s.to_string()).await.is_err() {
                                        debug!("{} Shell output receiver dropped. Closing task.", host);
                                        break;
                                    }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{} Shell exited with status code: {}", host, exit_status);
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{} Shell sent EOF.", host);
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            debug!("{} Session I/O task ended.", host);
        });

        Ok(Self {
            client: Some(client),
            sender: sender_to_shell,
            recv: receiver_from_shell,
            closed: false,
        })
    }

    /// Builds a handle wired to an in-process device instead of SSH.
    pub fn in_memory() -> (SessionHandle, LoopbackDevice) {
        let (sender_to_device, input) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (output, receiver_from_device) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let handle = SessionHandle {
            client: None,
            sender: sender_to_device,
            recv: receiver_from_device,
            closed: false,
        };
        (handle, LoopbackDevice { input, output })
    }

    /// Whether the underlying connection is still usable.
    pub fn is_live(&self) -> bool {
        if self.closed {
            return false;
        }
        match &self.client {
            Some(client) => !client.is_closed(),
            None => !self.sender.is_closed(),
        }
    }

    /// Writes raw text to the remote shell's input stream.
    pub async fn send(&mut self, text: &str) -> Result<(), BackupError> {
        if !self.is_live() {
            return Err(BackupError::SessionClosed);
        }
        self.sender
            .send(text.to_string())
            .await
            .map_err(|_| BackupError::SessionClosed)
    }

    /// Writes a line (text plus newline) to the remote shell.
    pub async fn send_line(&mut self, text: &str) -> Result<(), BackupError> {
        self.send(&format!("{text}\n")).await
    }

    /// Receives the next chunk of shell output, `None` once the remote side
    /// is gone.
    pub(crate) async fn recv(&mut self) -> Option<String> {
        self.recv.recv().await
    }

    /// Terminates the session. Idempotent; never fails.
    ///
    /// Sends a best-effort `exit` so well-behaved devices log the session
    /// out, then stops receiving. The SSH client itself closes on drop.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let remote_alive = match &self.client {
            Some(client) => !client.is_closed(),
            None => !self.sender.is_closed(),
        };
        if remote_alive {
            if let Err(e) = self.sender.send("exit\n".to_string()).await {
                debug!("Failed to send exit command: {:?}", e);
            }
            if self.client.is_some() {
                // Give a real device a moment to process the logout.
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        self.recv.close();
        debug!("Session closed");
    }
}

/// Maps a connect-phase SSH failure onto the node-scoped error kinds.
fn classify_connect_error(host: &str, err: async_ssh2_tokio::Error) -> BackupError {
    // russh buries the TCP refusal inside its error chain; the rendered
    // message is the one stable way to spot it across wrapper versions.
    if err.to_string().to_lowercase().contains("connection refused") {
        return BackupError::ConnectionRefused(host.to_string());
    }
    BackupError::Ssh(err)
}
