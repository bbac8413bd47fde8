//! Connection dispatcher
//!
//! Binds every configured port at startup and runs one accept loop per
//! listener. Each listener carries an immutable protocol tag; an accepted
//! connection is handled by a spawned task that performs exactly one bounded
//! read, routes the bytes by the listener's tag, writes one response, and
//! closes.
//!
//! A bind failure at startup is fatal. Accept and read errors only cost the
//! affected connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::http;
use crate::protocol::packet::Custom1Frame;
use crate::state::AppState;

/// Static acknowledgement sent on every Custom1 connection that produced a
/// decodable frame
pub const CUSTOM1_ACK: &[u8] = b"Custom Protocol 1 Connected\n";

/// Static acknowledgement sent on every Custom2 connection
pub const CUSTOM2_ACK: &[u8] = b"Custom Protocol 2 Connected\n";

/// Upper bound on a single request read. The legacy clients send requests
/// well under this; anything longer is cut off, not reassembled.
const READ_BUFFER_SIZE: usize = 1024;

/// Which protocol a listener speaks, fixed at bind time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTag {
    Http,
    Custom1,
    Custom2,
}

impl std::fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "HTTP"),
            Self::Custom1 => write!(f, "Custom1"),
            Self::Custom2 => write!(f, "Custom2"),
        }
    }
}

/// Owns the listener sockets for the process lifetime
pub struct Dispatcher {
    state: Arc<AppState>,
    listeners: Vec<(TcpListener, ProtocolTag)>,
}

impl Dispatcher {
    /// Bind all configured ports. Any bind failure is returned as-is and
    /// should abort startup.
    pub async fn bind(state: Arc<AppState>) -> Result<Self> {
        let mut listeners = Vec::new();

        let mut plan: Vec<(u16, ProtocolTag)> = vec![(state.config.http_port, ProtocolTag::Http)];
        plan.extend(
            state
                .config
                .custom1_ports
                .iter()
                .map(|&port| (port, ProtocolTag::Custom1)),
        );
        plan.push((state.config.custom2_port, ProtocolTag::Custom2));

        for (port, tag) in plan {
            let listener = TcpListener::bind(("0.0.0.0", port)).await?;
            let addr = listener.local_addr()?;
            info!(%tag, %addr, "Listener bound");
            listeners.push((listener, tag));
        }

        Ok(Self { state, listeners })
    }

    /// Bound addresses in bind order (tests bind port 0 and read these back)
    pub fn local_addrs(&self) -> Vec<(SocketAddr, ProtocolTag)> {
        self.listeners
            .iter()
            .filter_map(|(listener, tag)| listener.local_addr().ok().map(|addr| (addr, *tag)))
            .collect()
    }

    /// Spawn one accept loop per listener. The returned handles complete once
    /// the shutdown channel fires.
    pub fn run(self) -> Vec<JoinHandle<()>> {
        let Self { state, listeners } = self;
        listeners
            .into_iter()
            .map(|(listener, tag)| {
                let state = state.clone();
                let shutdown_rx = state.shutdown_tx.subscribe();
                tokio::spawn(accept_loop(listener, tag, state, shutdown_rx))
            })
            .collect()
    }
}

async fn accept_loop(
    listener: TcpListener,
    tag: ProtocolTag,
    state: Arc<AppState>,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(%tag, %addr, "New connection");
                        let state = state.clone();
                        tokio::spawn(async move {
                            handle_connection(state, stream, addr, tag).await;
                        });
                    }
                    Err(e) => {
                        error!(%tag, "Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!(%tag, "Acceptor shutting down");
                break;
            }
        }
    }
}

/// One request, one response, close
async fn handle_connection(
    state: Arc<AppState>,
    mut stream: TcpStream,
    addr: SocketAddr,
    tag: ProtocolTag,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let n = match timeout(state.config.read_timeout(), stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(%tag, %addr, "Read error: {}", e);
            return;
        }
        Err(_) => {
            debug!(%tag, %addr, "Read deadline expired");
            return;
        }
    };
    let data = &buf[..n];

    let response: Option<Vec<u8>> = match tag {
        ProtocolTag::Http => {
            let raw = String::from_utf8_lossy(data);
            Some(http::handle_request(&state, &raw).await.into_bytes())
        }
        ProtocolTag::Custom1 => handle_custom1(&state, data, addr),
        ProtocolTag::Custom2 => Some(CUSTOM2_ACK.to_vec()),
    };

    if let Some(response) = response {
        if let Err(e) = stream.write_all(&response).await {
            warn!(%tag, %addr, "Write error: {}", e);
            return;
        }
    }
    let _ = stream.shutdown().await;
}

/// Decode and handle one Custom1 frame.
///
/// The connection gets a table entry for the duration of handling; a failed
/// handshake still gets the static acknowledgement and simply stays
/// unauthenticated. An undecodable buffer gets no reply at all.
fn handle_custom1(state: &Arc<AppState>, data: &[u8], addr: SocketAddr) -> Option<Vec<u8>> {
    let connection_id = state.connections.register();

    let response = match Custom1Frame::decode(data) {
        Ok(frame) => {
            if frame.is_login() {
                match state.handshake().authenticate(&frame, connection_id) {
                    Ok(login) => {
                        info!(
                            %addr,
                            connection_id,
                            customer_id = %login.customer_id,
                            "Custom1 login authenticated"
                        );
                    }
                    Err(e) => {
                        warn!(%addr, connection_id, "Custom1 login rejected: {}", e);
                    }
                }
            } else {
                debug!(
                    %addr,
                    message_id = frame.message_id,
                    "Unsupported Custom1 message id"
                );
            }
            Some(CUSTOM1_ACK.to_vec())
        }
        Err(e) => {
            warn!(%addr, connection_id, "Undecodable Custom1 frame: {}", e);
            None
        }
    };

    state.connections.remove(connection_id);
    response
}
