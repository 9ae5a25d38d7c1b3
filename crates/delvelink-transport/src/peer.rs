//! The peer connection: one reliable, ordered stream per session.
//!
//! The host binds a [`PeerListener`] and accepts exactly one guest at a
//! time (a newer guest replaces an older one; the session layer drops the
//! stale link). The guest opens a [`PeerLink`] with a bounded connect
//! timeout. Either way the link spawns a dedicated receive task that
//! decodes frames and pushes them onto the [`InboundQueue`]; nothing on
//! the receive path ever touches game state directly.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use delvelink_protocol::{Codec, JsonCodec, Message};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::framing::{read_frame, write_frame};
use crate::{InboundQueue, TransportError};

/// Listening side of the peer connection (host role).
pub struct PeerListener {
    listener: TcpListener,
}

impl PeerListener {
    /// Binds the listening socket. Port 0 asks the OS for an ephemeral
    /// port; use [`local_addr`](Self::local_addr) to learn what was
    /// assigned.
    pub async fn bind(preferred_port: u16) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(("0.0.0.0", preferred_port))
                .await
                .map_err(TransportError::BindFailed)?;
        tracing::info!(
            addr = %listener.local_addr().map_err(TransportError::BindFailed)?,
            "peer listener bound"
        );
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next guest and wires it to the queue.
    ///
    /// The caller re-arms this after a guest leaves; the room persists
    /// across guest disconnects.
    pub async fn accept(
        &self,
        queue: InboundQueue,
    ) -> Result<PeerLink, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%addr, "guest connected");
        Ok(PeerLink::from_stream(stream, addr, queue))
    }
}

/// A live connection to the other peer.
///
/// Dropping the link aborts its receive task.
pub struct PeerLink {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    connected: Arc<AtomicBool>,
    recv_task: JoinHandle<()>,
    peer_addr: SocketAddr,
    queue: InboundQueue,
    codec: JsonCodec,
}

impl PeerLink {
    /// Opens an outbound connection (guest role).
    ///
    /// On timeout or refusal this returns an error with no side effects;
    /// nothing was enqueued, no task spawned.
    pub async fn connect(
        addr: SocketAddr,
        timeout: Duration,
        queue: InboundQueue,
    ) -> Result<Self, TransportError> {
        let stream =
            match tokio::time::timeout(timeout, TcpStream::connect(addr))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(TransportError::ConnectFailed(e)),
                Err(_) => return Err(TransportError::ConnectTimeout(timeout)),
            };
        tracing::info!(%addr, "connected to host");
        Ok(Self::from_stream(stream, addr, queue))
    }

    /// Wraps an established stream: splits it and spawns the receive task.
    fn from_stream(
        stream: TcpStream,
        peer_addr: SocketAddr,
        queue: InboundQueue,
    ) -> Self {
        // Turn-based traffic is small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "set_nodelay failed");
        }

        let (read_half, write_half) = stream.into_split();
        let connected = Arc::new(AtomicBool::new(true));

        let recv_task = tokio::spawn(recv_loop(
            read_half,
            queue.clone(),
            Arc::clone(&connected),
            peer_addr,
        ));

        Self {
            writer: Arc::new(Mutex::new(write_half)),
            connected,
            recv_task,
            peer_addr,
            queue,
            codec: JsonCodec,
        }
    }

    /// Encodes, frames, and writes a message to the peer.
    ///
    /// A no-op when the link is already down. A write failure is peer
    /// loss, not a caller error: the link marks itself disconnected and
    /// enqueues a synthetic `Disconnect` so the session state machine
    /// handles it on the next tick. Only encode failures return `Err`.
    pub async fn send(&self, msg: &Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            tracing::debug!(kind = msg.kind(), "send skipped, link down");
            return Ok(());
        }

        let payload = self.codec.encode(msg)?;
        let mut writer = self.writer.lock().await;
        if let Err(e) = write_frame(&mut *writer, &payload).await {
            tracing::warn!(kind = msg.kind(), error = %e, "send failed, treating as peer loss");
            if self.connected.swap(false, Ordering::AcqRel) {
                self.queue.enqueue(Message::Disconnect);
            }
        }
        Ok(())
    }

    /// Whether the link believes the peer is still there.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Tears the link down without enqueueing a synthetic disconnect.
    /// Idempotent.
    pub async fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            use tokio::io::AsyncWriteExt;
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }
        self.recv_task.abort();
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// Dedicated receive loop for one connection.
///
/// Decoded messages go onto the queue in arrival order. A frame that
/// fails to decode is logged and skipped. EOF, read errors, and corrupt
/// framing all end the loop the same way: one synthetic `Disconnect` on
/// the queue, never an error into the simulation.
async fn recv_loop(
    mut reader: OwnedReadHalf,
    queue: InboundQueue,
    connected: Arc<AtomicBool>,
    peer_addr: SocketAddr,
) {
    let codec = JsonCodec;
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(payload)) => {
                match codec.decode::<Message>(&payload) {
                    Ok(msg) => queue.enqueue(msg),
                    Err(e) => {
                        tracing::warn!(
                            %peer_addr,
                            error = %e,
                            "undecodable frame skipped"
                        );
                    }
                }
            }
            Ok(None) => {
                tracing::info!(%peer_addr, "peer closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(%peer_addr, error = %e, "receive loop error");
                break;
            }
        }
    }

    // Exactly one synthetic Disconnect per link, even if send() raced us.
    if connected.swap(false, Ordering::AcqRel) {
        queue.enqueue(Message::Disconnect);
    }
}
