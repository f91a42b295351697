//! Server network layer: TCP accept loop and per-connection tasks
//!
//! Every accepted connection becomes one session served by two tasks. The
//! reader task decodes frames and hands packets to the [`Arena`]; the writer
//! task drains the session's bounded outbound queue onto the socket. The
//! broadcaster only ever pushes into that queue, so a stalled socket holds
//! up nobody but its own writer.

use crate::arena::Arena;
use crate::config::ServerConfig;
use log::{debug, error, info, warn};
use shared::codec::{decode_packet, read_frame, write_packet, CodecError};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Main server owning the listener and the arena it feeds
pub struct Server {
    listener: TcpListener,
    arena: Arc<Arena>,
}

impl Server {
    pub async fn new(
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(config.bind_address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            arena: Arena::new(config),
        })
    }

    /// Address actually bound, useful when binding to port 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn arena(&self) -> Arc<Arena> {
        Arc::clone(&self.arena)
    }

    /// Runs the snapshot broadcaster and accepts connections until the
    /// future is dropped.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _snapshots = self.arena.spawn_snapshot_broadcaster();

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let arena = Arc::clone(&self.arena);
                    tokio::spawn(handle_connection(arena, stream, addr));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Serves one connection from admission to disconnect.
async fn handle_connection(arena: Arc<Arena>, stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }
    let (mut reader, mut writer) = stream.into_split();
    let (outbox, mut inbox) =
        mpsc::channel::<Arc<Packet>>(arena.config().outbound_queue.max(1));

    let mut session = match arena.sessions().connect(addr, outbox) {
        Some(session) => session,
        None => {
            let rejection = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            if let Err(e) = write_packet(&mut writer, &rejection).await {
                debug!("Failed to send rejection to {}: {}", addr, e);
            }
            let _ = writer.shutdown().await;
            return;
        }
    };

    let session_id = session.id;
    let writer_task = tokio::spawn(async move {
        while let Some(packet) = inbox.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                debug!("Send to session {} failed: {}", session_id, e);
                break;
            }
        }
    });

    loop {
        match read_frame(&mut reader).await {
            Ok(Some(payload)) => match decode_packet(&payload) {
                Ok(packet) => {
                    if !arena.dispatch(&mut session, packet) {
                        debug!("Session {} said goodbye", session.id);
                        break;
                    }
                }
                Err(e) => warn!("Undecodable frame from session {}: {}", session.id, e),
            },
            Ok(None) => break,
            Err(CodecError::FrameTooLarge(len)) => {
                warn!(
                    "Session {} sent a {} byte frame, closing connection",
                    session.id, len
                );
                break;
            }
            Err(e) => {
                debug!("Read from session {} failed: {}", session.id, e);
                break;
            }
        }
    }

    arena.sessions().disconnect(&mut session);
    writer_task.abort();
}
