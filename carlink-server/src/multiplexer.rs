//! Connection loop.
//!
//! One task owns the listener and every client socket. Each iteration waits
//! once for the first of: a pending connection, a readable client, a
//! stop/flush wake-up or the poll interval. It then serves the listener and
//! every client with data, and flushes the outbound queue.

use crate::control::LoopSignal;
use crate::dispatcher::RequestDispatcher;
use crate::handler::LogSink;
use crate::registry::{ClientRegistry, MAX_CLIENTS};
use carlink_channel::OutboundQueue;
use carlink_core::{RECV_BUFFER_LEN, parse};
use carlink_transport::tcp::{WireFraming, peer_address};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Settings the loop reads on every iteration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopSettings {
    pub poll_interval: Duration,
    pub framing: WireFraming,
    pub tcp_nodelay: bool,
}

struct Client {
    stream: TcpStream,
    address: String,
}

enum Wake {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Ready,
}

enum CloseReason {
    Disconnected,
    Failed(io::Error),
}

/// Multiplexes the listener and up to [`MAX_CLIENTS`] connections.
pub(crate) struct ConnectionLoop {
    listener: TcpListener,
    clients: [Option<Client>; MAX_CLIENTS],
    registry: Arc<ClientRegistry>,
    outbound: Arc<OutboundQueue>,
    signal: Arc<LoopSignal>,
    dispatcher: Arc<RequestDispatcher>,
    log: Arc<dyn LogSink>,
    settings: LoopSettings,
}

impl ConnectionLoop {
    pub(crate) fn new(
        listener: TcpListener,
        registry: Arc<ClientRegistry>,
        outbound: Arc<OutboundQueue>,
        signal: Arc<LoopSignal>,
        dispatcher: Arc<RequestDispatcher>,
        log: Arc<dyn LogSink>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            listener,
            clients: std::array::from_fn(|_| None),
            registry,
            outbound,
            signal,
            dispatcher,
            log,
            settings,
        }
    }

    /// Runs until [`LoopSignal::request_stop`] is called.
    pub(crate) async fn run(mut self) {
        while self.signal.is_running() {
            if let Wake::Accepted(result) = self.wait().await {
                match result {
                    Ok((stream, addr)) => self.accept(stream, addr),
                    Err(e) => tracing::error!("Accept error: {}", e),
                }
            }
            if !self.signal.is_running() {
                break;
            }

            if self.read_clients() {
                self.flush().await;
            }
            if self.signal.take_flush() {
                self.flush().await;
            }
        }

        self.shutdown();
    }

    async fn wait(&self) -> Wake {
        let readable = async {
            let waits: Vec<_> = self
                .clients
                .iter()
                .flatten()
                .map(|client| Box::pin(client.stream.readable()))
                .collect();
            if waits.is_empty() {
                std::future::pending::<()>().await;
            } else {
                let _ = futures::future::select_all(waits).await;
            }
        };

        tokio::select! {
            accepted = self.listener.accept() => Wake::Accepted(accepted),
            () = readable => Wake::Ready,
            () = self.signal.woken() => Wake::Ready,
            () = tokio::time::sleep(self.settings.poll_interval) => Wake::Ready,
        }
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let address = peer_address(&addr);

        if let Some(previous) = self.registry.find_by_address(&address) {
            self.drop_client(previous);
            self.log
                .append(&format!("[INFO] Client {address} reconnected\n"));
        } else {
            self.log.append(&format!("[INFO] Client {address} connected\n"));
        }

        let Some(index) = self.registry.find_free_slot() else {
            tracing::warn!(%addr, "No free client slot, dropping connection");
            self.log
                .append(&format!("[WARN] No free slot for {address}, connection dropped\n"));
            return;
        };

        if self.settings.tcp_nodelay
            && let Err(e) = stream.set_nodelay(true)
        {
            tracing::warn!(%addr, "Failed to set TCP_NODELAY: {}", e);
        }

        tracing::info!(slot = index, %addr, "Client connected");
        self.registry.occupy(index, &address);
        self.clients[index] = Some(Client { stream, address });
    }

    /// Reads once from every client with data. Returns true if any message
    /// was dispatched.
    fn read_clients(&mut self) -> bool {
        let mut dispatched = false;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        for index in 0..MAX_CLIENTS {
            let Some(client) = &self.clients[index] else {
                continue;
            };

            match client.stream.try_read(&mut buf) {
                Ok(0) => self.close(index, CloseReason::Disconnected),
                Ok(n) => match parse(&buf[..n]) {
                    Ok(message) => dispatched |= self.dispatcher.dispatch(index, &message),
                    Err(e) => {
                        tracing::warn!(slot = index, "Dropping frame: {}", e);
                        self.log
                            .append(&format!("[WARN] {index}: dropped frame: {e}\n"));
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => self.close(index, CloseReason::Failed(e)),
            }
        }

        dispatched
    }

    /// Writes every queued frame to its slot's socket. A write that cannot
    /// finish within the poll interval closes that client.
    async fn flush(&mut self) {
        for item in self.outbound.drain() {
            let Some(client) = self
                .clients
                .get_mut(item.destination)
                .and_then(Option::as_mut)
            else {
                tracing::debug!(slot = item.destination, "Discarding frame for empty slot");
                continue;
            };

            let len = self.settings.framing.wire_len(&item.frame);
            let write = client.stream.write_all(&item.frame[..len]);
            let result = match tokio::time::timeout(self.settings.poll_interval, write).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
            };
            if let Err(e) = result {
                self.close(item.destination, CloseReason::Failed(e));
            }
        }
    }

    fn close(&mut self, index: usize, reason: CloseReason) {
        let Some(client) = self.clients[index].take() else {
            return;
        };

        match reason {
            CloseReason::Disconnected => {
                tracing::info!(slot = index, address = %client.address, "Client disconnected");
                self.log
                    .append(&format!("[INFO] Client {} disconnected\n", client.address));
            }
            CloseReason::Failed(e) => {
                let who = self.registry.alias_of(index);
                tracing::warn!(slot = index, alias = who, "Closing client: {}", e);
                self.log.append(&format!(
                    "[WARN] Client 0x{who:02X} connection closed: {e}\n"
                ));
            }
        }

        self.registry.release(index);
    }

    /// Closes a slot without logging a disconnect.
    fn drop_client(&mut self, index: usize) {
        if let Some(client) = self.clients[index].take() {
            shutdown_stream(client.stream);
        }
        self.registry.release(index);
    }

    fn shutdown(&mut self) {
        for index in 0..MAX_CLIENTS {
            self.drop_client(index);
        }
        tracing::info!("Connection loop stopped");
    }
}

fn shutdown_stream(stream: TcpStream) {
    if let Ok(stream) = stream.into_std() {
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }
}
