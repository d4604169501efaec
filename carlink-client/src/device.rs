//! Field-device client.

use crate::error::ClientError;
use crate::retry::RetryPolicy;
use carlink_core::{
    Message, MessageType, RECV_BUFFER_LEN, STATUS_FAIL, STATUS_OK, TagRecord, TagSerial, alias,
    decode_downlink, encode_uplink,
};
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::Instant;

/// Builder for configuring and connecting a device client.
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    server_addr: SocketAddr,
    local_ip: Option<IpAddr>,
    connect_timeout: Duration,
    reply_timeout: Duration,
    retry: RetryPolicy,
}

impl DeviceBuilder {
    /// Creates a new builder for the specified server address.
    #[must_use]
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            local_ip: None,
            connect_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }

    /// Binds the connection to a local IP.
    ///
    /// The server identifies devices by IP, so devices sharing a host need
    /// distinct local addresses.
    #[must_use]
    pub fn local_ip(mut self, ip: IpAddr) -> Self {
        self.local_ip = Some(ip);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a request waits for its reply.
    #[must_use]
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the policy used by [`connect_with_retry`](Self::connect_with_retry).
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Makes one connection attempt.
    ///
    /// # Errors
    /// Returns `ClientError` if the connection fails or times out.
    pub async fn connect(self) -> Result<DeviceClient, ClientError> {
        let stream = self.attempt().await?;
        Ok(self.client(stream))
    }

    /// Connects, retrying failed attempts with the configured backoff.
    ///
    /// # Errors
    /// Returns [`ClientError::RetriesExhausted`] once the policy allows no
    /// further attempts.
    pub async fn connect_with_retry(self) -> Result<DeviceClient, ClientError> {
        let mut failures = 0;
        loop {
            match self.attempt().await {
                Ok(stream) => return Ok(self.client(stream)),
                Err(e) => {
                    failures += 1;
                    let Some(delay) = self.retry.delay_after(failures) else {
                        tracing::error!("Giving up on {} after {} attempts", self.server_addr, failures);
                        return Err(ClientError::RetriesExhausted { attempts: failures });
                    };
                    tracing::warn!(
                        "Connecting to {} failed: {}; retrying in {:?}",
                        self.server_addr,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self) -> Result<TcpStream, ClientError> {
        let socket = if self.server_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(ip) = self.local_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }

        let stream = tokio::time::timeout(self.connect_timeout, socket.connect(self.server_addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)?
            .map_err(ClientError::Io)?;
        stream.set_nodelay(true)?;

        tracing::info!("Connected to {}", self.server_addr);
        Ok(stream)
    }

    fn client(&self, stream: TcpStream) -> DeviceClient {
        DeviceClient {
            stream,
            alias: alias::UNASSIGNED,
            reply_timeout: self.reply_timeout,
            pending: VecDeque::new(),
        }
    }
}

/// A connected field device.
///
/// Request methods wait for their reply; anything else that arrives in the
/// meantime is kept for [`recv`](Self::recv).
pub struct DeviceClient {
    stream: TcpStream,
    alias: u8,
    reply_timeout: Duration,
    pending: VecDeque<Message>,
}

impl DeviceClient {
    /// Connects to `server_addr` with default settings.
    ///
    /// # Errors
    /// Returns `ClientError` if the connection fails or times out.
    pub async fn connect(server_addr: SocketAddr) -> Result<Self, ClientError> {
        DeviceBuilder::new(server_addr).connect().await
    }

    /// Connects to `server_addr` with the default retry policy.
    ///
    /// # Errors
    /// Returns [`ClientError::RetriesExhausted`] if every attempt fails.
    pub async fn connect_with_retry(server_addr: SocketAddr) -> Result<Self, ClientError> {
        DeviceBuilder::new(server_addr).connect_with_retry().await
    }

    /// Returns a builder for `server_addr`.
    #[must_use]
    pub fn builder(server_addr: SocketAddr) -> DeviceBuilder {
        DeviceBuilder::new(server_addr)
    }

    /// Returns the alias registered by this client, or
    /// [`alias::UNASSIGNED`].
    #[must_use]
    pub fn alias(&self) -> u8 {
        self.alias
    }

    /// Returns the local address of the connection.
    ///
    /// # Errors
    /// Returns an IO error if the socket is no longer connected.
    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.stream.local_addr()?)
    }

    /// Registers `requested` as this device's alias. Returns whether the
    /// server accepted it.
    ///
    /// # Errors
    /// Returns `ClientError` on IO failure or if no reply arrives in time.
    pub async fn register(&mut self, requested: u8) -> Result<bool, ClientError> {
        self.send(&Message::register(requested)).await?;
        let reply = self
            .await_reply(|m| m.kind == MessageType::Register && m.id == requested)
            .await?;

        let accepted = reply.is_ok();
        if accepted {
            self.alias = requested;
        }
        Ok(accepted)
    }

    /// Looks up a tag on the server's map.
    ///
    /// # Errors
    /// Returns `ClientError` on IO failure or if no reply arrives in time.
    pub async fn request_rfid(&mut self, serial: TagSerial) -> Result<TagRecord, ClientError> {
        self.send(&Message::request_rfid(serial)).await?;
        let reply = self
            .await_reply(|m| m.kind == MessageType::RequestRfid && m.payload().starts_with(&serial))
            .await?;

        // A zero kind byte is cut off on the wire.
        let mut bytes = [0u8; TagRecord::ENCODED_LENGTH];
        let payload = reply.payload();
        let len = payload.len().min(bytes.len());
        bytes[..len].copy_from_slice(&payload[..len]);
        Ok(TagRecord::from_bytes(&bytes).unwrap_or_else(|| TagRecord::unknown(serial)))
    }

    /// Sends `payload` to the device registered as `destination`. Returns
    /// whether the server delivered it.
    ///
    /// # Errors
    /// Returns `ClientError` on IO failure or if no ack arrives in time.
    pub async fn send_custom(
        &mut self,
        destination: u8,
        payload: impl Into<Vec<u8>>,
    ) -> Result<bool, ClientError> {
        self.send(&Message::custom(destination, payload)).await?;
        let ack = self.await_ack().await?;
        Ok(ack.is_ok())
    }

    /// Sends `payload` to every other connected device.
    ///
    /// # Errors
    /// Returns `ClientError` on IO failure or if no ack arrives in time.
    pub async fn broadcast(&mut self, payload: impl Into<Vec<u8>>) -> Result<bool, ClientError> {
        self.send(&Message::custom_broadcast(alias::UNASSIGNED, payload))
            .await?;
        let ack = self.await_ack().await?;
        Ok(ack.is_ok())
    }

    /// Reports that this device has parked.
    ///
    /// # Errors
    /// Returns `ClientError` on IO failure.
    pub async fn round_complete(&mut self) -> Result<(), ClientError> {
        self.send(&Message::round_complete()).await
    }

    /// Returns the next message from the server.
    ///
    /// # Errors
    /// Returns [`ClientError::ConnectionClosed`] if the server closed the
    /// connection.
    pub async fn recv(&mut self) -> Result<Message, ClientError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }
        self.read_message().await
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    ///
    /// # Errors
    /// Returns [`ClientError::ReplyTimeout`] if nothing arrives in time.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Message, ClientError> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| ClientError::ReplyTimeout)?
    }

    /// Writes `frame` to the server unchanged.
    ///
    /// # Errors
    /// Returns an IO error if the write fails.
    pub async fn send_raw(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        self.stream.write_all(frame).await?;
        Ok(())
    }

    /// Shuts the connection down.
    ///
    /// # Errors
    /// Returns an IO error if the shutdown fails.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        self.send_raw(&encode_uplink(message)).await
    }

    async fn read_message(&mut self) -> Result<Message, ClientError> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(decode_downlink(&buf[..n]))
    }

    async fn await_ack(&mut self) -> Result<Message, ClientError> {
        let me = self.alias;
        self.await_reply(|m| {
            m.kind == MessageType::Custom
                && m.id == me
                && (m.payload() == STATUS_OK || m.payload() == STATUS_FAIL)
        })
        .await
    }

    async fn await_reply(
        &mut self,
        is_reply: impl Fn(&Message) -> bool,
    ) -> Result<Message, ClientError> {
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            let message = tokio::time::timeout_at(deadline, self.read_message())
                .await
                .map_err(|_| ClientError::ReplyTimeout)??;
            if is_reply(&message) {
                return Ok(message);
            }
            tracing::debug!("Holding unsolicited message: {}", message);
            self.pending.push_back(message);
        }
    }
}
