//! Server builder and main server implementation.

use crate::control::{ControlSurface, LoopSignal};
use crate::dispatcher::RequestDispatcher;
use crate::error::ServerError;
use crate::handler::{
    Collaborators, EmptyMap, LogSink, ParkingTracker, RoundControl, TagLookup, TreasureNotifier,
};
use crate::log::TracingLogSink;
use crate::multiplexer::{ConnectionLoop, LoopSettings};
use crate::parking::ParkRecorder;
use crate::registry::{ClientRegistry, ClientSlot};
use crate::round::{RoundState, RoundTimer};
use carlink_channel::OutboundQueue;
use carlink_transport::tcp::{TcpServerConfig, WireFraming, bind_listener};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default upper bound on one readiness wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Builder for configuring and creating a server.
pub struct ServerBuilder {
    config: TcpServerConfig,
    poll_interval: Duration,
    framing: WireFraming,
    tag_lookup: Option<Arc<dyn TagLookup>>,
    treasure_notifier: Option<Arc<dyn TreasureNotifier>>,
    parking_tracker: Option<Arc<dyn ParkingTracker>>,
    round_control: Option<Arc<dyn RoundControl>>,
    log_sink: Option<Arc<dyn LogSink>>,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TcpServerConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            framing: WireFraming::default(),
            tag_lookup: None,
            treasure_notifier: None,
            parking_tracker: None,
            round_control: None,
            log_sink: None,
        }
    }

    /// Sets the host name or IPv4 address to bind to.
    #[must_use]
    pub fn bind_host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port. `0` lets the OS pick one.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the upper bound on one readiness wait.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how encoded frames are cut on the wire.
    #[must_use]
    pub fn framing(mut self, framing: WireFraming) -> Self {
        self.framing = framing;
        self
    }

    /// Enables or disables TCP_NODELAY on accepted sockets.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    /// Sets the tag map answering REQUEST_RFID.
    #[must_use]
    pub fn tag_lookup<T: TagLookup + 'static>(mut self, lookup: Arc<T>) -> Self {
        self.tag_lookup = Some(lookup);
        self
    }

    /// Sets the receiver of every tag read.
    #[must_use]
    pub fn treasure_notifier<T: TreasureNotifier + 'static>(mut self, notifier: Arc<T>) -> Self {
        self.treasure_notifier = Some(notifier);
        self
    }

    /// Sets the round completion tracker.
    #[must_use]
    pub fn parking_tracker<T: ParkingTracker + 'static>(mut self, tracker: Arc<T>) -> Self {
        self.parking_tracker = Some(tracker);
        self
    }

    /// Sets the entry point called when every car has completed the round.
    ///
    /// Without one the server drives its own [`RoundTimer`].
    #[must_use]
    pub fn round_control<T: RoundControl + 'static>(mut self, control: Arc<T>) -> Self {
        self.round_control = Some(control);
        self
    }

    /// Sets the activity log sink.
    #[must_use]
    pub fn log_sink<T: LogSink + 'static>(mut self, sink: Arc<T>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Builds a stopped server.
    #[must_use]
    pub fn build(self) -> Server {
        let registry = Arc::new(ClientRegistry::new());
        let outbound = Arc::new(OutboundQueue::new());
        let signal = Arc::new(LoopSignal::new());
        let round = Arc::new(RoundState::new());

        let tags = self.tag_lookup.unwrap_or_else(|| Arc::new(EmptyMap));
        let treasures = self.treasure_notifier.unwrap_or_else(|| Arc::new(EmptyMap));
        let tracker = self
            .parking_tracker
            .unwrap_or_else(|| Arc::new(ParkRecorder::new()));
        let log = self.log_sink.unwrap_or_else(|| Arc::new(TracingLogSink));

        let control = ControlSurface::new(
            Arc::clone(&registry),
            Arc::clone(&outbound),
            Arc::clone(&signal),
            Arc::clone(&round),
            Arc::clone(&tracker),
            Arc::clone(&treasures),
            Arc::clone(&log),
        );

        let mut round_timer = None;
        let round_control: Arc<dyn RoundControl> = match self.round_control {
            Some(custom) => custom,
            None => {
                let timer = Arc::new(RoundTimer::new(control.clone()));
                round_timer = Some(Arc::clone(&timer));
                timer
            }
        };

        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&outbound),
            round,
            Collaborators {
                tags,
                treasures,
                tracker,
                round_control,
                log: Arc::clone(&log),
            },
        ));

        let settings = LoopSettings {
            poll_interval: self.poll_interval,
            framing: self.framing,
            tcp_nodelay: self.config.tcp_nodelay,
        };

        Server {
            config: self.config,
            settings,
            registry,
            outbound,
            signal,
            dispatcher,
            log,
            control,
            round_timer,
            worker: None,
            local_addr: None,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The car coordination server.
///
/// The connection loop runs on a dedicated thread with its own
/// single-threaded runtime, between [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct Server {
    config: TcpServerConfig,
    settings: LoopSettings,
    registry: Arc<ClientRegistry>,
    outbound: Arc<OutboundQueue>,
    signal: Arc<LoopSignal>,
    dispatcher: Arc<RequestDispatcher>,
    log: Arc<dyn LogSink>,
    control: ControlSurface,
    round_timer: Option<Arc<RoundTimer>>,
    worker: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    /// Returns a builder with default settings.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds the listener and launches the connection loop.
    ///
    /// Returns the bound address.
    ///
    /// # Errors
    /// Returns `ServerError` if the server is already running, the host has
    /// no IPv4 address, the listener cannot be bound or the loop cannot be
    /// launched. The server stays stopped on error.
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.worker.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let listener = bind_listener(&self.config)?;
        let local_addr = listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ServerError::Runtime {
                message: e.to_string(),
            })?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(listener)?
        };

        let connection_loop = ConnectionLoop::new(
            listener,
            Arc::clone(&self.registry),
            Arc::clone(&self.outbound),
            Arc::clone(&self.signal),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.log),
            self.settings,
        );

        self.signal.set_running();
        let worker = std::thread::Builder::new()
            .name("carlink-server".to_string())
            .spawn(move || runtime.block_on(connection_loop.run()));
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                self.signal.request_stop();
                return Err(ServerError::Runtime {
                    message: e.to_string(),
                });
            }
        };

        self.worker = Some(worker);
        self.local_addr = Some(local_addr);
        self.log
            .append(&format!("[INFO] Server started on {local_addr}\n"));
        tracing::info!("Server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Stops the connection loop and waits for it to exit.
    ///
    /// Every client is disconnected and every slot released. Does nothing if
    /// the server is not running.
    ///
    /// # Errors
    /// Returns [`ServerError::Shutdown`] if the loop thread panicked.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.signal.request_stop();
        let joined = worker.join();
        self.local_addr = None;
        joined.map_err(|_| ServerError::Shutdown)?;

        self.log.append("[INFO] Server stopped\n");
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Returns true while the connection loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.signal.is_running()
    }

    /// Returns the bound address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns a handle to the control surface.
    #[must_use]
    pub fn control(&self) -> ControlSurface {
        self.control.clone()
    }

    /// Returns the built-in round timer, unless a custom round control was
    /// configured.
    #[must_use]
    pub fn round_timer(&self) -> Option<Arc<RoundTimer>> {
        self.round_timer.clone()
    }

    /// Returns a copy of the slot table.
    #[must_use]
    pub fn slots(&self) -> Vec<ClientSlot> {
        self.registry.snapshot()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Server stop failed: {}", e);
        }
    }
}
