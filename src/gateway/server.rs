//! Gateway server
//!
//! Owns the UDP listening socket and the receive loop, feeding each datagram
//! to the dispatcher and sending responses back to the originating peer.
//! Sends are fire-and-forget; the protocol has no delivery confirmation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::dispatcher::Dispatcher;
use super::GatewayConfig;
use crate::devices::DeviceStore;
use crate::protocol::codec;
use crate::registry::NodeRegistry;

/// Largest datagram the gateway will read; sensor messages are tiny
const MAX_DATAGRAM_SIZE: usize = 1024;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, std::net::AddrParseError),

    #[error("gateway already running")]
    AlreadyRunning,

    #[error("gateway not running")]
    NotRunning,

    #[error("bind failed: {0}")]
    BindFailed(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Events emitted by the gateway
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Listening socket is bound and the receive loop is running
    Started { bind_addr: SocketAddr },
    /// A datagram arrived
    DatagramReceived { peer: SocketAddr, raw: String },
    /// A response was sent back to a peer
    ResponseSent { peer: SocketAddr, raw: String },
    /// The receive loop ended
    Stopped,
    /// A handler failed on the given raw input; the loop has ended and the
    /// hosting process decides whether that is fatal
    HandlerFailed { raw: String, detail: String },
    /// Non-fatal socket-level error
    Error { message: String },
}

/// SensorNet gateway server.
///
/// Constructed once at startup; owns the socket, registry and device store,
/// which reach the dispatcher by argument rather than through any global.
pub struct Gateway<S: DeviceStore + 'static> {
    /// Gateway configuration
    config: GatewayConfig,
    /// Node identity records
    registry: Arc<Mutex<NodeRegistry>>,
    /// Visible devices
    devices: Arc<Mutex<S>>,
    /// Event sender
    event_tx: mpsc::Sender<GatewayEvent>,
    /// Event receiver (for consumers)
    event_rx: Option<mpsc::Receiver<GatewayEvent>>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Whether the receive loop is running
    running: Arc<RwLock<bool>>,
}

impl<S: DeviceStore + 'static> Gateway<S> {
    /// Create a new gateway over the given device store
    pub fn new(config: GatewayConfig, devices: S) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            config,
            registry: Arc::new(Mutex::new(NodeRegistry::new())),
            devices: Arc::new(Mutex::new(devices)),
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<GatewayEvent>> {
        self.event_rx.take()
    }

    /// Shared handle to the identity registry
    pub fn registry(&self) -> Arc<Mutex<NodeRegistry>> {
        self.registry.clone()
    }

    /// Shared handle to the device store
    pub fn devices(&self) -> Arc<Mutex<S>> {
        self.devices.clone()
    }

    /// Bind the discovery endpoint and start the receive loop
    pub async fn start(&mut self) -> GatewayResult<()> {
        {
            let running = self.running.read().await;
            if *running {
                return Err(GatewayError::AlreadyRunning);
            }
        }

        let endpoint: SocketAddr = self
            .config
            .endpoint
            .parse()
            .map_err(|e| GatewayError::InvalidEndpoint(self.config.endpoint.clone(), e))?;

        // The endpoint names the address nodes broadcast to; the socket
        // itself binds the wildcard so datagrams from any interface arrive.
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), endpoint.port());
        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            GatewayError::BindFailed(format!("failed to bind {}: {}", bind_addr, e))
        })?;
        socket.set_broadcast(true)?;

        if let IpAddr::V4(addr) = endpoint.ip() {
            if addr.is_multicast() {
                socket.join_multicast_v4(addr, Ipv4Addr::UNSPECIFIED)?;
            }
        }

        let local_addr = socket.local_addr()?;
        tracing::info!("gateway listening on {} (endpoint {})", local_addr, endpoint);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let _ = self
            .event_tx
            .send(GatewayEvent::Started { bind_addr: local_addr })
            .await;

        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            self.devices.clone(),
            self.config.auto_create,
            self.config.name.clone(),
        );
        let event_tx = self.event_tx.clone();
        let running = self.running.clone();

        // Spawn the receive loop
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, peer)) => {
                                let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
                                if !handle_datagram(&socket, &dispatcher, &event_tx, raw, peer).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!("recv error: {}", e);
                                let _ = event_tx.send(GatewayEvent::Error {
                                    message: format!("recv error: {}", e),
                                }).await;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("gateway shutdown requested");
                        break;
                    }
                }
            }

            let mut running = running.write().await;
            *running = false;

            let _ = event_tx.send(GatewayEvent::Stopped).await;
        });

        Ok(())
    }

    /// Stop the receive loop
    pub async fn stop(&mut self) -> GatewayResult<()> {
        {
            let running = self.running.read().await;
            if !*running {
                return Err(GatewayError::NotRunning);
            }
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        Ok(())
    }

    /// Check if the receive loop is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Process one datagram. Returns false when the loop must end because a
/// handler failed; expected protocol deviations never end the loop.
async fn handle_datagram<S: DeviceStore>(
    socket: &UdpSocket,
    dispatcher: &Dispatcher<S>,
    event_tx: &mpsc::Sender<GatewayEvent>,
    raw: String,
    peer: SocketAddr,
) -> bool {
    tracing::info!("datagram from {}: {}", peer, raw);
    let _ = event_tx
        .send(GatewayEvent::DatagramReceived {
            peer,
            raw: raw.clone(),
        })
        .await;

    match dispatcher.dispatch(&raw, peer).await {
        Ok(Some(reply)) => {
            let encoded = codec::serialize(&reply);
            // The dispatcher only builds complete messages, which never
            // serialize to the empty string.
            if encoded.is_empty() {
                tracing::error!("refusing to send empty response to {}", peer);
                return true;
            }
            match socket.send_to(encoded.as_bytes(), peer).await {
                Ok(_) => {
                    tracing::debug!("response to {}: {}", peer, encoded);
                    let _ = event_tx
                        .send(GatewayEvent::ResponseSent { peer, raw: encoded })
                        .await;
                }
                Err(e) => {
                    // Fire-and-forget: a failed send is logged, not retried.
                    tracing::error!("send to {} failed: {}", peer, e);
                    let _ = event_tx
                        .send(GatewayEvent::Error {
                            message: format!("send to {} failed: {}", peer, e),
                        })
                        .await;
                }
            }
            true
        }
        Ok(None) => true,
        Err(e) => {
            tracing::error!("exception handling datagram '{}': {}", raw, e);
            let _ = event_tx
                .send(GatewayEvent::HandlerFailed {
                    raw,
                    detail: e.to_string(),
                })
                .await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::MemoryDeviceStore;
    use std::time::Duration;

    async fn started_gateway(
        config: GatewayConfig,
    ) -> (Gateway<MemoryDeviceStore>, mpsc::Receiver<GatewayEvent>, SocketAddr) {
        let mut gateway = Gateway::new(config, MemoryDeviceStore::new());
        let mut event_rx = gateway.take_event_receiver().unwrap();
        gateway.start().await.unwrap();

        let bind_addr = match event_rx.recv().await {
            Some(GatewayEvent::Started { bind_addr }) => bind_addr,
            other => panic!("expected Started event, got {:?}", other),
        };
        (gateway, event_rx, bind_addr)
    }

    #[tokio::test]
    async fn test_gateway_creation() {
        let gateway = Gateway::new(GatewayConfig::default(), MemoryDeviceStore::new());
        assert!(!gateway.is_running().await);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_rejected() {
        let mut gateway = Gateway::new(
            GatewayConfig::new("not-an-endpoint"),
            MemoryDeviceStore::new(),
        );
        let err = gateway.start().await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidEndpoint(_, _)));
    }

    #[tokio::test]
    async fn test_id_request_roundtrip() {
        let (mut gateway, _event_rx, bind_addr) =
            started_gateway(GatewayConfig::new("127.0.0.1:0")).await;
        assert!(gateway.is_running().await);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bind_addr.port());

        // Garbage first: must produce no response and no registry mutation,
        // so the first reply we see belongs to the ID request.
        client.send_to(b"garbage", target).await.unwrap();
        client
            .send_to(b"0;0;3;0;3;AA:BB:CC:DD:EE:FF", target)
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(
            Duration::from_secs(5),
            client.recv_from(&mut buf),
        )
        .await
        .expect("no response within timeout")
        .unwrap();
        assert_eq!(&buf[..len], b"0;0;3;0;4;1");

        assert_eq!(gateway.registry().lock().await.len(), 1);
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_emits_stopped_event() {
        let (mut gateway, mut event_rx, _) =
            started_gateway(GatewayConfig::new("127.0.0.1:0")).await;

        gateway.stop().await.unwrap();
        loop {
            match event_rx.recv().await {
                Some(GatewayEvent::Stopped) => break,
                Some(_) => continue,
                None => panic!("event channel closed before Stopped"),
            }
        }
        assert!(!gateway.is_running().await);
    }
}
