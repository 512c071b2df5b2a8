//! Protocol dispatcher
//!
//! The per-message state machine: decode, validate, classify by command and
//! subtype, run the handler, and build the response when one is due.
//!
//! Expected protocol deviations (malformed or unsupported messages) are
//! absorbed here with a log line and no response. The one path that escapes
//! is a structurally valid message carrying a non-numeric value where an
//! integer is required; that surfaces as a [`DispatchError`] for the caller
//! to log and propagate.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::devices::DeviceStore;
use crate::protocol::{
    codec, Command, FieldError, Frame, InternalType, Message, SensorType, GATEWAY_NODE_ID,
};
use crate::registry::NodeRegistry;

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("malformed numeric field: {0}")]
    BadField(#[from] FieldError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Routes inbound messages to their handlers.
///
/// Holds shared references to the identity registry and the device store;
/// all registry mutation goes through the mutex, which serializes concurrent
/// ID allocation.
pub struct Dispatcher<S: DeviceStore> {
    registry: Arc<Mutex<NodeRegistry>>,
    devices: Arc<Mutex<S>>,
    auto_create: bool,
    gateway_name: String,
}

impl<S: DeviceStore> Dispatcher<S> {
    pub fn new(
        registry: Arc<Mutex<NodeRegistry>>,
        devices: Arc<Mutex<S>>,
        auto_create: bool,
        gateway_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            devices,
            auto_create,
            gateway_name: gateway_name.into(),
        }
    }

    /// Handle one raw datagram from a peer.
    ///
    /// Returns the response message to send back, if the protocol calls for
    /// one. Invalid and unsupported messages are logged and dropped.
    pub async fn dispatch(
        &self,
        raw: &str,
        peer: SocketAddr,
    ) -> DispatchResult<Option<Message>> {
        let msg = codec::parse(raw);
        let Some(frame) = msg.frame() else {
            debug!("not a valid sensor message from {}: '{}'", peer, raw);
            return Ok(None);
        };

        debug!(
            "message from {}: node={} child={} cmd={} ack={} type={} payload='{}'",
            peer,
            frame.node_id,
            frame.child_sensor_id,
            frame.command,
            frame.ack,
            frame.sub_type,
            frame.payload,
        );

        match frame.command()? {
            Command::Internal => self.handle_internal(frame, peer).await,
            Command::Presentation => {
                self.handle_presentation(frame, raw, peer).await?;
                Ok(None)
            }
            Command::Set => {
                self.handle_set(frame, raw, peer).await?;
                Ok(None)
            }
            other => {
                debug!("unsupported command {} from {}", other.code(), peer);
                Ok(None)
            }
        }
    }

    /// INTERNAL: only ID_REQUEST is served; the payload is the node's
    /// hardware unique identifier and the reply carries the resolved ID.
    async fn handle_internal(
        &self,
        frame: &Frame,
        peer: SocketAddr,
    ) -> DispatchResult<Option<Message>> {
        match InternalType::from_code(frame.sub_type()?) {
            InternalType::IdRequest => {
                let unique_id = frame.payload();
                let node_id = self.registry.lock().await.resolve(unique_id);
                info!("node '{}' at {} has ID {}", unique_id, peer, node_id);

                Ok(Some(codec::build(
                    GATEWAY_NODE_ID,
                    0,
                    Command::Internal,
                    false,
                    InternalType::IdResponse.code(),
                    &node_id.to_string(),
                )))
            }
            other => {
                debug!(
                    "unsupported internal subtype {} from {}",
                    other.code(),
                    peer
                );
                Ok(None)
            }
        }
    }

    /// PRESENTATION: register the announcing peer as a visible device when
    /// the sensor type is known and auto-create is on.
    async fn handle_presentation(
        &self,
        frame: &Frame,
        raw: &str,
        peer: SocketAddr,
    ) -> DispatchResult<()> {
        let sensor = SensorType::from_code(frame.sub_type()?);
        if let SensorType::Unknown(code) = sensor {
            debug!("device not supported: presentation subtype {} from {}", code, peer);
            return Ok(());
        }

        info!(
            "node {} child {} presents as {}",
            frame.node_id()?,
            frame.child_sensor_id()?,
            sensor.label()
        );

        if !self.auto_create {
            return Ok(());
        }

        let name = self.device_name(peer);
        let mut devices = self.devices.lock().await;
        let handle = match devices.find(&name).await {
            Some(handle) => handle,
            None => {
                let handle = devices.create(&name, sensor.label()).await;
                info!("created device: {}", name);
                handle
            }
        };
        devices
            .update(handle, 1, &format!("{};{}", peer.ip(), raw))
            .await;
        Ok(())
    }

    /// SET: record the reported value against the peer's visible device.
    async fn handle_set(
        &self,
        frame: &Frame,
        raw: &str,
        peer: SocketAddr,
    ) -> DispatchResult<()> {
        debug!(
            "value report from node {} child {} type {}: '{}'",
            frame.node_id()?,
            frame.child_sensor_id()?,
            frame.sub_type()?,
            frame.payload()
        );

        if !self.auto_create {
            return Ok(());
        }

        let name = self.device_name(peer);
        let mut devices = self.devices.lock().await;
        match devices.find(&name).await {
            Some(handle) => {
                devices
                    .update(handle, 1, &format!("{};{}", peer.ip(), raw))
                    .await;
            }
            None => debug!("no visible device for {} yet", peer),
        }
        Ok(())
    }

    fn device_name(&self, peer: SocketAddr) -> String {
        format!("{} - {}", self.gateway_name, peer.ip())
    }
}
