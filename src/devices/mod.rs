//! Visible device store
//!
//! The gateway surfaces discovered sensors as "visible devices" owned by the
//! hosting process (a home-automation frontend, a dashboard, ...). The core
//! only needs find/create/update, so the store is a trait seam and the
//! built-in implementation is a plain in-memory table.

use async_trait::async_trait;

/// Opaque handle to a visible device within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(pub u32);

/// A visible device record
#[derive(Debug, Clone)]
pub struct VisibleDevice {
    pub name: String,
    /// What kind of device this is, e.g. a sensor-type label
    pub type_hint: String,
    /// Numeric state value
    pub n_value: i32,
    /// String state value
    pub s_value: String,
}

/// Store of devices visible to the hosting process.
///
/// Used only by the presentation/set handlers; the dispatcher never reaches
/// past this interface.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find(&self, name: &str) -> Option<DeviceHandle>;

    async fn create(&mut self, name: &str, type_hint: &str) -> DeviceHandle;

    async fn update(&mut self, handle: DeviceHandle, n_value: i32, s_value: &str);
}

/// In-memory device store
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: Vec<VisibleDevice>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[VisibleDevice] {
        &self.devices
    }

    pub fn get(&self, handle: DeviceHandle) -> Option<&VisibleDevice> {
        self.devices.get(handle.0 as usize)
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn find(&self, name: &str) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .position(|d| d.name == name)
            .map(|i| DeviceHandle(i as u32))
    }

    async fn create(&mut self, name: &str, type_hint: &str) -> DeviceHandle {
        self.devices.push(VisibleDevice {
            name: name.to_string(),
            type_hint: type_hint.to_string(),
            n_value: 0,
            s_value: String::new(),
        });
        DeviceHandle((self.devices.len() - 1) as u32)
    }

    async fn update(&mut self, handle: DeviceHandle, n_value: i32, s_value: &str) {
        if let Some(device) = self.devices.get_mut(handle.0 as usize) {
            device.n_value = n_value;
            device.s_value = s_value.to_string();
        }
    }
}
