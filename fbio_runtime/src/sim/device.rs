//! Fixed device-status values.

use std::collections::HashMap;

use fbio::variant::Variant;

use crate::device::{BOARD_TEMPERATURE, CPU_LOAD, DeviceStatusProvider, MEMORY_USAGE, VENDOR_NAME};

/// Device status served from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceStatus {
    items: HashMap<String, Variant>,
}

impl StaticDeviceStatus {
    /// Empty table; every item reads as unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// The four init items with plausible values.
    pub fn sample(vendor: &str) -> Self {
        Self::new()
            .with_item(VENDOR_NAME, Variant::from(vendor))
            .with_item(CPU_LOAD, Variant::I8(3))
            .with_item(MEMORY_USAGE, Variant::I8(27))
            .with_item(BOARD_TEMPERATURE, Variant::I8(41))
    }

    /// Add or replace one item.
    pub fn with_item(mut self, name: &str, value: Variant) -> Self {
        self.items.insert(name.to_string(), value);
        self
    }
}

impl DeviceStatusProvider for StaticDeviceStatus {
    fn item(&self, name: &str) -> Option<Variant> {
        self.items.get(name).cloned()
    }
}
