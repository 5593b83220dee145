//! Device status readout at initialization.

use std::fmt;

use fbio::variant::Variant;
use tracing::{info, warn};

/// `General.VendorName`.
pub const VENDOR_NAME: &str = "General.VendorName";
/// `Status.Cpu.0.Load.Percent`.
pub const CPU_LOAD: &str = "Status.Cpu.0.Load.Percent";
/// `Status.Memory.Usage.Percent`.
pub const MEMORY_USAGE: &str = "Status.Memory.Usage.Percent";
/// `Status.Board.Temperature.Centigrade`.
pub const BOARD_TEMPERATURE: &str = "Status.Board.Temperature.Centigrade";

/// Host device-status service.
pub trait DeviceStatusProvider: Send + Sync {
    /// Value of a status item, `None` if unknown.
    fn item(&self, name: &str) -> Option<Variant>;
}

/// Status items read once at init.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStatus {
    /// Vendor name.
    pub vendor: Option<String>,
    /// CPU load [%].
    pub cpu_load: Option<i64>,
    /// Memory usage [%].
    pub memory_usage: Option<i64>,
    /// Board temperature [°C].
    pub board_temperature: Option<i64>,
}

impl DeviceStatus {
    /// Read every item. Missing or mistyped items are logged and left `None`.
    pub fn read(provider: &dyn DeviceStatusProvider) -> Self {
        let item = |name: &str| {
            let value = provider.item(name);
            if value.is_none() {
                warn!("Device status item {name} unavailable");
            }
            value
        };
        let number = |name: &str| {
            item(name).and_then(|v| {
                let n = v.as_i64();
                if n.is_none() {
                    warn!("Device status item {name} is not an integer: {v:?}");
                }
                n
            })
        };

        let status = Self {
            vendor: item(VENDOR_NAME).map(|v| v.to_string()),
            cpu_load: number(CPU_LOAD),
            memory_usage: number(MEMORY_USAGE),
            board_temperature: number(BOARD_TEMPERATURE),
        };
        info!("{status}");
        status
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "n/a".to_string(), T::to_string)
        }
        write!(
            f,
            "Device: vendor={} cpu={}% memory={}% temperature={}°C",
            opt(&self.vendor),
            opt(&self.cpu_load),
            opt(&self.memory_usage),
            opt(&self.board_temperature)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Partial;

    impl DeviceStatusProvider for Partial {
        fn item(&self, name: &str) -> Option<Variant> {
            match name {
                VENDOR_NAME => Some(Variant::from("ACME")),
                CPU_LOAD => Some(Variant::I8(12)),
                MEMORY_USAGE => Some(Variant::from("lots")),
                _ => None,
            }
        }
    }

    #[test]
    fn missing_items_stay_none() {
        let status = DeviceStatus::read(&Partial);
        assert_eq!(status.vendor.as_deref(), Some("ACME"));
        assert_eq!(status.cpu_load, Some(12));
        assert_eq!(status.memory_usage, None);
        assert_eq!(status.board_temperature, None);
        assert_eq!(
            status.to_string(),
            "Device: vendor=ACME cpu=12% memory=n/a% temperature=n/a°C"
        );
    }
}
