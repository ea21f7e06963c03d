//! Execution device selection for heavyweight engines.

use serde::{Deserialize, Serialize};

use crate::models::config::DeviceConfig;

/// Where an engine runs inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Accelerated,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accelerated => "accelerated",
        }
    }
}

/// Pick the device for one extraction call.
///
/// The accelerator is only used when it is available and the requested
/// batch is large enough to be worth the transfer.
pub fn select_device(batch_size: usize, config: &DeviceConfig) -> Device {
    if config.accelerator_available && batch_size >= config.min_accelerated_batch.max(1) {
        Device::Accelerated
    } else {
        Device::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_without_accelerator() {
        let config = DeviceConfig {
            accelerator_available: false,
            min_accelerated_batch: 1,
        };
        assert_eq!(select_device(64, &config), Device::Cpu);
    }

    #[test]
    fn test_threshold() {
        let config = DeviceConfig {
            accelerator_available: true,
            min_accelerated_batch: 4,
        };
        assert_eq!(select_device(3, &config), Device::Cpu);
        assert_eq!(select_device(4, &config), Device::Accelerated);
    }

    #[test]
    fn test_zero_threshold_still_needs_a_batch() {
        let config = DeviceConfig {
            accelerator_available: true,
            min_accelerated_batch: 0,
        };
        assert_eq!(select_device(0, &config), Device::Cpu);
        assert_eq!(select_device(1, &config), Device::Accelerated);
    }
}
