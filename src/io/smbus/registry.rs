// ============================================================================
// src/io/smbus/registry.rs - Slave Device Registry
// ============================================================================
//!
//! attach 時に公開したスレーブデバイスの登録簿。

use alloc::vec::Vec;
use hashbrown::HashMap;

use super::types::{SlaveAddress, SlaveDevice};
use crate::error::InitError;

/// デバイスレジストリ
///
/// 公開したデバイスは detach 時に `remove` される。
pub trait DeviceRegistry: Send {
    fn publish(&mut self, device: SlaveDevice) -> Result<(), InitError>;
    fn remove(&mut self, address: SlaveAddress);
    fn lookup(&self, address: SlaveAddress) -> Option<SlaveDevice>;
}

/// アドレスをキーにしたメモリ上のレジストリ
#[derive(Debug, Default)]
pub struct SlaveRegistry {
    devices: HashMap<SlaveAddress, SlaveDevice>,
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// 登録済みアドレス（昇順）
    pub fn addresses(&self) -> Vec<SlaveAddress> {
        let mut addresses: Vec<_> = self.devices.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }
}

impl DeviceRegistry for SlaveRegistry {
    fn publish(&mut self, device: SlaveDevice) -> Result<(), InitError> {
        if self.devices.contains_key(&device.address) {
            log::warn!("smbus: device {} already published", device.address);
            return Err(InitError::DeviceRegistration(device.address.as_u8()));
        }
        log::debug!("smbus: publishing device {}", device.address);
        self.devices.insert(device.address, device);
        Ok(())
    }

    fn remove(&mut self, address: SlaveAddress) {
        if self.devices.remove(&address).is_some() {
            log::debug!("smbus: removed device {}", address);
        }
    }

    fn lookup(&self, address: SlaveAddress) -> Option<SlaveDevice> {
        self.devices.get(&address).copied()
    }
}
