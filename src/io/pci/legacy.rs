// ============================================================================
// src/io/pci/legacy.rs - Legacy PCI I/O Port Access
// ============================================================================
//!
//! CF8h/CFCh ポートを使った Configuration Space アクセス。
//! SMBus ファンクションは 256 バイトのヘッダ内で完結する。

#![cfg(target_arch = "x86_64")]

use super::traits::ConfigSpaceAccessor;
use super::types::BdfAddress;
use spin::Mutex;
use x86_64::instructions::port::Port;

/// PCI configuration address port
const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
/// PCI configuration data port
const PCI_CONFIG_DATA: u16 = 0xCFC;

struct LegacyPciPorts {
    address_port: Port<u32>,
    data_port: Port<u32>,
}

/// アドレス書き込みとデータアクセスの組を不可分にする
static LEGACY_PCI: Mutex<LegacyPciPorts> = Mutex::new(LegacyPciPorts {
    address_port: Port::new(PCI_CONFIG_ADDRESS),
    data_port: Port::new(PCI_CONFIG_DATA),
});

/// Legacy PCI Configuration Space アクセサ
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyPciAccessor;

impl LegacyPciAccessor {
    pub const fn new() -> Self {
        Self
    }

    fn read_dword(&self, bdf: BdfAddress, offset: u8) -> u32 {
        let mut ports = LEGACY_PCI.lock();
        // SAFETY: CF8h/CFCh は PCI ホストブリッジ固定のポート
        unsafe {
            ports.address_port.write(bdf.legacy_address(offset));
            ports.data_port.read()
        }
    }

    fn write_dword(&self, bdf: BdfAddress, offset: u8, value: u32) {
        let mut ports = LEGACY_PCI.lock();
        // SAFETY: 同上
        unsafe {
            ports.address_port.write(bdf.legacy_address(offset));
            ports.data_port.write(value);
        }
    }

    /// 読み出した dword の一部を差し替えて書き戻す
    fn merge(&self, bdf: BdfAddress, offset: u16, width_mask: u32, value: u32) {
        let aligned = (offset & 0xFC) as u8;
        let shift = (offset & 3) * 8;
        let dword = self.read_dword(bdf, aligned);
        let merged = (dword & !(width_mask << shift)) | ((value & width_mask) << shift);
        self.write_dword(bdf, aligned, merged);
    }
}

impl ConfigSpaceAccessor for LegacyPciAccessor {
    fn read8(&self, bdf: BdfAddress, offset: u16) -> u8 {
        if offset >= 256 {
            return 0xFF;
        }
        let dword = self.read_dword(bdf, (offset & 0xFC) as u8);
        (dword >> ((offset & 3) * 8)) as u8
    }

    fn read16(&self, bdf: BdfAddress, offset: u16) -> u16 {
        if offset >= 256 || (offset & 1) != 0 {
            return 0xFFFF;
        }
        let dword = self.read_dword(bdf, (offset & 0xFC) as u8);
        (dword >> ((offset & 2) * 8)) as u16
    }

    fn write8(&self, bdf: BdfAddress, offset: u16, value: u8) {
        if offset < 256 {
            self.merge(bdf, offset, 0xFF, value as u32);
        }
    }

    fn write16(&self, bdf: BdfAddress, offset: u16, value: u16) {
        if offset < 256 && (offset & 1) == 0 {
            self.merge(bdf, offset, 0xFFFF, value as u32);
        }
    }
}
