// ============================================================================
// src/io/pci/traits.rs - PCI Configuration Space Accessor Trait
// ============================================================================
//!
//! Configuration Space アクセストレイト
//!
//! probe ロジックはこのトレイト越しにだけ PCI を触るので、
//! テストではメモリ上の Configuration Space を差し込める。

use super::types::{BdfAddress, command_bits, config_regs, smbus_config};

/// PCI Configuration Space アクセサトレイト
pub trait ConfigSpaceAccessor {
    /// 8ビット読み取り
    fn read8(&self, bdf: BdfAddress, offset: u16) -> u8;

    /// 16ビット読み取り
    fn read16(&self, bdf: BdfAddress, offset: u16) -> u16;

    /// 8ビット書き込み
    fn write8(&self, bdf: BdfAddress, offset: u16, value: u8);

    /// 16ビット書き込み
    fn write16(&self, bdf: BdfAddress, offset: u16, value: u16);

    // ========================================================================
    // Convenience methods with default implementations
    // ========================================================================

    /// ベンダーIDを読み取り
    fn read_vendor_id(&self, bdf: BdfAddress) -> u16 {
        self.read16(bdf, config_regs::VENDOR_ID)
    }

    /// デバイスIDを読み取り
    fn read_device_id(&self, bdf: BdfAddress) -> u16 {
        self.read16(bdf, config_regs::DEVICE_ID)
    }

    /// デバイスが存在するか確認
    fn device_exists(&self, bdf: BdfAddress) -> bool {
        self.read_vendor_id(bdf) != 0xFFFF
    }

    /// 割り込みラインを読み取り（0xFF = 未接続）
    fn read_interrupt_line(&self, bdf: BdfAddress) -> u8 {
        self.read8(bdf, config_regs::INTERRUPT_LINE)
    }

    /// I/O 空間デコードを有効化し、INTx を許可
    fn enable_io_space(&self, bdf: BdfAddress) {
        let cmd = self.read16(bdf, config_regs::COMMAND);
        let new = (cmd | command_bits::IO_SPACE) & !command_bits::INTERRUPT_DISABLE;
        if new != cmd {
            self.write16(bdf, config_regs::COMMAND, new);
        }
    }

    // ========================================================================
    // SMBus Function Helpers
    // ========================================================================

    /// SMBus I/O ベースアドレス (SMBA)
    fn read_smbus_base(&self, bdf: BdfAddress) -> u16 {
        self.read16(bdf, smbus_config::SMBBASE) & smbus_config::SMBBASE_MASK
    }

    /// ホストコンフィグ (HSTCFG)
    fn read_host_config(&self, bdf: BdfAddress) -> u8 {
        self.read8(bdf, smbus_config::SMBHSTCFG)
    }

    fn write_host_config(&self, bdf: BdfAddress, value: u8) {
        self.write8(bdf, smbus_config::SMBHSTCFG, value);
    }
}
