// ============================================================================
// src/io/pci/types.rs - PCI Type Definitions
// ============================================================================
//!
//! BDF アドレスと Configuration Space のレジスタ定義。

use core::fmt;

/// BDF (Bus/Device/Function) アドレス
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BdfAddress {
    pub bus: u8,
    /// 0-31
    pub device: u8,
    /// 0-7
    pub function: u8,
}

impl BdfAddress {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device: device & 0x1F,
            function: function & 0x07,
        }
    }

    /// CF8h に書くアドレス値（Enable ビット付き）
    pub const fn legacy_address(&self, offset: u8) -> u32 {
        0x8000_0000
            | ((self.bus as u32) << 16)
            | ((self.device as u32) << 11)
            | ((self.function as u32) << 8)
            | ((offset as u32) & 0xFC)
    }
}

impl fmt::Display for BdfAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

// ============================================================================
// Configuration Space Registers
// ============================================================================

/// 標準ヘッダのレジスタオフセット
pub mod config_regs {
    pub const VENDOR_ID: u16 = 0x00;
    pub const DEVICE_ID: u16 = 0x02;
    pub const COMMAND: u16 = 0x04;
    pub const INTERRUPT_LINE: u16 = 0x3C;
    pub const INTERRUPT_PIN: u16 = 0x3D;
}

/// コマンドレジスタビット
pub mod command_bits {
    pub const IO_SPACE: u16 = 1 << 0;
    pub const INTERRUPT_DISABLE: u16 = 1 << 10;
}

/// i801 SMBus ファンクション固有のレジスタ
pub mod smbus_config {
    /// SMBA: I/O ベースアドレス (BAR4)
    pub const SMBBASE: u16 = 0x20;
    /// ホストコンフィグ
    pub const SMBHSTCFG: u16 = 0x40;

    /// SMBBASE の I/O 空間指示ビットを除くマスク
    pub const SMBBASE_MASK: u16 = 0xFFFE;

    /// ホストコントローラ有効
    pub const HSTCFG_HST_EN: u8 = 1 << 0;
    /// 完了を SMI で配送（ポーリングモード）
    pub const HSTCFG_SMB_SMI_EN: u8 = 1 << 1;
    /// I2C モード
    pub const HSTCFG_I2C_EN: u8 = 1 << 2;

    /// Intel ベンダーID
    pub const VENDOR_INTEL: u16 = 0x8086;
}
