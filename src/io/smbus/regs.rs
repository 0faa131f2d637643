// ============================================================================
// src/io/smbus/regs.rs - i801 SMBus Register Definitions
// ============================================================================
//!
//! i801 SMBus ホストコントローラのレジスタ定義。
//!
//! 全レジスタは SMBA からのオフセットで指定する 8 ビット幅。
//! HSTSTS と SLVSTS のステータスビットは 1 を書くとクリアされる (RW1C)。

// ============================================================================
// Register Offsets
// ============================================================================

/// SMBA からのレジスタオフセット
pub mod offsets {
    /// Host Status - RW1C
    pub const HSTSTS: u16 = 0;
    /// Host Control - RW
    pub const HSTCNT: u16 = 2;
    /// Host Command - RW
    pub const HSTCMD: u16 = 3;
    /// Transmit Slave Address - RW
    pub const HSTADD: u16 = 4;
    /// Host Data 0 - RW
    pub const HSTDAT0: u16 = 5;
    /// Host Data 1 - RW
    pub const HSTDAT1: u16 = 6;
    /// Host Block Data - RW
    pub const BLKDAT: u16 = 7;
    /// Packet Error Check - RW
    pub const PEC: u16 = 8;
    /// Auxiliary Status - RW1C
    pub const AUXSTS: u16 = 12;
    /// Auxiliary Control - RW
    pub const AUXCTL: u16 = 13;
    /// Slave Status - RW1C
    pub const SLVSTS: u16 = 16;
    /// Slave Command - RW
    pub const SLVCMD: u16 = 17;
    /// Notify Device Address - RO
    pub const NTFDADD: u16 = 20;
    /// Notify Data Low - RO
    pub const NTFDDAT: u16 = 22;
}

// ============================================================================
// Host Status (HSTSTS) bits
// ============================================================================

pub mod hststs_bits {
    /// トランザクション実行中
    pub const HOST_BUSY: u8 = 1 << 0;
    /// トランザクション正常完了
    pub const INTR: u8 = 1 << 1;
    /// デバイスエラー（NACK / 未応答）
    pub const DEV_ERR: u8 = 1 << 2;
    /// バス衝突（調停負け）
    pub const BUS_ERR: u8 = 1 << 3;
    /// KILL による失敗
    pub const FAILED: u8 = 1 << 4;
    pub const SMBALERT: u8 = 1 << 5;
    pub const INUSE: u8 = 1 << 6;
    /// ブロック転送で 1 バイト完了
    pub const BYTE_DONE: u8 = 1 << 7;

    /// エラーを示すビット
    pub const ERROR_FLAGS: u8 = FAILED | BUS_ERR | DEV_ERR;
    /// 終端ステータスとして扱うビット
    pub const COMPLETION_FLAGS: u8 = INTR | ERROR_FLAGS;
    /// トランザクション開始前にクリアするビット
    pub const STATUS_FLAGS: u8 = BYTE_DONE | INTR | ERROR_FLAGS;
}

// ============================================================================
// Host Control (HSTCNT) bits
// ============================================================================

pub mod hstcnt_bits {
    /// 完了時に割り込みを発生
    pub const INTREN: u8 = 1 << 0;
    /// 実行中のトランザクションを中止
    pub const KILL: u8 = 1 << 1;
    /// 次のバイトが最後（ブロック読み取り）
    pub const LAST_BYTE: u8 = 1 << 5;
    /// トランザクション開始
    pub const START: u8 = 1 << 6;
    /// ハードウェア PEC
    pub const PEC_EN: u8 = 1 << 7;
}

// ============================================================================
// Command codes (HSTCNT bits 4:2)
// ============================================================================

pub mod command {
    pub const QUICK: u8 = 0x00;
    pub const BYTE: u8 = 0x04;
    pub const BYTE_DATA: u8 = 0x08;
    pub const WORD_DATA: u8 = 0x0C;
    pub const BLOCK_DATA: u8 = 0x14;
    pub const I2C_BLOCK_DATA: u8 = 0x18;
}

// ============================================================================
// Auxiliary Control (AUXCTL) bits
// ============================================================================

pub mod auxctl_bits {
    /// ハードウェア CRC (PEC) 付加
    pub const CRC: u8 = 1 << 0;
    /// 32 バイトブロックバッファ有効
    pub const E32B: u8 = 1 << 1;
}

// ============================================================================
// Slave Status / Slave Command bits
// ============================================================================

pub mod slvsts_bits {
    /// Host-Notify メッセージ受信
    pub const HST_NTFY_STS: u8 = 1 << 0;
}

pub mod slvcmd_bits {
    /// Host-Notify 受信で割り込み
    pub const HST_NTFY_INTREN: u8 = 1 << 0;
}

/// HSTADD に書く値（7ビットアドレス + R/W ビット）
#[inline]
pub const fn address_byte(address: u8, read: bool) -> u8 {
    ((address & 0x7F) << 1) | read as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_groups() {
        assert_eq!(hststs_bits::ERROR_FLAGS, 0x1C);
        assert_eq!(hststs_bits::STATUS_FLAGS, 0x9E);
        assert_eq!(hststs_bits::COMPLETION_FLAGS, 0x1E);
    }

    #[test]
    fn test_address_byte() {
        assert_eq!(address_byte(0x15, false), 0x2A);
        assert_eq!(address_byte(0x15, true), 0x2B);
        assert_eq!(address_byte(0x7F, true), 0xFF);
    }
}
