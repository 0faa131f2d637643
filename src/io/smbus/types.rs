// ============================================================================
// src/io/smbus/types.rs - SMBus Transfer Types
// ============================================================================
//!
//! トランザクションを記述する型。
//!
//! ブロックプロトコルのペイロードは「長さバイト + データ」の形で
//! `SmbusData` に格納される（`block[0]` が長さ、`block[1..=len]` がデータ）。

use bitflags::bitflags;
use core::fmt;

use crate::error::{SmbusError, SmbusResult};

/// ブロック転送の最大長
pub const BLOCK_MAX: usize = 32;

/// 転送方向（HSTADD の R/W ビット）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    pub const fn is_read(self) -> bool {
        matches!(self, Direction::Read)
    }
}

/// SMBus プロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// R/W ビットのみ
    Quick,
    /// Send Byte / Receive Byte
    Byte,
    ByteData,
    WordData,
    /// SMBus ブロック（長さはスレーブが送る）
    BlockData,
    /// I2C ブロック（長さは呼び出し側が決める）
    I2cBlockData,
}

impl Protocol {
    pub const fn is_block(self) -> bool {
        matches!(self, Protocol::BlockData | Protocol::I2cBlockData)
    }
}

/// 7ビットスレーブアドレス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    /// 0x7F を超えるアドレスは `InvalidAddress`
    pub const fn new(address: u8) -> SmbusResult<Self> {
        if address > 0x7F {
            return Err(SmbusError::InvalidAddress(address));
        }
        Ok(Self(address))
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SlaveAddress {
    type Error = SmbusError;

    fn try_from(address: u8) -> SmbusResult<Self> {
        Self::new(address)
    }
}

impl fmt::Display for SlaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

bitflags! {
    /// クライアント（スレーブドライバ）ごとのフラグ
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u8 {
        /// Packet Error Checking を使う
        const PEC = 1 << 0;
    }
}

/// クライアント識別子（不透明）
pub type ClientId = u32;

/// 登録済みスレーブデバイス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveDevice {
    pub address: SlaveAddress,
    pub client: ClientId,
    pub flags: ClientFlags,
}

impl SlaveDevice {
    pub const fn new(address: SlaveAddress, client: ClientId) -> Self {
        Self {
            address,
            client,
            flags: ClientFlags::empty(),
        }
    }

    pub const fn with_flags(mut self, flags: ClientFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// 転送バッファ
///
/// バイト/ワードは先頭から、ブロックは長さプレフィクス付きで格納する。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SmbusData {
    /// 長さ + 最大32バイト + PEC 用の予備
    pub block: [u8; BLOCK_MAX + 2],
}

impl SmbusData {
    pub const fn new() -> Self {
        Self {
            block: [0; BLOCK_MAX + 2],
        }
    }

    pub const fn from_byte(value: u8) -> Self {
        let mut data = Self::new();
        data.block[0] = value;
        data
    }

    pub const fn from_word(value: u16) -> Self {
        let mut data = Self::new();
        data.block[0] = value as u8;
        data.block[1] = (value >> 8) as u8;
        data
    }

    /// ブロック書き込み用（1..=32 バイト）
    pub fn from_block(bytes: &[u8]) -> SmbusResult<Self> {
        if bytes.is_empty() || bytes.len() > BLOCK_MAX {
            return Err(SmbusError::InvalidBlockLength(bytes.len().min(u8::MAX as usize) as u8));
        }
        let mut data = Self::new();
        data.block[0] = bytes.len() as u8;
        data.block[1..=bytes.len()].copy_from_slice(bytes);
        Ok(data)
    }

    /// I2C ブロック読み取りの要求長を設定したバッファ
    pub fn with_length(len: u8) -> SmbusResult<Self> {
        if len == 0 || len as usize > BLOCK_MAX {
            return Err(SmbusError::InvalidBlockLength(len));
        }
        let mut data = Self::new();
        data.block[0] = len;
        Ok(data)
    }

    pub const fn byte(&self) -> u8 {
        self.block[0]
    }

    pub const fn word(&self) -> u16 {
        (self.block[0] as u16) | ((self.block[1] as u16) << 8)
    }

    /// 長さプレフィクス
    pub const fn block_len(&self) -> usize {
        self.block[0] as usize
    }

    /// ペイロード部（長さは 32 で頭打ち）
    pub fn payload(&self) -> &[u8] {
        let len = self.block_len().min(BLOCK_MAX);
        &self.block[1..=len]
    }
}

impl Default for SmbusData {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SmbusData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmbusData")
            .field("len", &self.block[0])
            .field("payload", &self.payload())
            .finish()
    }
}

/// 1回の論理転送要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    pub command: u8,
    pub protocol: Protocol,
    pub data: SmbusData,
}

impl TransferRequest {
    pub const fn new(direction: Direction, command: u8, protocol: Protocol) -> Self {
        Self {
            direction,
            command,
            protocol,
            data: SmbusData::new(),
        }
    }

    pub const fn with_data(mut self, data: SmbusData) -> Self {
        self.data = data;
        self
    }
}

/// 成功したトランザクションの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOutcome {
    /// 完了時に観測したホストステータス
    pub raw_status: u8,
    /// 実際に START を書いた回数
    pub attempts: u32,
    /// ブロックプロトコルで転送したバイト数
    pub byte_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slave_address_range() {
        assert_eq!(SlaveAddress::new(0x15).map(SlaveAddress::as_u8), Ok(0x15));
        assert_eq!(SlaveAddress::new(0x7F).map(SlaveAddress::as_u8), Ok(0x7F));
        assert_eq!(SlaveAddress::try_from(0x80), Err(SmbusError::InvalidAddress(0x80)));
    }

    #[test]
    fn test_block_length_prefix() {
        let data = SmbusData::from_block(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(data.block[0], 3);
        assert_eq!(data.payload(), &[0xAA, 0xBB, 0xCC]);

        assert_eq!(SmbusData::from_block(&[]), Err(SmbusError::InvalidBlockLength(0)));
        assert_eq!(
            SmbusData::from_block(&[0u8; 33]),
            Err(SmbusError::InvalidBlockLength(33))
        );
        assert!(SmbusData::from_block(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_word_little_endian() {
        let data = SmbusData::from_word(0x1234);
        assert_eq!(data.block[0], 0x34);
        assert_eq!(data.block[1], 0x12);
        assert_eq!(data.word(), 0x1234);
    }

    #[test]
    fn test_payload_clamped() {
        let mut data = SmbusData::new();
        data.block[0] = 0xFF;
        assert_eq!(data.payload().len(), BLOCK_MAX);
    }
}
