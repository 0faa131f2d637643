// ============================================================================
// src/lib.rs - i801 SMBus Host Controller Driver
// ============================================================================
//!
//! # i801 SMBus ホストコントローラドライバ
//!
//! Intel ICH/PCH 系 SMBus ホストコントローラを割り込み駆動で操作する。
//!
//! ## モジュール構成
//! - `error`: 統一エラー型
//! - `time`: タイムアウト計測用のクロック抽象
//! - `sync`: 割り込みハンドラと共有する直列化コンテキスト
//! - `io::port`: レジスタインタフェース（I/Oポート）
//! - `io::pci`: PCI Configuration Space アクセス（probe 時のみ使用）
//! - `io::smbus`: トランザクションエンジン本体
//!
//! ## 使用方法
//! ```ignore
//! let pci: SharedPci = Arc::new(LegacyPciAccessor::new());
//! let info = i801_smbus::io::smbus::probe(&*pci, bdf)?;
//! let regs = unsafe { PortIo::new(info.io_base) };
//! let driver = SmbusDriver::attach(pci, info, regs, TscClock::new(tsc_hz),
//!                                  &SmbusConfig::default(), registrar, registry)?;
//! let value = driver.controller().read_byte_data(&device, 0x04)?;
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod io;
pub mod sync;
pub mod time;

pub use error::{InitError, SmbusError, SmbusResult};
pub use io::smbus::{
    ClientFlags, Direction, Features, HostNotifyEvent, HostNotifyListener, Protocol,
    SlaveAddress, SlaveDevice, SmbusConfig, SmbusController, SmbusData, SmbusDriver,
    TransactionOutcome, TransferRequest,
};
