// ============================================================================
// src/io/mod.rs - I/O Subsystem Module
// ============================================================================
//!
//! ハードウェアアクセス層
//!
//! - `port`: 8ビットレジスタファイル（SMBus I/O 空間）
//! - `pci`: PCI Configuration Space（probe 時のみ）
//! - `smbus`: i801 SMBus ホストコントローラ

pub mod pci;
pub mod port;
pub mod smbus;

pub use port::RegisterIo;
#[cfg(target_arch = "x86_64")]
pub use port::PortIo;
