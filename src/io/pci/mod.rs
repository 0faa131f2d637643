// ============================================================================
// src/io/pci/mod.rs - PCI Configuration Space Access
// ============================================================================
//!
//! # PCI Configuration Space アクセス
//!
//! SMBus ホストコントローラの probe に必要な範囲だけを扱う。
//!
//! ## モジュール構成
//! - `traits`: ConfigSpaceAccessor トレイト
//! - `types`: BDF とレジスタオフセット
//! - `legacy`: CF8h/CFCh ポートによるアクセス

pub mod legacy;
pub mod traits;
pub mod types;

#[cfg(target_arch = "x86_64")]
pub use legacy::LegacyPciAccessor;
pub use traits::ConfigSpaceAccessor;
pub use types::{BdfAddress, command_bits, config_regs, smbus_config};
