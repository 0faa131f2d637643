// ============================================================================
// src/io/smbus/mod.rs - i801 SMBus Host Controller
// ============================================================================
//!
//! # i801 SMBus ホストコントローラ
//!
//! 割り込みで完了を受け取る SMBus トランザクションエンジン。
//!
//! ## モジュール構成
//! - `regs`: レジスタ定義
//! - `types`: 転送要求・結果の型
//! - `config`: ドライバ設定と機能フラグ
//! - `adapter`: コントローラ状態
//! - `host_notify`: Host-Notify の有効化と受信
//! - `block`: バイト単位ブロック転送の継続
//! - `interrupt`: 割り込みハンドラ
//! - `transaction`: 1 試行ぶんのレジスタ操作
//! - `controller`: 公開 API とリトライループ
//! - `registry`: スレーブデバイスの登録簿
//! - `setup`: probe / attach / detach
//! - `stats`: 統計

pub mod adapter;
pub mod block;
pub mod config;
pub mod controller;
pub mod host_notify;
pub mod interrupt;
pub mod registry;
pub mod regs;
pub mod setup;
#[cfg(test)]
pub(crate) mod sim;
pub mod stats;
pub mod transaction;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::Adapter;
pub use config::{DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS, ELAN_TOUCHPAD_ADDRESS, Features, SmbusConfig};
pub use controller::{I2cModeSwitch, SmbusController};
pub use host_notify::{HostNotifyEvent, HostNotifyListener};
pub use interrupt::{InterruptHandler, IrqOutcome};
pub use registry::{DeviceRegistry, SlaveRegistry};
pub use setup::{InterruptRegistrar, ProbeInfo, SharedPci, SmbusDriver, probe};
pub use stats::{SmbusStats, StatsSnapshot};
pub use types::{
    BLOCK_MAX, ClientFlags, ClientId, Direction, Protocol, SlaveAddress, SlaveDevice, SmbusData,
    TransactionOutcome, TransferRequest,
};
