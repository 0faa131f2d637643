// ============================================================================
// src/io/smbus/config.rs - Driver Configuration
// ============================================================================

use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// コントローラの機能セット
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u32 {
        /// I2C ブロック読み取り
        const I2C_BLOCK_READ = 1 << 0;
        /// 割り込みで完了を受け取る（必須）
        const IRQ = 1 << 1;
        /// Host-Notify の受信
        const HOST_NOTIFY = 1 << 2;
        /// ハードウェア PEC
        const PEC = 1 << 3;
        /// 32 バイトブロックバッファ (E32B)
        const BLOCK_BUFFER = 1 << 4;
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::IRQ | Features::I2C_BLOCK_READ | Features::HOST_NOTIFY
    }
}

/// デフォルトのリトライ回数
pub const DEFAULT_RETRIES: u32 = 4;
/// デフォルトのタイムアウト (ms)
pub const DEFAULT_TIMEOUT_MS: u64 = 200;
/// attach 時に公開するタッチパッドのアドレス
pub const ELAN_TOUCHPAD_ADDRESS: u8 = 0x15;

/// SMBus ドライバ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbusConfig {
    /// 調停負け時の追加試行回数
    pub retries: u32,
    /// 1 試行あたりの完了待ちタイムアウト
    pub timeout_ms: u64,
    pub features: Features,
    /// attach 時にレジストリへ公開するスレーブアドレス
    pub devices: Vec<u8>,
}

impl Default for SmbusConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            features: Features::default(),
            devices: vec![ELAN_TOUCHPAD_ADDRESS],
        }
    }
}

impl SmbusConfig {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_devices(mut self, devices: &[u8]) -> Self {
        self.devices = devices.to_vec();
        self
    }

    /// タイムアウトをナノ秒で
    pub fn timeout_nanos(&self) -> crate::time::Nanoseconds {
        self.timeout_ms.saturating_mul(crate::time::NANOS_PER_MILLI)
    }
}
