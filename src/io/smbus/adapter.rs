// ============================================================================
// src/io/smbus/adapter.rs - Controller State
// ============================================================================
//!
//! コントローラ 1 台ぶんの可変状態。
//!
//! `Adapter` はディスパッチャと割り込みハンドラのどちらからも
//! `CompletionMutex` 越しにしか触られない。レジスタファイル `R` を
//! 所有するので、ハードウェアへの経路もこの型を通る一本だけになる。
//! リトライ回数とタイムアウトもここに置き、コントローラ 1 台ぶんの
//! 設定と観測値をまとめて持つ。

use super::block::BlockTransfer;
use super::config::{DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS, Features};
use super::regs::{hststs_bits, offsets};
use crate::io::port::RegisterIo;
use crate::time::{NANOS_PER_MILLI, Nanoseconds};

/// SMBus コントローラの状態
pub struct Adapter<R> {
    regs: R,
    features: Features,
    /// 調停負け時の追加試行回数
    retries: u32,
    /// 1 試行あたりの完了待ち時間
    timeout: Nanoseconds,
    /// ドライバ読み込み前の SLVCMD
    original_slvcmd: u8,
    /// Host-Notify 割り込みを有効にしたか
    pub(super) host_notify_enabled: bool,
    /// 直近のトランザクションで観測したホストステータス
    pub(super) last_status: u8,
    /// バイト単位ブロック転送の継続状態
    pub(super) block: BlockTransfer,
}

impl<R: RegisterIo> Adapter<R> {
    /// レジスタファイルを引き取り、復元用に SLVCMD を保存する
    pub fn new(mut regs: R, features: Features) -> Self {
        let original_slvcmd = regs.read8(offsets::SLVCMD);
        Self {
            regs,
            features,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT_MS * NANOS_PER_MILLI,
            original_slvcmd,
            host_notify_enabled: false,
            last_status: 0,
            block: BlockTransfer::new(),
        }
    }

    /// リトライ回数とタイムアウトを設定
    pub fn with_limits(mut self, retries: u32, timeout: Nanoseconds) -> Self {
        self.retries = retries;
        self.timeout = timeout;
        self
    }

    #[inline]
    pub(super) fn read(&mut self, offset: u16) -> u8 {
        self.regs.read8(offset)
    }

    #[inline]
    pub(super) fn write(&mut self, offset: u16, value: u8) {
        self.regs.write8(offset, value);
    }

    /// 現在のホストステータス
    pub fn host_status(&mut self) -> u8 {
        self.read(offsets::HSTSTS)
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn timeout(&self) -> Nanoseconds {
        self.timeout
    }

    pub fn original_slvcmd(&self) -> u8 {
        self.original_slvcmd
    }

    pub fn last_status(&self) -> u8 {
        self.last_status
    }

    /// HSTSTS の RW1C ビットをクリア
    #[inline]
    pub(super) fn clear_status(&mut self, bits: u8) {
        self.write(offsets::HSTSTS, bits & !hststs_bits::HOST_BUSY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::smbus::regs::slvcmd_bits;
    use crate::io::smbus::sim::SimBus;

    #[test]
    fn test_snapshot_slvcmd() {
        let sim = SimBus::new();
        sim.poke(offsets::SLVCMD, 0x04);

        let adapter = Adapter::new(sim.regs(), Features::default());
        assert_eq!(adapter.original_slvcmd(), 0x04);
        assert_eq!(adapter.original_slvcmd() & slvcmd_bits::HST_NTFY_INTREN, 0);
        assert!(!adapter.host_notify_enabled);
    }

    #[test]
    fn test_limits() {
        let sim = SimBus::new();
        let adapter = Adapter::new(sim.regs(), Features::default());
        assert_eq!(adapter.retries(), DEFAULT_RETRIES);
        assert_eq!(adapter.timeout(), 200 * NANOS_PER_MILLI);

        let adapter = adapter.with_limits(0, 5 * NANOS_PER_MILLI);
        assert_eq!(adapter.retries(), 0);
        assert_eq!(adapter.timeout(), 5 * NANOS_PER_MILLI);
    }

    #[test]
    fn test_clear_status_never_writes_busy() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());

        adapter.clear_status(0xFF);
        assert_eq!(sim.last_write(offsets::HSTSTS), Some(0xFE));
    }
}
