// ============================================================================
// src/io/smbus/controller.rs - Transaction Dispatcher
// ============================================================================
//!
//! 公開転送 API とリトライループ。
//!
//! 各ヘルパーは `TransferRequest` を組み立てて `transfer()` に渡す。
//! `transfer()` は調停負けのときだけ `retries` 回まで再試行し、
//! タイムアウト・デバイスエラー・バスエラーは即座に返す。
//!
//! ロックは 2 段になっている。`bus` は論理転送全体（リトライを含む）を
//! 直列化し、割り込みハンドラは取らない。`adapter` はレジスタ操作を
//! 直列化し、完了待ちの間だけ手放してハンドラに譲る。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::adapter::Adapter;
use super::config::{Features, SmbusConfig};
use super::host_notify::HostNotifyListener;
use super::stats::{SmbusStats, StatsSnapshot};
use super::types::{
    BLOCK_MAX, Direction, Protocol, SlaveDevice, SmbusData, TransactionOutcome,
    TransferRequest,
};
use crate::error::{InitError, SmbusError, SmbusResult};
use crate::io::port::RegisterIo;
use crate::sync::{CompletionMutex, IrqMutex};
use crate::time::Clock;

/// I2C モード (HSTCFG.I2C_EN) の切り替え
///
/// I2C ブロック書き込みの間だけ長さバイトの送出を止めるのに使う。
pub type I2cModeSwitch = Box<dyn Fn(bool) + Send + Sync>;

/// SMBus ホストコントローラ
pub struct SmbusController<R: RegisterIo, C: Clock> {
    /// 実行中の論理転送は常に 1 つ
    bus: spin::Mutex<()>,
    pub(super) adapter: CompletionMutex<Adapter<R>>,
    pub(super) clock: C,
    features: Features,
    /// 割り込みハンドラからも読むので IrqMutex
    pub(super) listener: IrqMutex<Option<Arc<dyn HostNotifyListener>>>,
    pub(super) i2c_mode: Option<I2cModeSwitch>,
    pub(super) stats: SmbusStats,
}

impl<R: RegisterIo, C: Clock> SmbusController<R, C> {
    /// コントローラを初期化する
    ///
    /// 割り込みモードが使えない構成（ポーリングモード）は受け付けない。
    pub fn new(regs: R, clock: C, config: &SmbusConfig) -> Result<Self, InitError> {
        if !config.features.contains(Features::IRQ) {
            log::error!("smbus: interrupt mode unavailable, poll mode is not supported");
            return Err(InitError::PollModeUnsupported);
        }

        let mut adapter = Adapter::new(regs, config.features)
            .with_limits(config.retries, config.timeout_nanos());
        adapter.enable_host_notify();

        log::info!(
            "smbus: controller ready (retries={}, timeout={}ms, features={:?})",
            config.retries,
            config.timeout_ms,
            config.features
        );

        Ok(Self {
            bus: spin::Mutex::new(()),
            adapter: CompletionMutex::new(adapter),
            clock,
            features: config.features,
            listener: IrqMutex::new(None),
            i2c_mode: None,
            stats: SmbusStats::new(),
        })
    }

    /// I2C ブロック書き込みを有効にする
    pub fn with_i2c_mode_switch(mut self, switch: I2cModeSwitch) -> Self {
        self.i2c_mode = Some(switch);
        self
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn retries(&self) -> u32 {
        self.adapter.lock().retries()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 直近のトランザクションで観測したホストステータス
    pub fn last_status(&self) -> u8 {
        self.adapter.lock().last_status()
    }

    /// Host-Notify の受け手を登録（既存の登録は置き換え）
    pub fn set_host_notify_listener(&self, listener: Arc<dyn HostNotifyListener>) {
        let previous = self.listener.lock().replace(listener);
        // 古い受け手の解放は割り込みを戻してから
        drop(previous);
    }

    pub fn clear_host_notify_listener(&self) {
        let previous = self.listener.lock().take();
        drop(previous);
    }

    /// レジスタを触る前に要求を検証する
    fn validate(&self, request: &TransferRequest) -> SmbusResult<()> {
        match (request.protocol, request.direction) {
            (Protocol::I2cBlockData, Direction::Read) => {
                if !self.features.contains(Features::I2C_BLOCK_READ) {
                    return Err(SmbusError::UnsupportedProtocol(Protocol::I2cBlockData));
                }
            }
            (Protocol::I2cBlockData, Direction::Write) => {
                if self.i2c_mode.is_none() {
                    return Err(SmbusError::UnsupportedProtocol(Protocol::I2cBlockData));
                }
            }
            _ => {}
        }

        let needs_length = request.protocol == Protocol::I2cBlockData
            || (request.protocol == Protocol::BlockData && request.direction == Direction::Write);
        if needs_length {
            let len = request.data.block[0];
            if len == 0 || len as usize > BLOCK_MAX {
                return Err(SmbusError::InvalidBlockLength(len));
            }
        }
        Ok(())
    }

    /// 1 回の論理転送（調停負けのみ再試行）
    ///
    /// 他の呼び出し元の転送が終わるまで待ってから始める。
    /// 成功時、読み取り結果は `request.data` に格納される。
    pub fn transfer(
        &self,
        device: &SlaveDevice,
        request: &mut TransferRequest,
    ) -> SmbusResult<TransactionOutcome> {
        self.validate(request)?;

        let _bus = self.bus.lock();
        let retries = self.retries();
        let mut attempt = 0;
        loop {
            #[cfg(feature = "verbose_logging")]
            log::debug!(
                "smbus: addr={} cmd={:#04x} {:?} {:?} attempt={}",
                device.address,
                request.command,
                request.protocol,
                request.direction,
                attempt
            );

            match self.attempt(device, request) {
                Ok((raw_status, byte_count)) => {
                    self.stats.record_transaction();
                    return Ok(TransactionOutcome {
                        raw_status,
                        attempts: attempt + 1,
                        byte_count,
                    });
                }
                Err(SmbusError::ArbitrationLoss { status, .. }) => {
                    if attempt >= retries {
                        self.stats.record_error();
                        return Err(SmbusError::ArbitrationLoss {
                            status,
                            attempts: attempt + 1,
                        });
                    }
                    log::debug!("smbus: lost arbitration, retrying ({})", attempt + 1);
                    self.stats.record_retry();
                    attempt += 1;
                }
                Err(err) => {
                    match err {
                        SmbusError::Timeout { .. } => self.stats.record_timeout(),
                        _ => self.stats.record_error(),
                    }
                    return Err(err);
                }
            }
        }
    }

    // ========================================================================
    // Protocol helpers
    // ========================================================================

    /// Quick コマンド（R/W ビットのみ）
    pub fn quick(&self, device: &SlaveDevice, direction: Direction) -> SmbusResult<()> {
        let mut request = TransferRequest::new(direction, 0, Protocol::Quick);
        self.transfer(device, &mut request).map(|_| ())
    }

    /// Receive Byte
    pub fn read_byte(&self, device: &SlaveDevice) -> SmbusResult<u8> {
        let mut request = TransferRequest::new(Direction::Read, 0, Protocol::Byte);
        self.transfer(device, &mut request)?;
        Ok(request.data.byte())
    }

    /// Send Byte
    pub fn write_byte(&self, device: &SlaveDevice, value: u8) -> SmbusResult<()> {
        let mut request = TransferRequest::new(Direction::Write, value, Protocol::Byte);
        self.transfer(device, &mut request).map(|_| ())
    }

    pub fn read_byte_data(&self, device: &SlaveDevice, command: u8) -> SmbusResult<u8> {
        let mut request = TransferRequest::new(Direction::Read, command, Protocol::ByteData);
        self.transfer(device, &mut request)?;
        Ok(request.data.byte())
    }

    pub fn write_byte_data(&self, device: &SlaveDevice, command: u8, value: u8) -> SmbusResult<()> {
        let mut request = TransferRequest::new(Direction::Write, command, Protocol::ByteData)
            .with_data(SmbusData::from_byte(value));
        self.transfer(device, &mut request).map(|_| ())
    }

    pub fn read_word_data(&self, device: &SlaveDevice, command: u8) -> SmbusResult<u16> {
        let mut request = TransferRequest::new(Direction::Read, command, Protocol::WordData);
        self.transfer(device, &mut request)?;
        Ok(request.data.word())
    }

    pub fn write_word_data(&self, device: &SlaveDevice, command: u8, value: u16) -> SmbusResult<()> {
        let mut request = TransferRequest::new(Direction::Write, command, Protocol::WordData)
            .with_data(SmbusData::from_word(value));
        self.transfer(device, &mut request).map(|_| ())
    }

    /// SMBus ブロック読み取り（長さはスレーブが決める）
    pub fn read_block_data(&self, device: &SlaveDevice, command: u8) -> SmbusResult<Vec<u8>> {
        let mut request = TransferRequest::new(Direction::Read, command, Protocol::BlockData);
        self.transfer(device, &mut request)?;
        Ok(request.data.payload().to_vec())
    }

    pub fn write_block_data(&self, device: &SlaveDevice, command: u8, bytes: &[u8]) -> SmbusResult<()> {
        let mut request = TransferRequest::new(Direction::Write, command, Protocol::BlockData)
            .with_data(SmbusData::from_block(bytes)?);
        self.transfer(device, &mut request).map(|_| ())
    }

    /// I2C ブロック読み取り（`len` バイト）
    pub fn read_i2c_block_data(
        &self,
        device: &SlaveDevice,
        command: u8,
        len: u8,
    ) -> SmbusResult<Vec<u8>> {
        let mut request = TransferRequest::new(Direction::Read, command, Protocol::I2cBlockData)
            .with_data(SmbusData::with_length(len)?);
        self.transfer(device, &mut request)?;
        Ok(request.data.payload().to_vec())
    }

    pub fn write_i2c_block_data(
        &self,
        device: &SlaveDevice,
        command: u8,
        bytes: &[u8],
    ) -> SmbusResult<()> {
        let mut request = TransferRequest::new(Direction::Write, command, Protocol::I2cBlockData)
            .with_data(SmbusData::from_block(bytes)?);
        self.transfer(device, &mut request).map(|_| ())
    }
}

impl<R: RegisterIo, C: Clock> Drop for SmbusController<R, C> {
    fn drop(&mut self) {
        self.adapter.lock().disable_host_notify();
        log::info!("smbus: controller detached");
    }
}
