// ============================================================================
// src/io/smbus/sim.rs - Simulated i801 Register File (test only)
// ============================================================================
//!
//! ホスト上のテスト用に i801 のレジスタファイルを模擬する。
//!
//! - HSTSTS / SLVSTS は 1 を書くとクリア
//! - START ごとにスクリプトから応答を 1 つ取り出す（空なら正常完了）
//! - バイト単位ブロック転送は BYTE_DONE のクリアで次のバイトへ進む
//! - E32B が立っていれば 32 バイトバッファで 1 回の INTR で完了
//! - 全アクセスをスレッド ID 付きで記録する

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::vec::Vec;

use super::interrupt::InterruptHandler;
use super::regs::{auxctl_bits, command, hstcnt_bits, hststs_bits, offsets, slvcmd_bits, slvsts_bits};
use crate::io::pci::{BdfAddress, ConfigSpaceAccessor};
use crate::io::port::RegisterIo;

/// START に対するハードウェアの応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SimResponse {
    /// 正常完了（読み取りなら DAT0/DAT1 を返す）
    Complete { dat0: u8, dat1: u8 },
    /// 指定したエラービットで終了
    Error(u8),
    /// 応答なし（HOST_BUSY のまま、KILL で FAILED）
    NoResponse,
    /// ブロック読み取り（`len` は DAT0 に見える長さ）
    BlockRead { len: u8, bytes: Vec<u8> },
}

/// 1 回のレジスタアクセス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Access {
    pub thread: ThreadId,
    pub write: bool,
    pub offset: u16,
    pub value: u8,
}

/// START 時点のレジスタ内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimTransaction {
    pub address: u8,
    pub command: u8,
    pub control: u8,
    pub dat0: u8,
    pub dat1: u8,
    pub aux: u8,
    /// ブロック書き込みで受け取ったバイト
    pub written: Vec<u8>,
}

enum ByteTransfer {
    Read { queue: VecDeque<u8> },
    Write { len: usize, written: Vec<u8> },
}

struct SimState {
    regs: [u8; 32],
    log: Vec<Access>,
    script: VecDeque<SimResponse>,
    transactions: Vec<SimTransaction>,
    block_buffer_supported: bool,
    fifo: [u8; 32],
    fifo_index: usize,
    byte_xfer: Option<ByteTransfer>,
    byte_done_raised: usize,
}

impl SimState {
    fn e32b(&self) -> bool {
        self.regs[offsets::AUXCTL as usize] & auxctl_bits::E32B != 0
    }

    fn set_status(&mut self, bits: u8) {
        self.regs[offsets::HSTSTS as usize] |= bits;
        if bits & hststs_bits::BYTE_DONE != 0 {
            self.byte_done_raised += 1;
        }
    }

    fn read(&mut self, offset: u16) -> u8 {
        match offset {
            offsets::HSTCNT => {
                if self.e32b() {
                    self.fifo_index = 0;
                }
                self.regs[offset as usize]
            }
            offsets::BLKDAT if self.e32b() => {
                let value = self.fifo[self.fifo_index % 32];
                self.fifo_index += 1;
                value
            }
            _ => self.regs[offset as usize],
        }
    }

    fn write(&mut self, offset: u16, value: u8) {
        match offset {
            offsets::HSTSTS => {
                self.regs[offset as usize] &= !(value & !hststs_bits::HOST_BUSY);
                if value & hststs_bits::BYTE_DONE != 0 {
                    self.advance_byte_transfer();
                }
            }
            offsets::SLVSTS => self.regs[offset as usize] &= !value,
            offsets::HSTCNT => {
                if value & hstcnt_bits::KILL != 0 {
                    self.kill();
                }
                self.regs[offset as usize] = value & !hstcnt_bits::START;
                if value & hstcnt_bits::START != 0 {
                    self.start(value);
                }
            }
            offsets::AUXCTL => {
                let mut value = value;
                if !self.block_buffer_supported {
                    value &= !auxctl_bits::E32B;
                }
                self.regs[offset as usize] = value;
            }
            offsets::BLKDAT if self.e32b() => {
                self.fifo[self.fifo_index % 32] = value;
                self.fifo_index += 1;
            }
            _ => self.regs[offset as usize] = value,
        }
    }

    fn kill(&mut self) {
        let status = self.regs[offsets::HSTSTS as usize];
        if status & hststs_bits::HOST_BUSY != 0 || self.byte_xfer.is_some() {
            self.regs[offsets::HSTSTS as usize] = (status & !hststs_bits::HOST_BUSY) | hststs_bits::FAILED;
            self.byte_xfer = None;
        }
    }

    fn start(&mut self, control: u8) {
        let kind = control & 0x1C;
        let block = kind == command::BLOCK_DATA || kind == command::I2C_BLOCK_DATA;
        let read = kind == command::I2C_BLOCK_DATA
            || self.regs[offsets::HSTADD as usize] & 1 != 0;

        self.transactions.push(SimTransaction {
            address: self.regs[offsets::HSTADD as usize],
            command: self.regs[offsets::HSTCMD as usize],
            control,
            dat0: self.regs[offsets::HSTDAT0 as usize],
            dat1: self.regs[offsets::HSTDAT1 as usize],
            aux: self.regs[offsets::AUXCTL as usize],
            written: Vec::new(),
        });

        let response = self
            .script
            .pop_front()
            .unwrap_or(SimResponse::Complete { dat0: 0, dat1: 0 });

        match response {
            SimResponse::Error(bits) => self.set_status(bits),
            SimResponse::NoResponse => self.set_status(hststs_bits::HOST_BUSY),
            response if !block => {
                if let SimResponse::Complete { dat0, dat1 } = response {
                    if read {
                        self.regs[offsets::HSTDAT0 as usize] = dat0;
                        self.regs[offsets::HSTDAT1 as usize] = dat1;
                    }
                }
                self.set_status(hststs_bits::INTR);
            }
            response => {
                let (len, bytes) = match response {
                    SimResponse::BlockRead { len, bytes } => (len, bytes),
                    _ => (1, vec![0]),
                };
                if self.e32b() {
                    if read {
                        self.regs[offsets::HSTDAT0 as usize] = len;
                        for (slot, byte) in self.fifo.iter_mut().zip(bytes.iter()) {
                            *slot = *byte;
                        }
                    } else {
                        let len = self.regs[offsets::HSTDAT0 as usize] as usize;
                        let written = self.fifo[..len.min(32)].to_vec();
                        if let Some(tx) = self.transactions.last_mut() {
                            tx.written = written;
                        }
                    }
                    self.set_status(hststs_bits::INTR);
                } else if read {
                    let mut queue: VecDeque<u8> = bytes.into_iter().collect();
                    self.regs[offsets::HSTDAT0 as usize] = len;
                    self.regs[offsets::BLKDAT as usize] = queue.pop_front().unwrap_or(0);
                    self.byte_xfer = Some(ByteTransfer::Read { queue });
                    self.set_status(hststs_bits::BYTE_DONE);
                } else {
                    let len = self.regs[offsets::HSTDAT0 as usize] as usize;
                    let written = vec![self.regs[offsets::BLKDAT as usize]];
                    self.byte_xfer = Some(ByteTransfer::Write { len, written });
                    self.set_status(hststs_bits::BYTE_DONE);
                }
            }
        }
    }

    fn advance_byte_transfer(&mut self) {
        let Some(xfer) = self.byte_xfer.take() else {
            return;
        };
        match xfer {
            ByteTransfer::Read { mut queue } => match queue.pop_front() {
                Some(byte) => {
                    self.regs[offsets::BLKDAT as usize] = byte;
                    self.byte_xfer = Some(ByteTransfer::Read { queue });
                    self.set_status(hststs_bits::BYTE_DONE);
                }
                None => self.set_status(hststs_bits::INTR),
            },
            ByteTransfer::Write { len, mut written } => {
                if written.len() < len {
                    written.push(self.regs[offsets::BLKDAT as usize]);
                    self.byte_xfer = Some(ByteTransfer::Write { len, written });
                    self.set_status(hststs_bits::BYTE_DONE);
                } else {
                    if let Some(tx) = self.transactions.last_mut() {
                        tx.written = written;
                    }
                    self.set_status(hststs_bits::INTR);
                }
            }
        }
    }

    fn line_asserted(&self) -> bool {
        let host = self.regs[offsets::HSTCNT as usize] & hstcnt_bits::INTREN != 0
            && self.regs[offsets::HSTSTS as usize] & hststs_bits::STATUS_FLAGS != 0;
        let notify = self.regs[offsets::SLVCMD as usize] & slvcmd_bits::HST_NTFY_INTREN != 0
            && self.regs[offsets::SLVSTS as usize] & slvsts_bits::HST_NTFY_STS != 0;
        host || notify
    }
}

/// 模擬 SMBus コントローラ（クローンは同じレジスタファイルを共有）
#[derive(Clone)]
pub(crate) struct SimBus {
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                regs: [0; 32],
                log: Vec::new(),
                script: VecDeque::new(),
                transactions: Vec::new(),
                block_buffer_supported: false,
                fifo: [0; 32],
                fifo_index: 0,
                byte_xfer: None,
                byte_done_raised: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// ドライバに渡すレジスタファイル
    pub(crate) fn regs(&self) -> SimBus {
        self.clone()
    }

    /// 副作用なしでレジスタを設定
    pub(crate) fn poke(&self, offset: u16, value: u8) {
        self.state().regs[offset as usize] = value;
    }

    /// 副作用なしでレジスタを読む
    pub(crate) fn peek(&self, offset: u16) -> u8 {
        self.state().regs[offset as usize]
    }

    pub(crate) fn push_response(&self, response: SimResponse) {
        self.state().script.push_back(response);
    }

    pub(crate) fn set_block_buffer_supported(&self, supported: bool) {
        self.state().block_buffer_supported = supported;
    }

    /// スレーブから Host-Notify が届いたことにする
    pub(crate) fn raise_host_notify(&self) {
        self.state().regs[offsets::SLVSTS as usize] |= slvsts_bits::HST_NTFY_STS;
    }

    pub(crate) fn line_asserted(&self) -> bool {
        self.state().line_asserted()
    }

    pub(crate) fn starts(&self) -> usize {
        self.state().transactions.len()
    }

    pub(crate) fn transactions(&self) -> Vec<SimTransaction> {
        self.state().transactions.clone()
    }

    pub(crate) fn accesses(&self) -> Vec<Access> {
        self.state().log.clone()
    }

    pub(crate) fn byte_done_raised(&self) -> usize {
        self.state().byte_done_raised
    }

    /// `offset` への最後の書き込み値
    pub(crate) fn last_write(&self, offset: u16) -> Option<u8> {
        self.state()
            .log
            .iter()
            .rev()
            .find(|access| access.write && access.offset == offset)
            .map(|access| access.value)
    }

    /// `offset` への書き込み値を順に
    pub(crate) fn writes_to(&self, offset: u16) -> Vec<u8> {
        self.state()
            .log
            .iter()
            .filter(|access| access.write && access.offset == offset)
            .map(|access| access.value)
            .collect()
    }
}

impl RegisterIo for SimBus {
    fn read8(&mut self, offset: u16) -> u8 {
        let mut state = self.state();
        let value = state.read(offset);
        state.log.push(Access {
            thread: thread::current().id(),
            write: false,
            offset,
            value,
        });
        value
    }

    fn write8(&mut self, offset: u16, value: u8) {
        let mut state = self.state();
        state.log.push(Access {
            thread: thread::current().id(),
            write: true,
            offset,
            value,
        });
        state.write(offset, value);
    }
}

/// 割り込み線が立つたびにハンドラを呼ぶスレッド
pub(crate) struct IrqThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IrqThread {
    pub(crate) fn spawn(sim: SimBus, handler: Arc<dyn InterruptHandler>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    if sim.line_asserted() {
                        handler.handle_interrupt();
                    } else {
                        thread::yield_now();
                    }
                }
            })
        };
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for IrqThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Simulated PCI configuration space
// ============================================================================

/// 1 ファンクションぶんの Configuration Space
#[derive(Clone)]
pub(crate) struct SimPci {
    space: Arc<Mutex<[u8; 256]>>,
    host_config_writes: Arc<Mutex<Vec<u8>>>,
}

impl SimPci {
    /// 有効な i801 SMBus ファンクション（SMBA=0xEFA1, IRQ 18, HST_EN）
    pub(crate) fn i801() -> Self {
        let pci = Self {
            space: Arc::new(Mutex::new([0; 256])),
            host_config_writes: Arc::new(Mutex::new(Vec::new())),
        };
        {
            let mut space = pci.space.lock().unwrap();
            space[0x00] = 0x86;
            space[0x01] = 0x80;
            space[0x20] = 0xA1;
            space[0x21] = 0xEF;
            space[0x3C] = 18;
            space[0x40] = 0x01;
        }
        pci
    }

    pub(crate) fn set(&self, offset: u16, value: u8) {
        self.space.lock().unwrap()[offset as usize] = value;
    }

    pub(crate) fn get(&self, offset: u16) -> u8 {
        self.space.lock().unwrap()[offset as usize]
    }

    pub(crate) fn host_config_writes(&self) -> Vec<u8> {
        self.host_config_writes.lock().unwrap().clone()
    }
}

impl ConfigSpaceAccessor for SimPci {
    fn read8(&self, _bdf: BdfAddress, offset: u16) -> u8 {
        self.get(offset)
    }

    fn read16(&self, _bdf: BdfAddress, offset: u16) -> u16 {
        let space = self.space.lock().unwrap();
        u16::from_le_bytes([space[offset as usize], space[offset as usize + 1]])
    }

    fn write8(&self, _bdf: BdfAddress, offset: u16, value: u8) {
        if offset == crate::io::pci::smbus_config::SMBHSTCFG {
            self.host_config_writes.lock().unwrap().push(value);
        }
        self.set(offset, value);
    }

    fn write16(&self, _bdf: BdfAddress, offset: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        let mut space = self.space.lock().unwrap();
        space[offset as usize] = lo;
        space[offset as usize + 1] = hi;
    }
}
