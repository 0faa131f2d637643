// ============================================================================
// src/io/smbus/block.rs - Block-Transfer Continuation
// ============================================================================
//!
//! バイト単位ブロック転送の継続状態機械。
//!
//! ディスパッチャが `arm()` で状態を設定して START を書き、以降は
//! BYTE_DONE 割り込みごとに `on_byte_done()` が 1 バイトだけ動かす。
//! トランザクションの完了判定はしない（INTR/エラービットを見て
//! 完了させるのは割り込みハンドラ本体の役目）。

use super::adapter::Adapter;
use super::regs::{command, hstcnt_bits, hststs_bits, offsets};
use super::types::{BLOCK_MAX, Direction, SmbusData};
use crate::io::port::RegisterIo;

/// ブロック転送の継続状態
#[derive(Debug, Clone, Copy)]
pub struct BlockTransfer {
    active: bool,
    direction: Direction,
    /// HSTCNT に書いた値（START 抜き）
    cmd: u8,
    /// 転送長
    len: usize,
    /// 移動済みバイト数
    count: usize,
    data: SmbusData,
    /// ハードウェアが報告した範囲外の長さ
    invalid_len: Option<u8>,
}

/// 終了したブロック転送の結果
#[derive(Debug, Clone, Copy)]
pub struct BlockResult {
    pub data: SmbusData,
    pub count: usize,
    pub invalid_len: Option<u8>,
}

impl BlockTransfer {
    pub const fn new() -> Self {
        Self {
            active: false,
            direction: Direction::Write,
            cmd: 0,
            len: 0,
            count: 0,
            data: SmbusData::new(),
            invalid_len: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 長さをスレーブから受け取る SMBus ブロック読み取りか
    fn length_from_device(&self) -> bool {
        self.direction.is_read() && (self.cmd & 0x1C) == command::BLOCK_DATA
    }

    /// 転送を開始状態にする
    ///
    /// `cmd` は INTREN を含む HSTCNT の値。`len` は 1..=32 に揃えてあること。
    pub(super) fn arm(&mut self, direction: Direction, cmd: u8, len: usize, data: SmbusData) {
        *self = Self {
            active: true,
            direction,
            cmd,
            len,
            count: 0,
            data,
            invalid_len: None,
        };
    }

    /// 転送を終了して結果を取り出す
    pub(super) fn finish(&mut self) -> BlockResult {
        let result = BlockResult {
            data: self.data,
            count: self.count,
            invalid_len: self.invalid_len,
        };
        *self = Self::new();
        result
    }
}

impl Default for BlockTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegisterIo> Adapter<R> {
    /// BYTE_DONE 1 回ぶんのデータ移動
    ///
    /// 最後に BYTE_DONE をクリアしてハードウェアを次のバイトへ進める。
    pub(super) fn on_byte_done(&mut self) {
        if !self.block.is_active() {
            log::warn!("smbus: BYTE_DONE outside of a block transfer");
            self.clear_status(hststs_bits::BYTE_DONE);
            return;
        }

        let mut xfer = self.block;
        if xfer.direction.is_read() {
            if xfer.count == 0 && xfer.length_from_device() {
                let reported = self.read(offsets::HSTDAT0);
                xfer.len = reported as usize;
                if xfer.len < 1 || xfer.len > BLOCK_MAX {
                    log::error!("smbus: illegal SMBus block read size {}", reported);
                    // バスを空にするため最大長まで読み切る
                    xfer.len = BLOCK_MAX;
                    xfer.invalid_len = Some(reported);
                }
                xfer.data.block[0] = xfer.len as u8;
            }

            if xfer.count < xfer.len {
                xfer.data.block[xfer.count + 1] = self.read(offsets::BLKDAT);
                xfer.count += 1;
            } else {
                log::debug!("smbus: discarding extra block byte");
            }

            if xfer.count + 1 == xfer.len {
                self.write(offsets::HSTCNT, xfer.cmd | hstcnt_bits::LAST_BYTE);
            }
        } else if xfer.count + 1 < xfer.len {
            xfer.count += 1;
            self.write(offsets::BLKDAT, xfer.data.block[xfer.count + 1]);
        } else {
            xfer.count = xfer.len;
        }
        self.block = xfer;

        self.clear_status(hststs_bits::BYTE_DONE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::smbus::config::Features;
    use crate::io::smbus::sim::SimBus;

    fn block_read_cmd() -> u8 {
        command::BLOCK_DATA | hstcnt_bits::INTREN
    }

    #[test]
    fn test_read_takes_length_from_dat0() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());
        adapter
            .block
            .arm(Direction::Read, block_read_cmd(), BLOCK_MAX, SmbusData::new());

        sim.poke(offsets::HSTDAT0, 2);
        sim.poke(offsets::BLKDAT, 0x11);
        adapter.on_byte_done();
        // 次が最後のバイト
        assert_eq!(
            sim.last_write(offsets::HSTCNT),
            Some(block_read_cmd() | hstcnt_bits::LAST_BYTE)
        );

        sim.poke(offsets::BLKDAT, 0x22);
        adapter.on_byte_done();

        let result = adapter.block.finish();
        assert_eq!(result.count, 2);
        assert_eq!(result.data.payload(), &[0x11, 0x22]);
        assert_eq!(result.invalid_len, None);
        assert!(!adapter.block.is_active());
    }

    #[test]
    fn test_illegal_length_clamped() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());
        adapter
            .block
            .arm(Direction::Read, block_read_cmd(), BLOCK_MAX, SmbusData::new());

        sim.poke(offsets::HSTDAT0, 0);
        adapter.on_byte_done();

        let result = adapter.block.finish();
        assert_eq!(result.invalid_len, Some(0));
        assert_eq!(result.data.block_len(), BLOCK_MAX);
    }

    #[test]
    fn test_write_feeds_next_byte() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());
        let data = SmbusData::from_block(&[0x01, 0x02, 0x03]).unwrap();
        adapter
            .block
            .arm(Direction::Write, command::BLOCK_DATA | hstcnt_bits::INTREN, 3, data);

        adapter.on_byte_done();
        assert_eq!(sim.last_write(offsets::BLKDAT), Some(0x02));
        adapter.on_byte_done();
        assert_eq!(sim.last_write(offsets::BLKDAT), Some(0x03));
        adapter.on_byte_done();

        assert_eq!(adapter.block.finish().count, 3);
    }

    #[test]
    fn test_stray_byte_done_only_clears() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());
        sim.poke(offsets::HSTSTS, hststs_bits::BYTE_DONE);

        adapter.on_byte_done();
        assert_eq!(sim.peek(offsets::HSTSTS) & hststs_bits::BYTE_DONE, 0);
        assert_eq!(sim.last_write(offsets::BLKDAT), None);
    }
}
