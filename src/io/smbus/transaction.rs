// ============================================================================
// src/io/smbus/transaction.rs - Single Transaction Attempt
// ============================================================================
//!
//! 1 試行ぶんのレジスタ操作。
//!
//! 状態遷移: `Idle → Armed → Started → (ByteLoop)* → {Completed | Failed}`
//!
//! 試行の間は直列化コンテキストを保持し、完了待ちの間だけ手放す。
//! どの経路で抜けてもガードのドロップでロックは解放される。

use super::adapter::Adapter;
use super::config::Features;
use super::controller::SmbusController;
use super::regs::{
    address_byte, auxctl_bits, command, hstcnt_bits, hststs_bits, offsets,
};
use super::types::{
    BLOCK_MAX, ClientFlags, Direction, Protocol, SlaveAddress, SlaveDevice, SmbusData,
    TransferRequest,
};
use crate::error::{SmbusError, SmbusResult};
use crate::io::port::RegisterIo;
use crate::sync::CompletionGuard;
use crate::time::{Clock, NANOS_PER_MILLI};

type Guard<'a, R> = CompletionGuard<'a, Adapter<R>>;

/// 試行の結果（ホストステータス, ブロック転送のバイト数）
pub(super) type AttemptResult = SmbusResult<(u8, Option<usize>)>;

/// 完了ステータスをエラー種別に分類
///
/// 複数ビットが立っていれば 調停負け > デバイスエラー > 失敗 の順。
pub(super) fn classify(status: u8) -> SmbusResult<u8> {
    if status & hststs_bits::BUS_ERR != 0 {
        Err(SmbusError::ArbitrationLoss { status, attempts: 0 })
    } else if status & hststs_bits::DEV_ERR != 0 {
        Err(SmbusError::DeviceError { status })
    } else if status & hststs_bits::FAILED != 0 {
        Err(SmbusError::BusError { status })
    } else {
        Ok(status)
    }
}

impl<R: RegisterIo> Adapter<R> {
    /// 開始前チェック: ビジーなら失敗、残っているステータスはクリア
    pub(super) fn check_pre(&mut self) -> SmbusResult<()> {
        let status = self.host_status();
        if status & hststs_bits::HOST_BUSY != 0 {
            log::error!("smbus: SMBus is busy, can't use it (status {:#04x})", status);
            return Err(SmbusError::Busy { status });
        }

        let stale = status & hststs_bits::STATUS_FLAGS;
        if stale != 0 {
            log::debug!("smbus: clearing status flags ({:#04x})", stale);
            self.clear_status(stale);
            let left = self.host_status() & hststs_bits::STATUS_FLAGS;
            if left != 0 {
                log::error!("smbus: failed clearing status flags ({:#04x})", left);
                return Err(SmbusError::Busy { status: left });
            }
        }
        Ok(())
    }

    /// アドレス・コマンド・データレジスタを設定し、コマンドコードを返す
    pub(super) fn program(&mut self, address: SlaveAddress, request: &TransferRequest) -> u8 {
        let addr = address.as_u8();
        let read = request.direction.is_read();
        let data = &request.data.block;

        match request.protocol {
            Protocol::Quick => {
                self.write(offsets::HSTADD, address_byte(addr, read));
                command::QUICK
            }
            Protocol::Byte => {
                self.write(offsets::HSTADD, address_byte(addr, read));
                if !read {
                    self.write(offsets::HSTCMD, request.command);
                }
                command::BYTE
            }
            Protocol::ByteData => {
                self.write(offsets::HSTADD, address_byte(addr, read));
                self.write(offsets::HSTCMD, request.command);
                if !read {
                    self.write(offsets::HSTDAT0, data[0]);
                }
                command::BYTE_DATA
            }
            Protocol::WordData => {
                self.write(offsets::HSTADD, address_byte(addr, read));
                self.write(offsets::HSTCMD, request.command);
                if !read {
                    self.write(offsets::HSTDAT0, data[0]);
                    self.write(offsets::HSTDAT1, data[1]);
                }
                command::WORD_DATA
            }
            Protocol::BlockData => {
                self.write(offsets::HSTADD, address_byte(addr, read));
                self.write(offsets::HSTCMD, request.command);
                command::BLOCK_DATA
            }
            Protocol::I2cBlockData => {
                // I2C ブロックは読み取りでも R/W ビットを 0 にし、
                // 読み取り時のコマンドは DATA1 に置く
                self.write(offsets::HSTADD, address_byte(addr, false));
                if read {
                    self.write(offsets::HSTDAT1, request.command);
                } else {
                    self.write(offsets::HSTCMD, request.command);
                }
                command::I2C_BLOCK_DATA
            }
        }
    }

    fn set_hw_pec(&mut self, enable: bool) {
        let aux = self.read(offsets::AUXCTL);
        if enable {
            self.write(offsets::AUXCTL, aux | auxctl_bits::CRC);
        } else {
            self.write(offsets::AUXCTL, aux & !auxctl_bits::CRC);
        }
    }

    /// E32B を有効化し、実際に立ったかを返す
    fn set_block_buffer_mode(&mut self) -> bool {
        let aux = self.read(offsets::AUXCTL);
        self.write(offsets::AUXCTL, aux | auxctl_bits::E32B);
        self.read(offsets::AUXCTL) & auxctl_bits::E32B != 0
    }

    /// 終了後に CRC と E32B を落とす
    fn reset_aux(&mut self) {
        let aux = self.read(offsets::AUXCTL);
        self.write(offsets::AUXCTL, aux & !(auxctl_bits::CRC | auxctl_bits::E32B));
    }

    /// スカラープロトコルの読み取り結果を取り出す
    fn read_scalar(&mut self, protocol: Protocol, data: &mut SmbusData) {
        match protocol {
            Protocol::Byte | Protocol::ByteData => {
                data.block[0] = self.read(offsets::HSTDAT0);
            }
            Protocol::WordData => {
                data.block[0] = self.read(offsets::HSTDAT0);
                data.block[1] = self.read(offsets::HSTDAT1);
            }
            _ => {}
        }
    }

    /// タイムアウトしたトランザクションを KILL で止める
    ///
    /// 戻り値は KILL 前のホストステータス。
    fn kill_transaction<C: Clock + ?Sized>(&mut self, clock: &C) -> u8 {
        let before = self.host_status();
        log::warn!("smbus: transaction timeout (status {:#04x})", before);

        self.write(offsets::HSTCNT, hstcnt_bits::KILL);
        clock.delay(NANOS_PER_MILLI);
        self.write(offsets::HSTCNT, 0);

        let status = self.host_status();
        if status & hststs_bits::HOST_BUSY != 0 || status & hststs_bits::FAILED == 0 {
            log::error!("smbus: failed terminating the transaction (status {:#04x})", status);
        }
        self.clear_status(hststs_bits::STATUS_FLAGS);
        before
    }
}

impl<R: RegisterIo, C: Clock> SmbusController<R, C> {
    /// 1 試行: 検証済みの要求を実行する
    pub(super) fn attempt(&self, device: &SlaveDevice, request: &mut TransferRequest) -> AttemptResult {
        let mut guard = self.adapter.lock();
        guard.check_pre()?;
        guard.clear_completion();

        let protocol = request.protocol;
        let hwpec = self.features().contains(Features::PEC)
            && device.flags.contains(ClientFlags::PEC)
            && !matches!(protocol, Protocol::Quick | Protocol::I2cBlockData);

        let xact = guard.program(device.address, request);
        guard.set_hw_pec(hwpec);
        let pec = if hwpec { hstcnt_bits::PEC_EN } else { 0 };

        let (mut guard, result) = if protocol.is_block() {
            self.block_transaction(guard, request, pec)
        } else {
            let (mut guard, result) = self.run(guard, xact | pec | hstcnt_bits::INTREN);
            let result = match result {
                Ok(status) => {
                    if request.direction.is_read() {
                        guard.read_scalar(protocol, &mut request.data);
                    }
                    Ok((status, None))
                }
                Err(err) => Err(err),
            };
            (guard, result)
        };

        if hwpec || protocol.is_block() {
            guard.reset_aux();
        }
        result
    }

    /// START を書いて完了を待ち、結果を分類する
    fn run<'a>(&'a self, mut guard: Guard<'a, R>, cntl: u8) -> (Guard<'a, R>, SmbusResult<u8>) {
        guard.write(offsets::HSTCNT, cntl | hstcnt_bits::START);

        let timeout = guard.timeout();
        let (mut guard, completion) = guard.wait_completion(&self.clock, timeout);
        let result = match completion {
            Some(status) => {
                guard.last_status = status;
                classify(status)
            }
            None => {
                let status = guard.kill_transaction(&self.clock);
                guard.last_status = status;
                Err(SmbusError::Timeout { status })
            }
        };
        (guard, result)
    }

    fn block_transaction<'a>(
        &'a self,
        mut guard: Guard<'a, R>,
        request: &mut TransferRequest,
        pec: u8,
    ) -> (Guard<'a, R>, AttemptResult) {
        let i2c_write =
            request.protocol == Protocol::I2cBlockData && request.direction == Direction::Write;
        if i2c_write {
            if let Some(switch) = &self.i2c_mode {
                switch(true);
            }
        }

        let use_buffer = request.protocol == Protocol::BlockData
            && self.features().contains(Features::BLOCK_BUFFER)
            && guard.set_block_buffer_mode();

        let (guard, result) = if use_buffer {
            self.block_by_buffer(guard, request, pec)
        } else {
            self.block_byte_by_byte(guard, request, pec)
        };

        if i2c_write {
            if let Some(switch) = &self.i2c_mode {
                switch(false);
            }
        }
        (guard, result)
    }

    /// 32 バイトバッファを使った SMBus ブロック転送（割り込み 1 回）
    fn block_by_buffer<'a>(
        &'a self,
        mut guard: Guard<'a, R>,
        request: &mut TransferRequest,
        pec: u8,
    ) -> (Guard<'a, R>, AttemptResult) {
        let read = request.direction.is_read();

        // HSTCNT の読み取りでバッファのインデックスが 0 に戻る
        guard.read(offsets::HSTCNT);
        if !read {
            let len = request.data.block_len();
            guard.write(offsets::HSTDAT0, len as u8);
            guard.read(offsets::HSTCNT);
            for i in 1..=len {
                guard.write(offsets::BLKDAT, request.data.block[i]);
            }
        }

        let (mut guard, result) =
            self.run(guard, command::BLOCK_DATA | pec | hstcnt_bits::INTREN);
        let status = match result {
            Ok(status) => status,
            Err(err) => return (guard, Err(err)),
        };

        if read {
            let len = guard.read(offsets::HSTDAT0);
            if len == 0 || len as usize > BLOCK_MAX {
                log::error!("smbus: illegal SMBus block read size {}", len);
                return (guard, Err(SmbusError::InvalidBlockLength(len)));
            }
            request.data.block[0] = len;
            guard.read(offsets::HSTCNT);
            for i in 1..=len as usize {
                request.data.block[i] = guard.read(offsets::BLKDAT);
            }
        }

        let count = request.data.block_len();
        (guard, Ok((status, Some(count))))
    }

    /// BYTE_DONE 割り込みごとに 1 バイトずつ進めるブロック転送
    fn block_byte_by_byte<'a>(
        &'a self,
        mut guard: Guard<'a, R>,
        request: &mut TransferRequest,
        pec: u8,
    ) -> (Guard<'a, R>, AttemptResult) {
        let read = request.direction.is_read();
        let smbus_block = request.protocol == Protocol::BlockData;

        let len = if read && smbus_block {
            BLOCK_MAX
        } else {
            request.data.block_len().clamp(1, BLOCK_MAX)
        };

        if !read {
            guard.write(offsets::HSTDAT0, len as u8);
            guard.write(offsets::BLKDAT, request.data.block[1]);
        }

        let mut smbcmd = if read && !smbus_block {
            command::I2C_BLOCK_DATA
        } else {
            command::BLOCK_DATA
        };
        smbcmd |= pec;
        if read && len == 1 {
            smbcmd |= hstcnt_bits::LAST_BYTE;
        }
        let cmd = smbcmd | hstcnt_bits::INTREN;

        guard.block.arm(request.direction, cmd, len, request.data);
        let (mut guard, result) = self.run(guard, cmd);
        let block = guard.block.finish();

        let status = match result {
            Ok(status) => status,
            Err(err) => return (guard, Err(err)),
        };

        if !read {
            return (guard, Ok((status, Some(len))));
        }
        if let Some(reported) = block.invalid_len {
            return (guard, Err(SmbusError::InvalidBlockLength(reported)));
        }
        request.data = block.data;
        (guard, Ok((status, Some(block.count))))
    }
}
