// ============================================================================
// src/io/smbus/interrupt.rs - Interrupt Handler
// ============================================================================
//!
//! ハードウェア割り込みの唯一の入口。
//!
//! 判定順（最初に当たったものだけを処理する）:
//! 1. Host-Notify の通知ビット → 通知を処理して戻る
//! 2. BYTE_DONE → ブロック転送を 1 バイト進める
//! 3. INTR / エラービット → クリアして完了スロットに書き、待機側を起こす
//!
//! どれにも当たらなければ迷い込んだ割り込みとして数えるだけ。

use alloc::sync::Arc;

use super::controller::SmbusController;
use super::host_notify::HostNotifyEvent;
use super::regs::hststs_bits;
use crate::io::port::RegisterIo;
use crate::time::Clock;

/// 1 回の割り込み処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// Host-Notify を処理した
    HostNotify,
    /// ブロック転送のバイトを移動しただけ（完了はまだ）
    ByteDone,
    /// 終端ステータスを完了スロットへ書いた
    Completed(u8),
    /// 何も該当しなかった
    Spurious,
}

/// 割り込み登録側から見たハンドラ
pub trait InterruptHandler: Send + Sync {
    fn handle_interrupt(&self) -> IrqOutcome;
}

impl<R: RegisterIo, C: Clock> SmbusController<R, C> {
    /// 割り込みを 1 回処理する
    ///
    /// ブロックしない。リスナーはロック解放後に呼ぶ。
    pub fn handle_interrupt(&self) -> IrqOutcome {
        let mut notify: Option<HostNotifyEvent> = None;

        let outcome = {
            let mut guard = self.adapter.lock();

            if let Some(event) = guard.service_host_notify() {
                notify = Some(event);
                IrqOutcome::HostNotify
            } else {
                let status = guard.host_status();
                let byte_done = status & hststs_bits::BYTE_DONE != 0;
                if byte_done {
                    guard.on_byte_done();
                }

                let masked = status & hststs_bits::COMPLETION_FLAGS;
                if masked != 0 {
                    guard.clear_status(masked);
                    guard.complete(masked);
                    IrqOutcome::Completed(masked)
                } else if byte_done {
                    IrqOutcome::ByteDone
                } else {
                    IrqOutcome::Spurious
                }
            }
        };

        match outcome {
            IrqOutcome::HostNotify => {
                self.stats.record_host_notify();
                let listener = self.listener.lock().as_ref().map(Arc::clone);
                if let (Some(listener), Some(event)) = (listener, notify) {
                    listener.on_host_notify(event);
                }
            }
            IrqOutcome::Spurious => self.stats.record_spurious(),
            _ => {}
        }
        outcome
    }
}

impl<R: RegisterIo, C: Clock> InterruptHandler for SmbusController<R, C> {
    fn handle_interrupt(&self) -> IrqOutcome {
        SmbusController::handle_interrupt(self)
    }
}
