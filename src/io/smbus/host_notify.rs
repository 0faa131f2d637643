// ============================================================================
// src/io/smbus/host_notify.rs - Host-Notify Subsystem
// ============================================================================
//!
//! スレーブ起点の Host-Notify メッセージの受信。
//!
//! 通知は実行中のトランザクションとは独立しており、完了スロットには
//! 一切触れない。通知元アドレス (NTFDADD) は検証済みのプラットフォームで
//! 常に 0 を返すため、イベントはアドレスなしで届ける。

use super::adapter::Adapter;
use super::config::Features;
use super::regs::{offsets, slvcmd_bits, slvsts_bits};
use super::types::SlaveAddress;
use crate::io::port::RegisterIo;

/// Host-Notify イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostNotifyEvent {
    /// 通知元スレーブ（ハードウェアから取得できない場合は `None`）
    pub address: Option<SlaveAddress>,
}

/// Host-Notify の受け手
///
/// 割り込みコンテキストから、直列化コンテキストを解放した後に呼ばれる。
/// 実装はブロックしてはならない。
pub trait HostNotifyListener: Send + Sync {
    fn on_host_notify(&self, event: HostNotifyEvent);
}

impl<R: RegisterIo> Adapter<R> {
    /// Host-Notify 割り込みを有効化し、次の通知を受けられるようにする
    pub fn enable_host_notify(&mut self) {
        if !self.features().contains(Features::HOST_NOTIFY) {
            return;
        }

        let original = self.original_slvcmd();
        if original & slvcmd_bits::HST_NTFY_INTREN == 0 {
            self.write(offsets::SLVCMD, original | slvcmd_bits::HST_NTFY_INTREN);
        }

        // 前回の通知が残っていれば捨てる
        self.write(offsets::SLVSTS, slvsts_bits::HST_NTFY_STS);
        self.host_notify_enabled = true;
    }

    /// SLVCMD を有効化前の値に戻す
    pub fn disable_host_notify(&mut self) {
        if !self.features().contains(Features::HOST_NOTIFY) {
            return;
        }

        let original = self.original_slvcmd();
        self.write(offsets::SLVCMD, original);
        self.host_notify_enabled = false;
    }

    /// 通知が届いていればクリアしてイベントを返す
    pub(super) fn service_host_notify(&mut self) -> Option<HostNotifyEvent> {
        if !self.host_notify_enabled {
            return None;
        }

        let status = self.read(offsets::SLVSTS);
        if status & slvsts_bits::HST_NTFY_STS == 0 {
            return None;
        }

        self.write(offsets::SLVSTS, slvsts_bits::HST_NTFY_STS);
        log::debug!("smbus: host notify received");
        Some(HostNotifyEvent { address: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::smbus::sim::SimBus;

    #[test]
    fn test_enable_preserves_vendor_bits() {
        let sim = SimBus::new();
        sim.poke(offsets::SLVCMD, 0x0C);
        let mut adapter = Adapter::new(sim.regs(), Features::default());

        adapter.enable_host_notify();
        assert_eq!(sim.peek(offsets::SLVCMD), 0x0D);

        adapter.disable_host_notify();
        assert_eq!(sim.peek(offsets::SLVCMD), 0x0C);
    }

    #[test]
    fn test_enable_skips_write_when_already_set() {
        let sim = SimBus::new();
        sim.poke(offsets::SLVCMD, slvcmd_bits::HST_NTFY_INTREN);
        let mut adapter = Adapter::new(sim.regs(), Features::default());

        adapter.enable_host_notify();
        assert_eq!(sim.last_write(offsets::SLVCMD), None);
        assert_eq!(sim.last_write(offsets::SLVSTS), Some(slvsts_bits::HST_NTFY_STS));
    }

    #[test]
    fn test_feature_disabled_is_noop() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::IRQ);

        adapter.enable_host_notify();
        sim.raise_host_notify();
        assert_eq!(adapter.service_host_notify(), None);
        assert_eq!(sim.last_write(offsets::SLVCMD), None);
    }

    #[test]
    fn test_service_clears_status() {
        let sim = SimBus::new();
        let mut adapter = Adapter::new(sim.regs(), Features::default());
        adapter.enable_host_notify();

        sim.raise_host_notify();
        assert_eq!(
            adapter.service_host_notify(),
            Some(HostNotifyEvent { address: None })
        );
        assert_eq!(sim.peek(offsets::SLVSTS) & slvsts_bits::HST_NTFY_STS, 0);
        assert_eq!(adapter.service_host_notify(), None);
    }
}
