//! 時間管理
//!
//! トランザクションのタイムアウト計測に使う単調増加クロックの抽象。
//! カーネル側は TSC など任意のタイマーソースを `Clock` として渡す。

/// ナノ秒単位の時間
pub type Nanoseconds = u64;

/// 1秒のナノ秒数
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// 1ミリ秒のナノ秒数
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// 1マイクロ秒のナノ秒数
pub const NANOS_PER_MICRO: u64 = 1_000;

/// 単調増加クロック
///
/// `now()` は巻き戻らないこと。`relax()` は待機ループの1周ごとに呼ばれる。
pub trait Clock: Send + Sync {
    /// 現在時刻
    fn now(&self) -> Nanoseconds;

    /// ビジーウェイト中のヒント
    fn relax(&self) {
        core::hint::spin_loop();
    }

    /// 指定時間だけビジーウェイト
    fn delay(&self, duration: Nanoseconds) {
        let end = self.now().saturating_add(duration);
        while self.now() < end {
            self.relax();
        }
    }
}

/// TSC情報
#[derive(Debug, Clone, Copy)]
pub struct TscInfo {
    /// TSC周波数 (Hz)
    pub frequency: u64,
}

impl TscInfo {
    /// TSCカウントをナノ秒に変換
    pub fn tsc_to_nanos(&self, tsc: u64) -> Nanoseconds {
        if self.frequency == 0 {
            return 0;
        }
        // tsc * 1e9 / frequency をオーバーフローを避けて計算
        let secs = tsc / self.frequency;
        let remainder = tsc % self.frequency;
        secs * NANOS_PER_SEC + (remainder * NANOS_PER_SEC) / self.frequency
    }
}

/// TSC ベースのクロック
///
/// 周波数はカーネル側で校正済みであること（不変TSC前提）。
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    info: TscInfo,
}

#[cfg(target_arch = "x86_64")]
impl TscClock {
    pub const fn new(frequency: u64) -> Self {
        Self {
            info: TscInfo { frequency },
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl Clock for TscClock {
    fn now(&self) -> Nanoseconds {
        // SAFETY: RDTSC は副作用のない読み取り命令
        let tsc = unsafe { core::arch::x86_64::_rdtsc() };
        self.info.tsc_to_nanos(tsc)
    }
}
