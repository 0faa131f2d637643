// ============================================================================
// src/sync/irq_mutex.rs - 割り込み禁止Mutex
//
// spin::Mutex はロック中でも割り込みを許可するため、割り込みハンドラが
// 同じ CPU 上で同じロックを取りに行くとデッドロックする。
// ロック中は cli で割り込みを止め、解放時に元の状態へ戻す。
// ============================================================================

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// 割り込みフラグ (RFLAGS.IF) を保存して割り込みを禁止
///
/// # Returns
/// 元の割り込み有効状態 (true = 有効だった)
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
#[inline]
pub(crate) fn save_and_disable_interrupts() -> bool {
    use core::arch::asm;

    let rflags: u64;

    unsafe {
        asm!(
            "pushfq",
            "pop {0}",
            out(reg) rflags,
            options(nomem, preserves_flags)
        );
        asm!("cli", options(nomem, nostack));
    }

    // IF ビット (bit 9)
    (rflags & (1 << 9)) != 0
}

/// 割り込みを復元（元々有効だった場合のみ有効化）
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
#[inline]
pub(crate) fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        unsafe {
            core::arch::asm!("sti", options(nomem, nostack));
        }
    }
}

// ホスト上のテストでは割り込みフラグをスレッドごとに模擬する
#[cfg(all(test, not(all(target_arch = "x86_64", target_os = "none"))))]
std::thread_local! {
    static IRQ_ENABLED: core::cell::Cell<bool> = const { core::cell::Cell::new(true) };
}

#[cfg(all(test, not(all(target_arch = "x86_64", target_os = "none"))))]
pub(crate) fn save_and_disable_interrupts() -> bool {
    IRQ_ENABLED.with(|flag| flag.replace(false))
}

#[cfg(all(test, not(all(target_arch = "x86_64", target_os = "none"))))]
pub(crate) fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        IRQ_ENABLED.with(|flag| flag.set(true));
    }
}

/// 現在のスレッドで（模擬）割り込みが有効か
#[cfg(all(test, not(all(target_arch = "x86_64", target_os = "none"))))]
pub(crate) fn interrupts_enabled() -> bool {
    IRQ_ENABLED.with(|flag| flag.get())
}

#[cfg(all(not(test), not(all(target_arch = "x86_64", target_os = "none"))))]
#[inline]
pub(crate) fn save_and_disable_interrupts() -> bool {
    false
}

#[cfg(all(not(test), not(all(target_arch = "x86_64", target_os = "none"))))]
#[inline]
pub(crate) fn restore_interrupts(_was_enabled: bool) {}

/// 割り込み禁止Mutex
///
/// 割り込みハンドラとタスクの両方から触る小さな状態に使う。
/// 保持している間は同じ CPU に割り込みが入らないので、
/// ハンドラ側が取りに来てもデッドロックしない。
pub struct IrqMutex<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: IrqMutex は排他的アクセスを保証する
unsafe impl<T: ?Sized + Send> Sync for IrqMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for IrqMutex<T> {}

impl<T> IrqMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> IrqMutex<T> {
    /// 割り込みを禁止してからロックを取得
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let irq_was_enabled = save_and_disable_interrupts();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        IrqMutexGuard {
            lock: self,
            irq_was_enabled,
        }
    }

    /// ロックを試行（失敗したら割り込み状態を戻して即座に返る）
    pub fn try_lock(&self) -> Option<IrqMutexGuard<'_, T>> {
        let irq_was_enabled = save_and_disable_interrupts();

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqMutexGuard {
                lock: self,
                irq_was_enabled,
            })
        } else {
            restore_interrupts(irq_was_enabled);
            None
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// IrqMutex のガード
pub struct IrqMutexGuard<'a, T: ?Sized> {
    lock: &'a IrqMutex<T>,
    irq_was_enabled: bool,
}

impl<T: ?Sized> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ロック保持中
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: ロック保持中
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for IrqMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        restore_interrupts(self.irq_was_enabled);
    }
}
