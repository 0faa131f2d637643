// ============================================================================
// src/sync/completion.rs - 割り込み禁止Mutex + 完了スロット
//
// レジスタ列の実行をディスパッチャと割り込みハンドラで直列化する。
// ロック取得中は cli で割り込みを禁止し、ハンドラが同じロックを
// 待ってデッドロックすることを防ぐ。
//
// ディスパッチャは完了待ちの間だけロックを手放し、割り込みハンドラが
// 完了スロットに終端ステータスを書き込むのを待つ。
// ============================================================================

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::irq_mutex::{restore_interrupts, save_and_disable_interrupts};
use crate::time::{Clock, Nanoseconds};

/// 完了スロット付き割り込み禁止Mutex
///
/// 保護対象は一度に一つのアクターだけが触れる。
/// 完了スロットはロック外から読める唯一のフィールドで、
/// 0 は「未完了」を意味する。
///
/// # Usage
/// ```ignore
/// // ディスパッチャ側
/// let guard = gate.lock();
/// guard.clear_completion();
/// start_transaction(&mut *guard);
/// let (guard, status) = guard.wait_completion(&clock, timeout);
///
/// // 割り込みハンドラ側
/// let guard = gate.lock();
/// guard.complete(status);
/// ```
pub struct CompletionMutex<T: ?Sized> {
    /// スピンロック本体
    locked: AtomicBool,
    /// 割り込みハンドラが書き込む終端ステータス
    completion: AtomicU8,
    /// 保護されるデータ
    data: UnsafeCell<T>,
}

// SAFETY: CompletionMutex は排他的アクセスを保証する
unsafe impl<T: ?Sized + Send> Sync for CompletionMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for CompletionMutex<T> {}

impl<T> CompletionMutex<T> {
    /// 新しい CompletionMutex を作成
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            completion: AtomicU8::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// 保護されたデータを取り出す
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> CompletionMutex<T> {
    /// ロックを取得
    ///
    /// 割り込みを禁止してからスピンロックを取得する。
    /// ガードがドロップされると自動的に割り込みが復元される。
    pub fn lock(&self) -> CompletionGuard<'_, T> {
        let irq_was_enabled = save_and_disable_interrupts();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        CompletionGuard {
            lock: self,
            irq_was_enabled,
        }
    }

    /// ロックを試行（失敗したら即座に返る）
    pub fn try_lock(&self) -> Option<CompletionGuard<'_, T>> {
        let irq_was_enabled = save_and_disable_interrupts();

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(CompletionGuard {
                lock: self,
                irq_was_enabled,
            })
        } else {
            restore_interrupts(irq_was_enabled);
            None
        }
    }

    /// ロック状態を確認（デバッグ用）
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// 未消費の完了ステータス（0 = なし）
    pub fn pending_completion(&self) -> u8 {
        self.completion.load(Ordering::Acquire)
    }
}

/// CompletionMutex のガード
///
/// ドロップ時にロックを解放し、割り込み状態を復元する。
pub struct CompletionGuard<'a, T: ?Sized> {
    lock: &'a CompletionMutex<T>,
    irq_was_enabled: bool,
}

impl<'a, T: ?Sized> CompletionGuard<'a, T> {
    /// 完了スロットをクリア（トランザクション開始前に呼ぶ）
    pub fn clear_completion(&self) {
        self.lock.completion.store(0, Ordering::Release);
    }

    /// 終端ステータスを書き込み、待機中のディスパッチャを起こす
    pub fn complete(&self, status: u8) {
        self.lock.completion.store(status, Ordering::Release);
    }

    /// ロックを手放して完了を待つ
    ///
    /// 割り込みハンドラが非ゼロのステータスを書き込むか、
    /// `timeout` が経過するまで待機し、ロックを取り直して返る。
    /// 受け取ったステータスはスロットから消費される。
    /// ロックを取り直した時点でもスロットが空なら `None`。
    pub fn wait_completion<C: Clock + ?Sized>(
        self,
        clock: &C,
        timeout: Nanoseconds,
    ) -> (CompletionGuard<'a, T>, Option<u8>) {
        let lock = self.lock;
        drop(self);

        let deadline = clock.now().saturating_add(timeout);
        let status = loop {
            if lock.completion.load(Ordering::Acquire) != 0 {
                break Some(lock.completion.swap(0, Ordering::AcqRel));
            }
            if clock.now() >= deadline {
                break None;
            }
            clock.relax();
        };

        let guard = lock.lock();
        // 期限切れとロック再取得の間に届いた完了も拾う
        let status = status.or_else(|| match lock.completion.swap(0, Ordering::AcqRel) {
            0 => None,
            late => Some(late),
        });
        (guard, status)
    }
}

impl<T: ?Sized> Deref for CompletionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ロックを保持しているので安全にアクセス可能
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for CompletionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: ロックを保持しているので安全にアクセス可能
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for CompletionGuard<'_, T> {
    fn drop(&mut self) {
        // 1. スピンロックを解放
        self.lock.locked.store(false, Ordering::Release);

        // 2. 割り込み状態を復元
        restore_interrupts(self.irq_was_enabled);
    }
}
