// ============================================================================
// src/sync/mod.rs - 同期プリミティブ
// ディスパッチャと割り込みハンドラが共有する直列化コンテキスト
// ============================================================================

pub mod completion;
pub mod irq_mutex;

pub use completion::{CompletionGuard, CompletionMutex};
pub use irq_mutex::{IrqMutex, IrqMutexGuard};
