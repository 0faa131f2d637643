// ============================================================================
// src/io/port.rs - SMBus Register File Access
// ============================================================================
//!
//! レジスタインタフェース
//!
//! コントローラのレジスタは I/O 空間上の 8 ビットレジスタ群で、
//! ベースアドレスからのオフセットで指定する。
//! 全アクセスは直列化コンテキストの内側から行われるため、
//! 実装側でロックを持つ必要はない。

/// 8ビットレジスタファイル
///
/// 読み取りにも副作用がありうる（例: HSTCNT の読み取りは
/// ブロックバッファのインデックスをリセットする）ため `&mut self` を取る。
pub trait RegisterIo: Send {
    /// `base + offset` から 1 バイト読む
    fn read8(&mut self, offset: u16) -> u8;

    /// `base + offset` へ 1 バイト書く
    fn write8(&mut self, offset: u16, value: u8);
}

impl<R: RegisterIo + ?Sized> RegisterIo for alloc::boxed::Box<R> {
    fn read8(&mut self, offset: u16) -> u8 {
        (**self).read8(offset)
    }

    fn write8(&mut self, offset: u16, value: u8) {
        (**self).write8(offset, value)
    }
}

/// x86 I/O ポート経由のレジスタファイル
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct PortIo {
    base: u16,
}

#[cfg(target_arch = "x86_64")]
impl PortIo {
    /// SMBA（I/O ベースアドレス）から作成
    ///
    /// # Safety
    /// `base` から 32 バイトが SMBus コントローラに割り当てられていること。
    pub const unsafe fn new(base: u16) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> u16 {
        self.base
    }
}

#[cfg(target_arch = "x86_64")]
impl RegisterIo for PortIo {
    fn read8(&mut self, offset: u16) -> u8 {
        let mut port = x86_64::instructions::port::Port::<u8>::new(self.base + offset);
        // SAFETY: PortIo::new の契約によりコントローラのポート
        unsafe { port.read() }
    }

    fn write8(&mut self, offset: u16, value: u8) {
        let mut port = x86_64::instructions::port::Port::<u8>::new(self.base + offset);
        // SAFETY: 同上
        unsafe { port.write(value) }
    }
}
