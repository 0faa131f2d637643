//! 統一エラーハンドリングモジュール
//!
//! SMBus ドライバ全体で使用されるエラー型を定義する。
//! ハードウェアのステータスで分類されたエラーは、診断のために
//! 完了時に観測した生のステータスバイトを保持する。

use core::fmt;

use crate::io::smbus::Protocol;

/// SMBus トランザクションの結果型
pub type SmbusResult<T> = Result<T, SmbusError>;

/// トランザクションエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbusError {
    /// 割り込みがタイムアウト内に届かなかった（リトライしない）
    Timeout { status: u8 },
    /// バス調停に負けた（リトライ上限まで再試行した後）
    ArbitrationLoss { status: u8, attempts: u32 },
    /// スレーブが応答しない (DEV_ERR)
    DeviceError { status: u8 },
    /// トランザクション失敗 (FAILED)
    BusError { status: u8 },
    /// 開始前からホストがビジー
    Busy { status: u8 },
    /// ハードウェアが報告したブロック長が範囲外
    InvalidBlockLength(u8),
    /// 機能セットに含まれないプロトコル
    UnsupportedProtocol(Protocol),
    /// 7ビットに収まらないスレーブアドレス
    InvalidAddress(u8),
    /// レジストリに公開されていないアドレス
    UnknownDevice(u8),
}

impl SmbusError {
    /// エラーに付随する生のホストステータスバイト
    pub fn raw_status(&self) -> Option<u8> {
        match *self {
            SmbusError::Timeout { status }
            | SmbusError::ArbitrationLoss { status, .. }
            | SmbusError::DeviceError { status }
            | SmbusError::BusError { status }
            | SmbusError::Busy { status } => Some(status),
            SmbusError::InvalidBlockLength(_)
            | SmbusError::UnsupportedProtocol(_)
            | SmbusError::InvalidAddress(_)
            | SmbusError::UnknownDevice(_) => None,
        }
    }

    /// 同じ呼び出しの中で再試行してよいエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self, SmbusError::ArbitrationLoss { .. })
    }
}

/// セットアップ時のエラー（回復不能）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// ホストコンフィグで HST_EN が立っていない
    ControllerDisabled,
    /// SMI 配送（ポーリングモード）しか使えない
    PollModeUnsupported,
    /// I/O ベースアドレスが割り当てられていない
    NoIoBase,
    /// 割り込みハンドラの登録に失敗
    InterruptRegistration,
    /// スレーブデバイスの公開に失敗
    DeviceRegistration(u8),
}

// ===== Display implementations =====

impl fmt::Display for SmbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmbusError::Timeout { status } => {
                write!(f, "transaction timeout (status {:#04x})", status)
            }
            SmbusError::ArbitrationLoss { status, attempts } => write!(
                f,
                "lost arbitration after {} attempts (status {:#04x})",
                attempts, status
            ),
            SmbusError::DeviceError { status } => {
                write!(f, "no response from device (status {:#04x})", status)
            }
            SmbusError::BusError { status } => {
                write!(f, "transaction failed (status {:#04x})", status)
            }
            SmbusError::Busy { status } => {
                write!(f, "SMBus is busy (status {:#04x})", status)
            }
            SmbusError::InvalidBlockLength(len) => write!(f, "illegal block length {}", len),
            SmbusError::UnsupportedProtocol(protocol) => {
                write!(f, "unsupported protocol {:?}", protocol)
            }
            SmbusError::InvalidAddress(addr) => write!(f, "invalid slave address {:#04x}", addr),
            SmbusError::UnknownDevice(addr) => write!(f, "no slave device at {:#04x}", addr),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::ControllerDisabled => write!(f, "SMBus host controller disabled"),
            InitError::PollModeUnsupported => {
                write!(f, "no PCI IRQ, poll mode is not supported")
            }
            InitError::NoIoBase => write!(f, "SMBus I/O base address not assigned"),
            InitError::InterruptRegistration => write!(f, "could not register interrupt handler"),
            InitError::DeviceRegistration(addr) => {
                write!(f, "could not publish slave device {:#04x}", addr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_raw_status_attached() {
        let err = SmbusError::ArbitrationLoss { status: 0x08, attempts: 3 };
        assert_eq!(err.raw_status(), Some(0x08));
        assert!(err.is_retryable());

        let err = SmbusError::UnsupportedProtocol(Protocol::I2cBlockData);
        assert_eq!(err.raw_status(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = SmbusError::Timeout { status: 0x01 };
        assert_eq!(err.to_string(), "transaction timeout (status 0x01)");
        assert_eq!(
            InitError::PollModeUnsupported.to_string(),
            "no PCI IRQ, poll mode is not supported"
        );
    }
}
