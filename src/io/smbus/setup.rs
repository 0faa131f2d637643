// ============================================================================
// src/io/smbus/setup.rs - Probe and Attach
// ============================================================================
//!
//! PCI ファンクションの probe と、ドライバ一式の attach/detach。
//!
//! attach は コントローラ → 割り込み登録 → スレーブ公開 の順で資源を取り、
//! 途中で失敗したら取得済みのものを逆順に解放する。各資源は
//! 自分のガード型が Drop で解放するので、早期 return だけで片付く。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::config::SmbusConfig;
use super::controller::SmbusController;
use super::interrupt::InterruptHandler;
use super::registry::DeviceRegistry;
use super::types::{ClientId, SlaveAddress, SlaveDevice, TransactionOutcome, TransferRequest};
use crate::error::{InitError, SmbusError, SmbusResult};
use crate::io::pci::{BdfAddress, ConfigSpaceAccessor, smbus_config};
use crate::io::port::RegisterIo;
use crate::time::Clock;

/// probe で得たコントローラ情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeInfo {
    pub bdf: BdfAddress,
    /// SMBA
    pub io_base: u16,
    /// probe 時点の HSTCFG
    pub host_config: u8,
    pub irq_line: u8,
}

/// SMBus ファンクションを調べる
///
/// ホストコントローラが無効、または完了が SMI で配送される構成
/// （ポーリングモード）は受け付けない。
pub fn probe(pci: &dyn ConfigSpaceAccessor, bdf: BdfAddress) -> Result<ProbeInfo, InitError> {
    let host_config = pci.read_host_config(bdf);
    if host_config & smbus_config::HSTCFG_HST_EN == 0 {
        log::error!("smbus: {} host controller not enabled", bdf);
        return Err(InitError::ControllerDisabled);
    }
    if host_config & smbus_config::HSTCFG_SMB_SMI_EN != 0 {
        log::error!("smbus: {} SMI# delivery configured, poll mode is not supported", bdf);
        return Err(InitError::PollModeUnsupported);
    }

    let io_base = pci.read_smbus_base(bdf);
    if io_base == 0 {
        log::error!("smbus: {} SMBus base address uninitialized", bdf);
        return Err(InitError::NoIoBase);
    }

    let irq_line = pci.read_interrupt_line(bdf);
    if irq_line == 0 || irq_line == 0xFF {
        log::error!("smbus: {} no PCI IRQ assigned", bdf);
        return Err(InitError::PollModeUnsupported);
    }

    pci.enable_io_space(bdf);

    log::info!(
        "smbus: {} SMBA={:#06x} irq={} hostcfg={:#04x}",
        bdf,
        io_base,
        irq_line,
        host_config
    );

    Ok(ProbeInfo {
        bdf,
        io_base,
        host_config,
        irq_line,
    })
}

/// 割り込みハンドラの登録先（カーネル側）
///
/// `unregister` は受け取ったハンドラへの参照を手放すこと。
pub trait InterruptRegistrar: Send {
    fn register(&mut self, irq: u8, handler: Arc<dyn InterruptHandler>) -> Result<(), InitError>;
    fn unregister(&mut self, irq: u8);
}

pub type SharedPci = Arc<dyn ConfigSpaceAccessor + Send + Sync>;

// ============================================================================
// Resource guards
// ============================================================================

/// HSTCFG を attach 前の値へ戻す
struct HostConfigRestore {
    pci: SharedPci,
    bdf: BdfAddress,
    original: u8,
}

impl Drop for HostConfigRestore {
    fn drop(&mut self) {
        if self.pci.read_host_config(self.bdf) != self.original {
            self.pci.write_host_config(self.bdf, self.original);
        }
    }
}

/// 登録した割り込みを解除する
struct IrqRegistration {
    registrar: Box<dyn InterruptRegistrar>,
    irq: u8,
}

impl Drop for IrqRegistration {
    fn drop(&mut self) {
        self.registrar.unregister(self.irq);
    }
}

/// 公開したスレーブを逆順に取り下げる
struct PublishedDevices {
    registry: Box<dyn DeviceRegistry>,
    published: Vec<SlaveAddress>,
}

impl PublishedDevices {
    fn publish(&mut self, device: SlaveDevice) -> Result<(), InitError> {
        self.registry.publish(device)?;
        self.published.push(device.address);
        Ok(())
    }
}

impl Drop for PublishedDevices {
    fn drop(&mut self) {
        while let Some(address) = self.published.pop() {
            self.registry.remove(address);
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// attach 済みの SMBus ドライバ
///
/// フィールドの宣言順がそのまま解放順になる。
pub struct SmbusDriver<R: RegisterIo + 'static, C: Clock + 'static> {
    devices: PublishedDevices,
    _irq: IrqRegistration,
    controller: Arc<SmbusController<R, C>>,
    _host_config: HostConfigRestore,
    info: ProbeInfo,
}

impl<R: RegisterIo + 'static, C: Clock + 'static> SmbusDriver<R, C> {
    /// probe 済みのコントローラに attach する
    pub fn attach(
        pci: SharedPci,
        info: ProbeInfo,
        regs: R,
        clock: C,
        config: &SmbusConfig,
        registrar: Box<dyn InterruptRegistrar>,
        registry: Box<dyn DeviceRegistry>,
    ) -> Result<Self, InitError> {
        let bdf = info.bdf;

        let host_config = HostConfigRestore {
            pci: Arc::clone(&pci),
            bdf,
            original: info.host_config,
        };
        // SMBus のタイミングで動かす
        if info.host_config & smbus_config::HSTCFG_I2C_EN != 0 {
            pci.write_host_config(bdf, info.host_config & !smbus_config::HSTCFG_I2C_EN);
        }

        let switch_pci = Arc::clone(&pci);
        let controller = Arc::new(SmbusController::new(regs, clock, config)?.with_i2c_mode_switch(
            Box::new(move |enable| {
                let hostc = switch_pci.read_host_config(bdf);
                let next = if enable {
                    hostc | smbus_config::HSTCFG_I2C_EN
                } else {
                    hostc & !smbus_config::HSTCFG_I2C_EN
                };
                switch_pci.write_host_config(bdf, next);
            }),
        ));

        let mut registrar = registrar;
        let handler: Arc<dyn InterruptHandler> = controller.clone();
        if let Err(err) = registrar.register(info.irq_line, handler) {
            log::error!("smbus: could not register interrupt {}", info.irq_line);
            return Err(err);
        }
        let irq = IrqRegistration {
            registrar,
            irq: info.irq_line,
        };

        let mut devices = PublishedDevices {
            registry,
            published: Vec::new(),
        };
        for (index, &raw) in config.devices.iter().enumerate() {
            let address =
                SlaveAddress::new(raw).map_err(|_| InitError::DeviceRegistration(raw))?;
            devices.publish(SlaveDevice::new(address, index as ClientId))?;
        }

        log::info!(
            "smbus: attached at {} ({} device(s) published)",
            bdf,
            devices.published.len()
        );

        Ok(Self {
            devices,
            _irq: irq,
            controller,
            _host_config: host_config,
            info,
        })
    }

    pub fn controller(&self) -> &Arc<SmbusController<R, C>> {
        &self.controller
    }

    pub fn info(&self) -> &ProbeInfo {
        &self.info
    }

    /// 公開済みデバイスをアドレスで引く
    pub fn device(&self, address: SlaveAddress) -> Option<SlaveDevice> {
        self.devices.registry.lookup(address)
    }

    /// アドレスで公開済みデバイスを引いて転送する
    ///
    /// 未公開のアドレスはレジスタに触れる前に `UnknownDevice` で失敗する。
    pub fn transfer(
        &self,
        address: SlaveAddress,
        request: &mut TransferRequest,
    ) -> SmbusResult<TransactionOutcome> {
        let device = self
            .device(address)
            .ok_or(SmbusError::UnknownDevice(address.as_u8()))?;
        self.controller.transfer(&device, request)
    }
}
