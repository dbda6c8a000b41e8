use super::{
    AccOdr, AccRange, ConfigBuilder, Ctrl9Command, Discovery, GyrOdr, GyrRange, ImuError,
    LpfMode, MotionData, RawMotion, Register, SensorConfig, SensorEnable, SensorSettings,
    WakeOnMotionConfig, CANDIDATE_ADDRESSES, CTRL1_INIT, CTRL5_ACC_LPF_EN, CTRL5_ACC_NIBBLE,
    CTRL5_GYR_LPF_EN, CTRL5_GYR_NIBBLE, DISCOVERY_ATTEMPTS, QMI8658_ADDRESS_LOW,
    QMI8658_CHIP_ID, RAW_MOTION_LEN, SELF_TEST_ENABLE, STATUS1_CMD_DONE,
};
use crate::BlockingRegisterDevice;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error, I2c};

/// Low pass filter mode used for both axes during normal configuration
const DEFAULT_LPF: Option<LpfMode> = Some(LpfMode::Mode3);

#[derive(Debug)]
pub struct Qmi8658<I2C, DELAY> {
    dev: BlockingRegisterDevice<I2C>,
    delay: DELAY,
    discovery: Option<Discovery>,
    config: Option<SensorConfig>,
}

impl<I2C, DELAY> Qmi8658<I2C, DELAY>
where
    I2C: I2c,
    DELAY: DelayNs,
{
    /// Create a new QMI8658 instance. No bus traffic happens until [`Self::init`].
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self {
            dev: BlockingRegisterDevice::new(i2c, QMI8658_ADDRESS_LOW),
            delay,
            discovery: None,
            config: None,
        }
    }

    /// Discover the device, enable register auto-increment and apply `settings`.
    pub fn init(&mut self, settings: &SensorSettings) -> Result<&SensorConfig, ImuError> {
        self.discover()?;
        self.write(Register::Ctrl1, CTRL1_INIT)?;
        self.configure(settings)
    }

    /// Probe both candidate addresses for the chip id.
    ///
    /// Each address gets a fixed number of WHO_AM_I reads. Bus errors on
    /// those reads are logged and count as a failed attempt. Once the id matches,
    /// the revision is read and any failure from there on is returned.
    pub fn discover(&mut self) -> Result<Discovery, ImuError> {
        self.discovery = None;
        self.config = None;

        for address in CANDIDATE_ADDRESSES {
            self.dev.set_address(address);
            if self.answers_at(address) {
                let revision = self.dev.read_register(Register::Revision.addr())?;
                info!("QMI8658 found at {:#x}, revision {:#x}", address, revision);
                let discovery = Discovery { address, revision };
                self.discovery = Some(discovery);
                return Ok(discovery);
            }
        }

        error!("QMI8658 not found on any candidate address");
        Err(ImuError::DeviceNotFound)
    }

    fn answers_at(&mut self, address: u8) -> bool {
        for attempt in 1..=DISCOVERY_ATTEMPTS {
            match self.dev.read_register(Register::WhoAmI.addr()) {
                Ok(QMI8658_CHIP_ID) => return true,
                Ok(id) => {
                    trace!(
                        "WHO_AM_I at {:#x} returned {:#x} (attempt {})",
                        address,
                        id,
                        attempt
                    );
                }
                Err(e) => {
                    let kind = e.kind();
                    warn!(
                        "WHO_AM_I read at {:#x} failed: {:?} (attempt {})",
                        address,
                        kind,
                        attempt
                    );
                }
            }
        }
        false
    }

    /// Apply `settings` to the discovered device.
    ///
    /// The stored configuration is replaced only after every register write
    /// succeeded. On failure the previous configuration is dropped.
    pub fn configure(&mut self, settings: &SensorSettings) -> Result<&SensorConfig, ImuError> {
        let discovery = self.discovery.ok_or(ImuError::DeviceNotFound)?;
        self.config = None;

        let mut builder = ConfigBuilder::new(discovery.address, discovery.revision, *settings);
        let enabled = settings.enabled;
        let attitude = enabled.contains(SensorEnable::AE);

        if attitude || enabled.contains(SensorEnable::ACC) {
            let div = self.configure_accel(settings.acc_range, settings.acc_odr, DEFAULT_LPF, false)?;
            builder.acc_lsb_div(div);
        }
        if attitude || enabled.contains(SensorEnable::GYR) {
            let div = self.configure_gyro(settings.gyr_range, settings.gyr_odr, DEFAULT_LPF, false)?;
            builder.gyro_lsb_div(div);
        }
        if attitude || enabled.contains(SensorEnable::MAG) {
            let ctrl4 = u8::from(settings.mag_device) | u8::from(settings.mag_odr);
            self.write(Register::Ctrl4, ctrl4)?;
        }
        if attitude {
            self.write(Register::Ctrl6, settings.ae_odr.into())?;
        }

        self.enable_sensors(enabled)?;

        let config = builder.build();
        debug!(
            "QMI8658 configured: sensors {:#x}, acc div {:?}, gyro div {:?}",
            enabled.wire_bits(),
            config.acc_lsb_div(),
            config.gyro_lsb_div()
        );
        Ok(self.config.insert(config))
    }

    /// Write CTRL7. The AttitudeEngine bit also turns on accelerometer and gyroscope.
    pub fn enable_sensors(&mut self, enabled: SensorEnable) -> Result<(), ImuError> {
        self.require_discovered()?;
        self.write(Register::Ctrl7, enabled.wire_bits())
    }

    fn configure_accel(
        &mut self,
        range: AccRange,
        odr: AccOdr,
        lpf: Option<LpfMode>,
        self_test: bool,
    ) -> Result<u16, ImuError> {
        let mut ctrl2 = u8::from(range) | u8::from(odr);
        if self_test {
            ctrl2 |= SELF_TEST_ENABLE;
        }
        self.write(Register::Ctrl2, ctrl2)?;

        let lpf_bits = lpf.map_or(0, |mode| mode.acc_bits() | CTRL5_ACC_LPF_EN);
        self.update_ctrl5(CTRL5_ACC_NIBBLE, lpf_bits)?;

        Ok(range.lsb_div())
    }

    fn configure_gyro(
        &mut self,
        range: GyrRange,
        odr: GyrOdr,
        lpf: Option<LpfMode>,
        self_test: bool,
    ) -> Result<u16, ImuError> {
        let mut ctrl3 = u8::from(range) | u8::from(odr);
        if self_test {
            ctrl3 |= SELF_TEST_ENABLE;
        }
        self.write(Register::Ctrl3, ctrl3)?;

        let lpf_bits = lpf.map_or(0, |mode| mode.gyr_bits() | CTRL5_GYR_LPF_EN);
        self.update_ctrl5(CTRL5_GYR_NIBBLE, lpf_bits)?;

        Ok(range.lsb_div())
    }

    /// Replace the bits under `mask` in CTRL5, keeping the other axis untouched.
    fn update_ctrl5(&mut self, mask: u8, bits: u8) -> Result<(), ImuError> {
        let current = self.dev.read_register(Register::Ctrl5.addr())?;
        self.write(Register::Ctrl5, (current & !mask) | (bits & mask))
    }

    /// Read one accelerometer + gyroscope sample without scaling.
    pub fn read_raw(&mut self) -> Result<RawMotion, ImuError> {
        if self.config.is_none() {
            return Err(ImuError::NotConfigured);
        }
        let mut buffer = [0u8; RAW_MOTION_LEN];
        self.dev
            .read_register_buffer(Register::AxL.addr(), &mut buffer)?;
        Ok(RawMotion::from_bytes(&buffer))
    }

    /// Read one sample scaled to mg and degrees per second.
    pub fn read_xyz(&mut self) -> Result<MotionData, ImuError> {
        let (acc_div, gyro_div) = self
            .config
            .as_ref()
            .and_then(|c| Some((c.acc_lsb_div()?, c.gyro_lsb_div()?)))
            .ok_or(ImuError::NotConfigured)?;
        let raw = self.read_raw()?;
        Ok(raw.scale(acc_div, gyro_div))
    }

    /// Die temperature in degrees Celsius
    pub fn read_temperature(&mut self) -> Result<f32, ImuError> {
        if self.config.is_none() {
            return Err(ImuError::NotConfigured);
        }
        let mut buffer = [0u8; 2];
        self.dev
            .read_register_buffer(Register::TemperatureL.addr(), &mut buffer)?;
        Ok(super::temperature_from_bytes(buffer))
    }

    /// Switch the accelerometer into low power motion detection.
    ///
    /// After the CTRL9 handshake completes only the accelerometer runs, at
    /// ±2g. Call [`Self::configure`] to return to normal operation.
    pub fn enable_wake_on_motion(&mut self, wom: &WakeOnMotionConfig) -> Result<(), ImuError> {
        let previous = self.config.ok_or(ImuError::NotConfigured)?;
        self.config = None;

        self.enable_sensors(SensorEnable::empty())?;
        let acc_div = self.configure_accel(AccRange::G2, AccOdr::LowPowerHz21, None, false)?;
        self.write(Register::Cal1L, wom.threshold)?;
        self.write(Register::Cal1H, wom.interrupt)?;
        self.write(Register::Ctrl9, Ctrl9Command::WakeOnMotionSetting.into())?;
        self.enable_sensors(SensorEnable::ACC)?;
        self.wait_command_done(wom.ready_poll_attempts, wom.ready_poll_interval_ms)?;

        let settings = previous
            .settings()
            .with_enabled(SensorEnable::ACC)
            .with_accel(AccRange::G2, AccOdr::LowPowerHz21);
        let mut builder = ConfigBuilder::new(previous.address(), previous.revision(), settings);
        builder.acc_lsb_div(acc_div);
        self.config = Some(builder.build());

        info!(
            "wake on motion armed: threshold {:#x}, interrupt {:#x}",
            wom.threshold,
            wom.interrupt
        );
        Ok(())
    }

    /// Turn every sensor off and clear the motion threshold.
    pub fn disable_wake_on_motion(&mut self) -> Result<(), ImuError> {
        self.enable_sensors(SensorEnable::empty())?;
        self.write(Register::Cal1L, 0)?;
        self.config = None;
        debug!("wake on motion disabled");
        Ok(())
    }

    /// Polls STATUS1 at least once, even when `attempts` is zero.
    fn wait_command_done(&mut self, attempts: u8, interval_ms: u32) -> Result<(), ImuError> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            let status = self.dev.read_register(Register::Status1.addr())?;
            if status & STATUS1_CMD_DONE != 0 {
                trace!("CTRL9 command done after {} polls", attempt);
                return Ok(());
            }
            if attempt < attempts {
                self.delay.delay_ms(interval_ms);
            }
        }
        warn!("CTRL9 command not acknowledged after {} polls", attempts);
        Err(ImuError::WakeOnMotionTimeout)
    }

    /// CTRL1 through CTRL9 in one transfer
    pub fn read_control_registers(&mut self) -> Result<[u8; 9], ImuError> {
        self.require_discovered()?;
        let mut buffer = [0u8; 9];
        self.dev
            .read_register_buffer(Register::Ctrl1.addr(), &mut buffer)?;
        Ok(buffer)
    }

    /// Configuration currently applied, if any
    pub fn config(&self) -> Option<&SensorConfig> {
        self.config.as_ref()
    }

    pub fn release(self) -> I2C {
        self.dev.release()
    }

    fn require_discovered(&self) -> Result<(), ImuError> {
        self.discovery.map(|_| ()).ok_or(ImuError::DeviceNotFound)
    }

    fn write(&mut self, register: Register, value: u8) -> Result<(), ImuError> {
        trace!("write {:?} = {:#x}", register, value);
        self.dev.write_register(&[register.addr(), value])?;
        Ok(())
    }
}
