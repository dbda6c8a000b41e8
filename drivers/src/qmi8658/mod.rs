use core::fmt::{self, Display, Formatter};

// https://www.qstcorp.com/upload/pdf/202202/QMI8658C%20datasheet%20rev%200.9.pdf
use bitflags::bitflags;
use embedded_hal::i2c::{Error, ErrorKind};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bus address with SA0 pulled low
pub const QMI8658_ADDRESS_LOW: u8 = 0x6A;
/// Bus address with SA0 pulled high
pub const QMI8658_ADDRESS_HIGH: u8 = 0x6B;

/// Addresses tried during discovery, in order
pub(crate) const CANDIDATE_ADDRESSES: [u8; 2] = [QMI8658_ADDRESS_LOW, QMI8658_ADDRESS_HIGH];

/// WHO_AM_I value reported by every QMI8658 revision
pub const QMI8658_CHIP_ID: u8 = 0x05;

/// WHO_AM_I reads per candidate address before moving on
pub(crate) const DISCOVERY_ATTEMPTS: usize = 5;

/// CTRL1 value written after discovery: serial address auto-increment on
pub(crate) const CTRL1_INIT: u8 = 0x60;

/// Bit 7 of CTRL2/CTRL3 starts the axis self test
pub(crate) const SELF_TEST_ENABLE: u8 = 0x80;

// CTRL5 layout: accelerometer owns the low nibble, gyroscope the high nibble
pub(crate) const CTRL5_ACC_NIBBLE: u8 = 0x0F;
pub(crate) const CTRL5_GYR_NIBBLE: u8 = 0xF0;
pub(crate) const CTRL5_ACC_LPF_EN: u8 = 0x01;
pub(crate) const CTRL5_GYR_LPF_EN: u8 = 0x10;

/// STATUS1 bit 0: CTRL9 command done
pub(crate) const STATUS1_CMD_DONE: u8 = 0x01;

/// Bytes in one accelerometer + gyroscope sample
pub const RAW_MOTION_LEN: usize = 12;

/// Raw temperature counts per degree Celsius
pub const TEMPERATURE_LSB_PER_CELSIUS: f32 = 256.0;

/// QMI8658 register map
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Device identifier
    WhoAmI = 0x00,
    /// Hardware revision
    Revision = 0x01,
    /// General and power management modes
    Ctrl1 = 0x02,
    /// Accelerometer control
    Ctrl2 = 0x03,
    /// Gyroscope control
    Ctrl3 = 0x04,
    /// Magnetometer control
    Ctrl4 = 0x05,
    /// Data processing settings (low pass filters)
    Ctrl5 = 0x06,
    /// AttitudeEngine control
    Ctrl6 = 0x07,
    /// Sensor enable
    Ctrl7 = 0x08,
    /// Reserved, do not write
    Ctrl8 = 0x09,
    /// Host command
    Ctrl9 = 0x0A,
    /// Calibration register 1, low byte
    Cal1L = 0x0B,
    /// Calibration register 1, high byte
    Cal1H = 0x0C,
    /// FIFO control
    FifoCtrl = 0x13,
    /// Output data overrun and availability
    StatusInt = 0x2D,
    /// Output data overrun and availability
    Status0 = 0x2E,
    /// Miscellaneous status
    Status1 = 0x2F,
    /// Timestamp, low byte
    TimestampL = 0x30,
    /// Temperature, low byte
    TemperatureL = 0x33,
    /// Accelerometer X axis, low byte
    AxL = 0x35,
    /// Gyroscope X axis, low byte
    GxL = 0x3B,
    /// Magnetometer X axis, low byte
    MxL = 0x41,
    /// Quaternion increment W, low byte
    Q1L = 0x49,
    /// Velocity increment X, low byte
    DvxL = 0x51,
    /// AttitudeEngine register 1
    AeReg1 = 0x57,
    /// I2C master status
    I2cmStatus = 0x6E,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

// The combined 12 byte sample read relies on gyro data following accel data.
const _: () = assert!(Register::GxL.addr() == Register::AxL.addr() + 6);
const _: () = assert!(Register::Ctrl9.addr() == Register::Ctrl1.addr() + 8);

bitflags! {
    /// CTRL7 sensor enable bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SensorEnable: u8 {
        const ACC = 0x01;
        const GYR = 0x02;
        const MAG = 0x04;
        const AE = 0x08;
        const GYR_SNOOZE = 0x10;
    }
}

impl SensorEnable {
    /// Only the low nibble of CTRL7 is written by the enable path
    pub const WIRE_MASK: u8 = 0x0F;

    /// Value written to CTRL7. The AttitudeEngine pulls in both inertial sensors.
    pub fn wire_bits(self) -> u8 {
        let mut flags = self;
        if flags.contains(SensorEnable::AE) {
            flags |= SensorEnable::ACC | SensorEnable::GYR;
        }
        flags.bits() & Self::WIRE_MASK
    }
}

impl Default for SensorEnable {
    fn default() -> Self {
        SensorEnable::ACC | SensorEnable::GYR
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorEnable {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SensorEnable({=u8:#x})", self.bits());
    }
}

/// Accelerometer full-scale range, CTRL2 bits 6:4
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccRange {
    G2 = 0x00,
    G4 = 0x10,
    G8 = 0x20,
    G16 = 0x30,
}

impl AccRange {
    /// Raw counts per g
    pub const fn lsb_div(self) -> u16 {
        match self {
            AccRange::G2 => 1 << 14,
            AccRange::G4 => 1 << 13,
            AccRange::G8 => 1 << 12,
            AccRange::G16 => 1 << 11,
        }
    }
}

/// Accelerometer output data rate, CTRL2 bits 3:0
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccOdr {
    Hz8000 = 0x00,
    Hz4000 = 0x01,
    Hz2000 = 0x02,
    Hz1000 = 0x03,
    Hz500 = 0x04,
    Hz250 = 0x05,
    Hz125 = 0x06,
    Hz62_5 = 0x07,
    Hz31_25 = 0x08,
    LowPowerHz128 = 0x0C,
    LowPowerHz21 = 0x0D,
    LowPowerHz11 = 0x0E,
    LowPowerHz3 = 0x0F,
}

/// Gyroscope full-scale range, CTRL3 bits 6:4
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyrRange {
    Dps32 = 0x00,
    Dps64 = 0x10,
    Dps128 = 0x20,
    Dps256 = 0x30,
    Dps512 = 0x40,
    Dps1024 = 0x50,
    Dps2048 = 0x60,
    Dps4096 = 0x70,
}

impl GyrRange {
    /// Raw counts per degree/s
    pub const fn lsb_div(self) -> u16 {
        match self {
            GyrRange::Dps32 => 1024,
            GyrRange::Dps64 => 512,
            GyrRange::Dps128 => 256,
            GyrRange::Dps256 => 128,
            GyrRange::Dps512 => 64,
            GyrRange::Dps1024 => 32,
            GyrRange::Dps2048 => 16,
            GyrRange::Dps4096 => 8,
        }
    }
}

/// Gyroscope output data rate, CTRL3 bits 3:0
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyrOdr {
    Hz8000 = 0x00,
    Hz4000 = 0x01,
    Hz2000 = 0x02,
    Hz1000 = 0x03,
    Hz500 = 0x04,
    Hz250 = 0x05,
    Hz125 = 0x06,
    Hz62_5 = 0x07,
    Hz31_25 = 0x08,
}

/// Magnetometer output data rate, CTRL4 bits 2:0
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagOdr {
    Hz1000 = 0x00,
    Hz500 = 0x01,
    Hz250 = 0x02,
    Hz125 = 0x03,
    Hz62_5 = 0x04,
    Hz31_25 = 0x05,
}

/// External magnetometer type, CTRL4 bits 6:3
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagDevice {
    Akm09918 = 0x00,
}

/// AttitudeEngine output data rate, CTRL6
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AeOdr {
    Hz1 = 0x00,
    Hz2 = 0x01,
    Hz4 = 0x02,
    Hz8 = 0x03,
    Hz16 = 0x04,
    Hz32 = 0x05,
    Hz64 = 0x06,
    Hz128 = 0x07,
    /// Samples are produced on host request only
    MotionOnDemand = 0x80,
}

/// Low pass filter mode field inside CTRL5
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LpfMode {
    Mode0 = 0x00,
    Mode1 = 0x01,
    Mode2 = 0x02,
    Mode3 = 0x03,
}

impl LpfMode {
    pub(crate) const fn acc_bits(self) -> u8 {
        (self as u8) << 1
    }

    pub(crate) const fn gyr_bits(self) -> u8 {
        (self as u8) << 5
    }
}

/// CTRL9 host commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ctrl9Command {
    Nop = 0x00,
    GyroBias = 0x01,
    RequestSdiMode = 0x03,
    WakeOnMotionSetting = 0x08,
    AccelHostDeltaOffset = 0x09,
    GyroHostDeltaOffset = 0x0A,
    DebugWakeOnMotionData = 0xF8,
}

/// Interrupt line raised on motion, CAL1_H bit 6
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptPin {
    Int1 = 0x00,
    Int2 = 0x40,
}

/// Initial level of the interrupt line, CAL1_H bit 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptLevel {
    Low = 0x00,
    High = 0x80,
}

/// Common wake-on-motion thresholds in mg
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeThreshold {
    /// Small motion wakes the host
    Low = 32,
    /// Large motion needed to wake the host
    High = 128,
}

/// Sensor configuration requested by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSettings {
    pub enabled: SensorEnable,
    pub acc_range: AccRange,
    pub acc_odr: AccOdr,
    pub gyr_range: GyrRange,
    pub gyr_odr: GyrOdr,
    pub mag_device: MagDevice,
    pub mag_odr: MagOdr,
    pub ae_odr: AeOdr,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            enabled: SensorEnable::default(),
            acc_range: AccRange::G8,
            acc_odr: AccOdr::Hz1000,
            gyr_range: GyrRange::Dps512,
            gyr_odr: GyrOdr::Hz1000,
            mag_device: MagDevice::Akm09918,
            mag_odr: MagOdr::Hz125,
            ae_odr: AeOdr::Hz128,
        }
    }
}

impl SensorSettings {
    pub fn with_enabled(mut self, enabled: SensorEnable) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_accel(mut self, range: AccRange, odr: AccOdr) -> Self {
        self.acc_range = range;
        self.acc_odr = odr;
        self
    }

    pub fn with_gyro(mut self, range: GyrRange, odr: GyrOdr) -> Self {
        self.gyr_range = range;
        self.gyr_odr = odr;
        self
    }

    pub fn with_magnetometer(mut self, device: MagDevice, odr: MagOdr) -> Self {
        self.mag_device = device;
        self.mag_odr = odr;
        self
    }

    pub fn with_attitude_engine(mut self, odr: AeOdr) -> Self {
        self.ae_odr = odr;
        self
    }
}

/// Configuration that was applied to the device. Only produced once every
/// register write of the configuration pass succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    address: u8,
    revision: u8,
    settings: SensorSettings,
    acc_lsb_div: Option<u16>,
    gyro_lsb_div: Option<u16>,
}

impl SensorConfig {
    /// Bus address the device answered on
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn settings(&self) -> &SensorSettings {
        &self.settings
    }

    pub fn enabled(&self) -> SensorEnable {
        self.settings.enabled
    }

    /// Accelerometer counts per g, `None` when the accelerometer was not configured
    pub fn acc_lsb_div(&self) -> Option<u16> {
        self.acc_lsb_div
    }

    /// Gyroscope counts per dps, `None` when the gyroscope was not configured
    pub fn gyro_lsb_div(&self) -> Option<u16> {
        self.gyro_lsb_div
    }
}

/// Collects the results of the configuration pass. Nothing escapes until
/// [`ConfigBuilder::build`].
#[derive(Debug)]
pub(crate) struct ConfigBuilder {
    address: u8,
    revision: u8,
    settings: SensorSettings,
    acc_lsb_div: Option<u16>,
    gyro_lsb_div: Option<u16>,
}

impl ConfigBuilder {
    pub(crate) fn new(address: u8, revision: u8, settings: SensorSettings) -> Self {
        Self {
            address,
            revision,
            settings,
            acc_lsb_div: None,
            gyro_lsb_div: None,
        }
    }

    pub(crate) fn acc_lsb_div(&mut self, div: u16) -> &mut Self {
        self.acc_lsb_div = Some(div);
        self
    }

    pub(crate) fn gyro_lsb_div(&mut self, div: u16) -> &mut Self {
        self.gyro_lsb_div = Some(div);
        self
    }

    pub(crate) fn build(self) -> SensorConfig {
        SensorConfig {
            address: self.address,
            revision: self.revision,
            settings: self.settings,
            acc_lsb_div: self.acc_lsb_div,
            gyro_lsb_div: self.gyro_lsb_div,
        }
    }
}

/// Result of a successful discovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Discovery {
    pub address: u8,
    pub revision: u8,
}

/// Wake-on-motion parameters.
///
/// `threshold` and `interrupt` go to CAL1_L and CAL1_H verbatim. Use
/// [`WakeOnMotionConfig::new`] to pack the interrupt byte from its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeOnMotionConfig {
    /// Motion threshold in mg, 1 mg/LSB
    pub threshold: u8,
    /// Interrupt line, initial level and blanking time
    pub interrupt: u8,
    /// STATUS1 reads before giving up on the CTRL9 handshake, at least one
    pub ready_poll_attempts: u8,
    pub ready_poll_interval_ms: u32,
}

impl WakeOnMotionConfig {
    const BLANKING_TIME_MASK: u8 = 0x3F;

    pub fn new(
        threshold: u8,
        pin: InterruptPin,
        level: InterruptLevel,
        blanking_time: u8,
    ) -> Self {
        Self {
            threshold,
            interrupt: u8::from(pin) | u8::from(level) | (blanking_time & Self::BLANKING_TIME_MASK),
            ..Self::default()
        }
    }
}

impl Default for WakeOnMotionConfig {
    fn default() -> Self {
        // Values the watch firmware ships with.
        Self {
            threshold: 0xFF,
            interrupt: 0x8F,
            ready_poll_attempts: 10,
            ready_poll_interval_ms: 10,
        }
    }
}

/// One axis triplet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

/// Raw accelerometer and gyroscope counts from one 12 byte transfer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawMotion {
    pub accel: Vector3<i16>,
    pub gyro: Vector3<i16>,
}

impl RawMotion {
    /// Decodes little endian axis pairs, accel X/Y/Z then gyro X/Y/Z.
    pub fn from_bytes(buffer: &[u8; RAW_MOTION_LEN]) -> Self {
        let axis = |i: usize| i16::from_le_bytes([buffer[i], buffer[i + 1]]);
        Self {
            accel: Vector3 {
                x: axis(0),
                y: axis(2),
                z: axis(4),
            },
            gyro: Vector3 {
                x: axis(6),
                y: axis(8),
                z: axis(10),
            },
        }
    }

    /// Converts to mg and dps with the divisors of the active configuration.
    pub fn scale(&self, acc_lsb_div: u16, gyro_lsb_div: u16) -> MotionData {
        let acc = |v: i16| (v as f32 * 1000.0) / acc_lsb_div as f32;
        let gyr = |v: i16| v as f32 / gyro_lsb_div as f32;
        MotionData {
            accel: Vector3 {
                x: acc(self.accel.x),
                y: acc(self.accel.y),
                z: acc(self.accel.z),
            },
            gyro: Vector3 {
                x: gyr(self.gyro.x),
                y: gyr(self.gyro.y),
                z: gyr(self.gyro.z),
            },
        }
    }
}

/// Scaled sample: acceleration in mg, angular rate in degrees per second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionData {
    pub accel: Vector3<f32>,
    pub gyro: Vector3<f32>,
}

/// Decodes the TEMP_L/TEMP_H pair into degrees Celsius.
pub fn temperature_from_bytes(buffer: [u8; 2]) -> f32 {
    i16::from_le_bytes(buffer) as f32 / TEMPERATURE_LSB_PER_CELSIUS
}

/// Errors that can occur when interacting with the QMI8658
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImuError {
    /// No candidate address reported the expected chip id
    DeviceNotFound,
    /// Bus transfer failed
    I2c(ErrorKind),
    /// Scaled data or a mode change was requested before configuration
    NotConfigured,
    /// CTRL9 wake-on-motion command was never acknowledged
    WakeOnMotionTimeout,
}

impl Display for ImuError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ImuError::DeviceNotFound => write!(f, "QMI8658 not found"),
            ImuError::I2c(kind) => write!(f, "I2C error: {kind:?}"),
            ImuError::NotConfigured => write!(f, "QMI8658 not configured"),
            ImuError::WakeOnMotionTimeout => write!(f, "Wake-on-motion not acknowledged"),
        }
    }
}

impl<E> From<E> for ImuError
where
    E: Error,
{
    fn from(e: E) -> Self {
        ImuError::I2c(e.kind())
    }
}

pub mod blocking;
