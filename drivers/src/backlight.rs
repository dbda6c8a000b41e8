use core::fmt::{self, Display, Formatter};

use embedded_hal::pwm::{Error, ErrorKind, SetDutyCycle};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BacklightError {
    /// Requested duty outside `0.0..=1.0`
    InvalidDuty,
    Pwm(ErrorKind),
}

impl Display for BacklightError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BacklightError::InvalidDuty => write!(f, "Backlight duty must be within 0.0..=1.0"),
            BacklightError::Pwm(kind) => write!(f, "PWM error: {kind:?}"),
        }
    }
}

impl<E> From<E> for BacklightError
where
    E: Error,
{
    fn from(e: E) -> Self {
        BacklightError::Pwm(e.kind())
    }
}

/// Backlight brightness as a fraction of the PWM period.
///
/// With no PWM channel wired the duty is still tracked so callers can read
/// back what they asked for.
#[derive(Debug)]
pub struct Backlight<PWM> {
    pwm: Option<PWM>,
    duty: f32,
}

impl<PWM> Backlight<PWM>
where
    PWM: SetDutyCycle,
{
    pub fn new(pwm: Option<PWM>) -> Self {
        Self { pwm, duty: 1.0 }
    }

    /// Set brightness in `0.0..=1.0`. Anything else is logged and ignored,
    /// leaving the current duty in effect.
    pub fn set_duty(&mut self, duty: f32) -> Result<(), BacklightError> {
        if !(0.0..=1.0).contains(&duty) {
            warn!("backlight duty {} out of range, keeping {}", duty, self.duty);
            return Err(BacklightError::InvalidDuty);
        }

        if let Some(pwm) = &mut self.pwm {
            let max = pwm.max_duty_cycle();
            let value = libm::roundf(duty * max as f32) as u16;
            pwm.set_duty_cycle(value)?;
        }
        self.duty = duty;
        debug!("backlight duty {}", duty);
        Ok(())
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }

    pub fn release(self) -> Option<PWM> {
        self.pwm
    }
}
