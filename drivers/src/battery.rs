/// Converts battery ADC readings to voltage and state of charge.
///
/// The cell is measured through a resistor divider, so the pin sees a
/// fraction of the cell voltage. The charge estimate is linear between the
/// empty and full voltages.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryGauge {
    /// Cell voltage reported as 100 %
    pub full_voltage: f32,
    /// Cell voltage reported as 0 %, the shutdown threshold
    pub empty_voltage: f32,
    /// ADC reference voltage
    pub reference_voltage: f32,
    /// Cell voltage divided by pin voltage
    pub divider_ratio: f32,
}

impl Default for BatteryGauge {
    fn default() -> Self {
        Self {
            full_voltage: 4.2,
            empty_voltage: 2.5,
            reference_voltage: 3.3,
            divider_ratio: 2.0,
        }
    }
}

impl BatteryGauge {
    /// Cell voltage for a raw reading taken with a `resolution_bits` ADC.
    pub fn voltage(&self, raw: u16, resolution_bits: u8) -> f32 {
        let full_scale = (1u32 << resolution_bits.min(16)) as f32;
        let voltage = raw as f32 / full_scale * self.reference_voltage * self.divider_ratio;
        trace!("battery raw {:#x} -> {} V", raw, voltage);
        voltage
    }

    /// Charge in percent, clamped to `0.0..=100.0`.
    pub fn percentage(&self, voltage: f32) -> f32 {
        let span = self.full_voltage - self.empty_voltage;
        let percent = (voltage - self.empty_voltage) / span * 100.0;
        percent.clamp(0.0, 100.0)
    }

    pub fn percentage_from_raw(&self, raw: u16, resolution_bits: u8) -> f32 {
        self.percentage(self.voltage(raw, resolution_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_voltage_from_12_bit_reading() {
        let gauge = BatteryGauge::default();
        // half scale on the pin is 1.65 V, doubled by the divider
        assert!(approx(gauge.voltage(2048, 12), 3.3));
        assert_eq!(gauge.voltage(0, 12), 0.0);
    }

    #[test]
    fn test_percentage_is_linear_between_limits() {
        let gauge = BatteryGauge::default();
        assert!(approx(gauge.percentage(2.5), 0.0));
        assert!(approx(gauge.percentage(3.35), 50.0));
        assert!(approx(gauge.percentage(4.2), 100.0));
    }

    #[test]
    fn test_percentage_is_clamped() {
        let gauge = BatteryGauge::default();
        assert_eq!(gauge.percentage(4.5), 100.0);
        assert_eq!(gauge.percentage(1.0), 0.0);
    }

    #[test]
    fn test_percentage_from_raw() {
        let gauge = BatteryGauge::default();
        // 3.3 V at the cell is (3.3 - 2.5) / 1.7 of the usable range
        let expected = 0.8 / 1.7 * 100.0;
        assert!(approx(gauge.percentage_from_raw(2048, 12), expected));
    }
}
