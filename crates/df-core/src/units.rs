//! uom quantities for system bases.

use uom::si::f64::{Frequency as UomFrequency, Power as UomPower};
use uom::si::frequency::hertz;
use uom::si::power::megawatt;

pub type Power = UomPower;
pub type Frequency = UomFrequency;

/// Apparent power rating in MVA, carried as a uom `Power`.
#[inline]
pub fn mva(v: f64) -> Power {
    Power::new::<megawatt>(v)
}

#[inline]
pub fn as_mva(p: Power) -> f64 {
    p.get::<megawatt>()
}

#[inline]
pub fn hz(v: f64) -> Frequency {
    Frequency::new::<hertz>(v)
}

#[inline]
pub fn as_hz(f: Frequency) -> f64 {
    f.get::<hertz>()
}

/// Factor converting a per-unit value on a device rating to the system base.
///
/// `v_sys = v_dev * rating / base`. A zero base is rejected by the caller.
#[inline]
pub fn device_to_system(rating: Power, base: Power) -> f64 {
    as_mva(rating) / as_mva(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_round_trip() {
        assert!((as_hz(hz(60.0)) - 60.0).abs() < 1e-12);
        assert!((as_mva(mva(100.0)) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn device_base_conversion() {
        let k = device_to_system(mva(200.0), mva(100.0));
        assert!((k - 2.0).abs() < 1e-12);
        assert!((device_to_system(mva(50.0), mva(100.0)) - 0.5).abs() < 1e-12);
    }
}
