//! System-wide configuration.

use df_core::{DfResult, Frequency, Power, as_hz, as_mva, ensure_positive, hz, mva};

/// System base quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemConfig {
    /// Power base that per-unit power parameters are converted to.
    pub base_mva: Power,
    /// Nominal frequency.
    pub freq: Frequency,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            base_mva: mva(100.0),
            freq: hz(60.0),
        }
    }
}

impl SystemConfig {
    pub fn with_base_mva(mut self, base: f64) -> Self {
        self.base_mva = mva(base);
        self
    }

    pub(crate) fn validate(&self) -> DfResult<()> {
        ensure_positive(as_mva(self.base_mva), "base_mva")?;
        ensure_positive(as_hz(self.freq), "freq")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base() {
        let cfg = SystemConfig::default();
        assert!((as_mva(cfg.base_mva) - 100.0).abs() < 1e-9);
        assert!(cfg.validate().is_ok());
        assert!(cfg.with_base_mva(0.0).validate().is_err());
    }
}
