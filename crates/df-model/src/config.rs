//! Block configuration passed explicitly when a model is declared.

use serde::{Deserialize, Serialize};

/// Enables for the discrete blocks of a device model.
///
/// Disabled blocks still produce well-formed flags: a disabled hard limiter
/// reports `zi = 1` everywhere, a disabled deadband reports `zi = 0` and
/// splits `zl`/`zu` at the band center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(default)]
    pub deadband: bool,
    #[serde(default)]
    pub hardlimit: bool,
}

impl BlockConfig {
    pub fn all_enabled() -> Self {
        Self {
            deadband: true,
            hardlimit: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_disabled() {
        let cfg: BlockConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, BlockConfig::default());
        let cfg: BlockConfig = serde_json::from_str(r#"{"hardlimit": true}"#).unwrap();
        assert!(cfg.hardlimit && !cfg.deadband);
    }
}
