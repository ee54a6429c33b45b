use crate::{DfError, DfResult};

/// Selector flag encoded as 0.0 / 1.0 so it can multiply equation terms.
#[inline]
pub fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub fn ensure_finite(v: f64, what: &'static str) -> DfResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(DfError::NonFinite { what, value: v })
    }
}

/// Finite and strictly positive, as required of bases and step sizes.
pub fn ensure_positive(v: f64, what: &'static str) -> DfResult<f64> {
    if ensure_finite(v, what)? > 0.0 {
        Ok(v)
    } else {
        Err(DfError::NonPositive { what, value: v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flag_encoding() {
        assert_eq!(flag(true), 1.0);
        assert_eq!(flag(false), 0.0);
    }

    #[test]
    fn rejects_nan_and_zero() {
        assert!(matches!(
            ensure_finite(f64::NAN, "dt"),
            Err(DfError::NonFinite { what: "dt", .. })
        ));
        assert!(matches!(
            ensure_positive(0.0, "dt"),
            Err(DfError::NonPositive { .. })
        ));
        assert!(ensure_positive(f64::INFINITY, "dt").is_err());
    }

    proptest! {
        #[test]
        fn flag_products_select(a in -1e6_f64..1e6, b in -1e6_f64..1e6, sel: bool) {
            let blended = flag(sel) * a + flag(!sel) * b;
            prop_assert_eq!(blended, if sel { a } else { b });
        }
    }
}
