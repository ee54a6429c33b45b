//! df-core: shared foundation for the dynaflow crates.
//!
//! - units: uom power and frequency for system bases
//! - numeric: flag encoding and finite checks
//! - ids: compact model positions
//! - error: shared error type

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{DfError, DfResult};
pub use ids::ModelId;
pub use numeric::{ensure_finite, ensure_positive, flag};
pub use units::*;
