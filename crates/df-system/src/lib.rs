//! df-system: instantiated models and the global DAE evaluator.
//!
//! Provides:
//! - [`System`]: model registration, instance data, setup and initialization
//! - external reference resolution between models
//! - [`DofMap`]: fixed global variable indexing
//! - [`Assembly`]: residual, sparse Jacobian and discrete commit for the
//!   integrator

pub mod assembly;
pub mod config;
pub mod dof;
pub mod error;
pub mod sparse;
pub mod system;

mod runtime;

pub use assembly::Assembly;
pub use config::SystemConfig;
pub use dof::DofMap;
pub use error::{SystemError, SystemResult};
pub use sparse::SparseJacobian;
pub use system::System;
