//! Device models declared with df-model.
//!
//! - [`syn_gen`]: generator stub exposing speed and mechanical power
//! - [`tg2`]: TG2 turbine governor composed from [`TGBaseData`] and [`TGBase`]

pub mod governor;
pub mod syngen;

pub use governor::{TG2, TGBase, TGBaseData, Tg2, tg2};
pub use syngen::{SYNGEN, syn_gen};
