//! df-model: declarative device model types.
//!
//! A model type is declared once through a [`ModelBuilder`]: parameters,
//! references into other models, services, variables with their equations,
//! discrete blocks and composite [`Block`]s. [`ModelBuilder::build`] compiles
//! everything into an immutable [`ModelDef`] shared by all instances.
//!
//! Per-instance numbers live in a [`ParamStore`]; evaluation and assembly
//! happen in `df-system`.

pub mod block;
pub mod builder;
pub mod config;
pub mod discrete;
pub mod error;
pub mod extref;
pub mod model;
pub mod order;
pub mod param;
pub mod service;
pub mod var;

pub use block::{Block, LeadLag, LeadLagHandle};
pub use builder::{DeadBandHandle, LimiterHandle, ModelBuilder, STATUS_PARAM, TIME_SYMBOL};
pub use config::BlockConfig;
pub use discrete::{Discrete, DiscreteMemory, HeldEdge};
pub use error::{ModelError, ModelResult};
pub use extref::{ExtDef, ExtKind, ExtRef};
pub use model::{CompiledExt, CompiledService, CompiledVar, InitStep, ModelDef, SlotSource};
pub use order::evaluation_order;
pub use param::{InstanceData, ParamDef, ParamKind, ParamStore, ParamValue};
pub use service::{RefreshPolicy, ServiceDef, ServiceKind};
pub use var::{Symbol, VarDef, VarKind};
