//! Composite blocks that expand into services, variables and equations.

use crate::builder::ModelBuilder;
use crate::error::ModelResult;
use crate::service::ServiceDef;
use crate::var::{Symbol, VarDef};

/// A reusable group of declarations attached to a model under a name prefix.
pub trait Block {
    type Handle;

    /// Declare this block's symbols on `builder`.
    fn attach(self, builder: &mut ModelBuilder) -> ModelResult<Self::Handle>;
}

/// Lead-lag transfer function `(1 + s*T1) / (1 + s*T2)`.
///
/// With `T2 == 0` the block degenerates to a pass-through `y = u` while its
/// internal state is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadLag {
    name: String,
    input: String,
    t1: String,
    t2: String,
    info: String,
}

/// Symbols declared by [`LeadLag`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeadLagHandle {
    /// Internal lag state.
    pub x: Symbol,
    /// Output.
    pub y: Symbol,
    /// 0 where `T2 == 0`, 1 elsewhere.
    pub nz: Symbol,
    /// `T2` with zeros replaced by one.
    pub t2s: Symbol,
}

impl LeadLag {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        t1: impl Into<String>,
        t2: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            t1: t1.into(),
            t2: t2.into(),
            info: String::new(),
        }
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

impl Block for LeadLag {
    type Handle = LeadLagHandle;

    fn attach(self, b: &mut ModelBuilder) -> ModelResult<LeadLagHandle> {
        let n = &self.name;
        let u = format!("({})", self.input);
        let (t1, t2) = (format!("({})", self.t1), format!("({})", self.t2));

        let nz = b.service(ServiceDef::flag_value(format!("{n}_nz"), &self.t2, 0.0))?;
        // T2 with zeros replaced by ones, so divisions stay finite
        let t2s = b.service(ServiceDef::constant(
            format!("{n}_T2s"),
            format!("{t2} + 1 - {nz}"),
        ))?;

        let x = b.state(
            VarDef::state(format!("{n}_x"))
                .v_init(&u)
                .info(format!("{} state", self.info)),
        )?;
        let y = b.algeb(
            VarDef::algeb(format!("{n}_y"))
                .v_init(&u)
                .info(format!("{} output", self.info)),
        )?;

        b.set_equation(&x, format!("{nz} * ({u} - {x}) / {t2s}"))?;
        b.set_equation(
            &y,
            format!("{nz} * ({t1} * ({u} - {x}) + {t2s} * ({x} - {y})) + (1 - {nz}) * ({u} - {y})"),
        )?;

        Ok(LeadLagHandle { x, y, nz, t2s })
    }
}
