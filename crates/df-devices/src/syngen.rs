//! Minimal synchronous generator: swing equation with a mechanical power
//! input that governors drive.

use df_model::{ModelBuilder, ModelDef, ModelResult, ParamDef, ServiceDef, VarDef};

pub const SYNGEN: &str = "SynGen";

/// `omega' = u (pm - pe - D (omega - 1)) / M`, `0 = pm0 - pm`.
///
/// `pe` is a fixed electrical power; `pm` settles at its initial value
/// unless an external model adds to its equation.
pub fn syn_gen() -> ModelResult<ModelDef> {
    let mut b = ModelBuilder::new(SYNGEN, "SynGen");
    let sn = b.param(
        ParamDef::num("Sn")
            .default(100.0)
            .unit("MVA")
            .info("Power rating")
            .non_zero(),
    )?;
    b.param(
        ParamDef::num("M")
            .default(6.0)
            .unit("s")
            .info("Inertia constant")
            .non_zero(),
    )?;
    b.param(ParamDef::num("D").default(1.0).info("Damping").non_negative())?;
    b.param(ParamDef::num("pe").default(0.5).unit("pu").info("Electrical power"))?;
    b.rating(&sn)?;

    let pm0 = b.service(ServiceDef::constant("pm0", "pe").info("Initial mechanical power"))?;
    let omega = b.state(VarDef::state("omega").v_init("1").info("Rotor speed"))?;
    let pm = b.algeb(VarDef::algeb("pm").v_init("pe").info("Mechanical power"))?;

    b.set_equation(&omega, format!("u * ({pm} - pe - D * ({omega} - 1)) / M"))?;
    b.set_equation(&pm, format!("{pm0} - {pm}"))?;
    b.build()
}
