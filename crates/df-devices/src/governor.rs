//! Turbine governors.
//!
//! [`TGBaseData`] declares the parameters every governor shares and
//! [`TGBase`] the links to the generator and the output stage. A concrete
//! governor declares both, then its own dynamics between speed deviation
//! and the non-limited power `pnl`.

use df_model::{
    BlockConfig, ExtDef, ExtKind, ExtRef, LeadLag, ModelBuilder, ModelDef, ModelResult,
    ParamDef, ServiceDef, Symbol, VarDef,
};
use tracing::debug;

use crate::syngen::SYNGEN;

pub const TG2: &str = "TG2";

/// Parameters shared by turbine governors.
#[derive(Debug, Clone)]
pub struct TGBaseData {
    pub syn: Symbol,
    pub r: Symbol,
    pub pmax: Symbol,
    pub pmin: Symbol,
    pub wref0: Symbol,
    pub dbl: Symbol,
    pub dbu: Symbol,
    pub dbc: Symbol,
}

impl TGBaseData {
    pub fn declare(b: &mut ModelBuilder) -> ModelResult<Self> {
        Ok(Self {
            syn: b.param(
                ParamDef::idx("syn", SYNGEN)
                    .mandatory()
                    .info("Synchronous generator idx"),
            )?,
            r: b.param(
                ParamDef::num("R")
                    .default(0.05)
                    .unit("pu")
                    .info("Speed regulation gain")
                    .non_zero(),
            )?,
            pmax: b.param(
                ParamDef::num("pmax")
                    .default(999.0)
                    .unit("pu")
                    .power()
                    .info("Maximum power output"),
            )?,
            pmin: b.param(
                ParamDef::num("pmin")
                    .default(0.0)
                    .unit("pu")
                    .power()
                    .info("Minimum power output"),
            )?,
            wref0: b.param(
                ParamDef::num("wref0")
                    .default(1.0)
                    .unit("pu")
                    .info("Base speed reference"),
            )?,
            dbl: b.param(
                ParamDef::num("dbl")
                    .default(-1e-4)
                    .unit("pu")
                    .info("Deadband lower limit"),
            )?,
            dbu: b.param(
                ParamDef::num("dbu")
                    .default(1e-4)
                    .unit("pu")
                    .info("Deadband upper limit"),
            )?,
            dbc: b.param(
                ParamDef::num("dbc")
                    .default(0.0)
                    .unit("pu")
                    .info("Deadband neutral value"),
            )?,
        })
    }
}

/// Generator links and output stage shared by turbine governors.
///
/// `pnl` and `pout` start at the generator's initial mechanical power; the
/// governor adds `u * (pout - pm0)` to the generator's `pm` equation.
#[derive(Debug, Clone)]
pub struct TGBase {
    pub sn: Symbol,
    pub pm0: Symbol,
    pub omega: Symbol,
    pub pm: Symbol,
    pub pnl: Symbol,
    pub pout: Symbol,
    pub wref: Symbol,
}

impl TGBase {
    pub fn declare(b: &mut ModelBuilder, data: &TGBaseData) -> ModelResult<Self> {
        let syn = data.syn.name();
        let sn = b.ext_param("Sn", ExtRef::new(SYNGEN, "Sn", syn))?;
        b.rating(&sn)?;
        let pm0 = b.ext_service("pm0", ExtRef::new(SYNGEN, "pm", syn))?;
        let omega = b.ext_state("omega", ExtRef::new(SYNGEN, "omega", syn))?;
        let pm = b.ext(
            ExtDef::new("pm", ExtKind::Algeb, ExtRef::new(SYNGEN, "pm", syn))
                .info("Mechanical power of the generator"),
        )?;
        let pnl = b.algeb(
            VarDef::algeb("pnl")
                .v_init(&pm0)
                .info("Power output before hard limiter"),
        )?;
        let pout = b.algeb(
            VarDef::algeb("pout")
                .v_init(&pm0)
                .info("Turbine power output after limiter"),
        )?;
        let wref = b.algeb(
            VarDef::algeb("wref")
                .v_init(&data.wref0)
                .e_str(format!("{} - wref", data.wref0))
                .info("Speed reference variable"),
        )?;
        b.set_equation(&pm, format!("u * ({pout} - {pm0})"))?;
        Ok(Self {
            sn,
            pm0,
            omega,
            pm,
            pnl,
            pout,
            wref,
        })
    }

    /// Hard limit `pnl` into `pout` between `pmin` and `pmax`.
    pub fn limit_output(
        &self,
        b: &mut ModelBuilder,
        data: &TGBaseData,
        enable: bool,
    ) -> ModelResult<()> {
        let plim = b.hard_limiter("plim", &self.pnl, &data.pmin, &data.pmax, enable)?;
        b.set_equation(
            &self.pout,
            format!(
                "{pnl} * {zi} + {pmax} * {zu} + {pmin} * {zl} - {pout}",
                pnl = self.pnl,
                pout = self.pout,
                pmax = data.pmax,
                pmin = data.pmin,
                zi = plim.zi,
                zu = plim.zu,
                zl = plim.zl,
            ),
        )
    }
}

/// Handles of a declared TG2 governor.
#[derive(Debug, Clone)]
pub struct Tg2 {
    pub data: TGBaseData,
    pub base: TGBase,
    pub t1: Symbol,
    pub t2: Symbol,
    pub t12: Symbol,
    pub w_d: Symbol,
    pub w_dm: Symbol,
    pub w_dmg: Symbol,
}

impl Tg2 {
    /// Declare TG2 on an empty builder.
    pub fn declare(b: &mut ModelBuilder, config: BlockConfig) -> ModelResult<Self> {
        let data = TGBaseData::declare(b)?;
        let t1 = b.param(ParamDef::num("T1").default(0.2).info("Transient gain time"))?;
        let t2 = b.param(
            ParamDef::num("T2")
                .default(10.0)
                .info("Governor time constant")
                .non_negative(),
        )?;
        let base = TGBase::declare(b, &data)?;

        let gain = b.service(ServiceDef::constant("gain", format!("u / {}", data.r)))?;

        let w_d = b.algeb(
            VarDef::algeb("w_d")
                .v_init("0")
                .info("Speed deviation before dead band (positive for under speed)"),
        )?;
        b.set_equation(&w_d, format!("({} - {}) - {w_d}", base.wref, base.omega))?;

        let w_dm = b.algeb(
            VarDef::algeb("w_dm")
                .v_init("0")
                .info("Measured speed deviation after dead band"),
        )?;
        let db = b.deadband("w_db", &w_d, &data.dbc, &data.dbl, &data.dbu, config.deadband)?;
        b.set_equation(
            &w_dm,
            format!(
                "(1 - {zi}) * {w_d} + {zlr} * {dbl} + {zur} * {dbu} \
                 + ({zi} - {zlr} - {zur}) * {dbc} - {w_dm}",
                zi = db.zi,
                zlr = db.zlr,
                zur = db.zur,
                dbl = data.dbl,
                dbu = data.dbu,
                dbc = data.dbc,
            ),
        )?;

        let w_dmg = b.algeb(
            VarDef::algeb("w_dmg")
                .v_init("0")
                .info("Speed deviation after dead band after gain"),
        )?;
        b.set_equation(&w_dmg, format!("{gain} * {w_dm} - {w_dmg}"))?;

        let ll = b.add_block(LeadLag::new("leadlag", &w_dmg, &t1, &t2).info("Lead-lag"))?;
        let t12 = b.service(
            ServiceDef::constant("T12", format!("{t1} / {}", ll.t2s)).info("Lead fraction T1 / T2"),
        )?;
        b.set_equation(
            &base.pnl,
            format!("{} + {} - {}", base.pm0, ll.y, base.pnl),
        )?;
        base.limit_output(b, &data, config.hardlimit)?;

        Ok(Self {
            data,
            base,
            t1,
            t2,
            t12,
            w_d,
            w_dm,
            w_dmg,
        })
    }
}

/// TG2 turbine governor: deadband, droop gain, lead-lag and output limiter.
pub fn tg2(config: BlockConfig) -> ModelResult<ModelDef> {
    let mut b = ModelBuilder::new(TG2, "TurbineGov");
    Tg2::declare(&mut b, config)?;
    debug!(?config, "TG2 declared");
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_model::{ModelError, SlotSource};

    #[test]
    fn declares_full_symbol_set() {
        let def = tg2(BlockConfig::default()).unwrap();
        for name in [
            "syn", "R", "pmax", "pmin", "wref0", "dbl", "dbu", "dbc", "T1", "T2", "Sn", "pm0",
            "omega", "pm", "pnl", "pout", "wref", "gain", "T12", "w_d", "w_dm", "w_dmg",
            "leadlag_x", "leadlag_y", "w_db_zlr", "plim_zu",
        ] {
            assert!(def.slot(name).is_some(), "missing {name}");
        }
        assert!(def.vars.iter().all(|v| v.equation.is_some()));
        assert!(def.ext("pm").unwrap().equation.is_some());
        assert!(matches!(
            def.sources[def.rating.unwrap()],
            SlotSource::Ext(_)
        ));
    }

    #[test]
    fn deadband_declared_before_limiter() {
        let def = tg2(BlockConfig::all_enabled()).unwrap();
        let names: Vec<&str> = def.discretes.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["w_db", "plim"]);
        assert!(def.discretes.iter().all(|d| d.is_enabled()));
    }

    #[test]
    fn misspelled_symbol_is_caught_at_build() {
        let mut b = ModelBuilder::new("Bad", "TurbineGov");
        let data = TGBaseData::declare(&mut b).unwrap();
        let base = TGBase::declare(&mut b, &data).unwrap();
        b.set_equation(&base.pnl, "pmx - pnl").unwrap();
        let err: ModelError = b.build().unwrap_err();
        assert!(err.is_undeclared_symbol());
    }
}
