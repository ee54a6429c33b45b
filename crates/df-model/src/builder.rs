//! Declarative construction of a model type.
//!
//! Declarations accumulate equation text; [`ModelBuilder::build`] resolves
//! every name, compiles every expression and fixes the initialization order.
//! Nothing is evaluated here.

use df_expr::{CompiledExpr, SymbolClass, SymbolTable, compile};
use tracing::debug;

use crate::block::Block;
use crate::discrete::{DEADBAND_FLAGS, DeadBand, Discrete, HardLimiter, LIMITER_FLAGS};
use crate::error::{ModelError, ModelResult};
use crate::extref::{ExtDef, ExtKind, ExtRef};
use crate::model::{
    CompiledExt, CompiledService, CompiledVar, InitStep, ModelDef, ServiceExpr, SlotSource,
};
use crate::order::evaluation_order;
use crate::param::{ParamDef, ParamKind};
use crate::service::{ServiceDef, ServiceKind};
use crate::var::{Symbol, VarDef, VarKind};

/// Name of the implicit connection-status parameter.
pub const STATUS_PARAM: &str = "u";
/// Name of the implicit time symbol.
pub const TIME_SYMBOL: &str = "dae_t";

/// Flags of a hard limiter, usable in equation text.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterHandle {
    pub zl: Symbol,
    pub zi: Symbol,
    pub zu: Symbol,
}

/// Flags of a deadband, usable in equation text.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadBandHandle {
    pub zl: Symbol,
    pub zi: Symbol,
    pub zu: Symbol,
    /// Inside the band, last left through the lower edge.
    pub zlr: Symbol,
    /// Inside the band, last left through the upper edge.
    pub zur: Symbol,
}

#[derive(Debug, Clone)]
enum PendingDiscrete {
    Limiter {
        name: String,
        origin: String,
        lower: String,
        upper: String,
        enable: bool,
        flags: [usize; 3],
    },
    DeadBand {
        name: String,
        origin: String,
        center: String,
        lower: String,
        upper: String,
        enable: bool,
        flags: [usize; 5],
    },
}

/// Builder for a [`ModelDef`].
///
/// ```
/// use df_model::{ModelBuilder, ParamDef, VarDef};
///
/// let mut b = ModelBuilder::new("Lag", "Test");
/// let k = b.param(ParamDef::num("k").default(2.0)).unwrap();
/// let x = b.state(VarDef::state("x").v_init("0")).unwrap();
/// b.set_equation(&x, format!("{k} - {x}")).unwrap();
/// let def = b.build().unwrap();
/// assert_eq!(def.vars.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    group: String,
    table: SymbolTable,
    sources: Vec<SlotSource>,
    params: Vec<ParamDef>,
    exts: Vec<(ExtDef, usize)>,
    services: Vec<(ServiceDef, usize)>,
    vars: Vec<(VarDef, usize)>,
    discretes: Vec<PendingDiscrete>,
    rating: Option<usize>,
}

impl ModelBuilder {
    /// Start a model. Declares the status parameter `u` (default 1) and the
    /// time symbol `dae_t`.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        let mut b = Self {
            name: name.into(),
            group: group.into(),
            table: SymbolTable::new(),
            sources: Vec::new(),
            params: Vec::new(),
            exts: Vec::new(),
            services: Vec::new(),
            vars: Vec::new(),
            discretes: Vec::new(),
            rating: None,
        };
        b.params.push(
            ParamDef::num(STATUS_PARAM)
                .default(1.0)
                .info("connection status"),
        );
        b.table
            .declare(STATUS_PARAM, SymbolClass::Parameter)
            .expect("fresh table has no `u`");
        b.sources.push(SlotSource::Param(0));
        b.table
            .declare(TIME_SYMBOL, SymbolClass::Time)
            .expect("fresh table has no `dae_t`");
        b.sources.push(SlotSource::Time);
        b
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn declare(
        &mut self,
        name: &str,
        class: SymbolClass,
        source: SlotSource,
    ) -> ModelResult<Symbol> {
        let slot = self
            .table
            .declare(name, class)
            .map_err(|e| ModelError::expr(&self.name, e))?;
        self.sources.push(source);
        Ok(Symbol::new(name, slot))
    }

    pub fn param(&mut self, def: ParamDef) -> ModelResult<Symbol> {
        let name = def.name.clone();
        let source = SlotSource::Param(self.params.len());
        let sym = self.declare(&name, SymbolClass::Parameter, source)?;
        self.params.push(def);
        Ok(sym)
    }

    /// Declare a reference to a symbol of another model.
    pub fn ext(&mut self, def: ExtDef) -> ModelResult<Symbol> {
        if def.e_str.is_some() && !def.kind.is_variable() {
            return Err(ModelError::InvalidArg {
                what: format!(
                    "{}: external `{}` is not a variable and cannot carry an equation",
                    self.name, def.name
                ),
            });
        }
        let class = match def.kind {
            ExtKind::Param => SymbolClass::Parameter,
            ExtKind::Service => SymbolClass::Service,
            ExtKind::State => SymbolClass::State,
            ExtKind::Algeb => SymbolClass::Algebraic,
        };
        let name = def.name.clone();
        let sym = self.declare(&name, class, SlotSource::Ext(self.exts.len()))?;
        self.exts.push((def, sym.slot()));
        Ok(sym)
    }

    pub fn ext_param(&mut self, name: impl Into<String>, ext: ExtRef) -> ModelResult<Symbol> {
        self.ext(ExtDef::new(name, ExtKind::Param, ext))
    }

    pub fn ext_service(&mut self, name: impl Into<String>, ext: ExtRef) -> ModelResult<Symbol> {
        self.ext(ExtDef::new(name, ExtKind::Service, ext))
    }

    pub fn ext_state(&mut self, name: impl Into<String>, ext: ExtRef) -> ModelResult<Symbol> {
        self.ext(ExtDef::new(name, ExtKind::State, ext))
    }

    pub fn ext_algeb(&mut self, name: impl Into<String>, ext: ExtRef) -> ModelResult<Symbol> {
        self.ext(ExtDef::new(name, ExtKind::Algeb, ext))
    }

    pub fn service(&mut self, def: ServiceDef) -> ModelResult<Symbol> {
        let name = def.name.clone();
        let source = SlotSource::Service(self.services.len());
        let sym = self.declare(&name, SymbolClass::Service, source)?;
        self.services.push((def, sym.slot()));
        Ok(sym)
    }

    fn var(&mut self, def: VarDef) -> ModelResult<Symbol> {
        let class = match def.kind {
            VarKind::State => SymbolClass::State,
            VarKind::Algeb => SymbolClass::Algebraic,
        };
        let name = def.name.clone();
        let sym = self.declare(&name, class, SlotSource::Var(self.vars.len()))?;
        self.vars.push((def, sym.slot()));
        Ok(sym)
    }

    /// Declare a differential variable.
    pub fn state(&mut self, def: VarDef) -> ModelResult<Symbol> {
        if def.kind != VarKind::State {
            return Err(ModelError::InvalidArg {
                what: format!("{}: `{}` is not a state", self.name, def.name),
            });
        }
        self.var(def)
    }

    /// Declare an algebraic variable.
    pub fn algeb(&mut self, def: VarDef) -> ModelResult<Symbol> {
        if def.kind != VarKind::Algeb {
            return Err(ModelError::InvalidArg {
                what: format!("{}: `{}` is not algebraic", self.name, def.name),
            });
        }
        self.var(def)
    }

    /// Attach the equation of a variable (owned or external) declared earlier.
    pub fn set_equation(&mut self, var: &Symbol, e: impl Into<String>) -> ModelResult<()> {
        let slot = var.slot();
        let target = match self.sources.get(slot).copied() {
            Some(SlotSource::Var(i)) => &mut self.vars[i].0.e_str,
            Some(SlotSource::Ext(i)) if self.exts[i].0.kind.is_variable() => {
                &mut self.exts[i].0.e_str
            }
            _ => {
                return Err(ModelError::NotAVariable {
                    model: self.name.clone(),
                    name: var.name().to_string(),
                });
            }
        };
        if target.is_some() {
            return Err(ModelError::InvalidArg {
                what: format!("{}: equation of `{}` set twice", self.name, var.name()),
            });
        }
        *target = Some(e.into());
        Ok(())
    }

    fn flags<const N: usize>(
        &mut self,
        block: &str,
        suffixes: [&str; N],
    ) -> ModelResult<[Symbol; N]> {
        let index = self.discretes.len();
        let mut out = Vec::with_capacity(N);
        for (flag, suffix) in suffixes.iter().enumerate() {
            out.push(self.declare(
                &format!("{block}_{suffix}"),
                SymbolClass::Flag,
                SlotSource::Flag { block: index, flag },
            )?);
        }
        out.try_into().map_err(|_| ModelError::InvalidArg {
            what: format!("{}: flag count mismatch on `{block}`", self.name),
        })
    }

    /// Hard limiter on `origin` between `lower` and `upper`.
    ///
    /// Flags are named `{name}_zl`, `{name}_zi` and `{name}_zu`.
    pub fn hard_limiter(
        &mut self,
        name: impl Into<String>,
        origin: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
        enable: bool,
    ) -> ModelResult<LimiterHandle> {
        let name = name.into();
        let [zl, zi, zu] = self.flags(&name, LIMITER_FLAGS)?;
        let flags = [zl.slot(), zi.slot(), zu.slot()];
        self.discretes.push(PendingDiscrete::Limiter {
            name,
            origin: origin.into(),
            lower: lower.into(),
            upper: upper.into(),
            enable,
            flags,
        });
        Ok(LimiterHandle { zl, zi, zu })
    }

    /// Deadband on `origin` over `[lower, upper]` around `center`.
    pub fn deadband(
        &mut self,
        name: impl Into<String>,
        origin: impl Into<String>,
        center: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
        enable: bool,
    ) -> ModelResult<DeadBandHandle> {
        let name = name.into();
        let [zl, zi, zu, zlr, zur] = self.flags(&name, DEADBAND_FLAGS)?;
        let flags = [zl.slot(), zi.slot(), zu.slot(), zlr.slot(), zur.slot()];
        self.discretes.push(PendingDiscrete::DeadBand {
            name,
            origin: origin.into(),
            center: center.into(),
            lower: lower.into(),
            upper: upper.into(),
            enable,
            flags,
        });
        Ok(DeadBandHandle {
            zl,
            zi,
            zu,
            zlr,
            zur,
        })
    }

    /// Attach a composite block.
    pub fn add_block<B: Block>(&mut self, block: B) -> ModelResult<B::Handle> {
        block.attach(self)
    }

    /// Mark the parameter holding the device power rating.
    ///
    /// Either a numeric local parameter or an external parameter.
    pub fn rating(&mut self, param: &Symbol) -> ModelResult<()> {
        let ok = match self.sources.get(param.slot()) {
            Some(SlotSource::Param(i)) => self.params[*i].is_numeric() && !self.params[*i].power,
            Some(SlotSource::Ext(i)) => self.exts[*i].0.kind == ExtKind::Param,
            _ => false,
        };
        if !ok {
            return Err(ModelError::InvalidArg {
                what: format!(
                    "{}: rating `{}` must be a numeric, unscaled parameter",
                    self.name,
                    param.name()
                ),
            });
        }
        self.rating = Some(param.slot());
        Ok(())
    }

    fn compile(&self, text: &str) -> ModelResult<CompiledExpr> {
        compile(text, &self.table).map_err(|e| ModelError::expr(&self.name, e))
    }

    fn compile_opt(&self, text: Option<&String>) -> ModelResult<Option<CompiledExpr>> {
        text.map(|t| self.compile(t)).transpose()
    }

    fn check_indexers(&self) -> ModelResult<()> {
        for (def, _) in &self.exts {
            let indexer = self.params.iter().find(|p| p.name == def.ext.indexer);
            match indexer.map(|p| &p.kind) {
                Some(ParamKind::Idx { model }) if *model == def.ext.model => {}
                _ => {
                    return Err(ModelError::InvalidArg {
                        what: format!(
                            "{}: `{}` needs index parameter `{}` referring to {}",
                            self.name, def.name, def.ext.indexer, def.ext.model
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_no_flags(&self, owner: &str, e: &CompiledExpr) -> ModelResult<()> {
        if let Some(&slot) = e.slots_of(&self.table, SymbolClass::Flag).first() {
            return Err(ModelError::FlagInInit {
                model: self.name.clone(),
                var: owner.to_string(),
                flag: self.table.name(slot).to_string(),
            });
        }
        Ok(())
    }

    fn init_order(
        &self,
        services: &[CompiledService],
        vars: &[CompiledVar],
    ) -> ModelResult<Vec<InitStep>> {
        let mut nodes: Vec<(InitStep, &str, &CompiledExpr)> = services
            .iter()
            .enumerate()
            .map(|(i, s)| (InitStep::Service(i), s.name.as_str(), s.compiled()))
            .collect();
        let mut var_node = vec![None; vars.len()];
        for (k, v) in vars.iter().enumerate() {
            if let Some(init) = &v.init {
                var_node[k] = Some(nodes.len());
                nodes.push((InitStep::Var(k), v.name.as_str(), init));
            }
        }

        let mut edges = Vec::new();
        for (node, (_, _, e)) in nodes.iter().enumerate() {
            for slot in e.slots() {
                let from = match self.sources[slot] {
                    SlotSource::Service(j) => Some(j),
                    SlotSource::Var(k) => var_node[k],
                    _ => None,
                };
                if let Some(from) = from {
                    edges.push((from, node));
                }
            }
        }

        match evaluation_order(nodes.len(), &edges) {
            Ok(order) => Ok(order.into_iter().map(|n| nodes[n].0).collect()),
            Err(stuck) => Err(ModelError::CyclicInitialization {
                model: self.name.clone(),
                cycle: stuck.into_iter().map(|n| nodes[n].1.to_string()).collect(),
            }),
        }
    }

    /// Resolve and compile every declaration.
    ///
    /// Fails on the first undeclared name, on initial values that read
    /// discrete flags and on cyclic initialization.
    pub fn build(self) -> ModelResult<ModelDef> {
        self.check_indexers()?;
        if self.rating.is_none() && self.params.iter().any(|p| p.power) {
            return Err(ModelError::InvalidArg {
                what: format!("{}: power parameters declared without a rating", self.name),
            });
        }

        let mut services = Vec::with_capacity(self.services.len());
        for (def, slot) in &self.services {
            let expr = match &def.kind {
                ServiceKind::Const(text) => ServiceExpr::Expr(self.compile(text)?),
                ServiceKind::FlagValue { of, value } => ServiceExpr::FlagValue {
                    of: self.compile(of)?,
                    value: *value,
                },
            };
            let compiled = CompiledService {
                name: def.name.clone(),
                slot: *slot,
                refresh: def.refresh,
                expr,
            };
            self.check_no_flags(&def.name, compiled.compiled())?;
            services.push(compiled);
        }

        let mut vars = Vec::with_capacity(self.vars.len());
        for (def, slot) in &self.vars {
            let init = self.compile_opt(def.v_init.as_ref())?;
            if let Some(init) = &init {
                self.check_no_flags(&def.name, init)?;
            }
            vars.push(CompiledVar {
                name: def.name.clone(),
                kind: def.kind,
                slot: *slot,
                init,
                equation: self.compile_opt(def.e_str.as_ref())?,
            });
        }

        let mut exts = Vec::with_capacity(self.exts.len());
        for (def, slot) in &self.exts {
            exts.push(CompiledExt {
                equation: self.compile_opt(def.e_str.as_ref())?,
                def: def.clone(),
                slot: *slot,
            });
        }

        let mut discretes = Vec::with_capacity(self.discretes.len());
        for pending in &self.discretes {
            discretes.push(match pending {
                PendingDiscrete::Limiter {
                    name,
                    origin,
                    lower,
                    upper,
                    enable,
                    flags,
                } => Discrete::HardLimiter(HardLimiter {
                    name: name.clone(),
                    origin: self.compile(origin)?,
                    lower: self.compile(lower)?,
                    upper: self.compile(upper)?,
                    enable: *enable,
                    flag_slots: *flags,
                }),
                PendingDiscrete::DeadBand {
                    name,
                    origin,
                    center,
                    lower,
                    upper,
                    enable,
                    flags,
                } => Discrete::DeadBand(DeadBand {
                    name: name.clone(),
                    origin: self.compile(origin)?,
                    center: self.compile(center)?,
                    lower: self.compile(lower)?,
                    upper: self.compile(upper)?,
                    enable: *enable,
                    flag_slots: *flags,
                }),
            });
        }

        let init_order = self.init_order(&services, &vars)?;
        debug!(
            model = %self.name,
            symbols = self.table.len(),
            vars = vars.len(),
            services = services.len(),
            discretes = discretes.len(),
            "model compiled"
        );

        Ok(ModelDef {
            u_slot: 0,
            t_slot: 1,
            name: self.name,
            group: self.group,
            symbols: self.table,
            sources: self.sources,
            params: self.params,
            exts,
            services,
            vars,
            discretes,
            init_order,
            rating: self.rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RefreshPolicy;

    fn base() -> ModelBuilder {
        let mut b = ModelBuilder::new("Gov", "TurbineGov");
        b.param(ParamDef::idx("syn", "SynGen").mandatory()).unwrap();
        b.param(ParamDef::num("R").default(0.05)).unwrap();
        b
    }

    #[test]
    fn implicit_symbols_declared() {
        let def = base().build().unwrap();
        assert_eq!(def.slot("u"), Some(def.u_slot));
        assert_eq!(def.slot("dae_t"), Some(def.t_slot));
        assert_eq!(def.params[0].default, Some(1.0));
        assert_eq!(def.sources[def.t_slot], SlotSource::Time);
    }

    #[test]
    fn param_store_holds_every_declaration() {
        let def = base().build().unwrap();
        let mut store = def.param_store();
        assert_eq!(store.defs().len(), 3);
        assert!(store.is_empty());
        assert_eq!(store.def("u").and_then(|d| d.default), Some(1.0));
        assert!(store.def("syn").is_some());
        store.bind(2);
        assert_eq!(store.values("R"), Some(&[0.05, 0.05][..]));
    }

    #[test]
    fn undeclared_symbol_is_eager() {
        let mut b = base();
        let x = b.algeb(VarDef::algeb("x")).unwrap();
        b.set_equation(&x, "pmx - x").unwrap();
        let err = b.build().unwrap_err();
        assert!(err.is_undeclared_symbol());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut b = base();
        assert!(b.algeb(VarDef::algeb("R")).is_err());
    }

    #[test]
    fn init_follows_dependencies() {
        let mut b = base();
        let a = b.algeb(VarDef::algeb("a").v_init("g * 2")).unwrap();
        b.set_equation(&a, "a").unwrap();
        b.service(ServiceDef::constant("g", "1 / R")).unwrap();
        let x = b.state(VarDef::state("x").v_init("a + 1")).unwrap();
        b.set_equation(&x, "a - x").unwrap();
        let def = b.build().unwrap();
        assert_eq!(
            def.init_order,
            vec![InitStep::Service(0), InitStep::Var(0), InitStep::Var(1)]
        );
    }

    #[test]
    fn cyclic_init_names_cycle() {
        let mut b = base();
        b.algeb(VarDef::algeb("a").v_init("c")).unwrap();
        b.algeb(VarDef::algeb("c").v_init("a")).unwrap();
        match b.build().unwrap_err() {
            ModelError::CyclicInitialization { cycle, .. } => {
                assert_eq!(cycle, vec!["a".to_string(), "c".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn flag_in_init_rejected() {
        let mut b = base();
        let a = b.algeb(VarDef::algeb("a")).unwrap();
        let lim = b.hard_limiter("lim", &a, "0", "1", true).unwrap();
        b.algeb(VarDef::algeb("p").v_init(format!("{} * 2", lim.zu)))
            .unwrap();
        assert!(matches!(
            b.build(),
            Err(ModelError::FlagInInit { ref flag, .. }) if flag == "lim_zu"
        ));
    }

    #[test]
    fn equation_set_once() {
        let mut b = base();
        let a = b.algeb(VarDef::algeb("a").e_str("1 - a")).unwrap();
        assert!(b.set_equation(&a, "2 - a").is_err());
        let r = Symbol::new("R", 3);
        assert!(matches!(
            b.set_equation(&r, "a"),
            Err(ModelError::NotAVariable { .. })
        ));
    }

    #[test]
    fn ext_needs_matching_indexer() {
        let mut b = base();
        b.ext_state("omega", ExtRef::new("SynGen", "omega", "syn"))
            .unwrap();
        assert!(b.clone().build().is_ok());
        b.ext_param("Sn", ExtRef::new("Other", "Sn", "syn")).unwrap();
        assert!(matches!(b.build(), Err(ModelError::InvalidArg { .. })));
    }

    #[test]
    fn ext_param_cannot_carry_equation() {
        let mut b = base();
        let def = ExtDef::new("Sn", ExtKind::Param, ExtRef::new("SynGen", "Sn", "syn")).e_str("1");
        assert!(b.ext(def).is_err());
    }

    #[test]
    fn power_params_need_rating() {
        let mut b = base();
        b.param(ParamDef::num("pmax").power()).unwrap();
        assert!(b.clone().build().is_err());
        let sn = b.param(ParamDef::num("Sn").default(100.0)).unwrap();
        assert!(b.rating(&Symbol::new("syn", 2)).is_err());
        b.rating(&sn).unwrap();
        let def = b.build().unwrap();
        assert_eq!(def.symbols.name(def.rating.unwrap()), "Sn");
    }

    #[test]
    fn flags_named_after_block() {
        let mut b = base();
        let a = b.algeb(VarDef::algeb("a")).unwrap();
        let db = b.deadband("db", &a, "0", "-1", "1", true).unwrap();
        assert_eq!(db.zur.name(), "db_zur");
        let def = b.build().unwrap();
        assert_eq!(def.discretes.len(), 1);
        assert_eq!(
            def.sources[db.zlr.slot()],
            SlotSource::Flag { block: 0, flag: 3 }
        );
    }

    #[test]
    fn refresh_policy_kept() {
        let mut b = base();
        b.service(ServiceDef::constant("g", "1 / R").refresh(RefreshPolicy::Refresh))
            .unwrap();
        let def = b.build().unwrap();
        assert_eq!(def.services[0].refresh, RefreshPolicy::Refresh);
    }
}
