//! TG2 driving a generator stub: limiter, deadband, lead-lag and base
//! conversion behavior through the assembled system.

use df_devices::{syn_gen, tg2};
use df_model::{BlockConfig, DiscreteMemory, HeldEdge, InstanceData};
use df_sim::{
    DifferenceScheme, JacobianMode, NewtonConfig, SimOptions, audit_jacobian,
    consistent_algebraic, difference_jacobian, run_sim,
};
use df_system::{Assembly, System, SystemConfig};
use nalgebra::DVector;
use proptest::prelude::*;

fn system(config: BlockConfig, gen_data: InstanceData, gov: InstanceData) -> System {
    let mut sys = System::new(SystemConfig::default());
    sys.add_model(syn_gen().unwrap()).unwrap();
    sys.add_model(tg2(config).unwrap()).unwrap();
    sys.add_instance("SynGen", gen_data).unwrap();
    sys.add_instance("TG2", gov.with("syn", "G1")).unwrap();
    sys.setup().unwrap();
    sys
}

fn dof_of(asm: &Assembly, label: &str) -> usize {
    (0..asm.len())
        .find(|&i| asm.dof().label(i) == Some(label))
        .unwrap_or_else(|| panic!("no unknown labelled {label}"))
}

fn scalar(asm: &Assembly, model: &str, name: &str, x: &DVector<f64>) -> f64 {
    asm.probe(model, name, x, 0.0).unwrap()[0]
}

#[test]
fn limiter_clamps_output_at_pmax() {
    let mut sys = system(
        BlockConfig::all_enabled(),
        InstanceData::new("G1").with("pe", 1.2),
        InstanceData::new("TG1")
            .with("R", 0.05)
            .with("pmax", 1.0)
            .with("pmin", 0.0),
    );
    let x0 = sys.initialize().unwrap();
    let asm = sys.assemble().unwrap();
    let x = consistent_algebraic(
        &asm,
        &x0,
        0.0,
        &NewtonConfig::default(),
        JacobianMode::Analytic,
    )
    .unwrap();

    assert_eq!(scalar(&asm, "TG2", "plim_zu", &x), 1.0);
    assert_eq!(scalar(&asm, "TG2", "plim_zi", &x), 0.0);
    assert_eq!(scalar(&asm, "TG2", "plim_zl", &x), 0.0);
    let pout = dof_of(&asm, "TG2.pout[TG1]");
    assert!((x[pout] - 1.0).abs() < 1e-12);

    // exactly pmax satisfies the output equation
    let mut exact = x.clone();
    exact[pout] = 1.0;
    assert_eq!(asm.residual(&exact, 0.0).unwrap()[pout], 0.0);

    // the generator sees the clamped power
    let pm = dof_of(&asm, "SynGen.pm[G1]");
    assert!((x[pm] - 1.0).abs() < 1e-12);
}

#[test]
fn disabled_limiter_passes_through() {
    let mut sys = system(
        BlockConfig::default(),
        InstanceData::new("G1").with("pe", 1.2),
        InstanceData::new("TG1").with("pmax", 1.0),
    );
    let x0 = sys.initialize().unwrap();
    let asm = sys.assemble().unwrap();
    assert_eq!(scalar(&asm, "TG2", "plim_zi", &x0), 1.0);
    let r = asm.residual(&x0, 0.0).unwrap();
    assert!(r.iter().all(|v| v.abs() < 1e-12), "steady state: {r}");
}

/// Output of the deadband for a given `w_d`, read off the `w_dm` row.
fn deadband_output(asm: &Assembly, x: &DVector<f64>, w_d: f64) -> f64 {
    let mut x = x.clone();
    x[dof_of(asm, "TG2.w_d[TG1]")] = w_d;
    let w_dm = dof_of(asm, "TG2.w_dm[TG1]");
    x[w_dm] = 0.0;
    asm.residual(&x, 0.0).unwrap()[w_dm]
}

fn commit_at(asm: &mut Assembly, x: &DVector<f64>, w_d: f64) {
    let mut x = x.clone();
    x[dof_of(asm, "TG2.w_d[TG1]")] = w_d;
    asm.commit_step(&x, 0.0).unwrap();
}

fn held(asm: &Assembly) -> HeldEdge {
    match &asm.memory("TG2").unwrap()[0] {
        DiscreteMemory::Held(h) => h[0],
        DiscreteMemory::Stateless => panic!("deadband keeps memory"),
    }
}

fn deadband_system() -> (Assembly, DVector<f64>) {
    let mut sys = system(
        BlockConfig::all_enabled(),
        InstanceData::new("G1"),
        InstanceData::new("TG1"),
    );
    let x0 = sys.initialize().unwrap();
    let asm = sys.assemble().unwrap();
    (asm, x0)
}

#[test]
fn deadband_holds_crossed_edge() {
    let (mut asm, x0) = deadband_system();
    assert_eq!(held(&asm), HeldEdge::None);

    // never crossed: the output rests at the center
    assert_eq!(deadband_output(&asm, &x0, 0.00005), 0.0);

    // outside the band the deviation passes through
    assert!((deadband_output(&asm, &x0, 0.0003) - 0.0003).abs() < 1e-15);
    assert_eq!(held(&asm), HeldEdge::None, "trial evaluation must not commit");
    commit_at(&mut asm, &x0, 0.0003);
    assert_eq!(held(&asm), HeldEdge::Upper);

    for w in [0.00005, -0.00005, 0.00002, -0.00004, 0.00005] {
        assert!((deadband_output(&asm, &x0, w) - 1e-4).abs() < 1e-15);
        commit_at(&mut asm, &x0, w);
        assert_eq!(held(&asm), HeldEdge::Upper);
    }

    commit_at(&mut asm, &x0, -0.0002);
    assert_eq!(held(&asm), HeldEdge::Lower);
    assert!((deadband_output(&asm, &x0, 0.00003) - -1e-4).abs() < 1e-15);
}

proptest! {
    #[test]
    fn inside_band_after_upper_crossing_holds_upper(
        seq in prop::collection::vec(-1e-4..=1e-4f64, 1..20),
    ) {
        let (mut asm, x0) = deadband_system();
        commit_at(&mut asm, &x0, 0.01);
        for w in seq {
            prop_assert!((deadband_output(&asm, &x0, w) - 1e-4).abs() < 1e-15);
            commit_at(&mut asm, &x0, w);
        }
    }
}

#[test]
fn disabled_deadband_is_transparent() {
    let mut sys = system(
        BlockConfig::default(),
        InstanceData::new("G1"),
        InstanceData::new("TG1"),
    );
    let x0 = sys.initialize().unwrap();
    let mut asm = sys.assemble().unwrap();
    commit_at(&mut asm, &x0, 0.01);
    assert_eq!(held(&asm), HeldEdge::None);
    for w in [0.00005, -0.00005, 0.01] {
        assert!((deadband_output(&asm, &x0, w) - w).abs() < 1e-15);
    }
}

#[test]
fn zero_lag_time_constant_passes_input() {
    let mut sys = system(
        BlockConfig::default(),
        InstanceData::new("G1"),
        InstanceData::new("TG1").with("T2", 0.0),
    );
    let x0 = sys.initialize().unwrap();
    let asm = sys.assemble().unwrap();

    let mut x = x0.clone();
    x[dof_of(&asm, "TG2.w_dmg[TG1]")] = 0.3;
    x[dof_of(&asm, "TG2.leadlag_x[TG1]")] = -0.7;
    let y = dof_of(&asm, "TG2.leadlag_y[TG1]");
    x[y] = 0.3;
    let r = asm.residual(&x, 0.0).unwrap();
    assert!(r.iter().all(|v| v.is_finite()));
    assert_eq!(r[y], 0.0);
    assert_eq!(r[dof_of(&asm, "TG2.leadlag_x[TG1]")], 0.0);
    assert_eq!(scalar(&asm, "TG2", "leadlag_nz", &x), 0.0);
}

#[test]
fn analytic_jacobian_matches_differences() {
    let (asm, x0) = deadband_system();
    let mut x = x0.clone();
    // away from every switching boundary
    x[dof_of(&asm, "SynGen.omega[G1]")] = 0.998;
    x[dof_of(&asm, "TG2.w_d[TG1]")] = 0.001;
    x[dof_of(&asm, "TG2.w_dm[TG1]")] = 0.0008;
    x[dof_of(&asm, "TG2.pnl[TG1]")] = 0.6;
    x[dof_of(&asm, "TG2.leadlag_x[TG1]")] = 0.02;

    assert_eq!(audit_jacobian(&asm, &x, 0.0, 1e-6, 1e-6).unwrap(), None);

    // the sparse pattern covers every nonzero of the difference Jacobian
    let jac = asm.jacobian(&x, 0.0).unwrap();
    let numeric = difference_jacobian(
        &x,
        |z| Ok(asm.residual(z, 0.0)?),
        1e-6,
        DifferenceScheme::Central,
    )
    .unwrap();
    let pattern = jac.pattern();
    for row in 0..numeric.nrows() {
        for col in 0..numeric.ncols() {
            if numeric[(row, col)].abs() > 1e-9 {
                assert!(pattern.contains(&(row, col)), "missing ({row}, {col})");
            }
        }
    }
}

#[test]
fn power_limits_follow_generator_rating() {
    let mut sys = system(
        BlockConfig::default(),
        InstanceData::new("G1").with("Sn", 200.0),
        InstanceData::new("TG1").with("pmax", 1.0).with("pmin", 0.1),
    );
    sys.initialize().unwrap();
    assert!((sys.values("TG2", "pmax").unwrap()[0] - 2.0).abs() < 1e-12);
    assert!((sys.values("TG2", "pmin").unwrap()[0] - 0.2).abs() < 1e-12);
    assert_eq!(sys.values("TG2", "Sn").unwrap(), vec![200.0]);
    // the regulation gain is not a power quantity
    assert_eq!(sys.values("TG2", "R").unwrap(), vec![0.05]);
}

#[test]
fn instances_load_from_json() {
    let gov: InstanceData =
        serde_json::from_str(r#"{"idx": "TG1", "params": {"R": 0.04, "T2": 5.0}}"#).unwrap();
    let mut sys = system(BlockConfig::default(), InstanceData::new("G1"), gov);
    sys.initialize().unwrap();
    assert_eq!(sys.values("TG2", "R").unwrap(), vec![0.04]);
    assert!((sys.values("TG2", "gain").unwrap()[0] - 25.0).abs() < 1e-12);
    assert_eq!(sys.values("TG2", "T2").unwrap(), vec![5.0]);
    assert_eq!(sys.idx("TG2").unwrap(), &["TG1".to_string()]);
}

#[test]
fn under_speed_raises_mechanical_power() {
    let mut sys = system(
        BlockConfig::default(),
        InstanceData::new("G1").with("pe", 0.5),
        InstanceData::new("TG1").with("T2", 0.5).with("T1", 0.1),
    );
    let mut x0 = sys.initialize().unwrap();
    let mut asm = sys.assemble().unwrap();
    let omega = dof_of(&asm, "SynGen.omega[G1]");
    x0[omega] = 0.99;

    let opts = SimOptions {
        dt: 0.01,
        t_end: 2.0,
        ..SimOptions::default()
    };
    let record = run_sim(&mut asm, x0, &opts).unwrap();
    let first = &record.x[0];
    let pm = dof_of(&asm, "SynGen.pm[G1]");
    // 0.01 under speed through 1 / R and the lead fraction T1 / T2
    assert!((first[pm] - 0.54).abs() < 1e-9, "pm = {}", first[pm]);

    let (_, last) = record.last().unwrap();
    assert!((last[omega] - 1.0).abs() < 3e-3, "omega = {}", last[omega]);
}

#[test]
fn lead_fraction_service() {
    let mut sys = System::new(SystemConfig::default());
    sys.add_model(syn_gen().unwrap()).unwrap();
    sys.add_model(tg2(BlockConfig::default()).unwrap()).unwrap();
    sys.add_instance("SynGen", InstanceData::new("G1")).unwrap();
    sys.add_instance("SynGen", InstanceData::new("G2")).unwrap();
    sys.add_instance("TG2", InstanceData::new("TG1").with("syn", "G1"))
        .unwrap();
    sys.add_instance(
        "TG2",
        InstanceData::new("TG9")
            .with("syn", "G2")
            .with("T1", 0.3)
            .with("T2", 0.0),
    )
    .unwrap();
    sys.setup().unwrap();
    sys.initialize().unwrap();

    let t12 = sys.values("TG2", "T12").unwrap();
    assert!((t12[0] - 0.02).abs() < 1e-15);
    // zero T2 falls back to a unit denominator
    assert!((t12[1] - 0.3).abs() < 1e-15);
}
