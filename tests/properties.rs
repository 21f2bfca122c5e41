//! Property-based tests for the forward simulator and its numerical kernels.
//!
//! Covers: Thomas solver, boundary mirroring, the equilibrium fixed point, flux identity and the
//! clipping of observations.

use basins::lake::PER_LITRE;
use basins::poly::Polynomial;
use basins::prelude::*;
use basins::tridiag::Tridiagonal;
use proptest::prelude::*;

fn lake(kh: f64, kch4: f64, kind: LakeKind) -> Lake {
    Lake::new().kh(kh).unwrap().kch4(kch4).unwrap().kind(kind)
}

fn kind() -> impl Strategy<Value = LakeKind> {
    prop_oneof![Just(LakeKind::Round), Just(LakeKind::Elongated)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// For any diagonally dominant system, the factored solve satisfies Ax = d.
    #[test]
    fn thomas_solve_ax_eq_d(n in 3usize..40, off in 0.0f64..0.45) {
        let sys = Tridiagonal {
            lower: (0..n).map(|i| if i > 0 { -off } else { 0.0 }).collect(),
            diag: vec![1.0; n],
            upper: (0..n).map(|i| if i < n - 1 { -off } else { 0.0 }).collect(),
        };
        let d: Vec<f64> = (0..n).map(|i| (i as f64 + 1.0).sin()).collect();
        let x = sys.factor().unwrap().solve(&d);
        for (ax, di) in sys.mul(&x).iter().zip(&d) {
            prop_assert!((ax - di).abs() < 1e-10);
        }
    }

    /// Boundary nodes mirror their interior neighbours after every step.
    #[test]
    fn boundaries_mirror(
        kh in 10.0f64..5000.0,
        kch4 in 0.0f64..2.0,
        fsed in 0.0f64..5.0,
        omp in -50.0f64..200.0,
        kind in kind(),
    ) {
        let run = Transport::new()
            .lake(lake(kh, kch4, kind))
            .sources(Sources::new().sediment(fsed).production(omp));
        let mut stepper = run.stepper().unwrap();
        for _ in 0..25 {
            stepper.step();
            let c = stepper.state();
            let n = c.len();
            prop_assert_eq!(c[0], c[1]);
            prop_assert_eq!(c[n - 1], c[n - 2]);
        }
    }

    /// Without sources or reaction the atmospheric equilibrium never moves.
    #[test]
    fn equilibrium_is_fixed_point(kh in 1.0f64..5000.0, kind in kind(), dr in 2.0f64..60.0) {
        let run = Transport::new()
            .lake(lake(kh, 0.0, kind))
            .solver(Solver::new().dr(dr).unwrap());
        let profile = run.simulate().unwrap();
        prop_assert!(profile.termination.converged());
        for c in &profile.concentration {
            prop_assert!((c - 0.1).abs() < 1e-12);
        }
        prop_assert!(profile.flux.abs() < 1e-12);
    }

    /// Reported flux is exactly the mean areal exchange of the returned profile.
    #[test]
    fn flux_identity(kch4 in 0.01f64..2.0, fsed in 0.0f64..5.0, kind in kind()) {
        let run = Transport::new()
            .lake(lake(1000.0, kch4, kind))
            .sources(Sources::new().sediment(fsed));
        let profile = run.simulate().unwrap();
        let ceq = run.get_lake().equilibrium();
        let areal: Vec<f64> = profile.concentration.iter().map(|c| kch4 * (c - ceq)).collect();
        prop_assert_eq!(profile.flux, utils::mean(&areal));
    }

    /// Observations past the basin radius land on the edge, nothing is dropped.
    #[test]
    fn clipping_keeps_every_station(d in proptest::collection::vec(0.0f64..900.0, 1..30)) {
        let conc = vec![0.2; d.len()];
        let obs = Transect::new(d.clone(), conc).unwrap().clipped(500.0);
        prop_assert_eq!(obs.len(), d.len());
        for (a, b) in obs.distance().iter().zip(&d) {
            prop_assert!(*a <= 500.0);
            prop_assert_eq!(*a, b.min(500.0));
        }
    }
}

#[test]
fn production_raises_uniform_lake_above_equilibrium() {
    // no taper and no reaction: production accumulates linearly in time
    let lake = Lake::new()
        .inner_radius(500.0)
        .unwrap()
        .kch4(0.0)
        .unwrap();
    let run = Transport::new()
        .lake(lake)
        .sources(Sources::new().production(100.0))
        .solver(Solver::new().t_end(10.0).unwrap());
    let profile = run.simulate().unwrap();
    assert!(!profile.termination.converged());
    let expected = 0.1 + 100.0 * PER_LITRE * 10.0;
    for c in &profile.concentration {
        assert!((c - expected).abs() < 1e-9, "{} vs {}", c, expected);
    }
}

#[test]
fn fit_mode_matches_grid_points() {
    let run = Transport::new()
        .lake(Lake::new().kh(5000.0).unwrap().kch4(0.5).unwrap())
        .sources(Sources::new().sediment(1.0));
    let profile = run.simulate().unwrap();
    let poly = Polynomial::fit(&profile.distance, &profile.concentration, 10).unwrap();
    let fitted = run.evaluate(&profile.distance).unwrap();
    for (x, f) in profile.distance.iter().zip(&fitted) {
        assert!((poly.eval(*x) - f).abs() < 1e-12);
    }
    let mid = profile.concentration.len() / 2;
    let at_node = run.evaluate(&[profile.distance[mid]]).unwrap()[0];
    assert!((at_node - profile.concentration[mid]).abs() < 0.02 * profile.concentration[mid]);
}

#[test]
fn calibration_failure_is_not_simulator_failure() {
    let run = Transport::new().sources(Sources::new().sediment(1.0));
    let obs = Transect::new(vec![0.0, 100.0, 200.0], vec![0.3, 0.2, 0.1]).unwrap();
    let cal = Calibrator::new(run, obs, FitVariable::Sediment)
        .options(FitOptions::new().max_iter(0));
    let err = cal.calibrate().unwrap_err();
    assert!(err.is_fit_failure());
    assert_eq!(err, BasinError::FitDiverged { iterations: 0 });
}
