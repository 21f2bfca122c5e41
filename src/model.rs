//! Forward simulator for lateral methane transport in the mixed layer of a lake.
//!
//! The radial transport-reaction equation is discretised with a fully implicit finite-difference
//! scheme and stepped in time until the profile stops changing or the time budget runs out.
use crate::errors::BasinError;
use crate::lake::{non_negative, positive, Lake, Sources, PER_LITRE};
use crate::poly::Polynomial;
use crate::tridiag::{Factored, Tridiagonal};
use crate::utils;
use log::Level;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mean absolute change between steps below which the profile counts as steady.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Degree of the polynomial used to query the profile off-grid.
pub const FIT_DEGREE: usize = 10;

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_level() -> Level {
    Level::Info
}

/// Solver controls: grid step `dr` (m), time step `dt` (d), time budget `t_end` (d) and the
/// steady-state tolerance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Solver {
    dr: f64,
    dt: f64,
    t_end: f64,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
    #[serde(skip, default = "default_level")]
    level: Level,
}

impl Solver {
    /// Create solver controls using a builder pattern.  Defaults are `dr = 10 m`, `dt = 0.1 d`,
    /// `t_end = 50 d`.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let solver = Solver::new().dr(5.0)?.dt(0.05)?.t_end(100.0)?;
    /// assert_eq!(solver.max_steps(), 2000);
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn new() -> Self {
        Solver {
            dr: 10.0,
            dt: 0.1,
            t_end: 50.0,
            tolerance: DEFAULT_TOLERANCE,
            level: Level::Info,
        }
    }

    /// Assign the radial grid step in m.
    pub fn dr(mut self, val: f64) -> Result<Self, BasinError> {
        self.dr = positive("dr", val)?;
        Ok(self)
    }

    /// Assign the time step in days.
    pub fn dt(mut self, val: f64) -> Result<Self, BasinError> {
        self.dt = positive("dt", val)?;
        Ok(self)
    }

    /// Assign the simulated time budget in days.
    pub fn t_end(mut self, val: f64) -> Result<Self, BasinError> {
        self.t_end = positive("t_end", val)?;
        Ok(self)
    }

    /// Assign the steady-state tolerance on the mean absolute change per step.
    ///
    /// The tolerance is an absolute change per time step, so with a loose tolerance the point
    /// where a run stops, and the profile it returns, shift with `dt`.  Profiles agree across
    /// time steps only once the tolerance is tight enough that the run sits at steady state.
    pub fn tolerance(mut self, val: f64) -> Result<Self, BasinError> {
        self.tolerance = non_negative("tolerance", val)?;
        Ok(self)
    }

    /// Assign the log level of the run summary.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Grid step as requested, before snapping.
    pub fn get_dr(&self) -> f64 {
        self.dr
    }

    /// Time step in days.
    pub fn get_dt(&self) -> f64 {
        self.dt
    }

    /// Time budget in days.
    pub fn get_t_end(&self) -> f64 {
        self.t_end
    }

    /// Steady-state tolerance.
    pub fn get_tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of time steps that fit in the time budget.
    pub fn max_steps(&self) -> usize {
        ((self.t_end / self.dt).round() as usize).max(1)
    }

    /// Check the controls together, as the setters only check their own field and deserialized
    /// values skip the builder.
    pub fn validate(&self) -> Result<(), BasinError> {
        positive("dr", self.dr)?;
        positive("dt", self.dt)?;
        positive("t_end", self.t_end)?;
        non_negative("tolerance", self.tolerance)?;
        if self.t_end < self.dt {
            return Err(BasinError::Config(format!(
                "t_end ({}) is shorter than one time step ({})",
                self.t_end, self.dt
            )));
        }
        Ok(())
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

/// Uniform radial grid from the basin centre to the shore.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Node radii, `radius[0] = 0` and the last node on the shore.
    pub radius: Vec<f64>,
    /// Step actually used, snapped so the last node lands on the shore.
    pub dr: f64,
}

impl Grid {
    /// Grid over `[0, radius]` with a step no larger than `dr`, and at least one interior node.
    ///
    /// # Examples
    /// ```
    /// use basins::model::Grid;
    /// let grid = Grid::new(500.0, 10.0)?;
    /// assert_eq!(grid.len(), 51);
    /// assert_eq!(grid.radius[50], 500.0);
    /// # Ok::<(), basins::prelude::BasinError>(())
    /// ```
    pub fn new(radius: f64, dr: f64) -> Result<Self, BasinError> {
        if !(radius.is_finite() && radius > 0.0 && dr.is_finite() && dr > 0.0) {
            return Err(BasinError::Config(format!(
                "grid needs positive radius and step, got {} and {}",
                radius, dr
            )));
        }
        let n = ((radius / dr) - 1e-9).ceil().max(2.0) as usize;
        let step = radius / n as f64;
        if (step - dr).abs() > 1e-9 * dr {
            log::debug!("Grid step snapped from {} m to {} m", dr, step);
        }
        let mut nodes: Vec<f64> = (0..=n).map(|i| i as f64 * step).collect();
        nodes[n] = radius;
        Ok(Grid {
            radius: nodes,
            dr: step,
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.radius.len()
    }

    /// True for a grid without nodes.
    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }
}

/// Which criterion ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Termination {
    /// Mean change per step fell below the tolerance.
    Converged {
        /// Simulated days at termination.
        days: f64,
    },
    /// Time budget exhausted first.
    TimeLimit {
        /// Simulated days at termination.
        days: f64,
    },
}

impl Termination {
    /// Simulated days when the run ended.
    pub fn days(&self) -> f64 {
        match self {
            Termination::Converged { days } | Termination::TimeLimit { days } => *days,
        }
    }

    /// True if the run reached steady state.
    pub fn converged(&self) -> bool {
        matches!(self, Termination::Converged { .. })
    }
}

/// Steady-state result of a forward run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    /// Node radii from the basin centre (m).
    pub radius: Vec<f64>,
    /// Node distance from the shore, `R - r` (m).
    pub distance: Vec<f64>,
    /// Concentration at each node (µmol/l).
    pub concentration: Vec<f64>,
    /// Mean net areal emission, `mean(Kch4·(C - Hcp·Patm))`.
    pub flux: f64,
    /// Criterion that ended the run.
    pub termination: Termination,
    /// Time steps taken.
    pub steps: usize,
}

/// One node of a profile, for csv output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileRow {
    /// Radius from the basin centre (m).
    pub radius: f64,
    /// Distance from the shore (m).
    pub distance: f64,
    /// Concentration (µmol/l).
    pub concentration: f64,
}

impl Profile {
    /// Mean concentration over the grid.
    pub fn mean(&self) -> f64 {
        utils::mean(&self.concentration)
    }

    /// Flatten into rows for [`utils::record`](../utils/fn.record.html).
    pub fn rows(&self) -> Vec<ProfileRow> {
        self.radius
            .iter()
            .zip(&self.distance)
            .zip(&self.concentration)
            .map(|((&radius, &distance), &concentration)| ProfileRow {
                radius,
                distance,
                concentration,
            })
            .collect()
    }
}

/// Cooperative cancellation flag, checked before every time step.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    /// Fresh token, not cancelled.
    pub fn new() -> Self {
        Cancel::default()
    }

    /// Request that runs holding this token stop at the next step boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](#method.cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Struct holding everything a forward run needs.
#[derive(Debug, Clone)]
pub struct Transport {
    lake: Lake,
    sources: Sources,
    solver: Solver,
    cancel: Option<Cancel>,
}

/// Time stepper owning the concentration state of one run.
///
/// The matrix is factored once when the stepper is built; each [`step`](#method.step) only
/// solves against it and swaps the current/next buffers.
#[derive(Debug, Clone)]
pub struct Stepper {
    factored: Factored,
    sources: Vec<f64>,
    current: Vec<f64>,
    next: Vec<f64>,
    rhs: Vec<f64>,
    dt: f64,
    steps: usize,
}

impl Stepper {
    /// Advance one implicit step, mirror both boundary nodes onto their interior neighbours and
    /// return the mean absolute change over the interior nodes.
    pub fn step(&mut self) -> f64 {
        let n = self.current.len();
        for i in 0..n {
            self.rhs[i] = self.current[i] + self.sources[i];
        }
        self.factored.solve_into(&self.rhs, &mut self.next);
        self.next[0] = self.next[1];
        self.next[n - 1] = self.next[n - 2];
        let change = (1..n - 1)
            .map(|i| (self.next[i] - self.current[i]).abs())
            .sum::<f64>()
            / (n - 2) as f64;
        std::mem::swap(&mut self.current, &mut self.next);
        self.steps += 1;
        change
    }

    /// Concentration after the latest step.
    pub fn state(&self) -> &[f64] {
        &self.current
    }

    /// Time steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Simulated days so far.
    pub fn days(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    fn into_state(self) -> Vec<f64> {
        self.current
    }
}

impl Transport {
    /// Create forward runs using a builder pattern.  Calling new() uses the default [`Lake`],
    /// no sources and the default [`Solver`].
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let run = Transport::new()
    ///     .lake(Lake::new().kch4(0.5)?)
    ///     .sources(Sources::new().sediment(2.0))
    ///     .solver(Solver::new().t_end(200.0)?);
    /// let profile = run.simulate()?;
    /// assert!(profile.flux > 0.0);
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn new() -> Self {
        Transport {
            lake: Lake::new(),
            sources: Sources::new(),
            solver: Solver::new(),
            cancel: None,
        }
    }

    /// Assign the lake.
    pub fn lake(mut self, lake: Lake) -> Self {
        self.lake = lake;
        self
    }

    /// Assign the sources.
    pub fn sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }

    /// Assign the solver controls.
    pub fn solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Attach a cancellation token.
    pub fn cancel(mut self, token: Cancel) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Lake of this run.
    pub fn get_lake(&self) -> &Lake {
        &self.lake
    }

    /// Sources of this run.
    pub fn get_sources(&self) -> &Sources {
        &self.sources
    }

    /// Solver controls of this run.
    pub fn get_solver(&self) -> &Solver {
        &self.solver
    }

    /// Radial grid for this run.
    pub fn grid(&self) -> Result<Grid, BasinError> {
        Grid::new(self.lake.get_radius(), self.solver.dr)
    }

    /// Implicit system matrix.  Interior rows carry the transport-reaction stencil with the
    /// zero-gradient condition folded into the first and last interior rows; the two boundary rows
    /// are decoupled identity rows, overwritten by mirroring after each solve.
    pub fn system(&self, grid: &Grid) -> Tridiagonal {
        let n = grid.len();
        let dt = self.solver.dt;
        let dr = grid.dr;
        let kh = self.lake.get_kh();
        let kch4 = self.lake.get_kch4();
        let diffusion = kh * dt / (dr * dr);
        let advection = kh * dt / (2.0 * dr);
        let mut sys = Tridiagonal::identity(n);
        for i in 1..n - 1 {
            let r = grid.radius[i];
            let h = self.lake.depth(r);
            let g = self.lake.divergence(r);
            sys.lower[i] = -diffusion + advection * g;
            sys.diag[i] = 1.0 + 2.0 * diffusion + (kch4 + self.lake.exchange(r)) * dt / h;
            sys.upper[i] = -diffusion - advection * g;
        }
        // C[0] = C[1] and C[n-1] = C[n-2] at the new time level
        sys.diag[1] += sys.lower[1];
        sys.lower[1] = 0.0;
        sys.diag[n - 2] += sys.upper[n - 2];
        sys.upper[n - 2] = 0.0;
        sys
    }

    /// Additive source per node and time step.
    ///
    /// Sediment input acts beyond the inner radius and hypolimnetic input inside it; both, like
    /// the atmospheric exchange, are switched off on the shore node where the depth vanishes.
    /// Production and dissolution are switched off at the centre.
    pub fn source_terms(&self, grid: &Grid) -> Vec<f64> {
        let n = grid.len();
        let dt = self.solver.dt;
        let lake = &self.lake;
        let src = &self.sources;
        let ceq = lake.equilibrium();
        grid.radius
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let mut s = 0.0;
                if i < n - 1 {
                    let h = lake.depth(r);
                    if lake.is_inner(r) {
                        s += (lake.exchange(r) * lake.get_c_hyp() + src.hypolimnion) * dt / h;
                    } else {
                        s += src.sediment * dt / h;
                    }
                    s += lake.get_kch4() * ceq * dt / h;
                }
                if i > 0 {
                    s += src.production * PER_LITRE * dt;
                    if let Some(diss) = &src.dissolution {
                        s += diss.rate(r) * PER_LITRE * dt;
                    }
                }
                s
            })
            .collect()
    }

    /// Assemble and factor the system, starting from atmospheric equilibrium everywhere.
    pub fn stepper(&self) -> Result<Stepper, BasinError> {
        self.lake.validate()?;
        self.solver.validate()?;
        let grid = self.grid()?;
        let n = grid.len();
        let factored = self.system(&grid).factor()?;
        let mut sources = self.source_terms(&grid);
        // boundary rows are decoupled and overwritten after each solve
        sources[0] = 0.0;
        sources[n - 1] = 0.0;
        let initial = vec![self.lake.equilibrium(); n];
        Ok(Stepper {
            factored,
            sources,
            next: initial.clone(),
            rhs: initial.clone(),
            current: initial,
            dt: self.solver.dt,
            steps: 0,
        })
    }

    fn run(&self, level: Level) -> Result<(Grid, Vec<f64>, Termination, usize), BasinError> {
        let grid = self.grid()?;
        let mut stepper = self.stepper()?;
        let max_steps = self.solver.max_steps();
        let termination = loop {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    return Err(BasinError::Cancelled {
                        step: stepper.steps(),
                    });
                }
            }
            let change = stepper.step();
            if stepper.steps() >= max_steps {
                break Termination::TimeLimit {
                    days: stepper.days(),
                };
            }
            if change < self.solver.tolerance {
                break Termination::Converged {
                    days: stepper.days(),
                };
            }
        };
        let steps = stepper.steps();
        let conc = stepper.into_state();
        log::log!(level, "Mean model concentration {:.2}", utils::mean(&conc));
        match termination {
            Termination::Converged { days } => {
                log::log!(level, "Model finished after {:.0} days", days)
            }
            Termination::TimeLimit { days } => {
                log::log!(level, "Model finished at maximum days ({:.0})", days)
            }
        }
        Ok((grid, conc, termination, steps))
    }

    /// Run to steady state and return the profile with its mean areal flux.
    pub fn simulate(&self) -> Result<Profile, BasinError> {
        let (grid, conc, termination, steps) = self.run(self.solver.level)?;
        let kch4 = self.lake.get_kch4();
        let ceq = self.lake.equilibrium();
        let areal: Vec<f64> = conc.iter().map(|c| kch4 * (c - ceq)).collect();
        let radius_max = self.lake.get_radius();
        Ok(Profile {
            distance: grid.radius.iter().map(|r| radius_max - r).collect(),
            radius: grid.radius,
            concentration: conc,
            flux: utils::mean(&areal),
            termination,
            steps,
        })
    }

    /// Fit-evaluation mode: run to steady state, refit the profile against distance from the
    /// shore with a degree 10 polynomial and evaluate it at `distances`.
    pub fn evaluate(&self, distances: &[f64]) -> Result<Vec<f64>, BasinError> {
        let (grid, conc, _, _) = self.run(Level::Debug)?;
        let radius_max = self.lake.get_radius();
        let distance: Vec<f64> = grid.radius.iter().map(|r| radius_max - r).collect();
        let degree = FIT_DEGREE.min(grid.len() - 1);
        let poly = Polynomial::fit(&distance, &conc, degree)?;
        Ok(distances.iter().map(|x| poly.eval(*x)).collect())
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new()
    }
}

/// Simulate independent runs in parallel.
pub fn simulate_all(runs: &[Transport]) -> Vec<Result<Profile, BasinError>> {
    runs.par_iter().map(|x| x.simulate()).collect()
}
