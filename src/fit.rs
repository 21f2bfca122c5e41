//! Calibration of one unknown parameter of the forward model against an observed transect.
//!
//! The fit is a single-parameter Levenberg-Marquardt on the squared residuals between the
//! fit-evaluation output of [`Transport`] and the observations.  Bounds are enforced by projecting
//! each trial step back into the feasible interval.
use crate::errors::BasinError;
use crate::model::{Profile, Transport};
use crate::transect::Transect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parameter left free during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FitVariable {
    /// Sediment flux `Fsed`, bounded below by zero.
    Sediment,
    /// Organic-matter production `OMP`, unbounded so net consumption can be fitted.
    Production,
    /// Horizontal diffusivity `Kh`, within a tenfold window of the baseline.
    Diffusivity,
    /// Reaction rate `Kch4`, bounded below by zero.
    Reaction,
}

impl FitVariable {
    /// Label of the fitted value in result tables.
    pub fn name(&self) -> &'static str {
        match self {
            FitVariable::Sediment => "Fsed_opt",
            FitVariable::Production => "OMP_opt",
            FitVariable::Diffusivity => "kh_opt",
            FitVariable::Reaction => "kch4_opt",
        }
    }

    /// Current value of the parameter in `run`.
    pub fn baseline(&self, run: &Transport) -> f64 {
        match self {
            FitVariable::Sediment => run.get_sources().sediment,
            FitVariable::Production => run.get_sources().production,
            FitVariable::Diffusivity => run.get_lake().get_kh(),
            FitVariable::Reaction => run.get_lake().get_kch4(),
        }
    }

    /// Feasible interval for the parameter given its baseline.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// assert_eq!(FitVariable::Diffusivity.bounds(1000.0)?, (100.0, 10000.0));
    /// assert_eq!(FitVariable::Sediment.bounds(3.0)?, (0.0, f64::INFINITY));
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn bounds(&self, baseline: f64) -> Result<(f64, f64), BasinError> {
        match self {
            FitVariable::Sediment | FitVariable::Reaction => Ok((0.0, f64::INFINITY)),
            FitVariable::Production => Ok((f64::NEG_INFINITY, f64::INFINITY)),
            FitVariable::Diffusivity => {
                if baseline.is_finite() && baseline > 0.0 {
                    Ok((baseline / 10.0, baseline * 10.0))
                } else {
                    Err(BasinError::Config(format!(
                        "diffusivity fit needs a positive baseline, got {}",
                        baseline
                    )))
                }
            }
        }
    }

    /// Copy of `run` with the parameter set to `value`.
    pub fn apply(&self, run: &Transport, value: f64) -> Result<Transport, BasinError> {
        let sources = run.get_sources().clone();
        let lake = run.get_lake().clone();
        let out = match self {
            FitVariable::Sediment => run.clone().sources(sources.sediment(value)),
            FitVariable::Production => run.clone().sources(sources.production(value)),
            FitVariable::Diffusivity => run.clone().lake(lake.kh(value)?),
            FitVariable::Reaction => run.clone().lake(lake.kch4(value)?),
        };
        Ok(out)
    }
}

impl fmt::Display for FitVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self {
            FitVariable::Sediment => "FSED",
            FitVariable::Production => "OMP",
            FitVariable::Diffusivity => "KH",
            FitVariable::Reaction => "KCH4",
        };
        write!(f, "{}", tag)
    }
}

impl FromStr for FitVariable {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FSED" => Ok(FitVariable::Sediment),
            "OMP" => Ok(FitVariable::Production),
            "KH" => Ok(FitVariable::Diffusivity),
            "KCH4" => Ok(FitVariable::Reaction),
            other => Err(BasinError::Config(format!("unknown fit variable {}", other))),
        }
    }
}

/// Controls for the least-squares fit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FitOptions {
    max_iter: usize,
    xtol: f64,
    ftol: f64,
    step: f64,
}

impl FitOptions {
    /// Defaults: 50 iterations, relative parameter and cost tolerances of 1e-8 and 1e-10, and a
    /// relative finite-difference step of 1e-6.
    pub fn new() -> Self {
        FitOptions {
            max_iter: 50,
            xtol: 1e-8,
            ftol: 1e-10,
            step: 1e-6,
        }
    }

    /// Cap on Levenberg-Marquardt iterations.
    pub fn max_iter(mut self, val: usize) -> Self {
        self.max_iter = val;
        self
    }

    /// Relative tolerance on the parameter step.
    pub fn xtol(mut self, val: f64) -> Self {
        self.xtol = val;
        self
    }

    /// Relative tolerance on the decrease of the cost.
    pub fn ftol(mut self, val: f64) -> Self {
        self.ftol = val;
        self
    }

    /// Relative step of the forward-difference derivative.
    pub fn step(mut self, val: f64) -> Self {
        self.step = val;
        self
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions::new()
    }
}

/// Least-squares estimate of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Fitted parameter value.
    pub value: f64,
    /// `s²/(JᵀJ)` with `s² = SSR/(m - 1)`; infinite when the data cannot constrain the value.
    pub variance: f64,
    /// Half the sum of squared residuals at `value`.
    pub cost: f64,
    /// Iterations used.
    pub iterations: usize,
}

fn residuals(pred: &[f64], obs: &[f64]) -> Result<Vec<f64>, BasinError> {
    let res: Vec<f64> = pred.iter().zip(obs).map(|(p, o)| p - o).collect();
    if res.iter().all(|x| x.is_finite()) {
        Ok(res)
    } else {
        Err(BasinError::FitNonFinite)
    }
}

fn cost(res: &[f64]) -> f64 {
    0.5 * res.iter().map(|x| x * x).sum::<f64>()
}

// forward difference, stepping inward at an upper bound
fn jacobian<F>(
    model: &F,
    p: f64,
    pred: &[f64],
    hi: f64,
    step: f64,
) -> Result<Vec<f64>, BasinError>
where
    F: Fn(f64) -> Result<Vec<f64>, BasinError>,
{
    let mut h = step * p.abs().max(1.0);
    if p + h > hi {
        h = -h;
    }
    let shifted = model(p + h)?;
    let jac: Vec<f64> = shifted
        .iter()
        .zip(pred)
        .map(|(a, b)| (a - b) / h)
        .collect();
    if jac.iter().all(|x| x.is_finite()) {
        Ok(jac)
    } else {
        Err(BasinError::FitNonFinite)
    }
}

/// Fit the single parameter of `model` to `obs` within `bounds`, starting from `p0`.
///
/// `model` maps a parameter value to predictions at the observation points.  Errors raised by the
/// model propagate unchanged; a fit that does not settle within `max_iter` iterations returns
/// [`BasinError::FitDiverged`] and non-finite predictions return [`BasinError::FitNonFinite`].
///
/// # Examples
/// ```
/// use basins::fit::{levenberg_marquardt, FitOptions};
/// use basins::prelude::BasinError;
/// let x = vec![1.0, 2.0, 3.0, 4.0];
/// let obs: Vec<f64> = x.iter().map(|v| 2.5 * v).collect();
/// let model = |p: f64| -> Result<Vec<f64>, BasinError> { Ok(x.iter().map(|v| p * v).collect()) };
/// let est = levenberg_marquardt(model, &obs, 1.0, (0.0, f64::INFINITY), &FitOptions::new())?;
/// assert!((est.value - 2.5).abs() < 1e-6);
/// # Ok::<(), BasinError>(())
/// ```
pub fn levenberg_marquardt<F>(
    model: F,
    obs: &[f64],
    p0: f64,
    bounds: (f64, f64),
    opts: &FitOptions,
) -> Result<Estimate, BasinError>
where
    F: Fn(f64) -> Result<Vec<f64>, BasinError>,
{
    let (lo, hi) = bounds;
    if !(lo < hi) {
        return Err(BasinError::Config(format!(
            "fit bounds must be increasing, got ({}, {})",
            lo, hi
        )));
    }
    let mut p = p0.max(lo).min(hi);
    if !p.is_finite() {
        return Err(BasinError::FitNonFinite);
    }
    let mut pred = model(p)?;
    let mut res = residuals(&pred, obs)?;
    let mut current = cost(&res);
    let mut lambda = 1e-3;
    let mut iterations = 0;
    let mut done = current == 0.0;

    while !done {
        if iterations == opts.max_iter {
            log::warn!("Fit stopped after {} iterations at {}", iterations, p);
            return Err(BasinError::FitDiverged { iterations });
        }
        iterations += 1;
        let jac = jacobian(&model, p, &pred, hi, opts.step)?;
        let jtj = jac.iter().map(|x| x * x).sum::<f64>();
        let grad = jac.iter().zip(&res).map(|(j, r)| j * r).sum::<f64>();
        if jtj == 0.0 || grad == 0.0 {
            break;
        }
        loop {
            let trial = (p - grad / (jtj * (1.0 + lambda))).max(lo).min(hi);
            if !trial.is_finite() {
                return Err(BasinError::FitNonFinite);
            }
            // a vanishing step means we sit on the minimum or against a bound
            if trial == p || (trial - p).abs() <= opts.xtol * (p.abs() + opts.xtol) {
                done = true;
                break;
            }
            let trial_pred = model(trial)?;
            let trial_res = residuals(&trial_pred, obs)?;
            let trial_cost = cost(&trial_res);
            if trial_cost < current {
                let dp = (trial - p).abs();
                let df = current - trial_cost;
                done = dp <= opts.xtol * (p.abs() + opts.xtol) || df <= opts.ftol * current;
                p = trial;
                pred = trial_pred;
                res = trial_res;
                current = trial_cost;
                lambda = (lambda / 10.0).max(1e-12);
                break;
            }
            lambda *= 10.0;
            if lambda > 1e10 {
                done = true;
                break;
            }
        }
        log::debug!("Iteration {}: value {} cost {}", iterations, p, current);
    }

    let jac = jacobian(&model, p, &pred, hi, opts.step)?;
    let jtj = jac.iter().map(|x| x * x).sum::<f64>();
    let m = obs.len();
    let variance = if m > 1 && jtj > 0.0 {
        2.0 * current / (m - 1) as f64 / jtj
    } else {
        f64::INFINITY
    };
    Ok(Estimate {
        value: p,
        variance,
        cost: current,
        iterations,
    })
}

/// Fitted parameter and the profile recomputed at the fitted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    /// Parameter that was fitted.
    pub variable: FitVariable,
    /// Fitted value.
    pub value: f64,
    /// Variance of the fitted value.
    pub variance: f64,
    /// Levenberg-Marquardt iterations used.
    pub iterations: usize,
    /// Profile simulated at the fitted value.
    pub profile: Profile,
}

/// Struct binding a forward run to the transect it should reproduce.
#[derive(Debug, Clone)]
pub struct Calibrator {
    transport: Transport,
    transect: Transect,
    variable: FitVariable,
    options: FitOptions,
}

impl Calibrator {
    /// Calibrate `variable`, holding every other parameter of `transport` at its baseline.
    pub fn new(transport: Transport, transect: Transect, variable: FitVariable) -> Self {
        Calibrator {
            transport,
            transect,
            variable,
            options: FitOptions::new(),
        }
    }

    /// Replace the default fit controls.
    pub fn options(mut self, options: FitOptions) -> Self {
        self.options = options;
        self
    }

    /// Parameter left free by this calibrator.
    pub fn get_variable(&self) -> FitVariable {
        self.variable
    }

    fn estimate(&self, transect: &Transect) -> Result<Estimate, BasinError> {
        let obs = transect.clipped(self.transport.get_lake().get_radius());
        let baseline = self.variable.baseline(&self.transport);
        let bounds = self.variable.bounds(baseline)?;
        let model = |p: f64| -> Result<Vec<f64>, BasinError> {
            self.variable
                .apply(&self.transport, p)?
                .evaluate(obs.distance())
        };
        let est = levenberg_marquardt(model, obs.concentration(), baseline, bounds, &self.options)?;
        if !est.value.is_finite() || est.value < bounds.0 || est.value > bounds.1 {
            return Err(BasinError::FitNonFinite);
        }
        Ok(est)
    }

    /// Fit the free parameter, then rerun the simulator once at the fitted value.
    pub fn calibrate(&self) -> Result<Calibration, BasinError> {
        log::info!("Fitting {}", self.variable);
        let est = self.estimate(&self.transect)?;
        log::info!(
            "{} = {:.4} (variance {:.3e}) after {} iterations",
            self.variable.name(),
            est.value,
            est.variance,
            est.iterations
        );
        let profile = self.variable.apply(&self.transport, est.value)?.simulate()?;
        Ok(Calibration {
            variable: self.variable,
            value: est.value,
            variance: est.variance,
            iterations: est.iterations,
            profile,
        })
    }

    /// Refit the parameter on `runs` resamples of the transect drawn with replacement.
    /// Resamples are fitted in parallel; the seed fixes the draws.
    pub fn bootstrap(&self, runs: usize, seed: u64) -> Result<Vec<f64>, BasinError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let ln = self.transect.len();
        let draws: Vec<Transect> = (0..runs)
            .map(|_| {
                let index: Vec<usize> = (0..ln).map(|_| rng.gen_range(0..ln)).collect();
                self.transect.resample(&index)
            })
            .collect();
        draws
            .par_iter()
            .map(|x| self.estimate(x).map(|est| est.value))
            .collect()
    }
}

/// Run independent calibrations in parallel.
pub fn calibrate_all(cals: &[Calibrator]) -> Vec<Result<Calibration, BasinError>> {
    cals.par_iter().map(|x| x.calibrate()).collect()
}
