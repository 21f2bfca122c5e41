/*!
* # Basins - A library for simulating lateral methane transport in lakes.
* Methane released from littoral sediments, the hypolimnion, in-situ production and dissolving bubbles
* spreads laterally through the surface mixed layer while it escapes to the atmosphere.  The functions
* in this crate step a one-dimensional radial transport-reaction model to steady state, report the
* concentration profile along a transect and the mean areal emission it implies, and calibrate one
* unknown parameter of the model against an observed transect.
*
* The model is implicit in time: the system matrix is tridiagonal and fixed for a run, so it is
* factored once and each time step costs a single linear pass over the grid.  Runs own their state
* and can be simulated or calibrated in parallel.
*
*  ## Quick Start
*
* To use basins, add it to your `Cargo.toml`
* ```toml
* [dependencies]
* basins = "^0.1.0"
* ```
*
*  - Load the crate prelude in the preamble of your `main.rs`.
*  - Describe the lake, its sources and the solver, then simulate:
* ```rust
* use basins::prelude::*;
*
* fn main() -> Result<(), BasinError> {
*     let lake = Lake::new()
*         .radius(500.0)?
*         .inner_radius(300.0)?
*         .mixed_depth(5.0)?
*         .kh(1000.0)?
*         .kch4(0.5)?;
*     let run = Transport::new()
*         .lake(lake)
*         .sources(Sources::new().sediment(2.0).production(50.0))
*         .solver(Solver::new().dr(10.0)?.dt(0.5)?.t_end(500.0)?);
*     let profile = run.simulate()?;
*     println!("mean flux {:.3}", profile.flux);
*
*     // refit the sediment flux from a transect sampled off the model
*     let stations: Vec<f64> = (0..=10).map(|i| i as f64 * 50.0).collect();
*     let obs = Transect::synthetic(&run, &stations, 0.0, 0)?;
*     let cal = Calibrator::new(run, obs, FitVariable::Sediment).calibrate()?;
*     assert!((cal.value - 2.0).abs() < 1e-2);
*     Ok(())
* }
* ```
*
* Calibration holds every parameter but one at its baseline.  Pick the free parameter with
* [FitVariable](fit/enum.FitVariable.html); each variant brings its own feasible bounds.
*/

#![warn(missing_docs)]
pub mod errors;
pub mod exchange;
pub mod fit;
pub mod lake;
pub mod model;
pub mod plot;
pub mod poly;
pub mod transect;
pub mod tridiag;
pub mod utils;

/// Common imports for building, simulating and calibrating runs.
pub mod prelude {
    pub use crate::errors::BasinError;
    pub use crate::fit::{calibrate_all, Calibration, Calibrator, FitOptions, FitVariable};
    pub use crate::lake::{Dissolution, Lake, LakeKind, Sources};
    pub use crate::model::{simulate_all, Cancel, Profile, Solver, Termination, Transport};
    pub use crate::plot;
    pub use crate::transect::Transect;
    pub use crate::utils;
}
