//! Observed concentration transects.
use crate::errors::BasinError;
use crate::model::Transport;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fs::File;

/// Holder struct to read in transect samples from csv.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Sample {
    /// Distance from the shore in m.
    pub distance: f64,
    /// Methane concentration in µmol/l.
    pub concentration: f64,
}

/// Concentrations observed along a transect, indexed by distance from the shore.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transect {
    distance: Vec<f64>,
    concentration: Vec<f64>,
}

impl Transect {
    /// Pair distances with concentrations.  Both must be non-empty, equally long and finite.
    pub fn new(distance: Vec<f64>, concentration: Vec<f64>) -> Result<Self, BasinError> {
        if distance.is_empty() || distance.len() != concentration.len() {
            return Err(BasinError::Config(format!(
                "transect needs matching non-empty columns, got {} distances and {} concentrations",
                distance.len(),
                concentration.len()
            )));
        }
        if distance
            .iter()
            .chain(concentration.iter())
            .any(|x| !x.is_finite())
        {
            return Err(BasinError::Config(
                "transect holds non-finite values".to_string(),
            ));
        }
        Ok(Transect {
            distance,
            concentration,
        })
    }

    /// Read a transect from csv with columns `distance` and `concentration`.
    pub fn read(path: &str) -> Result<Self, BasinError> {
        let var = File::open(path)?;
        let mut rdr = csv::Reader::from_reader(var);
        let mut distance = Vec::new();
        let mut concentration = Vec::new();
        for result in rdr.deserialize() {
            let row: Sample = result?;
            distance.push(row.distance);
            concentration.push(row.concentration);
        }
        Transect::new(distance, concentration)
    }

    /// Sample a run in fit-evaluation mode at `distances`, adding normal noise with standard
    /// deviation `noise`.  The seed makes the record reproducible.
    pub fn synthetic(
        run: &Transport,
        distances: &[f64],
        noise: f64,
        seed: u64,
    ) -> Result<Self, BasinError> {
        let mut conc = run.evaluate(distances)?;
        if noise != 0.0 {
            let mut rng = StdRng::seed_from_u64(seed);
            let dist = Normal::new(0.0, noise)?;
            for c in conc.iter_mut() {
                *c += dist.sample(&mut rng);
            }
        }
        Transect::new(distances.to_vec(), conc)
    }

    /// Observations beyond the basin radius are moved onto the edge rather than dropped.
    ///
    /// # Examples
    /// ```
    /// use basins::prelude::*;
    /// let obs = Transect::new(vec![10.0, 480.0, 530.0], vec![0.4, 0.3, 0.2])?;
    /// assert_eq!(obs.clipped(500.0).distance(), &[10.0, 480.0, 500.0]);
    /// # Ok::<(), BasinError>(())
    /// ```
    pub fn clipped(&self, radius: f64) -> Self {
        Transect {
            distance: self.distance.iter().map(|x| x.min(radius)).collect(),
            concentration: self.concentration.clone(),
        }
    }

    /// Subset the transect by index, repeats allowed.
    pub fn resample(&self, index: &[usize]) -> Self {
        Transect {
            distance: index.iter().map(|&i| self.distance[i]).collect(),
            concentration: index.iter().map(|&i| self.concentration[i]).collect(),
        }
    }

    /// Distances from the shore (m).
    pub fn distance(&self) -> &[f64] {
        &self.distance
    }

    /// Observed concentrations (µmol/l).
    pub fn concentration(&self) -> &[f64] {
        &self.concentration
    }

    /// Number of stations.
    pub fn len(&self) -> usize {
        self.distance.len()
    }

    /// True for a transect without stations.
    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    /// Pairs of (distance, concentration), handy for plotting.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.distance
            .iter()
            .cloned()
            .zip(self.concentration.iter().cloned())
            .collect()
    }
}
