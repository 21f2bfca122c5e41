//! Air-water exchange and mixing coefficients used to parameterise a lake.
//!
//! These turn field measurements (water temperature, wind speed, lake area and length) into the
//! solubility, gas transfer velocity and horizontal diffusivity taken by [`Lake`](crate::lake::Lake).
use crate::lake::SECONDS_PER_DAY;
use crate::utils;
use serde::{Deserialize, Serialize};

/// Henry's-law solubility of methane at 25 °C in mol/m³/Pa (Sander 2015).
pub const HENRY_25C: f64 = 1.4e-5;

/// Temperature dependence `d ln(H)/d(1/T)` in K.
pub const HENRY_SLOPE: f64 = 1750.0;

/// Wind speed (m/s) above which the Schmidt exponent switches from 2/3 to 1/2.
pub const WIND_REGIME: f64 = 3.7;

/// Henry's-law solubility of methane in µmol/l/Pa at water temperature `temp` (°C).
///
/// # Examples
/// ```
/// let h = basins::exchange::henry(25.0);
/// assert!((h - 0.014).abs() < 1e-12);
/// ```
pub fn henry(temp: f64) -> f64 {
    let kelvin = temp + 273.15;
    HENRY_25C * (HENRY_SLOPE * (1.0 / kelvin - 1.0 / 298.15)).exp() * 1000.0
}

/// Schmidt number of methane in freshwater at `temp` (°C).
pub fn schmidt(temp: f64) -> f64 {
    1897.8 - 114.28 * temp + 3.2902 * temp.powi(2) - 0.039061 * temp.powi(3)
}

/// Gas transfer velocity normalised to a Schmidt number of 600, in m/d (Vachon & Prairie 2013).
///  - `u10` is the wind speed at 10 m in m/s.
///  - `area` is the lake area in km².
pub fn k600(u10: f64, area: f64) -> f64 {
    let cm_per_hour = 2.51 + 1.48 * u10 + 0.39 * u10 * area.log10();
    cm_per_hour * 24.0 / 100.0
}

/// Mean methane transfer velocity in m/d over the water temperatures `temps` (°C).
pub fn kch4(temps: &[f64], k600: f64, u10: f64) -> f64 {
    let n = if u10 > WIND_REGIME { 0.5 } else { 2.0 / 3.0 };
    let k: Vec<f64> = temps
        .iter()
        .map(|t| k600 * (600.0 / schmidt(*t)).powf(n))
        .collect();
    utils::mean(&k)
}

/// Empirical scaling of horizontal diffusivity with the lake length scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Scheme {
    /// Peeters & Hofmann (2015).
    PeetersHofmann,
    /// Lawrence et al. (1995).
    Lawrence,
}

/// Horizontal diffusivity in m²/d for a lake of length scale `length` (m).
pub fn horizontal_diffusivity(length: f64, scheme: Scheme) -> f64 {
    let per_second = match scheme {
        Scheme::PeetersHofmann => 1.4e-4 * length.powf(1.07),
        Scheme::Lawrence => 3.2e-4 * length.powf(1.10),
    };
    per_second * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solubility_falls_with_temperature() {
        assert!(henry(5.0) > henry(20.0));
        assert!((henry(25.0) - 0.014).abs() < 1e-12);
    }

    #[test]
    fn schmidt_at_20c() {
        assert!((schmidt(20.0) - 615.792).abs() < 1e-9);
    }

    #[test]
    fn k600_calm_small_lake() {
        // no wind leaves the intercept only
        assert!((k600(0.0, 0.5) - 2.51 * 0.24).abs() < 1e-12);
        assert!(k600(5.0, 2.0) > k600(2.0, 2.0));
    }

    #[test]
    fn kch4_uses_wind_regime() {
        let calm = kch4(&[20.0, 20.0], 1.0, 1.0);
        let windy = kch4(&[20.0, 20.0], 1.0, 5.0);
        let sc: f64 = schmidt(20.0);
        assert!((calm - (600.0 / sc).powf(2.0 / 3.0)).abs() < 1e-12);
        assert!((windy - (600.0 / sc).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn diffusivity_schemes() {
        let ph = horizontal_diffusivity(1000.0, Scheme::PeetersHofmann);
        let lw = horizontal_diffusivity(1000.0, Scheme::Lawrence);
        assert!((ph - 1.4e-4 * 1000f64.powf(1.07) * 86400.0).abs() < 1e-9);
        assert!(lw > ph);
    }
}
