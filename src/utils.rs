//! Summary statistics and csv output.
use crate::errors;
use serde::Serialize;

/// Calculate the mean of a slice of f64 values.
///  - `numbers` is a reference to a slice of f64 values.
///  - Returns the mean of `numbers`.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![1.0, 1.5, 2.0, 2.5, 3.0];
/// let mn = basins::utils::mean(&numbers);
/// assert_eq!(2.0, mn);
/// ```
pub fn mean(numbers: &[f64]) -> f64 {
    let sum: f64 = numbers.iter().sum();

    sum / numbers.len() as f64
}

/// Calculate the median of a slice of f64 values.
///  - `numbers` is a reference to a slice of f64 values, in any order.
///  - Returns the median of `numbers`, NaN for an empty slice.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![10.0, 3.0, 1.0, 7.0];
/// let med = basins::utils::median(&numbers);
/// assert_eq!(5.0, med);
/// ```
pub fn median(numbers: &[f64]) -> f64 {
    if numbers.is_empty() {
        return f64::NAN;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let len = sorted.len();
    let mid = len / 2;
    if len % 2 == 0 {
        mean(&sorted[(mid - 1)..(mid + 1)])
    } else {
        sorted[mid]
    }
}

/// Value below which a fraction `thresh` of `obs` falls, by nearest rank.  NaN for an empty slice.
pub fn quantile(obs: &[f64], thresh: f64) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    let mut sorted = obs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (thresh * sorted.len() as f64).ceil() as usize;
    sorted[rank.max(1).min(sorted.len()) - 1]
}

/// Calculate the quantiles for a box-and-whisker plot (2.5%, 25%, 50%, 75%, 97.5%).
///  - `obs` is a reference to a slice of f64 observed values, e.g. bootstrap fits.
///  - Returns the observed value at each quantile.
pub fn quantiles(obs: &[f64]) -> Vec<f64> {
    vec![
        quantile(obs, 0.025),
        quantile(obs, 0.25),
        quantile(obs, 0.5),
        quantile(obs, 0.75),
        quantile(obs, 0.975),
    ]
}

/// Write model results to csv file.
pub fn record<T: Serialize>(rec: &[T], path: &str) -> Result<(), errors::BasinError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for i in rec {
        wtr.serialize(i)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_unsorted_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn quantiles_nearest_rank() {
        let obs: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        assert_eq!(quantiles(&obs), vec![1.0, 10.0, 20.0, 30.0, 39.0]);
        assert_eq!(quantile(&obs, 0.0), 1.0);
        assert_eq!(quantile(&obs, 1.0), 40.0);
    }

    #[test]
    fn empty_input_gives_nan() {
        assert!(median(&[]).is_nan());
        assert!(quantile(&[], 0.5).is_nan());
        assert!(quantiles(&[]).iter().all(|x| x.is_nan()));
    }

    #[test]
    fn record_writes_profile_rows() {
        let path = std::env::temp_dir().join("basins_record_test.csv");
        let path = path.to_str().unwrap();
        let rows = vec![(0.0, 0.1), (10.0, 0.2)];
        record(&rows, path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        std::fs::remove_file(path).unwrap();
    }
}
