//! Error type shared by the simulator and the calibrator.
/// Custom error type for the basins crate.
#[derive(Debug, Clone, PartialEq)]
pub enum BasinError {
    /// Invalid lake parameter or solver control.
    Config(String),
    /// Zero or non-finite pivot while factoring the transport matrix.
    Singular {
        /// Row of the system where elimination broke down.
        row: usize,
    },
    /// Run stopped through a [`Cancel`](crate::model::Cancel) token.
    Cancelled {
        /// Number of completed time steps.
        step: usize,
    },
    /// Least-squares fit did not converge.
    FitDiverged {
        /// Iterations spent before giving up.
        iterations: usize,
    },
    /// Least-squares fit produced a non-finite estimate or residual.
    FitNonFinite,
    /// Error type from csv crate.
    CsvError,
    /// Error type from rand_distr crate.
    NormalError,
    /// Error type from std::io.
    IoError,
}

impl std::error::Error for BasinError {}

impl std::fmt::Display for BasinError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BasinError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            BasinError::Singular { row } => {
                write!(f, "Transport matrix is singular at row {}.", row)
            }
            BasinError::Cancelled { step } => write!(f, "Run cancelled after {} steps.", step),
            BasinError::FitDiverged { iterations } => write!(
                f,
                "Least-squares fit failed to converge after {} iterations.",
                iterations
            ),
            BasinError::FitNonFinite => {
                write!(f, "Least-squares fit produced a non-finite estimate.")
            }
            BasinError::CsvError => write!(f, "Could not serialize/deserialize csv file."),
            BasinError::NormalError => write!(
                f,
                "Could not create normal distribution from deviation provided."
            ),
            BasinError::IoError => write!(f, "Could not read file from path provided."),
        }
    }
}

impl BasinError {
    /// True for failures raised by the calibrator rather than the simulator.
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, BasinError::FitDiverged { .. } | BasinError::FitNonFinite)
    }
}

impl From<csv::Error> for BasinError {
    fn from(_: csv::Error) -> Self {
        BasinError::CsvError
    }
}

impl From<rand_distr::NormalError> for BasinError {
    fn from(_: rand_distr::NormalError) -> Self {
        BasinError::NormalError
    }
}

impl From<std::io::Error> for BasinError {
    fn from(_: std::io::Error) -> Self {
        BasinError::IoError
    }
}
