//! Error types for the transcription and arrangement engine

use std::fmt;

/// Errors that can occur during transcription or arrangement
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Invalid input parameters (empty buffer, bad sample rate, malformed options)
    InvalidInput(String),

    /// External pitch/tempo/key estimator failed or returned malformed data
    EstimatorFailure(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::EstimatorFailure(msg) => write!(f, "Estimator failure: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}
