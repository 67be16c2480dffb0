// Error type shared by every stage of draw generation.

use thiserror::Error;

use crate::points::PointsError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrawError {
    #[error("Incompatible set of constraints")]
    IncompatibleConstraints,

    #[error("Number of pools ({0}) is not a power of 2.")]
    NotPowerOfTwo(u32),

    /// Strict validation failure. `lines` are 1-based and sorted.
    #[error("Draw formula is invalid: line(s) '{}' are not in the correct format.", join_lines(.lines))]
    InvalidFormat { lines: Vec<usize> },

    #[error("invalid formula {0:?}")]
    InvalidFormula(String),

    #[error("invalid stage {index} for division with {stage_count} stages")]
    InvalidStage { index: usize, stage_count: usize },

    #[error("invalid group {index} for stage {stage:?}, which has {pool_count} pools")]
    InvalidGroup {
        index: usize,
        stage: String,
        pool_count: usize,
    },

    #[error("stage {0:?} does not follow any other stage")]
    NoPrecedingStage(String),

    #[error("match {0} is referenced before it has been generated")]
    UnknownMatch(u32),

    #[error("invalid division structure: {0}")]
    InvalidStructure(String),

    #[error(transparent)]
    Points(#[from] PointsError),
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
