use std::process::{ExitCode, Termination};

/// Misconfiguration of a bit layout or threshold ladder.
///
/// These are detected when layouts and compilers are constructed at startup;
/// compiling a query never produces one.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("layout width must be between 1 and 8 bytes, got {0}")]
    WidthOutOfRange(usize),
    #[error("fact {0:?} is assigned more than once")]
    DuplicateFact(String),
    #[error("fact {fact:?} does not fit into byte {byte}, offset {offset}, width {width}")]
    SlotOutOfRange {
        fact: String,
        byte: usize,
        offset: u8,
        width: u8,
    },
    #[error("facts {first:?} and {second:?} share bits")]
    OverlappingBits { first: String, second: String },
    #[error("unknown fact {fact:?} in layout {layout:?}")]
    UnknownFact { layout: String, fact: String },
    #[error("ladder {0:?} has no steps")]
    EmptyLadder(String),
    #[error("ladder {ladder:?} has non-finite threshold {threshold}")]
    NonFiniteThreshold { ladder: String, threshold: f64 },
    #[error("ladder {ladder:?} thresholds are not strictly increasing at {threshold}")]
    LadderNotIncreasing { ladder: String, threshold: f64 },
    #[error("ladder {0:?} assigns overlapping bits to its steps")]
    LadderBitsOverlap(String),
    #[error("fields {first:?} and {second:?} are stored in the same bits")]
    FactReused { first: String, second: String },
}

impl Termination for LayoutError {
    fn report(self) -> ExitCode {
        ExitCode::from(2)
    }
}
