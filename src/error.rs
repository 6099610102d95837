//! Error types for cell construction and time stepping

use thiserror::Error;

/// Errors raised while lowering a cell description into an `FvmCell`.
///
/// Construction errors are fatal: the constructor returns them and no cell
/// is produced. Anything that would make a step fail for structural reasons
/// (bad indices, degenerate geometry) is rejected here, not at step time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// A segment that cannot be lowered to control volumes (e.g. a cable
    /// with zero compartments).
    #[error("segment cannot be lowered to control volumes")]
    UnsupportedSegment,

    /// The soma is missing or not the first segment of the cell.
    #[error("soma must be the first segment of the cell")]
    SomaPlacement,

    /// A mechanism name with no entry in the registry.
    #[error("unknown mechanism '{0}'")]
    UnknownMechanism(String),

    /// A parameter override that names no parameter of the mechanism.
    #[error("mechanism '{mechanism}' has no parameter '{name}'")]
    UnknownParameter { mechanism: String, name: String },

    /// A stimulus or synapse location outside the compartment range.
    #[error("location outside the compartment range")]
    InvalidIndex,

    /// A control volume whose lowered area or capacitance is not positive.
    #[error("control volume {index} has non-positive area or capacitance")]
    InvalidGeometry { index: usize },
}

/// Errors raised while advancing a cell.
///
/// After a runtime error the cell is in a defined but unusable state;
/// callers may `initialize()` and start over.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RuntimeError {
    /// Non-finite or zero pivot encountered during elimination.
    #[error("non-finite or zero pivot at row {index} during elimination")]
    NumericalInstability { index: usize },

    /// An event addressed a synapse instance that does not exist.
    #[error("event target {target} out of range for {count} synapse instances")]
    EventOutOfRange { target: u32, count: usize },
}
