pub mod categorized;
pub mod error_kind;
pub mod input;
pub mod result;
pub mod unit;

pub use categorized::{CategorizedMetadata, CategorizedResult, Priority};
pub use error_kind::{ErrorFamily, ErrorKind};
pub use input::{ExecutionInput, OsintData, ScanMetadata, ScanResult, ScanStatus};
pub use result::{
    ExecutionFailure, ExecutionMetrics, ExecutionResult, IntelligenceData, ProcessingStep,
    Relationship, ResultMetadata,
};
pub use unit::{
    AnalysisUnit, ConfigParameter, ParameterType, UnitDescriptor, UnitFailure, UnitFuture,
    UnitResult, ValidationOutcome,
};
