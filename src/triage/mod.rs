// Triage module - categorizes, prioritizes and inspects execution results

pub mod categorizer;
pub mod inspect;
pub mod rules;

pub use categorizer::{
    build_categorized, filter, filter_at, sort, Categorizer, FilterCriteria, DEFAULT_RESULT_LIMIT,
};
pub use inspect::{Correlation, DetailEntry, DetailKind, Inspection, ResultAction};
pub use rules::{classify_priority, ERRORS_CATEGORY};
