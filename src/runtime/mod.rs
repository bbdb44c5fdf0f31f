//! Record Design Runtime
//!
//! The semantics every generated program implements, available natively.
//!
//! ## Invariants
//!
//! 1. Designs run in declaration order, documents in the order supplied.
//! 2. Attributes evaluate in declaration order, repeated values in
//!    registration order.
//! 3. A skipped (design, document) pair leaves no trace in the graph.
//! 4. Id failures and non-tolerable evaluation errors abort the batch.
//! 5. Backlink inference runs once, after all designs and documents.

mod conditionals;
mod design;
mod executor;
mod record;
mod value;

pub use conditionals::{is_emptyish, log_value, otherwise, stop_with_fail};
pub use design::{
    constant, ApplyOutcome, AttributeSource, BackwardLinkFor, Condition, EvalContext, Evaluator,
    InferenceRules, Reaction, RecordDesign,
};
pub use executor::{ExecutionStats, Executor, RecordGraph, DEFAULT_TOLERABLE_ERRORS};
pub use record::PidRecord;
pub use value::{coerce_identifier, is_truthy, normalize_number, to_primitives, Primitive};
