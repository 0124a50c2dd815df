//! Validation of operations against documents and schemas.

#[allow(clippy::module_inception)]
pub mod automaton;
pub mod document;
pub mod result;
pub mod schema;
pub mod validator;

pub use automaton::DocOpAutomaton;
pub use document::{AutomatonDocument, EmptyDocument};
pub use result::{ValidationResult, Violation, ViolationCollector, ViolationKind};
pub use schema::{
    DocumentSchema, ElementRules, NoSchema, PermittedCharacters, SchemaDefinition, SchemaError,
};
pub use validator::{check_well_formed, is_well_formed, validate, validation_result};
