//! wave-model - operations on tree documents and the replicated collections
//! built on them.
//!
//! Layers, bottom up:
//!
//! * `doc_op`: operation components, operations and initializations, the
//!   builders that produce them, and their textual forms.
//! * `automaton`: the validation automaton that decides whether an operation
//!   is well-formed and applies to a document under a schema.
//! * `simple_doc` and `tree`: in-memory documents. `SimpleDocument` is a
//!   linear snapshot that consumes operations; `TreeDocument` is an
//!   observable element tree that collections are adapted onto.
//! * `adt`: document-based maps, sets, singletons, booleans, monotonic
//!   values and element lists.

pub mod doc_op;
pub mod automaton;
pub mod simple_doc;

pub mod listeners;
pub mod tree;
pub mod adt;
