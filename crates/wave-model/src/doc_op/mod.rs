//! Document operations.
//!
//! An operation is an ordered list of components walked against a document
//! from its first item to its last. The document is a flat sequence of
//! items: characters, element starts and element ends. Each component either
//! skips items (`Retain`), inserts items, deletes items, or changes the
//! attributes of one element start. Annotation boundaries sit between
//! components and open or close annotation changes for the items that
//! follow.

pub mod annotations;
pub mod attributes;
pub mod builder;
pub mod component;
pub mod concise;
pub mod cursor;
pub mod normalize;
pub mod op;
pub mod random;
mod scanner;
pub mod xml;

pub use annotations::{
    AnnotationBoundaryMap, AnnotationBoundaryMapBuilder, AnnotationError, AnnotationMap,
    AnnotationsUpdate,
};
pub use attributes::{Attributes, AttributesError, AttributesUpdate, ValueChange};
pub use builder::{DocInitializationBuffer, DocInitializationBuilder, DocOpBuffer, DocOpBuilder};
pub use component::{ComponentType, DocOpComponent};
pub use concise::{parse_concise, to_concise_string};
pub use cursor::{DocInitializationCursor, DocOpCursor, InitializationOnly};
pub use normalize::{
    initial_document_length, normalize, normalize_initialization, resulting_document_length,
};
pub use op::{DocInitialization, DocOp, DocOpError};
pub use random::{RandomInitializationGenerator, RandomInitializationParameters};
pub use scanner::ParseError;
pub use xml::{parse_xml, to_xml_string};
