//! Validation results and violation collection.

use std::fmt;

/// Outcome of validating an operation, ordered from worst to best so that
/// merging is `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationResult {
    IllFormed,
    /// Structurally valid, but the result would violate the schema.
    InvalidSchema,
    Valid,
}

impl ValidationResult {
    pub fn merge_with(self, other: ValidationResult) -> ValidationResult {
        self.min(other)
    }

    pub fn is_ill_formed(self) -> bool {
        self == ValidationResult::IllFormed
    }

    pub fn is_invalid_schema(self) -> bool {
        self == ValidationResult::InvalidSchema
    }

    pub fn is_valid(self) -> bool {
        self == ValidationResult::Valid
    }
}

/// What a violation says about the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Broken regardless of the document it is applied to.
    IllFormed,
    /// Does not fit the document it is applied to.
    InvalidDocument,
    /// Fits the document but breaks the schema.
    Schema,
}

impl ViolationKind {
    pub fn validation_result(self) -> ValidationResult {
        match self {
            ViolationKind::IllFormed | ViolationKind::InvalidDocument => ValidationResult::IllFormed,
            ViolationKind::Schema => ValidationResult::InvalidSchema,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ViolationKind::IllFormed => "ill-formed",
            ViolationKind::InvalidDocument => "invalid operation",
            ViolationKind::Schema => "schema violation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    pub original_pos: usize,
    pub resulting_pos: usize,
}

impl Violation {
    /// Message with both document positions.
    pub fn description(&self) -> String {
        format!(
            "{} at original document position {} / resulting document position {}",
            self.message, self.original_pos, self.resulting_pos
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.prefix(), self.description())
    }
}

/// Accumulates violations in the order they were found, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct ViolationCollector {
    ill_formed: Vec<Violation>,
    invalid_document: Vec<Violation>,
    schema: Vec<Violation>,
}

impl ViolationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, violation: Violation) {
        match violation.kind {
            ViolationKind::IllFormed => self.ill_formed.push(violation),
            ViolationKind::InvalidDocument => self.invalid_document.push(violation),
            ViolationKind::Schema => self.schema.push(violation),
        }
    }

    pub fn validation_result(&self) -> ValidationResult {
        self.violations()
            .map(|v| v.kind.validation_result())
            .min()
            .unwrap_or(ValidationResult::Valid)
    }

    pub fn is_ill_formed(&self) -> bool {
        !self.ill_formed.is_empty()
    }

    pub fn is_invalid_document(&self) -> bool {
        !self.invalid_document.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ill_formed.len() + self.invalid_document.len() + self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worst kinds first.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.ill_formed
            .iter()
            .chain(&self.invalid_document)
            .chain(&self.schema)
    }

    pub fn first_description(&self) -> Option<String> {
        self.violations().next().map(ToString::to_string)
    }
}

impl fmt::Display for ViolationCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first_description() {
            None => f.write_str("ViolationCollector[0]"),
            Some(first) => write!(f, "ViolationCollector[{}: {first}]", self.len()),
        }
    }
}
