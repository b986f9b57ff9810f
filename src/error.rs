//! Error taxonomies.
//!
//! Schema errors are fatal for a whole generation run. Load errors are fatal
//! for one record only and carry the path from the record root to the node
//! that failed. Validation failures are not errors at all; see
//! [`crate::validator::FailLog`].

use std::fmt;
use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("type `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("enum `{enum_name}` declares item `{item}` more than once")]
    DuplicateEnumItem { enum_name: String, item: String },

    #[error("bean `{bean}` declares field `{field}` which already exists in its hierarchy")]
    DuplicateField { bean: String, field: String },

    #[error("unknown type `{name}` referenced from {context}")]
    UnknownType { name: String, context: String },

    #[error("`{name}` referenced from {context} must be a {expected}")]
    WrongKind { name: String, context: String, expected: &'static str },

    #[error("inheritance cycle through bean `{0}`")]
    InheritanceCycle(String),

    #[error("table `{table}`: {reason}")]
    InvalidTable { table: String, reason: String },

    #[error("invalid type expression `{expr}`: {reason}")]
    InvalidTypeExpr { expr: String, reason: String },

    #[error("field `{field}`: `{validator}` validator {reason}")]
    InvalidValidator { field: String, validator: String, reason: String },

    #[error("field `{field}`: `{validator}` validator does not support type `{ty}`")]
    UnsupportedValidatorType { field: String, validator: String, ty: String },

    #[error("schema descriptor at {path}: {message}")]
    Descriptor { path: String, message: String },
}

// ————————————————————————————————————————————————————————————————————————————
// DATA
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadErrorKind {
    #[error("expected {expected}, found {found}")]
    MalformedScalar { expected: &'static str, found: String },

    #[error("expected {expected}, found {found}")]
    UnexpectedNode { expected: &'static str, found: String },

    #[error("`{value}` is not an item of enum `{enum_name}`")]
    UnknownEnumItem { enum_name: String, value: String },

    #[error("polymorphic bean `{bean}` requires a `$type` discriminator naming a subtype")]
    MissingDiscriminator { bean: String },

    #[error("`{name}` is not a concrete subtype of `{bean}`")]
    UnknownSubtype { bean: String, name: String },

    #[error("field `{field}` of `{bean}` must not be null")]
    NonNullableFieldIsNull { bean: String, field: String },

    #[error("field `{field}` of `{bean}` is missing")]
    RequiredFieldMissing { bean: String, field: String },

    #[error("invalid map encoding: {reason}")]
    InvalidMapEncoding { reason: String },

    #[error("duplicate map key {key}")]
    DuplicateMapKey { key: String },

    #[error("`{value}` is not a valid datetime")]
    MalformedDateTime { value: String },
}

/// One step of the path from a record root down to a failing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFrame {
    Field { bean: String, field: String },
    Index(usize),
    Key(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}: {kind}", render_path(.path))]
pub struct LoadError {
    pub kind: LoadErrorKind,
    /// Outermost frame first.
    pub path: Vec<PathFrame>,
}

impl LoadError {
    pub fn new(kind: LoadErrorKind) -> Self {
        Self { kind, path: Vec::new() }
    }

    /// Prefix a frame while the error unwinds through an enclosing node.
    pub fn within(mut self, frame: PathFrame) -> Self {
        self.path.insert(0, frame);
        self
    }

    pub(crate) fn within_field(self, bean: &str, field: &str) -> Self {
        self.within(PathFrame::Field { bean: bean.to_owned(), field: field.to_owned() })
    }

    /// Dotted path such as `$.reward.items[2].count`.
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }
}

impl From<LoadErrorKind> for LoadError {
    fn from(kind: LoadErrorKind) -> Self {
        LoadError::new(kind)
    }
}

impl fmt::Display for PathFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFrame::Field { field, .. } => write!(f, ".{field}"),
            PathFrame::Index(i) => write!(f, "[{i}]"),
            PathFrame::Key(k) => write!(f, "[{k}]"),
        }
    }
}

fn render_path(path: &[PathFrame]) -> String {
    let mut out = String::from("$");
    for frame in path {
        out.push_str(&frame.to_string());
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// TABLES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("table `{table}`: record {index} from `{source_file}`: {error}")]
    Record { table: String, source_file: String, index: usize, error: LoadError },

    #[error("table `{table}`: duplicate key {key} (record {index} from `{source_file}`)")]
    DuplicateKey { table: String, key: String, index: usize, source_file: String },

    #[error("table `{table}`: record {index} has a null index field `{field}`")]
    NullKey { table: String, field: String, index: usize },

    #[error("table `{table}` is a single-record table but {count} records were supplied")]
    RecordCount { table: String, count: usize },
}
