//! Output targets.
//!
//! A target walks the resolved schema and renders files. Each one supplies
//! its own [`TypeVisitor`](crate::visitor::TypeVisitor) implementations;
//! nothing in the type model knows which targets exist.

pub mod json_schema;
pub mod lua;

use crate::defs::Schema;

pub use json_schema::{JsonSchemaTarget, JsonSchemaTypeVisitor};
pub use lua::{LuaDeserializeVisitor, LuaMethodNameVisitor, LuaTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Relative to the output directory, `/`-separated.
    pub path: String,
    pub content: String,
}

impl OutputFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self { path: path.into(), content: content.into() }
    }
}

pub trait CodeTarget {
    fn name(&self) -> &'static str;

    fn generate(&self, schema: &Schema) -> Vec<OutputFile>;
}

/// `DropItem` → `drop-item`.
pub(crate) fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
