//! Generation options.
//!
//! Every key is optional; an empty JSON object yields [`GenOptions::default`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenOptions {
    /// Active field variant. Fields declaring it are read from `name@variant` first.
    pub variant: Option<String>,
    pub json_schema: JsonSchemaOptions,
    pub lua: LuaOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonSchemaOptions {
    pub schema_id: String,
    pub draft: String,
    pub output_file: String,
    /// Emit `<Bean>DataFile` definitions and per-table wrapper schemas.
    pub generate_file_variants: bool,
}

impl Default for JsonSchemaOptions {
    fn default() -> Self {
        Self {
            schema_id: "beanforge-schema".into(),
            draft: "http://json-schema.org/draft-07/schema#".into(),
            output_file: "schema.json".into(),
            generate_file_variants: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LuaOptions {
    pub output_file: String,
    /// Field tag that makes collection readers construct elements through a factory.
    pub object_factory_tag: String,
}

impl Default for LuaOptions {
    fn default() -> Self {
        Self {
            output_file: "schema.lua".into(),
            object_factory_tag: "ObjectFactory".into(),
        }
    }
}

impl GenOptions {
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}
