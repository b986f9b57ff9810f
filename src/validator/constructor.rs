use indexmap::IndexSet;

use crate::defs::TypeRef;
use crate::error::SchemaError;
use crate::ir::{Ty, TyKind};
use crate::value::Datum;

use super::{DataValidator, FieldSite, ValidateContext};

/// A string field that must name `base` or one of its subtypes.
#[derive(Debug)]
pub struct ConstructorValidator {
    base: String,
    /// Every spelling that resolves to an accepted bean.
    accepted: IndexSet<String>,
    /// Simple names, for messages.
    valid_names: Vec<String>,
}

impl ConstructorValidator {
    pub const NAME: &'static str = "constructor";

    pub fn compile(site: &FieldSite<'_>, ty: &Ty, args: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
        let base_name = args.trim();
        if base_name.is_empty() {
            return Err(site.invalid(Self::NAME, "base bean name is empty"));
        }
        let schema = site.schema;
        let base = match schema.find_type(base_name, Some(site.bean.namespace())) {
            Some(TypeRef::Bean(id)) => id,
            Some(TypeRef::Enum(_)) => {
                return Err(SchemaError::WrongKind {
                    name: base_name.to_owned(),
                    context: site.display(),
                    expected: "bean",
                });
            }
            None => {
                return Err(SchemaError::UnknownType {
                    name: base_name.to_owned(),
                    context: site.display(),
                });
            }
        };
        if !matches!(ty.kind, TyKind::String) {
            return Err(site.unsupported(Self::NAME, ty));
        }

        let base_def = schema.bean(base);
        let ns = base_def.namespace();
        let mut accepted = IndexSet::new();
        let mut valid_names = Vec::new();
        for &id in base_def.hierarchy_children() {
            let def = schema.bean(id);
            valid_names.push(def.name().to_owned());
            let relative = def.full_name.strip_prefix(ns).and_then(|r| r.strip_prefix('.'));
            for spelling in std::iter::once(def.full_name.as_str()).chain(relative) {
                if schema.find_type(spelling, Some(ns)) == Some(TypeRef::Bean(id)) {
                    accepted.insert(spelling.to_owned());
                }
            }
        }

        Ok(Box::new(Self { base: base_def.full_name.clone(), accepted, valid_names }))
    }
}

impl DataValidator for ConstructorValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &Ty, value: &Datum) {
        let Some(name) = value.as_str() else { return };
        if name.trim().is_empty() {
            cx.report(Self::NAME, "type name is empty");
            return;
        }
        if !self.accepted.contains(name) {
            cx.report(
                Self::NAME,
                format!(
                    "'{name}' is not '{}' or one of its subtypes; valid types: [{}]",
                    self.base,
                    self.valid_names.join(", "),
                ),
            );
        }
    }
}
