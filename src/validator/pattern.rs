use regex::Regex;

use crate::error::SchemaError;
use crate::ir::{Ty, TyKind};
use crate::value::Datum;

use super::{DataValidator, FieldSite, ValidateContext};

/// String matching a pattern. On a string collection every element must match.
#[derive(Debug)]
pub struct RegexValidator {
    pattern: Regex,
}

impl RegexValidator {
    pub const NAME: &'static str = "regex";

    pub fn compile(site: &FieldSite<'_>, ty: &Ty, args: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
        let on_strings = match &ty.kind {
            TyKind::String => true,
            TyKind::Array(e) | TyKind::List(e) | TyKind::Set(e) => matches!(e.kind, TyKind::String),
            _ => false,
        };
        if !on_strings {
            return Err(site.unsupported(Self::NAME, ty));
        }
        let pattern = Regex::new(args).map_err(|e| site.invalid(Self::NAME, e.to_string()))?;
        Ok(Box::new(Self { pattern }))
    }

    fn check(&self, cx: &ValidateContext<'_>, s: &str) {
        if !self.pattern.is_match(s) {
            cx.report(Self::NAME, format!("'{s}' does not match /{}/", self.pattern.as_str()));
        }
    }
}

impl DataValidator for RegexValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &Ty, value: &Datum) {
        match value {
            Datum::String(s) => self.check(cx, s),
            other => {
                for s in other.as_seq().unwrap_or_default().iter().filter_map(Datum::as_str) {
                    self.check(cx, s);
                }
            }
        }
    }
}
