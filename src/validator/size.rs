use crate::error::SchemaError;
use crate::ir::{Ty, TyKind};
use crate::value::Datum;

use super::{Bounds, DataValidator, FieldSite, ValidateContext};

/// String length, element count or map size.
#[derive(Debug)]
pub struct SizeValidator {
    bounds: Bounds,
}

impl SizeValidator {
    pub const NAME: &'static str = "size";

    pub fn compile(site: &FieldSite<'_>, ty: &Ty, args: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
        let sized = matches!(
            ty.kind,
            TyKind::String | TyKind::Array(_) | TyKind::List(_) | TyKind::Set(_) | TyKind::Map(..)
        );
        if !sized {
            return Err(site.unsupported(Self::NAME, ty));
        }
        let bounds = Bounds::parse(args)
            .filter(|b| b.min.is_none_or(|m| m >= 0.0))
            .ok_or_else(|| site.invalid(Self::NAME, format!("malformed size '{args}'")))?;
        Ok(Box::new(Self { bounds }))
    }
}

impl DataValidator for SizeValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &Ty, value: &Datum) {
        let size = match value {
            Datum::String(s) => s.chars().count(),
            Datum::Map(m) => m.len(),
            other => match other.as_seq() {
                Some(xs) => xs.len(),
                None => return,
            },
        };
        if !self.bounds.contains(size as f64) {
            cx.report(Self::NAME, format!("size {size} is outside {}", self.bounds));
        }
    }
}
