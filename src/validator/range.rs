use crate::error::SchemaError;
use crate::ir::{Ty, TyKind};
use crate::value::Datum;

use super::{Bounds, DataValidator, FieldSite, ValidateContext};

/// Bounds at the precision of the value they are compared with.
#[derive(Debug)]
enum Interval {
    Integer(Bounds<i64>),
    /// Endpoints rounded the way `float` data is when loaded.
    Single(Bounds<f32>),
    Real(Bounds<f64>),
}

/// Numeric value within an interval.
#[derive(Debug)]
pub struct RangeValidator {
    interval: Interval,
}

impl RangeValidator {
    pub const NAME: &'static str = "range";

    pub fn compile(site: &FieldSite<'_>, ty: &Ty, args: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
        if !ty.is_numeric() {
            return Err(site.unsupported(Self::NAME, ty));
        }
        let interval = match ty.kind {
            TyKind::Float => Bounds::parse(args).map(|b| Interval::Single(b.map(|x| x as f32))),
            // fractional bounds on an integer field still compare as reals
            TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long => Bounds::<i64>::parse_as(args)
                .map(Interval::Integer)
                .or_else(|| Bounds::parse(args).map(Interval::Real)),
            _ => Bounds::parse(args).map(Interval::Real),
        };
        let interval = interval
            .ok_or_else(|| site.invalid(Self::NAME, format!("malformed interval '{args}'")))?;
        Ok(Box::new(Self { interval }))
    }
}

impl DataValidator for RangeValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &Ty, value: &Datum) {
        let failure = match (&self.interval, value) {
            (Interval::Integer(b), v) => v.as_i64().filter(|v| !b.contains(*v)).map(|v| format!("{v} is outside {b}")),
            (Interval::Single(b), Datum::Float(v)) => {
                (!b.contains(v.0)).then(|| format!("{} is outside {b}", v.0))
            }
            (Interval::Single(b), v) => v.as_f64()
                .filter(|v| !b.contains(*v as f32))
                .map(|v| format!("{v} is outside {b}")),
            (Interval::Real(b), v) => v.as_f64().filter(|v| !b.contains(*v)).map(|v| format!("{v} is outside {b}")),
        };
        if let Some(message) = failure {
            cx.report(Self::NAME, message);
        }
    }
}
