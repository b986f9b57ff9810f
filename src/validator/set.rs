use crate::defs::EnumId;
use crate::error::SchemaError;
use crate::ir::{Ty, TyKind};
use crate::value::Datum;

use super::{DataValidator, FieldSite, ValidateContext};

#[derive(Debug)]
enum Allowed {
    Integers(Vec<i64>),
    /// `float` values, rounded as loading rounds them.
    Singles(Vec<f32>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
    Items(EnumId, Vec<usize>),
}

/// Value drawn from a fixed list: `set=1,2,3`.
#[derive(Debug)]
pub struct SetValidator {
    allowed: Allowed,
    listing: String,
}

impl SetValidator {
    pub const NAME: &'static str = "set";

    pub fn compile(site: &FieldSite<'_>, ty: &Ty, args: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
        let items: Vec<&str> = args.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        if items.is_empty() {
            return Err(site.invalid(Self::NAME, "no allowed values"));
        }
        let bad = |item: &str| site.invalid(Self::NAME, format!("'{item}' is not a valid {}", ty.type_name(site.schema)));

        let allowed = match &ty.kind {
            TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long => Allowed::Integers(
                items.iter().map(|i| i.parse::<i64>().map_err(|_| bad(i))).collect::<Result<_, _>>()?,
            ),
            TyKind::Float => Allowed::Singles(
                items.iter()
                    .map(|i| i.parse::<f64>().map(|x| x as f32).map_err(|_| bad(i)))
                    .collect::<Result<_, _>>()?,
            ),
            TyKind::Double => Allowed::Floats(
                items.iter().map(|i| i.parse::<f64>().map_err(|_| bad(i))).collect::<Result<_, _>>()?,
            ),
            TyKind::String => Allowed::Strings(items.iter().map(|i| (*i).to_owned()).collect()),
            TyKind::Enum(id) => {
                let def = site.schema.enum_def(*id);
                Allowed::Items(
                    *id,
                    items.iter().map(|i| def.find_item(i).ok_or_else(|| bad(i))).collect::<Result<_, _>>()?,
                )
            }
            _ => return Err(site.unsupported(Self::NAME, ty)),
        };
        Ok(Box::new(Self { allowed, listing: items.join(", ") }))
    }
}

impl DataValidator for SetValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &Ty, value: &Datum) {
        let ok = match (&self.allowed, value) {
            (Allowed::Integers(xs), v) => v.as_i64().is_none_or(|v| xs.contains(&v)),
            (Allowed::Singles(xs), Datum::Float(v)) => xs.contains(&v.0),
            (Allowed::Singles(xs), v) => v.as_f64().is_none_or(|v| xs.contains(&(v as f32))),
            (Allowed::Floats(xs), v) => v.as_f64().is_none_or(|v| xs.contains(&v)),
            (Allowed::Strings(xs), Datum::String(s)) => xs.contains(s),
            (Allowed::Items(def, xs), Datum::Enum(e)) => e.def != *def || xs.contains(&e.item),
            _ => true,
        };
        if !ok {
            cx.report(
                Self::NAME,
                format!("{} is not one of [{}]", value.to_json(cx.schema), self.listing),
            );
        }
    }
}
