//! Typed values, one variant per [`TyKind`](crate::ir::TyKind).
//!
//! Values are produced by the loader, never mutated afterwards, and can be
//! exported back to the canonical raw JSON form with [`Datum::to_json`].

use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use indexmap::map::Entry;
use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::defs::{BeanId, EnumId, EnumItemValue, Schema};
use crate::loader::JSON_TYPE_NAME_KEY;

/// Format used when exporting datetimes.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// `%.f` also matches no fraction at all.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datum {
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    String(String),
    DateTime(NaiveDateTime),
    Enum(EnumValue),
    Bean(BeanValue),
    Array(Vec<Datum>),
    List(Vec<Datum>),
    Set(Vec<Datum>),
    Map(MapValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub def: EnumId,
    pub item: usize,
}

/// A bean instance. `fields` is aligned with the hierarchy fields of the
/// concrete bean `bean`; `None` is a null field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanValue {
    pub bean: BeanId,
    pub fields: Vec<Option<Datum>>,
}

/// Insertion-ordered map. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapValue(IndexMap<Datum, Datum>);

impl Hash for MapValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // equality is order-insensitive, so only the size takes part
        self.0.len().hash(state);
    }
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present; the rejected key is handed back.
    pub fn try_insert(&mut self, key: Datum, value: Datum) -> Result<(), Datum> {
        match self.0.entry(key) {
            Entry::Occupied(e) => Err(e.key().clone()),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &Datum) -> Option<&Datum> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Datum, &Datum)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BeanValue {
    /// Field value by name; `Some(None)` is a null field.
    pub fn get<'a>(&'a self, schema: &Schema, name: &str) -> Option<&'a Option<Datum>> {
        let index = schema.bean(self.bean).hierarchy_field_index(name)?;
        self.fields.get(index)
    }
}

impl Datum {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Bool(_) => "bool",
            Datum::Byte(_) => "byte",
            Datum::Short(_) => "short",
            Datum::Int(_) => "int",
            Datum::Long(_) => "long",
            Datum::Float(_) => "float",
            Datum::Double(_) => "double",
            Datum::String(_) => "string",
            Datum::DateTime(_) => "datetime",
            Datum::Enum(_) => "enum",
            Datum::Bean(_) => "bean",
            Datum::Array(_) => "array",
            Datum::List(_) => "list",
            Datum::Set(_) => "set",
            Datum::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Byte(v) => Some(i64::from(*v)),
            Datum::Short(v) => Some(i64::from(*v)),
            Datum::Int(v) => Some(i64::from(*v)),
            Datum::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Float(v) => Some(f64::from(v.0)),
            Datum::Double(v) => Some(v.0),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bean(&self) -> Option<&BeanValue> {
        match self {
            Datum::Bean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumValue> {
        match self {
            Datum::Enum(e) => Some(*e),
            _ => None,
        }
    }

    /// Elements of an array, list or set.
    pub fn as_seq(&self) -> Option<&[Datum]> {
        match self {
            Datum::Array(xs) | Datum::List(xs) | Datum::Set(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Datum::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Canonical raw form: loading the result again yields an equal value.
    pub fn to_json(&self, schema: &Schema) -> Value {
        match self {
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Byte(v) => Value::from(*v),
            Datum::Short(v) => Value::from(*v),
            Datum::Int(v) => Value::from(*v),
            Datum::Long(v) => Value::from(*v),
            // shortest decimal that reloads to the same f32
            Datum::Float(v) => v.0.to_string().parse().map_or(Value::Null, float_json),
            Datum::Double(v) => float_json(v.0),
            Datum::String(s) => Value::String(s.clone()),
            Datum::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            Datum::Enum(e) => {
                let def = schema.enum_def(e.def);
                Value::String(def.items[e.item].name.clone())
            }
            Datum::Bean(b) => bean_json(b, schema),
            Datum::Array(xs) | Datum::List(xs) | Datum::Set(xs) => {
                Value::Array(xs.iter().map(|x| x.to_json(schema)).collect())
            }
            Datum::Map(m) => Value::Array(
                m.iter()
                    .map(|(k, v)| Value::Array(vec![k.to_json(schema), v.to_json(schema)]))
                    .collect(),
            ),
        }
    }
}

impl EnumValue {
    /// Declared value of the item, if integer-valued.
    pub fn int_value(&self, schema: &Schema) -> Option<i64> {
        match schema.enum_def(self.def).items[self.item].value {
            EnumItemValue::Int(v) => Some(v),
            EnumItemValue::Str(_) => None,
        }
    }

    pub fn name<'s>(&self, schema: &'s Schema) -> &'s str {
        &schema.enum_def(self.def).items[self.item].name
    }
}

fn float_json(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn bean_json(b: &BeanValue, schema: &Schema) -> Value {
    let bean = schema.bean(b.bean);
    let mut out = Map::new();
    if bean.parent.is_some() {
        out.insert(JSON_TYPE_NAME_KEY.into(), Value::String(schema.discriminator(bean).to_owned()));
    }
    for (field, value) in bean.hierarchy_fields().iter().zip(&b.fields) {
        let v = value.as_ref().map_or(Value::Null, |v| v.to_json(schema));
        out.insert(field.name.clone(), v);
    }
    Value::Object(out)
}

/// Parse the datetime spellings accepted in raw data.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // hour only, e.g. `2024-05-01 08`
    if let Some((date, hour)) = s.split_once(' ') {
        if !hour.is_empty() && hour.len() <= 2 && hour.bytes().all(|b| b.is_ascii_digit()) {
            let padded = format!("{date} {hour}:00");
            for fmt in DATETIME_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(&padded, fmt) {
                    return Some(dt);
                }
            }
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}
