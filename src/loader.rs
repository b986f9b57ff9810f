//! Data creator: raw JSON nodes → typed values.
//!
//! Implemented as a [`TypeVisitor`] whose per-call context is the raw node.
//! The loader never mutates the schema; a failure is terminal for the record
//! and unwinds with one path frame per enclosing bean field or element.

use serde_json::{Map, Value};

use crate::config::GenOptions;
use crate::defs::{BeanId, EnumId, Field, Schema};
use crate::error::{LoadError, LoadErrorKind, PathFrame};
use crate::ir::{Ty, TyKind};
use crate::value::{BeanValue, Datum, EnumValue, MapValue, parse_datetime};
use crate::visitor::TypeVisitor;

use ordered_float::OrderedFloat;

/// Discriminator key for polymorphic beans.
pub const JSON_TYPE_NAME_KEY: &str = "$type";
/// Accepted when [`JSON_TYPE_NAME_KEY`] is absent.
pub const FALLBACK_TYPE_NAME_KEY: &str = "__type__";

pub struct DataCreator<'s> {
    schema: &'s Schema,
    variant: Option<&'s str>,
}

type LoadResult = Result<Datum, LoadError>;

impl<'s> DataCreator<'s> {
    pub fn new(schema: &'s Schema, options: &'s GenOptions) -> Self {
        Self { schema, variant: options.variant.as_deref() }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn load(&self, ty: &Ty, raw: &Value) -> LoadResult {
        ty.apply(self, raw)
    }

    /// Load one record of bean type `bean`.
    pub fn load_bean(&self, bean: BeanId, raw: &Value) -> Result<BeanValue, LoadError> {
        let obj = raw.as_object().ok_or_else(|| unexpected("object", raw))?;
        let impl_id = self.resolve_impl(bean, obj)?;
        let bean = self.schema.bean(impl_id);

        let mut fields = Vec::with_capacity(bean.hierarchy_fields().len());
        for f in bean.hierarchy_fields() {
            let value = match self.field_node(obj, f) {
                Some(Value::Null) if f.ty.nullable => None,
                Some(Value::Null) => {
                    return Err(LoadError::new(LoadErrorKind::NonNullableFieldIsNull {
                        bean: bean.full_name.clone(),
                        field: f.name.clone(),
                    })
                    .within_field(&bean.full_name, &f.name));
                }
                Some(node) => Some(
                    f.ty.apply(self, node)
                        .map_err(|e| e.within_field(&bean.full_name, &f.name))?,
                ),
                None if f.ty.nullable => None,
                None => {
                    return Err(LoadError::new(LoadErrorKind::RequiredFieldMissing {
                        bean: bean.full_name.clone(),
                        field: f.name.clone(),
                    })
                    .within_field(&bean.full_name, &f.name));
                }
            };
            fields.push(value);
        }
        Ok(BeanValue { bean: impl_id, fields })
    }

    /// Per-variant key first, then the declared name, then the alias.
    fn field_node<'a>(&self, obj: &'a Map<String, Value>, field: &Field) -> Option<&'a Value> {
        if let Some(key) = self.variant.and_then(|v| field.variant_key(v)) {
            if let Some(node) = obj.get(&key) {
                return Some(node);
            }
        }
        obj.get(&field.name)
            .or_else(|| field.alias.as_ref().and_then(|alias| obj.get(alias)))
    }

    fn resolve_impl(&self, def: BeanId, obj: &Map<String, Value>) -> Result<BeanId, LoadError> {
        let bean = self.schema.bean(def);
        if !bean.is_abstract() {
            return Ok(def);
        }
        let missing = || LoadError::new(LoadErrorKind::MissingDiscriminator { bean: bean.full_name.clone() });
        let tag = obj.get(JSON_TYPE_NAME_KEY)
            .or_else(|| obj.get(FALLBACK_TYPE_NAME_KEY))
            .ok_or_else(missing)?;
        let name = tag.as_str().ok_or_else(missing)?;
        self.schema.impl_bean_by_name_or_alias(def, name).ok_or_else(|| {
            LoadError::new(LoadErrorKind::UnknownSubtype {
                bean: bean.full_name.clone(),
                name: name.to_owned(),
            })
        })
    }

    fn read_seq(&self, elem: &Ty, raw: &Value) -> Result<Vec<Datum>, LoadError> {
        let xs = raw.as_array().ok_or_else(|| unexpected("array", raw))?;
        xs.iter()
            .enumerate()
            .map(|(i, x)| elem.apply(self, x).map_err(|e| e.within(PathFrame::Index(i))))
            .collect()
    }

    /// Object-notation keys arrive as property names and are re-read as
    /// literals of the key type.
    fn parse_key(&self, key_ty: &Ty, name: &str) -> LoadResult {
        let node = match key_ty.kind {
            TyKind::String | TyKind::Enum(_) => Value::String(name.to_owned()),
            TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long | TyKind::Float | TyKind::Double => {
                match serde_json::from_str::<Value>(name.trim()) {
                    Ok(n @ Value::Number(_)) => n,
                    _ => {
                        return Err(LoadError::new(LoadErrorKind::MalformedScalar {
                            expected: "numeric map key",
                            found: format!("`{name}`"),
                        }));
                    }
                }
            }
            _ => {
                return Err(LoadError::new(LoadErrorKind::InvalidMapEncoding {
                    reason: "object notation requires a string-compatible key type".into(),
                }));
            }
        };
        key_ty.apply(self, &node)
    }
}

fn describe(raw: &Value) -> String {
    let kind = match raw {
        Value::Null => return "null".into(),
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => return "array".into(),
        Value::Object(_) => return "object".into(),
    };
    format!("{kind} `{raw}`")
}

fn malformed(expected: &'static str, raw: &Value) -> LoadError {
    LoadError::new(LoadErrorKind::MalformedScalar { expected, found: describe(raw) })
}

fn unexpected(expected: &'static str, raw: &Value) -> LoadError {
    LoadError::new(LoadErrorKind::UnexpectedNode { expected, found: describe(raw) })
}

fn integer<T: TryFrom<i64>>(raw: &Value, expected: &'static str) -> Result<T, LoadError> {
    raw.as_i64()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| malformed(expected, raw))
}

impl<'a> TypeVisitor<&'a Value> for DataCreator<'_> {
    type Output = LoadResult;

    fn visit_bool(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        raw.as_bool().map(Datum::Bool).ok_or_else(|| malformed("bool", raw))
    }

    fn visit_byte(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        integer::<u8>(raw, "byte").map(Datum::Byte)
    }

    fn visit_short(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        integer::<i16>(raw, "short").map(Datum::Short)
    }

    fn visit_int(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        integer::<i32>(raw, "int").map(Datum::Int)
    }

    fn visit_long(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        integer::<i64>(raw, "long").map(Datum::Long)
    }

    fn visit_float(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        match raw.as_f64() {
            Some(v) if v.is_finite() && v.abs() <= f64::from(f32::MAX) => {
                Ok(Datum::Float(OrderedFloat(v as f32)))
            }
            _ => Err(malformed("float", raw)),
        }
    }

    fn visit_double(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        raw.as_f64()
            .map(|v| Datum::Double(OrderedFloat(v)))
            .ok_or_else(|| malformed("double", raw))
    }

    fn visit_string(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        raw.as_str()
            .map(|s| Datum::String(s.to_owned()))
            .ok_or_else(|| malformed("string", raw))
    }

    fn visit_datetime(&self, _: &Ty, raw: &'a Value) -> LoadResult {
        let s = raw.as_str().ok_or_else(|| malformed("datetime string", raw))?;
        parse_datetime(s)
            .map(Datum::DateTime)
            .ok_or_else(|| LoadError::new(LoadErrorKind::MalformedDateTime { value: s.to_owned() }))
    }

    fn visit_enum(&self, _: &Ty, def: EnumId, raw: &'a Value) -> LoadResult {
        let enum_def = self.schema.enum_def(def);
        raw.as_str()
            .and_then(|name| enum_def.find_item(name))
            .map(|item| Datum::Enum(EnumValue { def, item }))
            .ok_or_else(|| {
                LoadError::new(LoadErrorKind::UnknownEnumItem {
                    enum_name: enum_def.full_name.clone(),
                    value: raw.as_str().map_or_else(|| raw.to_string(), str::to_owned),
                })
            })
    }

    fn visit_bean(&self, _: &Ty, def: BeanId, raw: &'a Value) -> LoadResult {
        self.load_bean(def, raw).map(Datum::Bean)
    }

    fn visit_array(&self, _: &Ty, elem: &Ty, raw: &'a Value) -> LoadResult {
        self.read_seq(elem, raw).map(Datum::Array)
    }

    fn visit_list(&self, _: &Ty, elem: &Ty, raw: &'a Value) -> LoadResult {
        self.read_seq(elem, raw).map(Datum::List)
    }

    fn visit_set(&self, _: &Ty, elem: &Ty, raw: &'a Value) -> LoadResult {
        self.read_seq(elem, raw).map(Datum::Set)
    }

    fn visit_map(&self, _: &Ty, key_ty: &Ty, value_ty: &Ty, raw: &'a Value) -> LoadResult {
        let mut map = MapValue::new();
        match raw {
            Value::Array(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    let pair = match entry.as_array() {
                        Some(pair) if pair.len() == 2 => pair,
                        _ => {
                            return Err(LoadError::new(LoadErrorKind::InvalidMapEncoding {
                                reason: format!("entry {entry} must be a [key, value] pair"),
                            })
                            .within(PathFrame::Index(i)));
                        }
                    };
                    let in_entry = |e: LoadError| e.within(PathFrame::Index(i));
                    let key = key_ty.apply(self, &pair[0]).map_err(in_entry)?;
                    let value = value_ty.apply(self, &pair[1]).map_err(in_entry)?;
                    if map.try_insert(key, value).is_err() {
                        return Err(LoadError::new(LoadErrorKind::DuplicateMapKey { key: pair[0].to_string() })
                            .within(PathFrame::Index(i)));
                    }
                }
            }
            Value::Object(props) => {
                if !key_ty.is_string_compatible_key() {
                    return Err(LoadError::new(LoadErrorKind::InvalidMapEncoding {
                        reason: format!(
                            "object notation requires a string-compatible key type, found `{}`; use [[key, value], ...]",
                            key_ty.type_name(self.schema)
                        ),
                    }));
                }
                for (name, node) in props {
                    let in_entry = |e: LoadError| e.within(PathFrame::Key(name.clone()));
                    let key = self.parse_key(key_ty, name).map_err(in_entry)?;
                    let value = value_ty.apply(self, node).map_err(in_entry)?;
                    if map.try_insert(key, value).is_err() {
                        return Err(LoadError::new(LoadErrorKind::DuplicateMapKey { key: format!("\"{name}\"") })
                            .within(PathFrame::Key(name.clone())));
                    }
                }
            }
            other => {
                return Err(LoadError::new(LoadErrorKind::InvalidMapEncoding {
                    reason: format!("expected [[key, value], ...] or an object, found {}", describe(other)),
                }));
            }
        }
        Ok(Datum::Map(map))
    }
}
