//! JSON schema descriptor.
//!
//! A convenience front-end over [`SchemaBuilder`]: a document listing enums,
//! beans and tables, with field types written as type expressions:
//!
//! ```text
//! int                      scalar
//! string?                  nullable
//! int#range=[1,100]        tagged
//! list,Item                container, element type follows
//! map,string,int           map, key then value
//! (list#size=3),int        tags on the container itself
//! map,(int#set=1,2),string parenthesized element
//! ```
//!
//! Names are reserved before any field type is parsed, so declaration order
//! does not matter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defs::{BeanDecl, DefEnum, EnumItem, EnumItemValue, Field, Schema, SchemaBuilder, TableDecl, TableMode, TypeRef};
use crate::error::SchemaError;
use crate::ir::{Tags, Ty, TyKind};
use crate::path_de;

static FULL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("static pattern")
});

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaSource {
    pub enums: Vec<EnumSource>,
    pub beans: Vec<BeanSource>,
    pub tables: Vec<TableSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumSource {
    pub name: String,
    #[serde(default)]
    pub flags: bool,
    #[serde(default)]
    pub comment: Option<String>,
    pub items: Vec<EnumItemSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumItemSource {
    pub name: String,
    /// Integer or string. Omitted integers continue from the previous item.
    #[serde(default)]
    pub value: Option<ItemValueSource>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValueSource {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeanSource {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSource {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TableSource {
    pub name: String,
    pub value_type: String,
    #[serde(default = "default_mode")]
    pub mode: TableMode,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_mode() -> TableMode {
    TableMode::Map
}

impl SchemaSource {
    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        path_de::from_str_with_path(src)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, SchemaError> {
        path_de::from_slice_with_path(bytes)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        path_de::from_value_with_path(value)
    }

    /// Lower and resolve into a [`Schema`].
    pub fn build(&self) -> Result<Schema, SchemaError> {
        let mut builder = SchemaBuilder::new();

        for (i, e) in self.enums.iter().enumerate() {
            check_name(&FULL_NAME, &e.name, &format!("enums[{i}].name"))?;
            builder.enum_id(&e.name);
        }
        for (i, b) in self.beans.iter().enumerate() {
            check_name(&FULL_NAME, &b.name, &format!("beans[{i}].name"))?;
            builder.bean_id(&b.name);
        }

        for (i, e) in self.enums.iter().enumerate() {
            builder.add_enum(lower_enum(e, i)?);
        }
        for (i, b) in self.beans.iter().enumerate() {
            let decl = lower_bean(&builder, b, i)?;
            builder.add_bean(decl);
        }
        for t in &self.tables {
            builder.add_table(TableDecl {
                full_name: t.name.clone(),
                value_type: t.value_type.clone(),
                mode: t.mode,
                index: t.index.clone(),
                input_files: t.input_files.clone(),
                comment: t.comment.clone(),
            });
        }

        builder.build()
    }
}

fn check_name(pattern: &Regex, name: &str, path: &str) -> Result<(), SchemaError> {
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::Descriptor {
            path: path.to_owned(),
            message: format!("`{name}` is not a valid name"),
        })
    }
}

fn lower_enum(src: &EnumSource, index: usize) -> Result<DefEnum, SchemaError> {
    let mut next = 0i64;
    let mut items = Vec::with_capacity(src.items.len());
    for (j, item) in src.items.iter().enumerate() {
        check_name(&IDENT, &item.name, &format!("enums[{index}].items[{j}].name"))?;
        let value = match &item.value {
            Some(ItemValueSource::Int(v)) => EnumItemValue::Int(*v),
            Some(ItemValueSource::Str(s)) => match s.trim().parse::<i64>() {
                Ok(v) => EnumItemValue::Int(v),
                Err(_) => EnumItemValue::Str(s.clone()),
            },
            None => EnumItemValue::Int(next),
        };
        if let EnumItemValue::Int(v) = value {
            next = v.saturating_add(1);
        }
        items.push(EnumItem {
            name: item.name.clone(),
            value,
            alias: item.alias.clone(),
            comment: item.comment.clone(),
        });
    }
    Ok(DefEnum {
        full_name: src.name.clone(),
        items,
        is_flags: src.flags,
        comment: src.comment.clone(),
    })
}

fn lower_bean(builder: &SchemaBuilder, src: &BeanSource, index: usize) -> Result<BeanDecl, SchemaError> {
    let ns = src.name.rsplit_once('.').map_or("", |(ns, _)| ns);
    let mut fields = Vec::with_capacity(src.fields.len());
    for (j, f) in src.fields.iter().enumerate() {
        check_name(&IDENT, &f.name, &format!("beans[{index}].fields[{j}].name"))?;
        let context = format!("field `{}.{}`", src.name, f.name);
        let ty = parse_type(&f.ty, &TypeScope { builder, namespace: ns, context: &context })?;
        fields.push(Field {
            name: f.name.clone(),
            alias: f.alias.clone(),
            variants: f.variants.clone(),
            ty,
            tags: f.tags.clone(),
            comment: f.comment.clone(),
        });
    }
    Ok(BeanDecl {
        full_name: src.name.clone(),
        parent: src.parent.clone(),
        alias: src.alias.clone(),
        fields,
        comment: src.comment.clone(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

pub struct TypeScope<'a> {
    pub builder: &'a SchemaBuilder,
    pub namespace: &'a str,
    /// Where the expression appears, for error messages.
    pub context: &'a str,
}

const CONTAINERS: [&str; 4] = ["array", "list", "set", "map"];

/// Parse a type expression. Bean and enum names must already be reserved.
pub fn parse_type(expr: &str, scope: &TypeScope<'_>) -> Result<Ty, SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidTypeExpr { expr: expr.to_owned(), reason: reason.to_owned() };
    let s = expr.trim();
    if s.is_empty() {
        return Err(invalid("empty type"));
    }

    let (head, rest) = if s.starts_with('(') {
        let close = matching_paren(s).ok_or_else(|| invalid("unbalanced parentheses"))?;
        let inner = &s[1..close];
        let after = s[close + 1..].trim_start();
        if after.is_empty() {
            return parse_type(inner, scope);
        }
        let rest = after.strip_prefix(',').ok_or_else(|| invalid("expected `,` after `)`"))?;
        (inner, Some(rest))
    } else {
        let name_end = s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.')).unwrap_or(s.len());
        if CONTAINERS.contains(&&s[..name_end]) {
            match split_top_level(s) {
                Some((head, rest)) => (head, Some(rest)),
                None => return Err(invalid("container is missing its element type")),
            }
        } else {
            (s, None)
        }
    };

    let mut segments = head.split('#');
    let name = segments.next().unwrap_or_default().trim();
    let (name, nullable) = match name.strip_suffix('?') {
        Some(n) => (n.trim_end(), true),
        None => (name, false),
    };
    let mut tags = Tags::new();
    for seg in segments {
        let (k, v) = seg.split_once('=').unwrap_or((seg, ""));
        let k = k.trim();
        if k.is_empty() {
            return Err(invalid("empty tag name"));
        }
        tags.insert(k.to_owned(), v.trim().to_owned());
    }

    let kind = match (name, rest) {
        ("array" | "list" | "set", Some(rest)) => {
            let elem = Box::new(parse_type(rest, scope)?);
            match name {
                "array" => TyKind::Array(elem),
                "list" => TyKind::List(elem),
                _ => TyKind::Set(elem),
            }
        }
        ("map", Some(rest)) => {
            let (k, v) = split_top_level(rest).ok_or_else(|| invalid("map needs a key and a value type"))?;
            TyKind::Map(Box::new(parse_type(k, scope)?), Box::new(parse_type(v, scope)?))
        }
        (_, Some(_)) => return Err(invalid("only containers take element types")),
        (_, None) => scalar_or_named(name, scope)?,
    };

    Ok(Ty { kind, nullable, tags })
}

fn scalar_or_named(name: &str, scope: &TypeScope<'_>) -> Result<TyKind, SchemaError> {
    Ok(match name {
        "bool" => TyKind::Bool,
        "byte" => TyKind::Byte,
        "short" => TyKind::Short,
        "int" => TyKind::Int,
        "long" => TyKind::Long,
        "float" => TyKind::Float,
        "double" => TyKind::Double,
        "string" => TyKind::String,
        "datetime" => TyKind::DateTime,
        "array" | "list" | "set" | "map" => {
            return Err(SchemaError::InvalidTypeExpr {
                expr: name.to_owned(),
                reason: "container is missing its element type".into(),
            });
        }
        _ if !FULL_NAME.is_match(name) => {
            return Err(SchemaError::InvalidTypeExpr {
                expr: name.to_owned(),
                reason: "malformed type name".into(),
            });
        }
        _ => match scope.builder.find_type(name, Some(scope.namespace)) {
            Some(TypeRef::Bean(id)) => TyKind::Bean(id),
            Some(TypeRef::Enum(id)) => TyKind::Enum(id),
            None => {
                return Err(SchemaError::UnknownType {
                    name: name.to_owned(),
                    context: scope.context.to_owned(),
                });
            }
        },
    })
}

/// Split at the first comma outside brackets and parentheses.
fn split_top_level(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => return Some((s[..i].trim(), s[i + 1..].trim())),
            _ => {}
        }
    }
    None
}

/// Byte offset of the `)` closing the `(` at offset 0.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(expr: &str) -> Result<Ty, SchemaError> {
        let mut builder = SchemaBuilder::new();
        builder.bean_id("game.Item");
        builder.enum_id("game.Color");
        parse_type(expr, &TypeScope { builder: &builder, namespace: "game", context: "test" })
    }

    #[test]
    fn scalars_and_tags() {
        let ty = parse("int#range=[1,100]").unwrap();
        assert_eq!(ty.kind, TyKind::Int);
        assert_eq!(ty.tag("range"), Some("[1,100]"));

        let ty = parse("string?").unwrap();
        assert!(ty.nullable);

        let ty = parse("int#set=1,2,3").unwrap();
        assert_eq!(ty.tag("set"), Some("1,2,3"));
    }

    #[test]
    fn containers_nest() {
        let ty = parse("map,string,list,Item?").unwrap();
        let TyKind::Map(k, v) = &ty.kind else { panic!("not a map: {ty:?}") };
        assert_eq!(k.kind, TyKind::String);
        let elem = v.element().unwrap();
        assert!(elem.nullable);
        assert!(matches!(elem.kind, TyKind::Bean(_)));
    }

    #[test]
    fn container_tags_and_parenthesized_elements() {
        let ty = parse("(list#size=3),int#range=[0,9]").unwrap();
        assert_eq!(ty.tag("size"), Some("3"));
        assert_eq!(ty.element().unwrap().tag("range"), Some("[0,9]"));

        let ty = parse("map,(int#set=1,2),Color").unwrap();
        let TyKind::Map(k, v) = &ty.kind else { panic!("not a map: {ty:?}") };
        assert_eq!(k.tag("set"), Some("1,2"));
        assert!(matches!(v.kind, TyKind::Enum(_)));
    }

    #[test]
    fn rejects_bad_expressions() {
        assert!(matches!(parse("list"), Err(SchemaError::InvalidTypeExpr { .. })));
        assert!(matches!(parse("map,int"), Err(SchemaError::InvalidTypeExpr { .. })));
        assert!(matches!(parse("(list,int"), Err(SchemaError::InvalidTypeExpr { .. })));
        assert!(matches!(parse("Nope"), Err(SchemaError::UnknownType { .. })));
        assert!(matches!(parse("int,int"), Err(SchemaError::InvalidTypeExpr { .. })));
    }

    #[test]
    fn descriptor_errors_carry_a_path() {
        let err = SchemaSource::from_json_str(r#"{"beans":[{"name":"A","fields":[{"name":"x"}]}]}"#).unwrap_err();
        let SchemaError::Descriptor { path, .. } = err else { panic!("unexpected {err:?}") };
        assert_eq!(path, "beans[0].fields[0]");
    }

    #[test]
    fn enum_values_auto_increment() {
        let src = SchemaSource::from_json_str(
            r#"{"enums":[{"name":"E","items":[{"name":"A"},{"name":"B","value":10},{"name":"C"},{"name":"D","value":"x"}]}]}"#,
        ).unwrap();
        let schema = src.build().unwrap();
        let e = schema.enum_def(schema.enum_by_name("E").unwrap());
        let values: Vec<_> = e.items.iter().map(|i| i.value.clone()).collect();
        assert_eq!(values, vec![
            EnumItemValue::Int(0),
            EnumItemValue::Int(10),
            EnumItemValue::Int(11),
            EnumItemValue::Str("x".into()),
        ]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let err = SchemaSource::from_json_str(r#"{"beans":[{"name":"bad name"}]}"#).unwrap().build().unwrap_err();
        assert!(matches!(err, SchemaError::Descriptor { ref path, .. } if path == "beans[0].name"));
    }
}
