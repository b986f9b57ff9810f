//! Draft-07 JSON Schema for the raw data files.
//!
//! Every bean and enum becomes an entry under `definitions`; field types
//! refer to them with `$ref`. Abstract beans become discriminated unions
//! over their concrete descendants, keyed by `$type`.

use serde_json::{json, Map, Value};

use crate::config::JsonSchemaOptions;
use crate::defs::{BeanId, DefBean, DefEnum, DefTable, EnumId, EnumItemValue, Field, Schema};
use crate::ir::{Tags, Ty, TyKind};
use crate::loader::JSON_TYPE_NAME_KEY;
use crate::validator::Bounds;
use crate::visitor::TypeVisitor;

use super::{kebab_case, CodeTarget, OutputFile};

/// Suffix of the standalone-file variant of a bean definition.
pub const DATA_FILE_SUFFIX: &str = "DataFile";

#[derive(Debug, Clone, Default)]
pub struct JsonSchemaTarget {
    pub options: JsonSchemaOptions,
}

impl JsonSchemaTarget {
    pub fn new(options: JsonSchemaOptions) -> Self {
        Self { options }
    }

    /// The main schema document.
    pub fn build_document(&self, schema: &Schema) -> Value {
        let mut definitions = Map::new();

        for (_, e) in schema.enums() {
            definitions.insert(e.full_name.clone(), enum_schema(e));
        }

        let table_types: Vec<BeanId> = schema.tables().iter().map(|t| t.value_type).collect();
        for (id, bean) in schema.beans() {
            definitions.insert(bean.full_name.clone(), bean_schema(schema, bean));

            if !self.options.generate_file_variants {
                continue;
            }
            let variants: Vec<BeanId> = if bean.is_abstract() {
                bean.concrete_descendants().to_vec()
            } else if bean.parent.is_some() || table_types.contains(&id) {
                vec![id]
            } else {
                Vec::new()
            };
            for v in variants {
                let def = schema.bean(v);
                definitions.insert(format!("{}{DATA_FILE_SUFFIX}", def.full_name), file_variant_schema(schema, def));
            }
            // wrapper schemas of polymorphic tables point here
            if bean.is_abstract() && table_types.contains(&id) {
                let arms: Vec<Value> = bean.concrete_descendants().iter()
                    .map(|&c| definition_ref(&format!("{}{DATA_FILE_SUFFIX}", schema.bean(c).full_name)))
                    .collect();
                definitions.insert(format!("{}{DATA_FILE_SUFFIX}", bean.full_name), json!({ "anyOf": arms }));
            }
        }

        let mut tables = Map::new();
        for t in schema.tables() {
            tables.insert(t.full_name.clone(), table_meta(schema, t));
        }

        json!({
            "$schema": self.options.draft,
            "$id": self.options.schema_id,
            "definitions": definitions,
            "tables": tables,
        })
    }

    /// Schema for one data file of `table`, pointing back into the main document.
    pub fn wrapper_schema(&self, schema: &Schema, table: &DefTable) -> Value {
        let bean = schema.bean(table.value_type);
        json!({
            "$schema": self.options.draft,
            "$ref": format!("../{}#/definitions/{}{DATA_FILE_SUFFIX}", self.options.output_file, bean.full_name),
        })
    }
}

impl CodeTarget for JsonSchemaTarget {
    fn name(&self) -> &'static str {
        "json-schema"
    }

    fn generate(&self, schema: &Schema) -> Vec<OutputFile> {
        let mut files = vec![OutputFile::new(
            self.options.output_file.clone(),
            format!("{:#}", self.build_document(schema)),
        )];
        if self.options.generate_file_variants {
            for table in schema.tables() {
                let bean = schema.bean(table.value_type);
                files.push(OutputFile::new(
                    format!("definitions/{}.schema.json", kebab_case(bean.name())),
                    format!("{:#}", self.wrapper_schema(schema, table)),
                ));
            }
        }
        tracing::debug!(files = files.len(), "json schema generated");
        files
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub struct JsonSchemaTypeVisitor<'s> {
    pub schema: &'s Schema,
}

impl JsonSchemaTypeVisitor<'_> {
    fn finish(&self, ty: &Ty, mut o: Value) -> Value {
        apply_tags(&mut o, &ty.tags, ty);
        if ty.nullable { wrap_nullable(o) } else { o }
    }

    fn seq(&self, ty: &Ty, elem: &Ty, unique: bool) -> Value {
        let mut o = json!({ "type": "array", "items": elem.apply(self, ()) });
        if unique {
            o["uniqueItems"] = Value::from(true);
        }
        self.finish(ty, o)
    }
}

fn definition_ref(full_name: &str) -> Value {
    json!({ "$ref": format!("#/definitions/{full_name}") })
}

impl TypeVisitor<()> for JsonSchemaTypeVisitor<'_> {
    type Output = Value;

    fn visit_bool(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "boolean" }))
    }

    fn visit_byte(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "integer", "minimum": 0, "maximum": 255 }))
    }

    fn visit_short(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "integer", "minimum": i16::MIN, "maximum": i16::MAX }))
    }

    fn visit_int(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "integer" }))
    }

    fn visit_long(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "integer" }))
    }

    fn visit_float(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "number" }))
    }

    fn visit_double(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "number" }))
    }

    fn visit_string(&self, ty: &Ty, _: ()) -> Value {
        self.finish(ty, json!({ "type": "string" }))
    }

    fn visit_datetime(&self, ty: &Ty, _: ()) -> Value {
        // not RFC 3339, so no `format`
        self.finish(ty, json!({ "type": "string", "x-format": "datetime" }))
    }

    fn visit_enum(&self, ty: &Ty, def: EnumId, _: ()) -> Value {
        self.finish(ty, definition_ref(&self.schema.enum_def(def).full_name))
    }

    fn visit_bean(&self, ty: &Ty, def: BeanId, _: ()) -> Value {
        self.finish(ty, definition_ref(&self.schema.bean(def).full_name))
    }

    fn visit_array(&self, ty: &Ty, elem: &Ty, _: ()) -> Value {
        self.seq(ty, elem, false)
    }

    fn visit_list(&self, ty: &Ty, elem: &Ty, _: ()) -> Value {
        self.seq(ty, elem, false)
    }

    fn visit_set(&self, ty: &Ty, elem: &Ty, _: ()) -> Value {
        self.seq(ty, elem, true)
    }

    fn visit_map(&self, ty: &Ty, key: &Ty, value: &Ty, _: ()) -> Value {
        let value_schema = value.apply(self, ());
        let o = if key.is_string_compatible_key() {
            let mut o = json!({
                "type": "object",
                "additionalProperties": value_schema,
                "x-key-type": key_type_name(self.schema, key),
            });
            if key.is_integer() {
                o["propertyNames"] = json!({ "pattern": "^-?[0-9]+$" });
            }
            o
        } else {
            // only the pair notation can carry these keys
            json!({
                "type": "array",
                "items": {
                    "type": "array",
                    "items": [key.apply(self, ()), value_schema],
                    "minItems": 2,
                    "maxItems": 2,
                },
            })
        };
        self.finish(ty, o)
    }
}

fn key_type_name(schema: &Schema, key: &Ty) -> String {
    match &key.kind {
        TyKind::Bool => "boolean".into(),
        TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long => "integer".into(),
        TyKind::Float | TyKind::Double => "number".into(),
        TyKind::Enum(id) => schema.enum_def(*id).full_name.clone(),
        _ => "string".into(),
    }
}

fn wrap_nullable(mut o: Value) -> Value {
    if let Some(Value::String(t)) = o.get("type").cloned() {
        o["type"] = json!([t, "null"]);
        if let Some(Value::Array(values)) = o.get_mut("enum") {
            values.push(Value::Null);
        }
        return o;
    }
    json!({ "oneOf": [o, { "type": "null" }] })
}

/// Translate the tags the target understands into schema keywords.
fn apply_tags(o: &mut Value, tags: &Tags, ty: &Ty) {
    for (key, args) in tags {
        match key.as_str() {
            "range" => {
                let Some(b) = Bounds::parse(args) else { continue };
                if let Some(m) = b.min {
                    o[if b.min_inclusive { "minimum" } else { "exclusiveMinimum" }] = json!(m);
                }
                if let Some(m) = b.max {
                    o[if b.max_inclusive { "maximum" } else { "exclusiveMaximum" }] = json!(m);
                }
            }
            "size" => {
                let Some(b) = Bounds::parse(args) else { continue };
                let (min_key, max_key) = match &ty.kind {
                    TyKind::String => ("minLength", "maxLength"),
                    TyKind::Map(..) if o["type"] == "object" => ("minProperties", "maxProperties"),
                    TyKind::Array(_) | TyKind::List(_) | TyKind::Set(_) | TyKind::Map(..) => ("minItems", "maxItems"),
                    _ => continue,
                };
                let (min, max) = size_bounds(&b);
                if let Some(m) = min {
                    o[min_key] = json!(m);
                }
                if let Some(m) = max {
                    o[max_key] = json!(m);
                }
            }
            "regex" => match &ty.kind {
                TyKind::String => o["pattern"] = json!(args),
                TyKind::Array(_) | TyKind::List(_) | TyKind::Set(_) => {
                    if let Some(items) = o.get_mut("items") {
                        items["pattern"] = json!(args);
                    }
                }
                _ => {}
            },
            "set" => {
                let items = args.split(',').map(str::trim).filter(|s| !s.is_empty());
                let values: Option<Vec<Value>> = match &ty.kind {
                    TyKind::String => Some(items.map(Value::from).collect()),
                    TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long => {
                        items.map(|s| s.parse::<i64>().ok().map(Value::from)).collect()
                    }
                    TyKind::Float | TyKind::Double => {
                        items.map(|s| s.parse::<f64>().ok().map(Value::from)).collect()
                    }
                    _ => None,
                };
                if let Some(values) = values {
                    o["enum"] = Value::Array(values);
                }
            }
            "ref" => o["x-ref"] = json!(args),
            "path" => o["x-path"] = json!(args),
            _ => {}
        }
    }
}

/// Integer length bounds covered by `b`.
fn size_bounds(b: &Bounds) -> (Option<u64>, Option<u64>) {
    let min = b.min.map(|m| {
        let m = if b.min_inclusive { m.ceil() } else { m.floor() + 1.0 };
        m.max(0.0) as u64
    });
    let max = b.max.map(|m| {
        let m = if b.max_inclusive { m.floor() } else { m.ceil() - 1.0 };
        m.max(0.0) as u64
    });
    (min, max)
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITIONS
// ————————————————————————————————————————————————————————————————————————————

fn enum_schema(e: &DefEnum) -> Value {
    let mut accepted = Vec::new();
    let mut values = Vec::new();
    let mut items = Vec::new();
    for item in &e.items {
        accepted.push(Value::from(item.name.clone()));
        if let Some(alias) = &item.alias {
            accepted.push(Value::from(alias.clone()));
        }
        let value = match &item.value {
            EnumItemValue::Int(v) => Value::from(*v),
            EnumItemValue::Str(s) => Value::from(s.clone()),
        };
        values.push(value.clone());

        let mut o = json!({ "name": item.name, "value": value });
        if let Some(alias) = &item.alias {
            o["alias"] = json!(alias);
        }
        if let Some(comment) = item.comment.as_deref().filter(|c| !c.is_empty()) {
            o["comment"] = json!(comment);
        }
        items.push(o);
    }

    let mut o = json!({
        "type": "string",
        "enum": accepted,
        "x-enum": e.full_name,
        "x-enum-values": values,
        "x-enum-items": items,
    });
    if e.is_flags {
        o["x-flags"] = Value::from(true);
    }
    if let Some(comment) = e.comment.as_deref().filter(|c| !c.is_empty()) {
        o["description"] = json!(comment);
    }
    o
}

fn field_schema(schema: &Schema, field: &Field) -> Value {
    let mut o = field.ty.apply(&JsonSchemaTypeVisitor { schema }, ());
    apply_tags(&mut o, &field.tags, &field.ty);
    if let Some(comment) = field.comment.as_deref().filter(|c| !c.is_empty()) {
        o["description"] = json!(comment);
    }
    o
}

#[derive(Default)]
struct Required {
    names: Vec<Value>,
    /// One `anyOf` per required field that has more than one accepted key.
    either: Vec<Value>,
}

/// Properties and required keys for the hierarchy fields of `bean`.
/// Aliases and variant keys are accepted spellings of the same field.
fn field_properties(schema: &Schema, bean: &DefBean, properties: &mut Map<String, Value>, required: &mut Required) {
    for field in bean.hierarchy_fields() {
        let o = field_schema(schema, field);
        let mut spellings = vec![field.name.clone()];
        spellings.extend(field.variants.iter().map(|v| format!("{}@{v}", field.name)));
        spellings.extend(field.alias.iter().cloned());
        for key in &spellings[1..] {
            properties.insert(key.clone(), o.clone());
        }
        properties.insert(field.name.clone(), o);
        if field.ty.nullable {
            continue;
        }
        if spellings.len() == 1 {
            required.names.push(Value::from(field.name.clone()));
        } else {
            let arms: Vec<Value> = spellings.iter().map(|k| json!({ "required": [k] })).collect();
            required.either.push(json!({ "anyOf": arms }));
        }
    }
}

fn bean_schema(schema: &Schema, bean: &DefBean) -> Value {
    if bean.is_abstract() {
        polymorphic_bean_schema(schema, bean)
    } else {
        concrete_bean_schema(schema, bean)
    }
}

fn concrete_bean_schema(schema: &Schema, bean: &DefBean) -> Value {
    let mut properties = Map::new();
    let mut required = Required::default();
    if bean.parent.is_some() {
        properties.insert(JSON_TYPE_NAME_KEY.into(), json!({ "const": schema.discriminator(bean) }));
        required.names.push(Value::from(JSON_TYPE_NAME_KEY));
    }
    field_properties(schema, bean, &mut properties, &mut required);
    object_schema(properties, required, bean.comment.as_deref())
}

fn polymorphic_bean_schema(schema: &Schema, bean: &DefBean) -> Value {
    let concrete = bean.concrete_descendants().iter().map(|&id| schema.bean(id));
    let names: Vec<&str> = concrete.clone().map(|child| schema.discriminator(child)).collect();
    let arms: Vec<Value> = concrete
        .map(|child| {
            json!({
                "if": {
                    "properties": { JSON_TYPE_NAME_KEY: { "const": schema.discriminator(child) } },
                    "required": [JSON_TYPE_NAME_KEY],
                },
                "then": definition_ref(&child.full_name),
            })
        })
        .collect();

    let mut o = json!({
        "type": "object",
        "properties": {
            JSON_TYPE_NAME_KEY: {
                "type": "string",
                "enum": names,
                "description": format!("Type discriminator for {}", bean.name()),
            },
        },
        "required": [JSON_TYPE_NAME_KEY],
        "allOf": arms,
        "discriminator": { "propertyName": JSON_TYPE_NAME_KEY },
    });
    if let Some(comment) = bean.comment.as_deref().filter(|c| !c.is_empty()) {
        o["description"] = json!(comment);
    }
    o
}

/// Standalone-file form: no discriminator, `$schema` allowed.
fn file_variant_schema(schema: &Schema, bean: &DefBean) -> Value {
    let mut properties = Map::new();
    let mut required = Required::default();
    properties.insert(
        "$schema".into(),
        json!({ "type": "string", "description": "JSON Schema reference for editor support" }),
    );
    field_properties(schema, bean, &mut properties, &mut required);
    let description = format!("Standalone file variant of {}", bean.name());
    object_schema(properties, required, Some(&description))
}

fn object_schema(properties: Map<String, Value>, required: Required, description: Option<&str>) -> Value {
    let mut o = json!({ "type": "object", "properties": properties });
    if !required.names.is_empty() {
        o["required"] = Value::Array(required.names);
    }
    if !required.either.is_empty() {
        o["allOf"] = Value::Array(required.either);
    }
    o["additionalProperties"] = Value::from(false);
    if let Some(d) = description.filter(|d| !d.is_empty()) {
        o["description"] = json!(d);
    }
    o
}

fn table_meta(schema: &Schema, table: &DefTable) -> Value {
    let mut o = json!({
        "valueType": schema.bean(table.value_type).full_name,
        "mode": table.mode.as_str(),
    });
    if let Some(index) = &table.index {
        o["index"] = json!(index);
    }
    if !table.input_files.is_empty() {
        o["inputFiles"] = json!(table.input_files);
    }
    if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
        o["comment"] = json!(comment);
    }
    o
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{BeanDecl, SchemaBuilder};

    fn schema_with(field: Field) -> Schema {
        let mut b = SchemaBuilder::new();
        b.add_bean(BeanDecl { full_name: "T".into(), fields: vec![field], ..BeanDecl::default() });
        b.build().unwrap()
    }

    #[test]
    fn range_and_nullable() {
        let schema = schema_with(Field::new("x", Ty::int().with_tag("range", "(0,10]").nullable()));
        let o = field_schema(&schema, &schema.bean(BeanId(0)).hierarchy_fields()[0]);
        assert_eq!(o, json!({ "type": ["integer", "null"], "exclusiveMinimum": 0.0, "maximum": 10.0 }));
    }

    #[test]
    fn size_on_strings_and_lists() {
        let schema = schema_with(Field::new("s", Ty::string().with_tag("size", "[1,8]")));
        let o = field_schema(&schema, &schema.bean(BeanId(0)).hierarchy_fields()[0]);
        assert_eq!(o["minLength"], 1);
        assert_eq!(o["maxLength"], 8);

        let schema = schema_with(Field::new("xs", Ty::list(Ty::int()).with_tag("size", "3")));
        let o = field_schema(&schema, &schema.bean(BeanId(0)).hierarchy_fields()[0]);
        assert_eq!((o["minItems"].clone(), o["maxItems"].clone()), (json!(3), json!(3)));
    }

    #[test]
    fn element_tags_land_on_items() {
        let schema = schema_with(Field::new("xs", Ty::set(Ty::string().with_tag("regex", "^[a-z]+$"))));
        let o = field_schema(&schema, &schema.bean(BeanId(0)).hierarchy_fields()[0]);
        assert_eq!(o["uniqueItems"], true);
        assert_eq!(o["items"]["pattern"], "^[a-z]+$");
    }

    #[test]
    fn exclusive_size_bounds_round_inward() {
        let b = Bounds::parse("(1,5)").unwrap();
        assert_eq!(size_bounds(&b), (Some(2), Some(4)));
    }
}
