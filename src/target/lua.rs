//! Lua deserializers over exported data.
//!
//! The generated module exposes `InitTypes(methods)`, which returns the bean
//! deserializers, enum tables and table metadata. Collection readers come
//! from the host through `methods`; scalar readers are plain identities.

use std::fmt::Write as _;

use crate::config::LuaOptions;
use crate::defs::{BeanId, DefBean, EnumId, EnumItemValue, Field, Schema};
use crate::ir::Ty;
use crate::loader::{FALLBACK_TYPE_NAME_KEY, JSON_TYPE_NAME_KEY};
use crate::visitor::TypeVisitor;

use super::{CodeTarget, OutputFile};

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

#[derive(Debug, Clone, Default)]
pub struct LuaTarget {
    pub options: LuaOptions,
}

impl LuaTarget {
    pub fn new(options: LuaOptions) -> Self {
        Self { options }
    }

    pub fn render_module(&self, schema: &Schema) -> String {
        let mut out = String::new();
        out.push_str(PRELUDE);

        out.push_str("\n    local enums = {\n");
        for (_, e) in schema.enums() {
            let _ = writeln!(out, "        [{}] = {{", lua_string(&e.full_name));
            for item in &e.items {
                let value = match &item.value {
                    EnumItemValue::Int(v) => v.to_string(),
                    EnumItemValue::Str(s) => lua_string(s),
                };
                let _ = writeln!(out, "            {} = {value},", table_key(&item.name));
            }
            out.push_str("        },\n");
        }
        out.push_str("    }\n\n    local beans = {}\n");

        for (id, bean) in schema.beans() {
            out.push_str(&self.render_bean(schema, id, bean));
        }

        out.push_str("\n    local tables = {\n");
        for t in schema.tables() {
            let mut entry = format!(
                "name = {}, file = {}, mode = {}, value_type = {}",
                lua_string(t.name()),
                lua_string(&t.name().to_lowercase()),
                lua_string(t.mode.as_str()),
                lua_string(&schema.bean(t.value_type).full_name),
            );
            if let Some(index) = &t.index {
                let _ = write!(entry, ", index = {}", lua_string(index));
            }
            let _ = writeln!(out, "        {{ {entry} }},");
        }
        out.push_str("    }\n\n    return { enums = enums, beans = beans, tables = tables }\nend\n\nreturn { InitTypes = InitTypes }\n");
        out
    }

    fn render_bean(&self, schema: &Schema, id: BeanId, bean: &DefBean) -> String {
        let mut out = String::new();
        let name = lua_string(&bean.full_name);
        let _ = writeln!(out, "\n    do");
        let _ = writeln!(out, "        local class = {{ _name = {name}, _type_ = {} }}", lua_string(bean.name()));
        out.push_str("        class.__index = class\n");

        if bean.is_abstract() {
            out.push_str("        local _subtypes = {\n");
            for &child in bean.concrete_descendants() {
                let def = schema.bean(child);
                let target = lua_string(&def.full_name);
                let short = schema.discriminator(def);
                let full = (short != def.full_name).then_some(def.full_name.as_str());
                for spelling in [Some(short), full, def.alias.as_deref()].into_iter().flatten() {
                    let _ = writeln!(out, "            [{}] = {target},", lua_string(spelling));
                }
            }
            out.push_str("        }\n");
            let _ = writeln!(
                out,
                "        class._deserialize = function(data)\n            local t = data[{}] or data[{}]\n            local sub = _subtypes[t]\n            if sub == nil then error('unknown subtype ' .. tostring(t) .. ' of ' .. {name}) end\n            return beans[sub]._deserialize(data)\n        end",
                lua_string(JSON_TYPE_NAME_KEY),
                lua_string(FALLBACK_TYPE_NAME_KEY),
            );
        } else {
            out.push_str("        class._deserialize = function(data)\n            local o = setmetatable({}, class)\n");
            for field in bean.hierarchy_fields() {
                out.push_str(&self.render_field(schema, field));
            }
            out.push_str("            return o\n        end\n");
        }
        let _ = writeln!(out, "        beans[{name}] = class");
        out.push_str("    end\n");
        tracing::trace!(bean = %bean.full_name, id = id.index(), "lua bean rendered");
        out
    }

    fn render_field(&self, schema: &Schema, field: &Field) -> String {
        let src = member("data", &field.name);
        let dst = member("o", &field.name);
        let visitor = LuaDeserializeVisitor {
            schema,
            field: Some(field),
            factory_tag: &self.options.object_factory_tag,
        };
        let expr = field.ty.apply(&visitor, src.as_str());
        if field.ty.nullable {
            format!("            if {src} ~= nil then {dst} = {expr} end\n")
        } else {
            format!("            {dst} = {expr}\n")
        }
    }
}

impl CodeTarget for LuaTarget {
    fn name(&self) -> &'static str {
        "lua-bin"
    }

    fn generate(&self, schema: &Schema) -> Vec<OutputFile> {
        let lua_file = self.options.output_file.clone();
        let dts_file = match lua_file.strip_suffix(".lua") {
            Some(stem) => format!("{stem}.d.ts"),
            None => format!("{lua_file}.d.ts"),
        };
        vec![
            OutputFile::new(lua_file, self.render_module(schema)),
            OutputFile::new(dts_file, SCHEMA_DTS),
        ]
    }
}

fn lua_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn is_plain_name(name: &str) -> bool {
    !LUA_KEYWORDS.contains(&name)
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `obj.name`, or `obj['name']` when `name` is not a plain identifier.
fn member(obj: &str, name: &str) -> String {
    if is_plain_name(name) { format!("{obj}.{name}") } else { format!("{obj}[{}]", lua_string(name)) }
}

fn table_key(name: &str) -> String {
    if is_plain_name(name) { name.to_owned() } else { format!("[{}]", lua_string(name)) }
}

// ————————————————————————————————————————————————————————————————————————————
// VISITORS
// ————————————————————————————————————————————————————————————————————————————

/// A callable that deserializes one value: a reader name, a bean
/// deserializer, or an inline function for nested collections.
pub struct LuaMethodNameVisitor<'s> {
    pub schema: &'s Schema,
}

impl TypeVisitor<()> for LuaMethodNameVisitor<'_> {
    type Output = String;

    fn visit_bool(&self, _: &Ty, _: ()) -> String { "readBool".into() }
    fn visit_byte(&self, _: &Ty, _: ()) -> String { "readByte".into() }
    fn visit_short(&self, _: &Ty, _: ()) -> String { "readShort".into() }
    fn visit_int(&self, _: &Ty, _: ()) -> String { "readInt".into() }
    fn visit_long(&self, _: &Ty, _: ()) -> String { "readLong".into() }
    fn visit_float(&self, _: &Ty, _: ()) -> String { "readFloat".into() }
    fn visit_double(&self, _: &Ty, _: ()) -> String { "readDouble".into() }
    fn visit_string(&self, _: &Ty, _: ()) -> String { "readString".into() }
    fn visit_datetime(&self, _: &Ty, _: ()) -> String { "readDateTime".into() }

    fn visit_enum(&self, _: &Ty, _: EnumId, _: ()) -> String {
        "readEnum".into()
    }

    fn visit_bean(&self, _: &Ty, def: BeanId, _: ()) -> String {
        format!("beans[{}]._deserialize", lua_string(&self.schema.bean(def).full_name))
    }

    fn visit_array(&self, _: &Ty, elem: &Ty, _: ()) -> String {
        format!("function(_x_) return readArray(_x_, {}) end", elem.apply(self, ()))
    }

    fn visit_list(&self, _: &Ty, elem: &Ty, _: ()) -> String {
        format!("function(_x_) return readList(_x_, {}) end", elem.apply(self, ()))
    }

    fn visit_set(&self, _: &Ty, elem: &Ty, _: ()) -> String {
        format!("function(_x_) return readSet(_x_, {}) end", elem.apply(self, ()))
    }

    fn visit_map(&self, _: &Ty, _: &Ty, value: &Ty, _: ()) -> String {
        format!("function(_x_) return readMap(_x_, {}) end", value.apply(self, ()))
    }
}

/// Expression deserializing the raw value `x`.
pub struct LuaDeserializeVisitor<'a> {
    pub schema: &'a Schema,
    /// Field being read; its tags switch collection readers to factory mode.
    pub field: Option<&'a Field>,
    pub factory_tag: &'a str,
}

impl LuaDeserializeVisitor<'_> {
    fn call(&self, ty: &Ty, x: &str) -> String {
        let method = ty.apply(&LuaMethodNameVisitor { schema: self.schema }, ());
        format!("{method}({x})")
    }

    fn collection(&self, reader: &str, elem: &Ty, x: &str) -> String {
        let deserializer = elem.apply(&LuaMethodNameVisitor { schema: self.schema }, ());
        let factory = self.field.is_some_and(|f| f.has_tag(self.factory_tag));
        if factory {
            format!("{reader}({x}, {deserializer}, true)")
        } else {
            format!("{reader}({x}, {deserializer})")
        }
    }
}

impl<'x> TypeVisitor<&'x str> for LuaDeserializeVisitor<'_> {
    type Output = String;

    fn visit_bool(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_byte(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_short(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_int(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_long(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_float(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_double(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_string(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_datetime(&self, ty: &Ty, x: &'x str) -> String { self.call(ty, x) }
    fn visit_enum(&self, ty: &Ty, _: EnumId, x: &'x str) -> String { self.call(ty, x) }

    fn visit_bean(&self, _: &Ty, def: BeanId, x: &'x str) -> String {
        format!("beans[{}]._deserialize({x})", lua_string(&self.schema.bean(def).full_name))
    }

    fn visit_array(&self, _: &Ty, elem: &Ty, x: &'x str) -> String {
        self.collection("readArray", elem, x)
    }

    fn visit_list(&self, _: &Ty, elem: &Ty, x: &'x str) -> String {
        self.collection("readList", elem, x)
    }

    fn visit_set(&self, _: &Ty, elem: &Ty, x: &'x str) -> String {
        self.collection("readSet", elem, x)
    }

    fn visit_map(&self, _: &Ty, _: &Ty, value: &Ty, x: &'x str) -> String {
        let deserializer = value.apply(&LuaMethodNameVisitor { schema: self.schema }, ());
        format!("readMap({x}, {deserializer})")
    }
}

const PRELUDE: &str = "\
local function InitTypes(methods)
    local readList = methods.readList
    local readArray = methods.readArray or methods.readList
    local readSet = methods.readSet
    local readMap = methods.readMap

    local function readBool(x) return x end
    local function readByte(x) return x end
    local function readShort(x) return x end
    local function readInt(x) return x end
    local function readLong(x) return x end
    local function readFloat(x) return x end
    local function readDouble(x) return x end
    local function readString(x) return x end
    local function readDateTime(x) return x end
    local function readEnum(x) return x end
";

const SCHEMA_DTS: &str = r#"type deserializer = (item: unknown) => unknown

export interface Methods {
    readList: (cfg: Array<unknown>, deserializer: deserializer, factory?: boolean) => object,
    readArray?: (cfg: Array<unknown>, deserializer: deserializer, factory?: boolean) => object,
    readSet: (cfg: Array<unknown>, deserializer: deserializer, factory?: boolean) => object,
    readMap: (cfg: Array<[unknown, unknown]> | Record<string, unknown>, deserializer: deserializer) => object,
}

export interface TableMeta {
    name: string;
    file: string;
    mode: "map" | "list" | "one" | "singleton" | "single" | "array";
    index?: string;
    value_type: string;
}

export interface DeserializerBean {
    _deserialize: (data: unknown) => unknown
}

export function InitTypes(methods: Methods): {
    enums: Record<string, Record<string, number | string>>,
    beans: Record<string, DeserializerBean>,
    tables: TableMeta[],
}
"#;
