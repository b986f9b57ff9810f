mod common;

use beanforge::config::{JsonSchemaOptions, LuaOptions};
use beanforge::target::{JsonSchemaTarget, LuaTarget};
use beanforge::CodeTarget;
use serde_json::{Value, json};

use common::game_schema;

fn document() -> Value {
    JsonSchemaTarget::new(JsonSchemaOptions::default()).build_document(&game_schema())
}

#[test]
fn document_header_and_tables() {
    let doc = document();
    assert_eq!(doc["$schema"], "http://json-schema.org/draft-07/schema#");
    assert_eq!(doc["$id"], "beanforge-schema");
    assert_eq!(
        doc["tables"]["game.TbItem"],
        json!({ "valueType": "game.Item", "mode": "map", "index": "id", "inputFiles": ["*@items.json"] })
    );
    assert_eq!(doc["tables"]["game.TbGlobal"]["comment"], "Global constants");
}

#[test]
fn enums_accept_names_and_aliases() {
    let doc = document();
    let color = &doc["definitions"]["game.Color"];
    assert_eq!(color["type"], "string");
    assert_eq!(color["enum"], json!(["Red", "Green", "Blue", "b"]));
    assert_eq!(color["x-enum-values"], json!([0, 1, 2]));
    assert_eq!(doc["definitions"]["game.Perm"]["x-flags"], true);
    assert_eq!(doc["definitions"]["game.Perm"]["x-enum-values"], json!([1, 2]));
}

#[test]
fn concrete_subtypes_require_their_discriminator() {
    let doc = document();
    let circle = &doc["definitions"]["game.Circle"];
    assert_eq!(circle["properties"]["$type"], json!({ "const": "Circle" }));
    assert_eq!(circle["required"], json!(["$type", "id", "radius"]));
    assert_eq!(circle["additionalProperties"], false);

    // root beans carry no discriminator
    let point = &doc["definitions"]["game.Point"];
    assert!(point["properties"].get("$type").is_none());
    assert_eq!(point["properties"]["c"], json!({ "$ref": "#/definitions/game.Color" }));
}

#[test]
fn abstract_beans_become_discriminated_unions() {
    let doc = document();
    let shape = &doc["definitions"]["game.Shape"];
    assert_eq!(shape["properties"]["$type"]["enum"], json!(["Circle", "Square", "Triangle"]));
    assert_eq!(shape["required"], json!(["$type"]));
    assert_eq!(shape["discriminator"]["propertyName"], "$type");

    let arms = shape["allOf"].as_array().unwrap();
    assert_eq!(arms.len(), 3);
    assert_eq!(arms[1]["if"]["properties"]["$type"]["const"], "Square");
    assert_eq!(arms[1]["then"]["$ref"], "#/definitions/game.Square");

    let polygon = &doc["definitions"]["game.Polygon"];
    assert_eq!(polygon["properties"]["$type"]["enum"], json!(["Square", "Triangle"]));
}

#[test]
fn item_fields() {
    let doc = document();
    let item = &doc["definitions"]["game.Item"];
    let props = &item["properties"];

    assert_eq!(item["description"], "An inventory item");
    assert_eq!(props["id"]["minimum"].as_f64(), Some(1.0));
    assert_eq!(props["id"]["maximum"].as_f64(), Some(1000.0));
    assert_eq!(props["name"]["maxLength"], 16);
    assert_eq!(props["name@en"], props["name"]);
    assert_eq!(props["label"], props["tag"]);
    assert_eq!(props["tag"]["type"], json!(["string", "null"]));
    assert_eq!(props["created"], json!({ "type": "string", "x-format": "datetime" }));
    assert_eq!(
        props["tint"],
        json!({ "oneOf": [{ "$ref": "#/definitions/game.Color" }, { "type": "null" }] })
    );
    assert_eq!(props["drops"]["items"]["$ref"], "#/definitions/game.Drop");
    assert_eq!(props["counts"]["type"], "object");
    assert_eq!(props["counts"]["x-key-type"], "string");
    assert_eq!(props["counts"]["additionalProperties"]["maximum"].as_f64(), Some(99.0));

    let required: Vec<&str> = item["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(required, ["id", "created", "shape", "drops", "counts", "kind"]);
    // a field with several accepted keys needs any one of them
    assert_eq!(
        item["allOf"],
        json!([{ "anyOf": [{ "required": ["name"] }, { "required": ["name@en"] }] }])
    );
}

#[test]
fn required_aliases_satisfy_the_schema() {
    let schema = beanforge::SchemaSource::from_json_value(json!({
        "beans": [{ "name": "t.Hero", "fields": [
            { "name": "hp", "type": "int", "alias": "health" },
            { "name": "mp", "type": "int" }
        ] }]
    }))
    .unwrap()
    .build()
    .unwrap();
    let doc = JsonSchemaTarget::new(JsonSchemaOptions::default()).build_document(&schema);
    let hero = &doc["definitions"]["t.Hero"];
    assert_eq!(hero["required"], json!(["mp"]));
    assert_eq!(hero["allOf"], json!([{ "anyOf": [{ "required": ["hp"] }, { "required": ["health"] }] }]));
    assert_eq!(hero["properties"]["health"], hero["properties"]["hp"]);
}

#[test]
fn collection_and_element_tags() {
    let doc = document();
    let names = &doc["definitions"]["game.Global"]["properties"]["names"];
    assert_eq!(names["minItems"], 1);
    assert_eq!(names["maxItems"], 3);
    assert_eq!(names["items"], json!({ "type": "string", "pattern": "^[a-z]+$" }));
}

#[test]
fn file_variants_and_wrappers() {
    let schema = game_schema();
    let target = JsonSchemaTarget::new(JsonSchemaOptions::default());
    let doc = target.build_document(&schema);
    let defs = doc["definitions"].as_object().unwrap();

    for name in ["game.ItemDataFile", "game.DropDataFile", "game.CircleDataFile", "game.SquareDataFile", "game.TriangleDataFile"] {
        let variant = &defs[name];
        assert!(variant["properties"]["$schema"].is_object(), "{name}");
        assert!(variant["properties"].get("$type").is_none(), "{name}");
    }
    assert!(!defs.contains_key("game.PointDataFile"));
    assert_eq!(defs["game.ShapeDataFile"]["anyOf"].as_array().map(Vec::len), Some(3));

    let files = target.generate(&schema);
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        [
            "schema.json",
            "definitions/item.schema.json",
            "definitions/shape.schema.json",
            "definitions/drop.schema.json",
            "definitions/global.schema.json",
        ]
    );
    let wrapper: Value = serde_json::from_str(&files[2].content).unwrap();
    assert_eq!(wrapper["$ref"], "../schema.json#/definitions/game.ShapeDataFile");
    let main: Value = serde_json::from_str(&files[0].content).unwrap();
    assert_eq!(main, doc);
}

#[test]
fn file_variants_can_be_disabled() {
    let schema = game_schema();
    let options = JsonSchemaOptions { generate_file_variants: false, ..JsonSchemaOptions::default() };
    let target = JsonSchemaTarget::new(options);
    let doc = target.build_document(&schema);
    assert!(doc["definitions"].as_object().unwrap().keys().all(|k| !k.ends_with("DataFile")));
    assert_eq!(target.generate(&schema).len(), 1);
}

#[test]
fn lua_module() {
    let schema = game_schema();
    let target = LuaTarget::new(LuaOptions::default());
    let lua = target.render_module(&schema);

    assert!(lua.starts_with("local function InitTypes(methods)\n"));
    assert!(lua.ends_with("return { InitTypes = InitTypes }\n"));
    assert!(lua.contains("        ['game.Perm'] = {\n            Read = 1,\n            Write = 2,\n        },\n"));

    // subtype lookup by simple name, full name and alias
    assert!(lua.contains("            ['sq'] = 'game.Square',\n"));
    assert!(lua.contains("            ['game.Triangle'] = 'game.Triangle',\n"));
    assert!(lua.contains("local t = data['$type'] or data['__type__']"));

    assert!(lua.contains("            o.drops = readList(data.drops, beans['game.Drop']._deserialize, true)\n"));
    assert!(lua.contains("            if data.tag ~= nil then o.tag = readString(data.tag) end\n"));
    assert!(lua.contains("            o.counts = readMap(data.counts, readInt)\n"));
    assert!(lua.contains("            o.shape = beans['game.Shape']._deserialize(data.shape)\n"));
    assert!(lua.contains("            o.names = readList(data.names, readString)\n"));
    assert!(lua.contains(
        "        { name = 'TbItem', file = 'tbitem', mode = 'map', value_type = 'game.Item', index = 'id' },\n"
    ));
    assert!(lua.contains("        { name = 'TbDrop', file = 'tbdrop', mode = 'list', value_type = 'game.Drop' },\n"));
}

#[test]
fn lua_square_reads_inherited_fields_first() {
    let lua = LuaTarget::default().render_module(&game_schema());
    let start = lua.find("_name = 'game.Square'").unwrap();
    let body = &lua[start..];
    let id = body.find("o.id = ").unwrap();
    let sides = body.find("o.sides = ").unwrap();
    let side = body.find("o.side = ").unwrap();
    assert!(id < sides && sides < side);
}

#[test]
fn lua_outputs() {
    let files = LuaTarget::default().generate(&game_schema());
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["schema.lua", "schema.d.ts"]);
    assert!(files[1].content.contains("export function InitTypes(methods: Methods)"));
}
