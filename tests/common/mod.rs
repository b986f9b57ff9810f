#![allow(dead_code)]

use beanforge::{Schema, SchemaSource};

pub const GAME_SCHEMA: &str = r#"{
  "enums": [
    { "name": "game.Color", "items": [
      { "name": "Red" },
      { "name": "Green" },
      { "name": "Blue", "alias": "b" }
    ]},
    { "name": "game.Perm", "flags": true, "items": [
      { "name": "Read", "value": 1 },
      { "name": "Write", "value": 2 }
    ]}
  ],
  "beans": [
    { "name": "game.Point", "fields": [
      { "name": "x", "type": "int" },
      { "name": "y", "type": "int" },
      { "name": "c", "type": "Color" }
    ]},
    { "name": "game.Shape", "fields": [
      { "name": "id", "type": "int" }
    ]},
    { "name": "game.Circle", "parent": "Shape", "fields": [
      { "name": "radius", "type": "float" }
    ]},
    { "name": "game.Polygon", "parent": "Shape", "fields": [
      { "name": "sides", "type": "int" }
    ]},
    { "name": "game.Square", "parent": "Polygon", "alias": "sq", "fields": [
      { "name": "side", "type": "double" }
    ]},
    { "name": "game.Triangle", "parent": "Polygon" },
    { "name": "game.Drop", "fields": [
      { "name": "item_id", "type": "int#range=[1,1000]" },
      { "name": "weight", "type": "int#range=(0,100]" }
    ]},
    { "name": "game.Item", "comment": "An inventory item", "fields": [
      { "name": "id", "type": "int#range=[1,1000]" },
      { "name": "name", "type": "string#size=[1,16]", "variants": ["en"] },
      { "name": "tag", "type": "string?", "alias": "label" },
      { "name": "price", "type": "double?" },
      { "name": "created", "type": "datetime" },
      { "name": "shape", "type": "Shape" },
      { "name": "drops", "type": "list,Drop", "tags": { "ObjectFactory": "" } },
      { "name": "counts", "type": "map,string,int#range=[0,99]" },
      { "name": "kind", "type": "string#constructor=Shape" },
      { "name": "tint", "type": "Color?" }
    ]},
    { "name": "game.Global", "fields": [
      { "name": "max_level", "type": "int" },
      { "name": "names", "type": "(list#size=[1,3]),string#regex=^[a-z]+$" }
    ]}
  ],
  "tables": [
    { "name": "game.TbItem", "valueType": "Item", "mode": "map", "index": "id", "inputFiles": ["*@items.json"] },
    { "name": "game.TbShape", "valueType": "Shape", "mode": "map", "index": "id" },
    { "name": "game.TbDrop", "valueType": "Drop", "mode": "list" },
    { "name": "game.TbGlobal", "valueType": "Global", "mode": "one", "comment": "Global constants" }
  ]
}"#;

pub fn game_schema() -> Schema {
    SchemaSource::from_json_str(GAME_SCHEMA)
        .and_then(|src| src.build())
        .expect("game schema")
}

pub fn item_json() -> serde_json::Value {
    serde_json::json!({
        "id": 7,
        "name": "sword",
        "price": 12.5,
        "created": "2024-05-01 08:30:00",
        "shape": { "$type": "Circle", "id": 1, "radius": 2.5 },
        "drops": [ { "item_id": 3, "weight": 50 } ],
        "counts": { "gold": 3 },
        "kind": "Circle",
        "tint": null
    })
}
