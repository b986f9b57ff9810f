mod common;

use beanforge::validator::{DataValidator, FieldSite, ValidateContext};
use beanforge::{
    DataCreator, Datum, FailLog, GenOptions, Schema, SchemaError, SchemaSource, ValidatorRegistry, ValidatorSet,
};
use serde_json::{Value, json};

use common::{game_schema, item_json};

/// A `t.Row` bean with one field `v` of type `ty`, plus a small hierarchy and
/// an enum to point validators at.
fn row_schema(ty: &str) -> Result<Schema, SchemaError> {
    SchemaSource::from_json_value(json!({
        "enums": [{ "name": "t.Color", "items": [{ "name": "Red" }, { "name": "Green" }, { "name": "Blue", "alias": "b" }] }],
        "beans": [
            { "name": "t.Base", "fields": [] },
            { "name": "t.Leaf", "parent": "Base", "fields": [] },
            { "name": "t.Row", "fields": [{ "name": "v", "type": ty }] }
        ]
    }))?
    .build()
}

fn check(schema: &Schema, bean: &str, raw: Value) -> FailLog {
    let set = ValidatorSet::compile(schema, &ValidatorRegistry::builtin()).unwrap();
    let opts = GenOptions::default();
    let value = DataCreator::new(schema, &opts)
        .load_bean(schema.bean_by_name(bean).unwrap(), &raw)
        .unwrap();
    let log = FailLog::new();
    set.validate_bean(schema, &value, "Tb[0]", "rows.json", &log);
    log
}

fn messages(log: &FailLog) -> Vec<String> {
    log.failures().into_iter().map(|f| f.message).collect()
}

#[test]
fn clean_item_passes() {
    let schema = game_schema();
    let log = check(&schema, "game.Item", item_json());
    assert!(log.is_empty(), "{:?}", log.failures());
}

#[test]
fn range_reports_path_and_interval() {
    let schema = game_schema();
    let mut raw = item_json();
    raw["id"] = json!(0);
    raw["drops"] = json!([{ "item_id": 5, "weight": 100 }, { "item_id": 5, "weight": 0 }]);

    let failures = check(&schema, "game.Item", raw).failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].record_path, "Tb[0].id");
    assert_eq!(failures[0].validator, "range");
    assert_eq!(failures[0].message, "0 is outside [1,1000]");
    assert_eq!(failures[0].source, "rows.json");
    assert_eq!(failures[1].record_path, "Tb[0].drops[1].weight");
    assert_eq!(failures[1].message, "0 is outside (0,100]");
    assert_eq!(
        failures[1].to_string(),
        "Tb[0].drops[1].weight (from rows.json): [range] 0 is outside (0,100]"
    );
}

#[test]
fn map_values_are_checked_under_their_key() {
    let schema = game_schema();
    let mut raw = item_json();
    raw["counts"] = json!({ "gold": 3, "gems": 150 });

    let failures = check(&schema, "game.Item", raw).failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record_path, "Tb[0].counts[\"gems\"]");
    assert_eq!(failures[0].message, "150 is outside [0,99]");
}

#[test]
fn size_counts_characters() {
    let schema = game_schema();
    let mut raw = item_json();
    raw["name"] = json!("");
    assert_eq!(messages(&check(&schema, "game.Item", raw)), ["size 0 is outside [1,16]"]);

    let mut raw = item_json();
    raw["name"] = json!("ÄÖÜäöüßÄÖÜäöüßÄÖ");
    assert!(check(&schema, "game.Item", raw).is_empty());
}

#[test]
fn collection_and_element_tags_apply_separately() {
    let schema = game_schema();

    let log = check(&schema, "game.Global", json!({ "max_level": 60, "names": ["ok", "Bad"] }));
    let failures = log.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record_path, "Tb[0].names[1]");
    assert_eq!(failures[0].message, "'Bad' does not match /^[a-z]+$/");

    let log = check(&schema, "game.Global", json!({ "max_level": 60, "names": [] }));
    assert_eq!(messages(&log), ["size 0 is outside [1,3]"]);
    assert_eq!(log.failures()[0].record_path, "Tb[0].names");
}

#[test]
fn constructor_accepts_subtype_spellings() {
    let schema = game_schema();
    for kind in ["Circle", "game.Square", "Shape", "Polygon"] {
        let mut raw = item_json();
        raw["kind"] = json!(kind);
        assert!(check(&schema, "game.Item", raw).is_empty(), "{kind}");
    }

    let mut raw = item_json();
    raw["kind"] = json!("Hexagon");
    assert_eq!(
        messages(&check(&schema, "game.Item", raw)),
        ["'Hexagon' is not 'game.Shape' or one of its subtypes; valid types: [Shape, Circle, Polygon, Square, Triangle]"]
    );

    let mut raw = item_json();
    raw["kind"] = json!("Point");
    assert_eq!(check(&schema, "game.Item", raw).len(), 1);

    let mut raw = item_json();
    raw["kind"] = json!("  ");
    assert_eq!(messages(&check(&schema, "game.Item", raw)), ["type name is empty"]);
}

#[test]
fn field_tag_map_attaches_validators() {
    let schema = SchemaSource::from_json_value(json!({
        "beans": [{
            "name": "t.Hero",
            "fields": [
                { "name": "hp", "type": "int", "tags": { "range": "[1,5]" } },
                { "name": "names", "type": "list,string", "tags": { "size": "2", "note": "free text" } }
            ]
        }]
    }))
    .unwrap()
    .build()
    .unwrap();

    assert!(check(&schema, "t.Hero", json!({ "hp": 3, "names": ["a", "b"] })).is_empty());

    let failures = check(&schema, "t.Hero", json!({ "hp": 99, "names": ["a"] })).failures();
    let got: Vec<(&str, &str)> = failures.iter().map(|f| (f.record_path.as_str(), f.message.as_str())).collect();
    assert_eq!(got, [("Tb[0].hp", "99 is outside [1,5]"), ("Tb[0].names", "size 1 is outside [2,2]")]);
}

#[test]
fn float_arguments_use_float_precision() {
    let schema = row_schema("float#set=0.1,0.5").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 0.1 })).is_empty());
    assert_eq!(messages(&check(&schema, "t.Row", json!({ "v": 0.2 }))), ["0.2 is not one of [0.1, 0.5]"]);

    let schema = row_schema("float#range=[0,0.1]").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 0.1 })).is_empty());
    assert_eq!(messages(&check(&schema, "t.Row", json!({ "v": 0.3 }))), ["0.3 is outside [0,0.1]"]);

    let schema = row_schema("double#range=[0,0.1]").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 0.1 })).is_empty());
}

#[test]
fn long_bounds_compare_exactly() {
    let schema = row_schema("long#range=[9007199254740993,]").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 9007199254740993_i64 })).is_empty());
    assert_eq!(
        messages(&check(&schema, "t.Row", json!({ "v": 9007199254740992_i64 }))),
        ["9007199254740992 is outside [9007199254740993,]"]
    );

    // fractional bounds on integers still work
    let schema = row_schema("int#range=(0.5,2.5)").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 1 })).is_empty());
    assert_eq!(check(&schema, "t.Row", json!({ "v": 3 })).len(), 1);
}

#[test]
fn set_of_integers_strings_and_enum_items() {
    let schema = row_schema("int#set=1,2,3").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": 2 })).is_empty());
    assert_eq!(messages(&check(&schema, "t.Row", json!({ "v": 4 }))), ["4 is not one of [1, 2, 3]"]);

    let schema = row_schema("string#set=a,b").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": "b" })).is_empty());
    assert_eq!(check(&schema, "t.Row", json!({ "v": "c" })).len(), 1);

    let schema = row_schema("Color#set=Red,b").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": "Blue" })).is_empty());
    assert_eq!(
        messages(&check(&schema, "t.Row", json!({ "v": "Green" }))),
        ["\"Green\" is not one of [Red, b]"]
    );
}

#[test]
fn nulls_are_not_validated() {
    let schema = row_schema("int?#range=[1,2]").unwrap();
    assert!(check(&schema, "t.Row", json!({ "v": null })).is_empty());
    assert!(check(&schema, "t.Row", json!({})).is_empty());
    assert_eq!(check(&schema, "t.Row", json!({ "v": 3 })).len(), 1);
}

fn compile_err(ty: &str) -> SchemaError {
    let schema = row_schema(ty).unwrap();
    ValidatorSet::compile(&schema, &ValidatorRegistry::builtin()).unwrap_err()
}

#[test]
fn validators_reject_unsupported_types() {
    for ty in ["string#range=[1,2]", "bool#size=[1,2]", "int#regex=a", "Leaf#set=1", "int#constructor=Base"] {
        let err = compile_err(ty);
        assert!(
            matches!(err, SchemaError::UnsupportedValidatorType { ref field, .. } if field == "t.Row.v"),
            "{ty}: {err}"
        );
    }

    // nullability does not change the underlying type
    let schema = row_schema("string?#constructor=Base").unwrap();
    assert!(ValidatorSet::compile(&schema, &ValidatorRegistry::builtin()).is_ok());
}

#[test]
fn validators_reject_bad_arguments() {
    for ty in ["int#range=[5,1]", "int#range=abc", "string#size=[-1,3]", "string#regex=(", "int#set=1,x", "Color#set=Purple", "string#constructor="] {
        assert!(matches!(compile_err(ty), SchemaError::InvalidValidator { .. }), "{ty}");
    }
    assert!(matches!(compile_err("string#constructor=Nope"), SchemaError::UnknownType { ref name, .. } if name == "Nope"));
    assert!(matches!(compile_err("string#constructor=Color"), SchemaError::WrongKind { expected: "bean", .. }));
}

#[derive(Debug)]
struct Even;

impl DataValidator for Even {
    fn name(&self) -> &'static str {
        "even"
    }

    fn validate(&self, cx: &ValidateContext<'_>, _: &beanforge::Ty, value: &Datum) {
        if value.as_i64().is_some_and(|v| v % 2 != 0) {
            cx.report("even", "odd");
        }
    }
}

fn compile_even(_: &FieldSite<'_>, _: &beanforge::Ty, _: &str) -> Result<Box<dyn DataValidator>, SchemaError> {
    Ok(Box::new(Even))
}

#[test]
fn custom_validators_plug_into_the_registry() {
    let schema = row_schema("int#even=#note=x").unwrap();
    let mut registry = ValidatorRegistry::builtin();
    registry.register("even", compile_even);
    assert!(registry.names().any(|n| n == "even"));

    let set = ValidatorSet::compile(&schema, &registry).unwrap();
    let opts = GenOptions::default();
    let value = DataCreator::new(&schema, &opts)
        .load_bean(schema.bean_by_name("t.Row").unwrap(), &json!({ "v": 3 }))
        .unwrap();
    let log = FailLog::new();
    set.validate_bean(&schema, &value, "Row", "-", &log);
    assert_eq!(messages(&log), ["odd"]);

    // unregistered tags are plain metadata
    let set = ValidatorSet::compile(&schema, &ValidatorRegistry::empty()).unwrap();
    assert!(set.is_empty());
}
