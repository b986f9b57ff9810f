//! Table record assembly.
//!
//! Records of one table are loaded and validated in parallel; the schema is
//! shared read-only and the fail log is the only shared mutable state. The
//! loaded records are then assembled according to the table mode.

use indexmap::IndexMap;
use indexmap::map::Entry;
use rayon::prelude::*;
use serde_json::Value;

use crate::config::GenOptions;
use crate::defs::{DefTable, Schema, TableMode};
use crate::error::TableError;
use crate::loader::DataCreator;
use crate::validator::{FailLog, ValidatorSet};
use crate::value::{BeanValue, Datum};

/// Input-file prefix marking a file that holds an array of records.
pub const ARRAY_FILE_PREFIX: &str = "*@";

/// One raw record and the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: String,
    pub value: Value,
}

impl RawRecord {
    pub fn new(source: impl Into<String>, value: Value) -> Self {
        Self { source: source.into(), value }
    }

    /// Records held by one input file. A `*@`-prefixed file holding an array
    /// yields one record per element; anything else is a single record.
    pub fn from_input(input_file: &str, value: Value) -> Vec<RawRecord> {
        let (is_array, path) = split_input_file(input_file);
        match value {
            Value::Array(items) if is_array => {
                items.into_iter().map(|v| RawRecord::new(path, v)).collect()
            }
            value => vec![RawRecord::new(path, value)],
        }
    }
}

/// `*@items.json` → `(true, "items.json")`.
pub fn split_input_file(input_file: &str) -> (bool, &str) {
    match input_file.strip_prefix(ARRAY_FILE_PREFIX) {
        Some(path) => (true, path),
        None => (false, input_file),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableData {
    Map(IndexMap<Datum, BeanValue>),
    List(Vec<BeanValue>),
    One(BeanValue),
}

impl TableData {
    pub fn len(&self) -> usize {
        match self {
            TableData::Map(m) => m.len(),
            TableData::List(xs) => xs.len(),
            TableData::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record by index key (map tables only).
    pub fn get(&self, key: &Datum) -> Option<&BeanValue> {
        match self {
            TableData::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Records in input order.
    pub fn records(&self) -> Box<dyn Iterator<Item = &BeanValue> + '_> {
        match self {
            TableData::Map(m) => Box::new(m.values()),
            TableData::List(xs) => Box::new(xs.iter()),
            TableData::One(x) => Box::new(std::iter::once(x)),
        }
    }
}

/// Load, validate and assemble every record of `table`.
///
/// The first record that fails to load (in input order) aborts the table.
/// Validation failures never abort; they are appended to `log`.
pub fn load_table(
    schema: &Schema,
    table: &DefTable,
    records: &[RawRecord],
    options: &GenOptions,
    validators: &ValidatorSet,
    log: &FailLog,
) -> Result<TableData, TableError> {
    let creator = DataCreator::new(schema, options);

    let loaded: Vec<Result<BeanValue, TableError>> = records
        .par_iter()
        .enumerate()
        .map(|(index, record)| {
            let value = creator.load_bean(table.value_type, &record.value).map_err(|error| {
                TableError::Record {
                    table: table.full_name.clone(),
                    source_file: record.source.clone(),
                    index,
                    error,
                }
            })?;
            let path = format!("{}[{index}]", table.name());
            validators.validate_bean(schema, &value, &path, &record.source, log);
            Ok(value)
        })
        .collect();
    let values = loaded.into_iter().collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(table = %table.full_name, records = values.len(), "records loaded");

    let data = assemble(schema, table, records, values)?;
    tracing::info!(table = %table.full_name, mode = %table.mode, records = data.len(), "table loaded");
    Ok(data)
}

fn assemble(
    schema: &Schema,
    table: &DefTable,
    records: &[RawRecord],
    values: Vec<BeanValue>,
) -> Result<TableData, TableError> {
    match table.mode {
        TableMode::List | TableMode::Array => Ok(TableData::List(values)),
        TableMode::One | TableMode::Singleton | TableMode::Single => {
            let count = values.len();
            let mut values = values.into_iter();
            match (values.next(), values.next()) {
                (Some(one), None) => Ok(TableData::One(one)),
                _ => Err(TableError::RecordCount { table: table.full_name.clone(), count }),
            }
        }
        TableMode::Map => {
            let field = table.index.as_deref().unwrap_or_default();
            // hierarchy fields are parent-first, so the base position holds in every subtype
            let position = schema.bean(table.value_type).hierarchy_field_index(field);
            let mut map = IndexMap::with_capacity(values.len());
            for (index, value) in values.into_iter().enumerate() {
                let key = position.and_then(|p| value.fields.get(p)).and_then(Option::as_ref);
                let Some(key) = key.cloned() else {
                    return Err(TableError::NullKey { table: table.full_name.clone(), field: field.to_owned(), index });
                };
                match map.entry(key) {
                    Entry::Occupied(e) => {
                        return Err(TableError::DuplicateKey {
                            table: table.full_name.clone(),
                            key: e.key().to_json(schema).to_string(),
                            index,
                            source_file: records[index].source.clone(),
                        });
                    }
                    Entry::Vacant(e) => {
                        e.insert(value);
                    }
                }
            }
            Ok(TableData::Map(map))
        }
    }
}
