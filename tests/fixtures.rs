//! Data-driven cases under `tests/fixtures/<case>/`.
//!
//! Each case holds a `schema.json` descriptor, the input files its tables
//! name, and an `expected.json`:
//!
//! ```json
//! {
//!   "tables": { "pkg.TbName": 3 },
//!   "failures": ["TbName[0].field [range]"],
//!   "error": "substring of the first table error"
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use beanforge::{
    FailLog, GenOptions, RawRecord, SchemaSource, TableError, ValidatorRegistry, ValidatorSet, load_table,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Expected {
    tables: indexmap::IndexMap<String, usize>,
    failures: Vec<String>,
    error: Option<String>,
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn run_case(dir: &Path) -> Result<()> {
    let source = std::fs::read_to_string(dir.join("schema.json"))?;
    let schema = SchemaSource::from_json_str(&source)?.build()?;
    let validators = ValidatorSet::compile(&schema, &ValidatorRegistry::builtin())?;
    let expected: Expected = serde_json::from_value(read_json(&dir.join("expected.json"))?)?;
    let options = GenOptions::default();
    let log = FailLog::new();

    let mut first_error: Option<TableError> = None;
    for table in schema.tables() {
        let mut records = Vec::new();
        for input in &table.input_files {
            let (_, file) = beanforge::table_data::split_input_file(input);
            records.extend(RawRecord::from_input(input, read_json(&dir.join(file))?));
        }
        match load_table(&schema, table, &records, &options, &validators, &log) {
            Ok(data) => {
                if let Some(&len) = expected.tables.get(&table.full_name) {
                    if data.len() != len {
                        bail!("{}: expected {len} records, loaded {}", table.full_name, data.len());
                    }
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match (&expected.error, &first_error) {
        (None, Some(e)) => bail!("unexpected error: {e}"),
        (Some(want), None) => bail!("expected an error containing `{want}`"),
        (Some(want), Some(e)) if !e.to_string().contains(want.as_str()) => {
            bail!("error `{e}` does not contain `{want}`")
        }
        _ => {}
    }

    let mut got: Vec<String> = log.failures().iter()
        .map(|f| format!("{} [{}]", f.record_path, f.validator))
        .collect();
    got.sort();
    let mut want = expected.failures.clone();
    want.sort();
    if got != want {
        bail!("validation failures differ\n  got:  {got:?}\n  want: {want:?}");
    }
    Ok(())
}

#[test]
fn fixtures() -> Result<()> {
    let pattern = format!("{}/tests/fixtures/*/schema.json", env!("CARGO_MANIFEST_DIR"));
    let cases: Vec<PathBuf> = glob::glob(&pattern)?
        .map(|entry| entry.map(|p| p.parent().map(Path::to_path_buf).unwrap_or_default()))
        .collect::<Result<_, _>>()?;
    if cases.is_empty() {
        bail!("no fixtures matched {pattern}");
    }
    for dir in &cases {
        run_case(dir).with_context(|| format!("fixture {}", dir.display()))?;
    }
    Ok(())
}
