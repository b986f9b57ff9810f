//! Field validators.
//!
//! A validator is attached to a field's type through a tag whose key names a
//! registered validator (`int#range=[1,100]`), or through the field's own
//! tag map, which applies to the whole value. Each attachment is compiled
//! exactly once when a [`ValidatorSet`] is built: argument parsing and
//! schema lookups happen there and are fatal [`SchemaError`]s. The compiled
//! object only keeps what it needs, and [`DataValidator::validate`] reports
//! data problems to the shared [`FailLog`] instead of failing.
//!
//! Compiled validators form a tree that mirrors the [`Ty`] tree, so a tag on
//! a list element type checks every element.

mod constructor;
mod pattern;
mod range;
mod set;
mod size;

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;

use crate::defs::{DefBean, Field, Schema};
use crate::error::SchemaError;
use crate::ir::{Tags, Ty, TyKind};
use crate::value::{BeanValue, Datum};

pub use constructor::ConstructorValidator;
pub use pattern::RegexValidator;
pub use range::RangeValidator;
pub use set::SetValidator;
pub use size::SizeValidator;

// ————————————————————————————————————————————————————————————————————————————
// FAIL LOG
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub record_path: String,
    pub source: String,
    pub validator: String,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {}): [{}] {}", self.record_path, self.source, self.validator, self.message)
    }
}

/// Append-only, shareable across loader threads.
#[derive(Debug, Default)]
pub struct FailLog {
    failures: Mutex<Vec<ValidationFailure>>,
}

impl FailLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, failure: ValidationFailure) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).push(failure);
    }

    /// Snapshot in append order.
    pub fn failures(&self) -> Vec<ValidationFailure> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONTRACT
// ————————————————————————————————————————————————————————————————————————————

/// Where a validator is being compiled.
pub struct FieldSite<'a> {
    pub schema: &'a Schema,
    pub bean: &'a DefBean,
    pub field: &'a Field,
}

impl FieldSite<'_> {
    pub fn display(&self) -> String {
        format!("{}.{}", self.bean.full_name, self.field.name)
    }

    pub fn invalid(&self, validator: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidValidator {
            field: self.display(),
            validator: validator.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(&self, validator: &str, ty: &Ty) -> SchemaError {
        SchemaError::UnsupportedValidatorType {
            field: self.display(),
            validator: validator.to_owned(),
            ty: ty.type_name(self.schema),
        }
    }
}

pub struct ValidateContext<'a> {
    pub schema: &'a Schema,
    pub record_path: &'a str,
    pub source: &'a str,
    log: &'a FailLog,
}

impl ValidateContext<'_> {
    pub fn report(&self, validator: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(
            record = self.record_path,
            source = self.source,
            validator,
            "{message}"
        );
        self.log.push(ValidationFailure {
            record_path: self.record_path.to_owned(),
            source: self.source.to_owned(),
            validator: validator.to_owned(),
            message,
        });
    }
}

pub trait DataValidator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Check one non-null value. Problems go to the fail log.
    fn validate(&self, cx: &ValidateContext<'_>, ty: &Ty, value: &Datum);
}

pub type CompileFn = fn(&FieldSite<'_>, &Ty, &str) -> Result<Box<dyn DataValidator>, SchemaError>;

/// Tag key → compile function.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    compilers: IndexMap<String, CompileFn>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self { compilers: IndexMap::new() }
    }

    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register(ConstructorValidator::NAME, ConstructorValidator::compile);
        r.register(RangeValidator::NAME, RangeValidator::compile);
        r.register(SizeValidator::NAME, SizeValidator::compile);
        r.register(RegexValidator::NAME, RegexValidator::compile);
        r.register(SetValidator::NAME, SetValidator::compile);
        r
    }

    pub fn register(&mut self, name: impl Into<String>, compile: CompileFn) {
        self.compilers.insert(name.into(), compile);
    }

    pub fn get(&self, name: &str) -> Option<CompileFn> {
        self.compilers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.compilers.keys().map(String::as_str)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILED SET
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
struct CompiledTy {
    validators: Vec<Box<dyn DataValidator>>,
    /// Element, or key then value for maps.
    children: Vec<CompiledTy>,
}

impl CompiledTy {
    fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.children.iter().all(CompiledTy::is_empty)
    }
}

/// All validators of a schema, compiled. Holding one is proof that every
/// compile step has completed.
#[derive(Debug)]
pub struct ValidatorSet {
    /// Indexed by bean, then hierarchy field.
    beans: Vec<Vec<CompiledTy>>,
}

impl ValidatorSet {
    pub fn compile(schema: &Schema, registry: &ValidatorRegistry) -> Result<Self, SchemaError> {
        let mut beans = Vec::new();
        let mut count = 0;
        for (_, bean) in schema.beans() {
            let mut fields = Vec::with_capacity(bean.hierarchy_fields().len());
            for field in bean.hierarchy_fields() {
                let site = FieldSite { schema, bean, field };
                let mut compiled = compile_ty(&site, &field.ty, registry, &mut count)?;
                // field annotations apply to the field's value as a whole
                compile_tags(&site, &field.tags, &field.ty, registry, &mut count, &mut compiled.validators)?;
                fields.push(compiled);
            }
            beans.push(fields);
        }
        tracing::debug!(validators = count, "validators compiled");
        Ok(Self { beans })
    }

    pub fn is_empty(&self) -> bool {
        self.beans.iter().flatten().all(CompiledTy::is_empty)
    }

    /// Run every validator reachable from `value`.
    pub fn validate_bean(&self, schema: &Schema, value: &BeanValue, record_path: &str, source: &str, log: &FailLog) {
        let walker = Walker { set: self, schema, source, log };
        walker.bean(value, record_path);
    }
}

fn compile_tags(
    site: &FieldSite<'_>,
    tags: &Tags,
    ty: &Ty,
    registry: &ValidatorRegistry,
    count: &mut usize,
    out: &mut Vec<Box<dyn DataValidator>>,
) -> Result<(), SchemaError> {
    for (key, args) in tags {
        if let Some(compile) = registry.get(key) {
            out.push(compile(site, ty, args)?);
            *count += 1;
        }
    }
    Ok(())
}

fn compile_ty(site: &FieldSite<'_>, ty: &Ty, registry: &ValidatorRegistry, count: &mut usize) -> Result<CompiledTy, SchemaError> {
    let mut validators = Vec::new();
    compile_tags(site, &ty.tags, ty, registry, count, &mut validators)?;
    let children = match &ty.kind {
        TyKind::Array(e) | TyKind::List(e) | TyKind::Set(e) => vec![compile_ty(site, e, registry, count)?],
        TyKind::Map(k, v) => vec![
            compile_ty(site, k, registry, count)?,
            compile_ty(site, v, registry, count)?,
        ],
        _ => Vec::new(),
    };
    Ok(CompiledTy { validators, children })
}

struct Walker<'a> {
    set: &'a ValidatorSet,
    schema: &'a Schema,
    source: &'a str,
    log: &'a FailLog,
}

impl Walker<'_> {
    fn bean(&self, value: &BeanValue, path: &str) {
        let bean = self.schema.bean(value.bean);
        let compiled = &self.set.beans[value.bean.index()];
        for ((field, c), v) in bean.hierarchy_fields().iter().zip(compiled).zip(&value.fields) {
            if let Some(v) = v {
                self.node(c, &field.ty, v, &format!("{path}.{}", field.name));
            }
        }
    }

    fn node(&self, compiled: &CompiledTy, ty: &Ty, value: &Datum, path: &str) {
        if !compiled.validators.is_empty() {
            let cx = ValidateContext { schema: self.schema, record_path: path, source: self.source, log: self.log };
            for v in &compiled.validators {
                v.validate(&cx, ty, value);
            }
        }
        match (&ty.kind, value) {
            (TyKind::Array(e), Datum::Array(xs))
            | (TyKind::List(e), Datum::List(xs))
            | (TyKind::Set(e), Datum::Set(xs)) => {
                for (i, x) in xs.iter().enumerate() {
                    self.node(&compiled.children[0], e, x, &format!("{path}[{i}]"));
                }
            }
            (TyKind::Map(k, v), Datum::Map(m)) => {
                for (key, val) in m.iter() {
                    let key_path = format!("{path}[{}]", key.to_json(self.schema));
                    self.node(&compiled.children[0], k, key, &key_path);
                    self.node(&compiled.children[1], v, val, &key_path);
                }
            }
            (TyKind::Bean(_), Datum::Bean(b)) => self.bean(b, path),
            _ => {}
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED ARGUMENT PARSING
// ————————————————————————————————————————————————————————————————————————————

/// Interval argument: `[a,b]`, `(a,b]`, `[a,]`, `a,b` (inclusive) or a single
/// exact value `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T = f64> {
    pub min: Option<T>,
    pub min_inclusive: bool,
    pub max: Option<T>,
    pub max_inclusive: bool,
}

impl Bounds {
    pub fn parse(args: &str) -> Option<Bounds> {
        Self::parse_as(args)
    }
}

impl<T: Copy + PartialOrd + FromStr> Bounds<T> {
    /// Parse with endpoints read as `T`, so integer bounds keep full `i64`
    /// precision.
    pub fn parse_as(args: &str) -> Option<Bounds<T>> {
        let s = args.trim();
        let (min_inclusive, max_inclusive, inner) = match (s.chars().next(), s.chars().last()) {
            (Some(open @ ('[' | '(')), Some(close @ (']' | ')'))) if s.len() >= 2 => {
                (open == '[', close == ']', &s[1..s.len() - 1])
            }
            _ => {
                if !s.contains(',') {
                    let v = s.parse::<T>().ok()?;
                    return Some(Bounds { min: Some(v), min_inclusive: true, max: Some(v), max_inclusive: true });
                }
                (true, true, s)
            }
        };
        let (lo, hi) = inner.split_once(',')?;
        let side = |x: &str| -> Option<Option<T>> {
            let x = x.trim();
            if x.is_empty() { Some(None) } else { x.parse::<T>().ok().map(Some) }
        };
        let bounds = Bounds { min: side(lo)?, min_inclusive, max: side(hi)?, max_inclusive };
        match (bounds.min, bounds.max) {
            (None, None) => None,
            (Some(a), Some(b)) if a > b => None,
            _ => Some(bounds),
        }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Bounds<U> {
        Bounds {
            min: self.min.map(&f),
            min_inclusive: self.min_inclusive,
            max: self.max.map(&f),
            max_inclusive: self.max_inclusive,
        }
    }

    pub fn contains(&self, v: T) -> bool {
        let above = match self.min {
            Some(m) if self.min_inclusive => v >= m,
            Some(m) => v > m,
            None => true,
        };
        let below = match self.max {
            Some(m) if self.max_inclusive => v <= m,
            Some(m) => v < m,
            None => true,
        };
        above && below
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<T>| v.as_ref().map(|v| v.to_string()).unwrap_or_default();
        write!(
            f,
            "{}{},{}{}",
            if self.min_inclusive { '[' } else { '(' },
            side(&self.min),
            side(&self.max),
            if self.max_inclusive { ']' } else { ')' },
        )
    }
}
