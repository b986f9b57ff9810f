//! Typed game-configuration data.
//!
//! A [`Schema`] of enums, beans (single inheritance) and tables is built once,
//! either directly through [`SchemaBuilder`] or from a JSON descriptor
//! ([`SchemaSource`]). Raw JSON records are then loaded into typed
//! [`Datum`] values by [`DataCreator`], checked by field validators compiled
//! into a [`ValidatorSet`], and the schema itself can be rendered by any
//! [`CodeTarget`].

pub mod config;
pub mod defs;
pub mod error;
pub mod ir;
pub mod loader;
pub mod path_de;
pub mod source;
pub mod table_data;
pub mod target;
pub mod validator;
pub mod value;
pub mod visitor;

pub use config::GenOptions;
pub use defs::{BeanDecl, BeanId, DefBean, DefEnum, DefTable, EnumId, Field, Schema, SchemaBuilder, TableMode};
pub use error::{LoadError, LoadErrorKind, PathFrame, SchemaError, TableError};
pub use ir::{Ty, TyKind};
pub use loader::DataCreator;
pub use source::SchemaSource;
pub use table_data::{load_table, RawRecord, TableData};
pub use target::{CodeTarget, OutputFile};
pub use validator::{FailLog, ValidationFailure, ValidatorRegistry, ValidatorSet};
pub use value::{BeanValue, Datum, EnumValue, MapValue};
pub use visitor::TypeVisitor;
