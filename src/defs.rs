//! Schema definitions: enums, beans (single inheritance) and tables.
//!
//! Beans live in an arena indexed by [`BeanId`]; a bean refers to its parent
//! by index only. Everything derived from the hierarchy (`HierarchyFields`,
//! abstractness, concrete descendants) is computed once in
//! [`SchemaBuilder::build`] and never recomputed afterwards.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::ir::{Tags, Ty, TyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

impl BeanId {
    pub fn index(self) -> usize { self.0 }
}

impl EnumId {
    pub fn index(self) -> usize { self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Bean(BeanId),
    Enum(EnumId),
}

fn split_full_name(full_name: &str) -> (&str, &str) {
    match full_name.rsplit_once('.') {
        Some((ns, name)) => (ns, name),
        None => ("", full_name),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENUMS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum EnumItemValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: String,
    pub value: EnumItemValue,
    pub alias: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefEnum {
    pub full_name: String,
    pub items: Vec<EnumItem>,
    pub is_flags: bool,
    pub comment: Option<String>,
}

impl DefEnum {
    pub fn name(&self) -> &str { split_full_name(&self.full_name).1 }
    pub fn namespace(&self) -> &str { split_full_name(&self.full_name).0 }

    /// String-valued when any item carries a string value.
    pub fn is_string_enum(&self) -> bool {
        self.items.iter().any(|i| matches!(i.value, EnumItemValue::Str(_)))
    }

    /// Item index by name, falling back to alias.
    pub fn find_item(&self, name_or_alias: &str) -> Option<usize> {
        self.items.iter().position(|i| i.name == name_or_alias)
            .or_else(|| self.items.iter().position(|i| i.alias.as_deref() == Some(name_or_alias)))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BEANS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    /// Variants under which the field is stored as `name@variant`.
    pub variants: Vec<String>,
    pub ty: Ty,
    pub tags: Tags,
    pub comment: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            alias: None,
            variants: Vec::new(),
            ty,
            tags: Tags::new(),
            comment: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variants.push(variant.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Raw key the field is stored under when `variant` is active.
    pub fn variant_key(&self, variant: &str) -> Option<String> {
        self.variants.iter()
            .any(|v| v == variant)
            .then(|| format!("{}@{}", self.name, variant))
    }
}

/// Bean as declared, before hierarchy resolution.
#[derive(Debug, Clone, Default)]
pub struct BeanDecl {
    pub full_name: String,
    pub parent: Option<String>,
    pub alias: Option<String>,
    pub fields: Vec<Field>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DefBean {
    pub full_name: String,
    pub alias: Option<String>,
    pub parent: Option<BeanId>,
    /// Own fields only.
    pub fields: Vec<Field>,
    pub comment: Option<String>,
    hierarchy_fields: Vec<Field>,
    children: Vec<BeanId>,
    hierarchy_children: Vec<BeanId>,
    concrete_descendants: Vec<BeanId>,
}

impl DefBean {
    pub fn name(&self) -> &str { split_full_name(&self.full_name).1 }
    pub fn namespace(&self) -> &str { split_full_name(&self.full_name).0 }

    /// Parent fields (recursively) followed by own fields.
    pub fn hierarchy_fields(&self) -> &[Field] { &self.hierarchy_fields }

    pub fn hierarchy_field_index(&self, name: &str) -> Option<usize> {
        self.hierarchy_fields.iter().position(|f| f.name == name)
    }

    /// Abstract iff at least one bean inherits from it.
    pub fn is_abstract(&self) -> bool { !self.children.is_empty() }

    pub fn children(&self) -> &[BeanId] { &self.children }

    /// This bean followed by all of its descendants, depth first.
    pub fn hierarchy_children(&self) -> &[BeanId] { &self.hierarchy_children }

    /// Descendants that can be instantiated, depth first.
    pub fn concrete_descendants(&self) -> &[BeanId] { &self.concrete_descendants }
}

// ————————————————————————————————————————————————————————————————————————————
// TABLES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    Map,
    List,
    One,
    Singleton,
    Single,
    Array,
}

impl TableMode {
    pub fn is_single_record(self) -> bool {
        matches!(self, TableMode::One | TableMode::Singleton | TableMode::Single)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableMode::Map => "map",
            TableMode::List => "list",
            TableMode::One => "one",
            TableMode::Singleton => "singleton",
            TableMode::Single => "single",
            TableMode::Array => "array",
        }
    }
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TableDecl {
    pub full_name: String,
    pub value_type: String,
    pub mode: TableMode,
    pub index: Option<String>,
    pub input_files: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DefTable {
    pub full_name: String,
    pub value_type: BeanId,
    pub mode: TableMode,
    pub index: Option<String>,
    pub input_files: Vec<String>,
    pub comment: Option<String>,
}

impl DefTable {
    pub fn name(&self) -> &str { split_full_name(&self.full_name).1 }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

/// Resolved, immutable schema shared read-only by every later phase.
#[derive(Debug, Clone)]
pub struct Schema {
    beans: Vec<DefBean>,
    enums: Vec<DefEnum>,
    tables: Vec<DefTable>,
    names: IndexMap<String, TypeRef>,
}

impl Schema {
    pub fn bean(&self, id: BeanId) -> &DefBean { &self.beans[id.0] }
    pub fn enum_def(&self, id: EnumId) -> &DefEnum { &self.enums[id.0] }

    pub fn beans(&self) -> impl Iterator<Item = (BeanId, &DefBean)> {
        self.beans.iter().enumerate().map(|(i, b)| (BeanId(i), b))
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &DefEnum)> {
        self.enums.iter().enumerate().map(|(i, e)| (EnumId(i), e))
    }

    pub fn tables(&self) -> &[DefTable] { &self.tables }

    pub fn table(&self, full_name: &str) -> Option<&DefTable> {
        self.tables.iter().find(|t| t.full_name == full_name)
    }

    /// Look a type up by full name, then inside `namespace`.
    pub fn find_type(&self, name: &str, namespace: Option<&str>) -> Option<TypeRef> {
        lookup(&self.names, name, namespace)
    }

    pub fn bean_by_name(&self, name: &str) -> Option<BeanId> {
        match self.find_type(name, None)? {
            TypeRef::Bean(id) => Some(id),
            TypeRef::Enum(_) => None,
        }
    }

    pub fn enum_by_name(&self, name: &str) -> Option<EnumId> {
        match self.find_type(name, None)? {
            TypeRef::Enum(id) => Some(id),
            TypeRef::Bean(_) => None,
        }
    }

    /// Resolve a discriminator value to a concrete descendant of `base`,
    /// matching full name, then simple name, then alias.
    pub fn impl_bean_by_name_or_alias(&self, base: BeanId, name: &str) -> Option<BeanId> {
        let candidates = self.bean(base).concrete_descendants();
        let find = |pred: &dyn Fn(&DefBean) -> bool| candidates.iter().copied().find(|&id| pred(self.bean(id)));
        find(&|b| b.full_name == name)
            .or_else(|| find(&|b| b.name() == name))
            .or_else(|| find(&|b| b.alias.as_deref() == Some(name)))
    }

    /// The `$type` spelling written for `bean`: its simple name, or its full
    /// name when another concrete bean of the same hierarchy shares the
    /// simple name.
    pub fn discriminator<'a>(&'a self, bean: &'a DefBean) -> &'a str {
        let mut root = bean;
        while let Some(parent) = root.parent {
            root = self.bean(parent);
        }
        let clash = root.concrete_descendants().iter()
            .map(|&id| self.bean(id))
            .any(|other| other.full_name != bean.full_name && other.name() == bean.name());
        if clash { bean.full_name.as_str() } else { bean.name() }
    }

    /// True when `other` is `base` or one of its descendants.
    pub fn is_assignable_from(&self, base: BeanId, other: BeanId) -> bool {
        let mut cur = Some(other);
        while let Some(id) = cur {
            if id == base {
                return true;
            }
            cur = self.bean(id).parent;
        }
        false
    }
}

fn lookup(names: &IndexMap<String, TypeRef>, name: &str, namespace: Option<&str>) -> Option<TypeRef> {
    if let Some(found) = names.get(name) {
        return Some(*found);
    }
    match namespace {
        Some(ns) if !ns.is_empty() => names.get(&format!("{ns}.{name}")).copied(),
        _ => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

/// Collects declarations and resolves them into a [`Schema`].
///
/// Names are reserved on first mention so that field types may refer to
/// beans and enums declared later (or to the declaring bean itself).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    beans: Vec<(String, Option<BeanDecl>)>,
    enums: Vec<(String, Option<DefEnum>)>,
    tables: Vec<TableDecl>,
    names: IndexMap<String, TypeRef>,
    duplicates: Vec<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the bean `full_name`, reserving it if not yet declared.
    pub fn bean_id(&mut self, full_name: &str) -> BeanId {
        if let Some(TypeRef::Bean(id)) = self.names.get(full_name) {
            return *id;
        }
        let id = BeanId(self.beans.len());
        self.beans.push((full_name.to_owned(), None));
        if self.names.insert(full_name.to_owned(), TypeRef::Bean(id)).is_some() {
            self.duplicates.push(full_name.to_owned());
        }
        id
    }

    /// Id of the enum `full_name`, reserving it if not yet declared.
    pub fn enum_id(&mut self, full_name: &str) -> EnumId {
        if let Some(TypeRef::Enum(id)) = self.names.get(full_name) {
            return *id;
        }
        let id = EnumId(self.enums.len());
        self.enums.push((full_name.to_owned(), None));
        if self.names.insert(full_name.to_owned(), TypeRef::Enum(id)).is_some() {
            self.duplicates.push(full_name.to_owned());
        }
        id
    }

    /// Look up an already reserved type.
    pub fn find_type(&self, name: &str, namespace: Option<&str>) -> Option<TypeRef> {
        lookup(&self.names, name, namespace)
    }

    pub fn add_enum(&mut self, def: DefEnum) -> EnumId {
        let id = self.enum_id(&def.full_name);
        let slot = &mut self.enums[id.0].1;
        if slot.is_some() {
            self.duplicates.push(def.full_name.clone());
        }
        *slot = Some(def);
        id
    }

    pub fn add_bean(&mut self, decl: BeanDecl) -> BeanId {
        let id = self.bean_id(&decl.full_name);
        let slot = &mut self.beans[id.0].1;
        if slot.is_some() {
            self.duplicates.push(decl.full_name.clone());
        }
        *slot = Some(decl);
        id
    }

    pub fn add_table(&mut self, decl: TableDecl) {
        self.tables.push(decl);
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(SchemaError::DuplicateName(name));
        }

        let mut enums = Vec::with_capacity(self.enums.len());
        for (name, def) in self.enums {
            let def = def.ok_or_else(|| SchemaError::UnknownType {
                name: name.clone(),
                context: "a field type".into(),
            })?;
            check_enum_items(&def)?;
            enums.push(def);
        }

        let mut decls = Vec::with_capacity(self.beans.len());
        for (name, decl) in self.beans {
            decls.push(decl.ok_or_else(|| SchemaError::UnknownType {
                name: name.clone(),
                context: "a field type".into(),
            })?);
        }

        let parents = resolve_parents(&decls, &self.names)?;
        let beans = resolve_hierarchy(decls, &parents)?;

        let mut schema = Schema { beans, enums, tables: Vec::new(), names: self.names };
        let tables = self.tables.into_iter()
            .map(|t| resolve_table(&schema, t))
            .collect::<Result<Vec<_>, _>>()?;
        schema.tables = tables;

        tracing::debug!(
            beans = schema.beans.len(),
            enums = schema.enums.len(),
            tables = schema.tables.len(),
            "schema resolved"
        );
        Ok(schema)
    }
}

fn check_enum_items(def: &DefEnum) -> Result<(), SchemaError> {
    for (i, item) in def.items.iter().enumerate() {
        if def.items[..i].iter().any(|other| other.name == item.name) {
            return Err(SchemaError::DuplicateEnumItem {
                enum_name: def.full_name.clone(),
                item: item.name.clone(),
            });
        }
    }
    Ok(())
}

fn resolve_parents(decls: &[BeanDecl], names: &IndexMap<String, TypeRef>) -> Result<Vec<Option<BeanId>>, SchemaError> {
    let parents = decls.iter()
        .map(|decl| {
            let Some(parent) = decl.parent.as_deref() else { return Ok(None) };
            let ns = split_full_name(&decl.full_name).0;
            match lookup(names, parent, Some(ns)) {
                Some(TypeRef::Bean(id)) => Ok(Some(id)),
                Some(TypeRef::Enum(_)) => Err(SchemaError::WrongKind {
                    name: parent.to_owned(),
                    context: format!("bean `{}`", decl.full_name),
                    expected: "bean",
                }),
                None => Err(SchemaError::UnknownType {
                    name: parent.to_owned(),
                    context: format!("parent of bean `{}`", decl.full_name),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    // A parent chain longer than the arena must revisit a bean.
    for (start, decl) in decls.iter().enumerate() {
        let mut cur = parents[start];
        let mut steps = 0;
        while let Some(BeanId(p)) = cur {
            steps += 1;
            if p == start || steps > decls.len() {
                return Err(SchemaError::InheritanceCycle(decl.full_name.clone()));
            }
            cur = parents[p];
        }
    }
    Ok(parents)
}

fn resolve_hierarchy(decls: Vec<BeanDecl>, parents: &[Option<BeanId>]) -> Result<Vec<DefBean>, SchemaError> {
    let n = decls.len();
    let mut children = vec![Vec::new(); n];
    for (i, parent) in parents.iter().enumerate() {
        if let Some(BeanId(p)) = parent {
            children[*p].push(BeanId(i));
        }
    }

    let mut hierarchy_fields = Vec::with_capacity(n);
    for i in 0..n {
        let mut chain = vec![i];
        let mut cur = parents[i];
        while let Some(BeanId(p)) = cur {
            chain.push(p);
            cur = parents[p];
        }
        let mut fields: Vec<Field> = Vec::new();
        for &b in chain.iter().rev() {
            for f in &decls[b].fields {
                if fields.iter().any(|existing| existing.name == f.name) {
                    return Err(SchemaError::DuplicateField {
                        bean: decls[b].full_name.clone(),
                        field: f.name.clone(),
                    });
                }
                fields.push(f.clone());
            }
        }
        hierarchy_fields.push(fields);
    }

    fn collect_descendants(id: usize, children: &[Vec<BeanId>], out: &mut Vec<BeanId>) {
        for &BeanId(c) in &children[id] {
            out.push(BeanId(c));
            collect_descendants(c, children, out);
        }
    }

    let beans = decls.into_iter()
        .zip(hierarchy_fields)
        .enumerate()
        .map(|(i, (decl, hierarchy_fields))| {
            let mut hierarchy_children = vec![BeanId(i)];
            collect_descendants(i, &children, &mut hierarchy_children);
            let concrete_descendants = hierarchy_children.iter()
                .copied()
                .filter(|c| children[c.0].is_empty())
                .collect();
            DefBean {
                full_name: decl.full_name,
                alias: decl.alias,
                parent: parents[i],
                fields: decl.fields,
                comment: decl.comment,
                hierarchy_fields,
                children: children[i].clone(),
                hierarchy_children,
                concrete_descendants,
            }
        })
        .collect();
    Ok(beans)
}

fn resolve_table(schema: &Schema, decl: TableDecl) -> Result<DefTable, SchemaError> {
    let ns = split_full_name(&decl.full_name).0;
    let value_type = match schema.find_type(&decl.value_type, Some(ns)) {
        Some(TypeRef::Bean(id)) => id,
        Some(TypeRef::Enum(_)) => {
            return Err(SchemaError::WrongKind {
                name: decl.value_type,
                context: format!("table `{}`", decl.full_name),
                expected: "bean",
            });
        }
        None => {
            return Err(SchemaError::UnknownType {
                name: decl.value_type,
                context: format!("table `{}`", decl.full_name),
            });
        }
    };

    let invalid = |reason: String| SchemaError::InvalidTable { table: decl.full_name.clone(), reason };
    let bean = schema.bean(value_type);
    match decl.index.as_deref() {
        None if decl.mode == TableMode::Map => {
            return Err(invalid("map tables require an index field".into()));
        }
        Some(index) => {
            let field = bean.hierarchy_fields().iter()
                .find(|f| f.name == index)
                .ok_or_else(|| invalid(format!("index field `{index}` does not exist in `{}`", bean.full_name)))?;
            if decl.mode == TableMode::Map && !is_valid_index_type(&field.ty) {
                return Err(invalid(format!("index field `{index}` must be a scalar or enum")));
            }
        }
        None => {}
    }

    Ok(DefTable {
        full_name: decl.full_name,
        value_type,
        mode: decl.mode,
        index: decl.index,
        input_files: decl.input_files,
        comment: decl.comment,
    })
}

fn is_valid_index_type(ty: &Ty) -> bool {
    !ty.is_collection() && !matches!(ty.kind, TyKind::Bean(_))
}
