//! Double dispatch over the closed set of type variants.
//!
//! A target implements [`TypeVisitor`] once, with one method per variant and
//! no defaults, so adding a variant to [`TyKind`] breaks every target at
//! compile time while adding a target touches nothing else. `C` is the
//! per-call context (a raw node, a variable name, ...).
//!
//! Recursive variants hand their nested types to the visitor; whether and
//! how to recurse is the visitor's business, done by calling [`Ty::apply`]
//! again.

use crate::defs::{BeanId, EnumId, Schema};
use crate::ir::{Ty, TyKind};

pub trait TypeVisitor<C> {
    type Output;

    fn visit_bool(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_byte(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_short(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_int(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_long(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_float(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_double(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_string(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_datetime(&self, ty: &Ty, cx: C) -> Self::Output;
    fn visit_enum(&self, ty: &Ty, def: EnumId, cx: C) -> Self::Output;
    fn visit_bean(&self, ty: &Ty, def: BeanId, cx: C) -> Self::Output;
    fn visit_array(&self, ty: &Ty, elem: &Ty, cx: C) -> Self::Output;
    fn visit_list(&self, ty: &Ty, elem: &Ty, cx: C) -> Self::Output;
    fn visit_set(&self, ty: &Ty, elem: &Ty, cx: C) -> Self::Output;
    fn visit_map(&self, ty: &Ty, key: &Ty, value: &Ty, cx: C) -> Self::Output;
}

impl Ty {
    /// Forward to the handler for this type's variant.
    pub fn apply<C, V>(&self, visitor: &V, cx: C) -> V::Output
    where
        V: TypeVisitor<C> + ?Sized,
    {
        match &self.kind {
            TyKind::Bool => visitor.visit_bool(self, cx),
            TyKind::Byte => visitor.visit_byte(self, cx),
            TyKind::Short => visitor.visit_short(self, cx),
            TyKind::Int => visitor.visit_int(self, cx),
            TyKind::Long => visitor.visit_long(self, cx),
            TyKind::Float => visitor.visit_float(self, cx),
            TyKind::Double => visitor.visit_double(self, cx),
            TyKind::String => visitor.visit_string(self, cx),
            TyKind::DateTime => visitor.visit_datetime(self, cx),
            TyKind::Enum(id) => visitor.visit_enum(self, *id, cx),
            TyKind::Bean(id) => visitor.visit_bean(self, *id, cx),
            TyKind::Array(elem) => visitor.visit_array(self, elem, cx),
            TyKind::List(elem) => visitor.visit_list(self, elem, cx),
            TyKind::Set(elem) => visitor.visit_set(self, elem, cx),
            TyKind::Map(key, value) => visitor.visit_map(self, key, value, cx),
        }
    }

    /// Type expression such as `map,string,list,Item?`.
    pub fn type_name(&self, schema: &Schema) -> String {
        self.apply(&TypeNameVisitor { schema }, ())
    }
}

/// Renders types in the descriptor syntax; used in diagnostics.
pub struct TypeNameVisitor<'s> {
    pub schema: &'s Schema,
}

impl TypeNameVisitor<'_> {
    fn finish(&self, ty: &Ty, base: String) -> String {
        if ty.nullable { format!("{base}?") } else { base }
    }
}

impl TypeVisitor<()> for TypeNameVisitor<'_> {
    type Output = String;

    fn visit_bool(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "bool".into()) }
    fn visit_byte(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "byte".into()) }
    fn visit_short(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "short".into()) }
    fn visit_int(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "int".into()) }
    fn visit_long(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "long".into()) }
    fn visit_float(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "float".into()) }
    fn visit_double(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "double".into()) }
    fn visit_string(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "string".into()) }
    fn visit_datetime(&self, ty: &Ty, _: ()) -> String { self.finish(ty, "datetime".into()) }

    fn visit_enum(&self, ty: &Ty, def: EnumId, _: ()) -> String {
        self.finish(ty, self.schema.enum_def(def).full_name.clone())
    }

    fn visit_bean(&self, ty: &Ty, def: BeanId, _: ()) -> String {
        self.finish(ty, self.schema.bean(def).full_name.clone())
    }

    fn visit_array(&self, ty: &Ty, elem: &Ty, _: ()) -> String {
        self.finish(ty, format!("array,{}", elem.apply(self, ())))
    }

    fn visit_list(&self, ty: &Ty, elem: &Ty, _: ()) -> String {
        self.finish(ty, format!("list,{}", elem.apply(self, ())))
    }

    fn visit_set(&self, ty: &Ty, elem: &Ty, _: ()) -> String {
        self.finish(ty, format!("set,{}", elem.apply(self, ())))
    }

    fn visit_map(&self, ty: &Ty, key: &Ty, value: &Ty, _: ()) -> String {
        self.finish(ty, format!("map,{},{}", key.apply(self, ()), value.apply(self, ())))
    }
}
