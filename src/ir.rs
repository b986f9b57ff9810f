// Static type model. Closed set of variants; consumers dispatch through
// `crate::visitor::TypeVisitor`.

use indexmap::IndexMap;

use crate::defs::{BeanId, EnumId};

/// Free-form `key=value` annotations, in declaration order.
pub type Tags = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Ty {
    pub kind: TyKind,
    pub nullable: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TyKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    DateTime,
    Enum(EnumId),
    Bean(BeanId),
    Array(Box<Ty>),
    List(Box<Ty>),
    Set(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
}

impl Ty {
    pub fn new(kind: TyKind) -> Self {
        Self { kind, nullable: false, tags: Tags::new() }
    }

    pub fn bool() -> Self { Self::new(TyKind::Bool) }
    pub fn byte() -> Self { Self::new(TyKind::Byte) }
    pub fn short() -> Self { Self::new(TyKind::Short) }
    pub fn int() -> Self { Self::new(TyKind::Int) }
    pub fn long() -> Self { Self::new(TyKind::Long) }
    pub fn float() -> Self { Self::new(TyKind::Float) }
    pub fn double() -> Self { Self::new(TyKind::Double) }
    pub fn string() -> Self { Self::new(TyKind::String) }
    pub fn datetime() -> Self { Self::new(TyKind::DateTime) }
    pub fn enum_(id: EnumId) -> Self { Self::new(TyKind::Enum(id)) }
    pub fn bean(id: BeanId) -> Self { Self::new(TyKind::Bean(id)) }
    pub fn array(elem: Ty) -> Self { Self::new(TyKind::Array(Box::new(elem))) }
    pub fn list(elem: Ty) -> Self { Self::new(TyKind::List(Box::new(elem))) }
    pub fn set(elem: Ty) -> Self { Self::new(TyKind::Set(Box::new(elem))) }
    pub fn map(key: Ty, value: Ty) -> Self { Self::new(TyKind::Map(Box::new(key), Box::new(value))) }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Element type of `array`/`list`/`set`.
    pub fn element(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Array(e) | TyKind::List(e) | TyKind::Set(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TyKind::Array(_) | TyKind::List(_) | TyKind::Set(_) | TyKind::Map(..))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TyKind::Byte | TyKind::Short | TyKind::Int | TyKind::Long)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self.kind, TyKind::Float | TyKind::Double)
    }

    /// Key types that may be written as JSON object property names.
    pub fn is_string_compatible_key(&self) -> bool {
        self.is_numeric() || matches!(self.kind, TyKind::String | TyKind::Enum(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_compatible_keys() {
        assert!(Ty::string().is_string_compatible_key());
        assert!(Ty::byte().is_string_compatible_key());
        assert!(Ty::double().is_string_compatible_key());
        assert!(Ty::enum_(EnumId(0)).is_string_compatible_key());
        assert!(!Ty::bool().is_string_compatible_key());
        assert!(!Ty::datetime().is_string_compatible_key());
        assert!(!Ty::bean(BeanId(0)).is_string_compatible_key());
        assert!(!Ty::list(Ty::int()).is_string_compatible_key());
    }

    #[test]
    fn tags_keep_declaration_order() {
        let ty = Ty::int().with_tag("range", "[1,5]").with_tag("set", "1,2,3");
        let keys: Vec<_> = ty.tags.keys().cloned().collect();
        assert_eq!(keys, ["range", "set"]);
        assert_eq!(ty.tag("range"), Some("[1,5]"));
        assert!(!ty.has_tag("regex"));
    }
}
