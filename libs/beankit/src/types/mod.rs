//! Type descriptors and the type-closure resolver.
//!
//! The descriptors here are a language-neutral model of a generic type
//! system: raw classes, parameterized types, generic arrays, type variables,
//! and a raw-type wrapper used when no generic information is available.
//! Class metadata is supplied through [`TypeIntrospector`]; [`ClassTable`] is
//! the in-memory implementation.

use std::fmt;
use std::sync::Arc;

mod class_table;
mod hierarchy;
mod model;
mod parse;
mod type_info;

pub use class_table::{AccessDenied, ClassDef, ClassKind, ClassTable, TypeIntrospector, TypeParam};
pub use hierarchy::{
    raw_type, HierarchyDiscovery, ResolutionError, ResolverConfig, TypeClosure, DEFAULT_MAX_DEPTH,
};
pub use model::{ClassDecl, ClassModel, ModelError, TypeParamDecl};
pub use parse::{parse_type, ParseError};
pub use type_info::TypeInfo;

/// Name of the universal root class.
pub const OBJECT: &str = "Object";

/// Name of the marker interface that makes a class serializable.
pub const SERIALIZABLE: &str = "Serializable";

/// Erased class identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawClass {
    Named(Arc<str>),
    Array(Arc<RawClass>),
}

impl RawClass {
    pub fn named(name: impl AsRef<str>) -> Self {
        RawClass::Named(Arc::from(name.as_ref()))
    }

    pub fn object() -> Self {
        RawClass::named(OBJECT)
    }

    /// The array class whose component is `self`.
    pub fn array_of(&self) -> Self {
        RawClass::Array(Arc::new(self.clone()))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, RawClass::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, RawClass::Named(n) if &**n == OBJECT)
    }

    pub fn component(&self) -> Option<&RawClass> {
        match self {
            RawClass::Array(c) => Some(c),
            RawClass::Named(_) => None,
        }
    }

    /// Name of the class, or of the innermost component for arrays.
    pub fn element_name(&self) -> &str {
        match self {
            RawClass::Named(n) => n,
            RawClass::Array(c) => c.element_name(),
        }
    }
}

impl fmt::Display for RawClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawClass::Named(n) => f.write_str(n),
            RawClass::Array(c) => write!(f, "{c}[]"),
        }
    }
}

/// A type variable, identified by its name and the class declaring it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeVariable {
    pub name: Arc<str>,
    pub declared_by: RawClass,
}

impl TypeVariable {
    pub fn new(declared_by: RawClass, name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            declared_by,
        }
    }
}

impl fmt::Display for TypeVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterizedType {
    pub raw: RawClass,
    pub args: Vec<Type>,
    pub owner: Option<Type>,
}

/// Type descriptor. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Class(RawClass),
    Parameterized(Arc<ParameterizedType>),
    GenericArray(Arc<Type>),
    Variable(TypeVariable),
    /// Erased class used when no generic information is available.
    Raw(RawClass),
}

impl Type {
    pub fn class(name: impl AsRef<str>) -> Self {
        Type::Class(RawClass::named(name))
    }

    pub fn object() -> Self {
        Type::Class(RawClass::object())
    }

    pub fn raw(name: impl AsRef<str>) -> Self {
        Type::Raw(RawClass::named(name))
    }

    pub fn parameterized(raw: impl AsRef<str>, args: impl IntoIterator<Item = Type>) -> Self {
        Type::parameterized_with_owner(RawClass::named(raw), args, None)
    }

    pub fn parameterized_with_owner(
        raw: RawClass,
        args: impl IntoIterator<Item = Type>,
        owner: Option<Type>,
    ) -> Self {
        Type::Parameterized(Arc::new(ParameterizedType {
            raw,
            args: args.into_iter().collect(),
            owner,
        }))
    }

    pub fn array(component: Type) -> Self {
        Type::GenericArray(Arc::new(component))
    }

    /// Type variable `name` declared on class `declared_by`.
    pub fn var(declared_by: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Type::Variable(TypeVariable::new(RawClass::named(declared_by), name))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable(_))
    }

    /// Raw class for descriptors that carry one directly.
    ///
    /// Generic arrays and variables need an introspector; see [`raw_type`].
    pub fn raw_class(&self) -> Option<&RawClass> {
        match self {
            Type::Class(c) | Type::Raw(c) => Some(c),
            Type::Parameterized(p) => Some(&p.raw),
            Type::GenericArray(_) | Type::Variable(_) => None,
        }
    }
}

impl From<RawClass> for Type {
    fn from(class: RawClass) -> Self {
        Type::Class(class)
    }
}

impl From<TypeVariable> for Type {
    fn from(var: TypeVariable) -> Self {
        Type::Variable(var)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Class(c) => write!(f, "{c}"),
            Type::Raw(c) => write!(f, "raw {c}"),
            Type::Variable(v) => write!(f, "{v}"),
            Type::GenericArray(c) => write!(f, "{c}[]"),
            Type::Parameterized(p) => {
                if let Some(owner) = &p.owner {
                    write!(f, "{owner}.")?;
                }
                write!(f, "{}<", p.raw)?;
                for (i, arg) in p.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_nested_generics() {
        let ty = Type::parameterized(
            "Map",
            [Type::class("String"), Type::parameterized("List", [Type::var("Foo", "T")])],
        );
        assert_eq!(ty.to_string(), "Map<String, List<T>>");
        assert_eq!(RawClass::named("Foo").array_of().array_of().to_string(), "Foo[][]");
    }

    #[test]
    fn variables_compare_by_declaring_class() {
        assert_eq!(Type::var("A", "T"), Type::var("A", "T"));
        assert_ne!(Type::var("A", "T"), Type::var("B", "T"));
    }
}
