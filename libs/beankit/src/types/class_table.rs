//! Class metadata source for the resolver.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{RawClass, Type, TypeVariable, OBJECT, SERIALIZABLE};

/// The hierarchy of a class is not visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access to the hierarchy of '{class}' is restricted")]
pub struct AccessDenied {
    pub class: RawClass,
}

/// Reflective view over classes and their generic signatures.
///
/// Unknown classes behave as non-generic, non-final classes extending the
/// root object class.
pub trait TypeIntrospector: Send + Sync {
    /// Type parameters declared by `class`, in declaration order.
    fn type_parameters(&self, class: &RawClass) -> Vec<TypeVariable>;

    /// Declared bounds of a type variable. Empty means the root object class.
    fn bounds(&self, var: &TypeVariable) -> Vec<Type>;

    fn generic_superclass(&self, class: &RawClass) -> Result<Option<Type>, AccessDenied>;

    fn generic_interfaces(&self, class: &RawClass) -> Result<Vec<Type>, AccessDenied>;

    /// Enclosing class of a nested class.
    fn declaring_class(&self, class: &RawClass) -> Option<RawClass>;

    fn is_interface(&self, class: &RawClass) -> bool;

    fn is_final(&self, class: &RawClass) -> bool;

    fn is_serializable(&self, class: &RawClass) -> bool;

    /// Erased superclass.
    fn superclass(&self, class: &RawClass) -> Option<RawClass> {
        self.generic_superclass(class)
            .ok()
            .flatten()
            .and_then(|t| t.raw_class().cloned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Primitive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParam {
    pub var: TypeVariable,
    pub bounds: Vec<Type>,
}

/// Declared shape of a single class.
#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: Arc<str>,
    pub kind: ClassKind,
    pub type_params: Vec<TypeParam>,
    /// `None` means the root object class (ignored for interfaces and primitives).
    pub superclass: Option<Type>,
    pub interfaces: Vec<Type>,
    pub declaring_class: Option<RawClass>,
    pub is_final: bool,
    /// Hierarchy is hidden from the resolver.
    pub restricted: bool,
}

impl ClassDef {
    fn new(name: impl AsRef<str>, kind: ClassKind) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            kind,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            declaring_class: None,
            is_final: kind == ClassKind::Primitive,
            restricted: false,
        }
    }

    pub fn class(name: impl AsRef<str>) -> Self {
        Self::new(name, ClassKind::Class)
    }

    pub fn interface(name: impl AsRef<str>) -> Self {
        Self::new(name, ClassKind::Interface)
    }

    pub fn primitive(name: impl AsRef<str>) -> Self {
        Self::new(name, ClassKind::Primitive)
    }

    pub fn raw(&self) -> RawClass {
        RawClass::Named(self.name.clone())
    }

    /// Reference to a type parameter declared by this class.
    pub fn var(&self, name: impl AsRef<str>) -> Type {
        Type::Variable(TypeVariable::new(self.raw(), name))
    }

    pub fn type_param(self, name: impl AsRef<str>) -> Self {
        self.bounded_type_param(name, [])
    }

    pub fn bounded_type_param(
        mut self,
        name: impl AsRef<str>,
        bounds: impl IntoIterator<Item = Type>,
    ) -> Self {
        let var = TypeVariable::new(self.raw(), name);
        self.type_params.push(TypeParam {
            var,
            bounds: bounds.into_iter().collect(),
        });
        self
    }

    pub fn extends(mut self, superclass: Type) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn declared_in(mut self, owner: impl AsRef<str>) -> Self {
        self.declaring_class = Some(RawClass::named(owner));
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }
}

/// In-memory [`TypeIntrospector`].
#[derive(Clone, Debug)]
pub struct ClassTable {
    classes: HashMap<Arc<str>, ClassDef>,
    array_interfaces: Vec<Type>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTable {
    /// Table with the builtin classes registered.
    pub fn new() -> Self {
        let mut table = Self::empty();

        let comparable = ClassDef::interface("Comparable").type_param("T");
        table.insert(ClassDef::interface(SERIALIZABLE));
        table.insert(ClassDef::interface("Cloneable"));
        table.insert(comparable);
        table.insert(
            ClassDef::class("String")
                .final_class()
                .implements(Type::class(SERIALIZABLE))
                .implements(Type::parameterized("Comparable", [Type::class("String")])),
        );
        table.insert(ClassDef::class("Number").implements(Type::class(SERIALIZABLE)));
        table.insert(
            ClassDef::class("Integer")
                .final_class()
                .extends(Type::class("Number"))
                .implements(Type::parameterized("Comparable", [Type::class("Integer")])),
        );
        for p in ["int", "long", "boolean", "double"] {
            table.insert(ClassDef::primitive(p));
        }

        table.array_interfaces = vec![Type::class("Cloneable"), Type::class(SERIALIZABLE)];
        table
    }

    /// Table holding only the root object class.
    pub fn empty() -> Self {
        let mut classes = HashMap::new();
        let object = ClassDef::class(OBJECT);
        classes.insert(object.name.clone(), object);
        Self {
            classes,
            array_interfaces: Vec::new(),
        }
    }

    /// Register or replace a class definition.
    pub fn insert(&mut self, def: ClassDef) -> Option<ClassDef> {
        self.classes.insert(def.name.clone(), def)
    }

    pub fn with(mut self, def: ClassDef) -> Self {
        self.insert(def);
        self
    }

    /// Interfaces every array class implements.
    pub fn with_array_interfaces(mut self, interfaces: impl IntoIterator<Item = Type>) -> Self {
        self.array_interfaces = interfaces.into_iter().collect();
        self
    }

    pub fn get(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|k| &**k)
    }

    fn def(&self, class: &RawClass) -> Option<&ClassDef> {
        match class {
            RawClass::Named(n) => self.classes.get(n),
            RawClass::Array(_) => None,
        }
    }

    /// Raw supertypes from the declarations, ignoring access restrictions.
    fn declared_raw_supertypes(&self, class: &RawClass) -> Vec<RawClass> {
        match class {
            RawClass::Array(_) => std::iter::once(RawClass::object())
                .chain(self.array_interfaces.iter().filter_map(|t| t.raw_class().cloned()))
                .collect(),
            RawClass::Named(_) => match self.def(class) {
                Some(def) => {
                    let mut out: Vec<RawClass> = Vec::new();
                    if def.kind == ClassKind::Class && !class.is_object() {
                        out.push(
                            def.superclass
                                .as_ref()
                                .and_then(|t| t.raw_class().cloned())
                                .unwrap_or_else(RawClass::object),
                        );
                    }
                    out.extend(def.interfaces.iter().filter_map(|t| t.raw_class().cloned()));
                    out
                }
                None if class.is_object() => Vec::new(),
                None => vec![RawClass::object()],
            },
        }
    }
}

impl TypeIntrospector for ClassTable {
    fn type_parameters(&self, class: &RawClass) -> Vec<TypeVariable> {
        self.def(class)
            .map(|d| d.type_params.iter().map(|p| p.var.clone()).collect())
            .unwrap_or_default()
    }

    fn bounds(&self, var: &TypeVariable) -> Vec<Type> {
        self.def(&var.declared_by)
            .and_then(|d| d.type_params.iter().find(|p| p.var == *var))
            .map(|p| p.bounds.clone())
            .unwrap_or_default()
    }

    fn generic_superclass(&self, class: &RawClass) -> Result<Option<Type>, AccessDenied> {
        if class.is_object() {
            return Ok(None);
        }
        match class {
            RawClass::Array(_) => Ok(Some(Type::object())),
            RawClass::Named(_) => match self.def(class) {
                Some(def) if def.restricted => Err(AccessDenied {
                    class: class.clone(),
                }),
                Some(def) if def.kind != ClassKind::Class => Ok(None),
                Some(def) => Ok(Some(def.superclass.clone().unwrap_or_else(Type::object))),
                None => Ok(Some(Type::object())),
            },
        }
    }

    fn generic_interfaces(&self, class: &RawClass) -> Result<Vec<Type>, AccessDenied> {
        match class {
            RawClass::Array(_) => Ok(self.array_interfaces.clone()),
            RawClass::Named(_) => match self.def(class) {
                Some(def) if def.restricted => Err(AccessDenied {
                    class: class.clone(),
                }),
                Some(def) => Ok(def.interfaces.clone()),
                None => Ok(Vec::new()),
            },
        }
    }

    fn declaring_class(&self, class: &RawClass) -> Option<RawClass> {
        self.def(class).and_then(|d| d.declaring_class.clone())
    }

    fn is_interface(&self, class: &RawClass) -> bool {
        self.def(class)
            .map(|d| d.kind == ClassKind::Interface)
            .unwrap_or(false)
    }

    fn is_final(&self, class: &RawClass) -> bool {
        match class {
            RawClass::Array(_) => true,
            RawClass::Named(_) => self.def(class).map(|d| d.is_final).unwrap_or(false),
        }
    }

    fn is_serializable(&self, class: &RawClass) -> bool {
        if let Some(component) = class.component() {
            return self.is_serializable(component);
        }
        if self
            .def(class)
            .map(|d| d.kind == ClassKind::Primitive)
            .unwrap_or(false)
        {
            return true;
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class.clone()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if matches!(&next, RawClass::Named(n) if &**n == SERIALIZABLE) {
                return true;
            }
            queue.extend(self.declared_raw_supertypes(&next));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_classify_serializability() {
        let table = ClassTable::new();
        assert!(table.is_serializable(&RawClass::named("String")));
        assert!(table.is_serializable(&RawClass::named("Integer")));
        assert!(table.is_serializable(&RawClass::named("int")));
        assert!(!table.is_serializable(&RawClass::object()));
        assert!(table.is_serializable(&RawClass::named("String").array_of()));
    }

    #[test]
    fn serializability_is_inherited() {
        let table = ClassTable::new()
            .with(ClassDef::class("Base").implements(Type::class(SERIALIZABLE)))
            .with(ClassDef::class("Derived").extends(Type::class("Base")));
        assert!(table.is_serializable(&RawClass::named("Derived")));
    }

    #[test]
    fn restricted_class_denies_hierarchy_access() {
        let table = ClassTable::new().with(ClassDef::class("Hidden").restricted());
        let hidden = RawClass::named("Hidden");
        assert!(table.generic_superclass(&hidden).is_err());
        assert!(table.generic_interfaces(&hidden).is_err());
        assert_eq!(table.superclass(&hidden), None);
    }

    #[test]
    fn classes_default_to_object_superclass() {
        let table = ClassTable::new()
            .with(ClassDef::class("Plain"))
            .with(ClassDef::interface("Marker"));
        assert_eq!(
            table.generic_superclass(&RawClass::named("Plain")).unwrap(),
            Some(Type::object())
        );
        assert_eq!(table.generic_superclass(&RawClass::named("Marker")).unwrap(), None);
        assert_eq!(table.generic_superclass(&RawClass::object()).unwrap(), None);
    }

    #[test]
    fn cyclic_declarations_do_not_hang_serializability() {
        let table = ClassTable::new()
            .with(ClassDef::class("A").extends(Type::class("B")))
            .with(ClassDef::class("B").extends(Type::class("A")));
        assert!(!table.is_serializable(&RawClass::named("A")));
    }
}
