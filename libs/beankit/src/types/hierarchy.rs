//! Type-closure discovery.
//!
//! Walks the class graph depth-first from a root type, substituting type
//! variables with the actual arguments bound along the way. The walk keeps a
//! bidirectional map between resolved types and raw classes: when the same raw
//! class is reached through several paths, the last resolution wins.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::class_table::{AccessDenied, TypeIntrospector};
use super::{ParameterizedType, RawClass, Type, TypeVariable};

pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Resolver tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum nesting of the recursive walk before resolution is aborted.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The walk did not terminate within the budget: a cyclic hierarchy or an
    /// unbounded self-referential signature.
    #[error("type closure of '{root}' exceeded the recursion limit of {limit}")]
    RecursionLimit { root: String, limit: usize },
}

enum WalkError {
    Denied(AccessDenied),
    Fatal(ResolutionError),
}

impl From<AccessDenied> for WalkError {
    fn from(e: AccessDenied) -> Self {
        WalkError::Denied(e)
    }
}

/// Resolved types reachable from a root, each paired with its raw class.
#[derive(Debug, Clone)]
pub struct TypeClosure {
    types: Vec<Type>,
    by_class: HashMap<RawClass, Type>,
    by_type: HashMap<Type, RawClass>,
}

impl TypeClosure {
    /// Types in discovery order.
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    pub fn contains(&self, ty: &Type) -> bool {
        self.by_type.contains_key(ty)
    }

    pub fn contains_class(&self, class: &RawClass) -> bool {
        self.by_class.contains_key(class)
    }

    /// Resolved type recorded for a raw class.
    pub fn type_for(&self, class: &RawClass) -> Option<&Type> {
        self.by_class.get(class)
    }

    pub fn class_for(&self, ty: &Type) -> Option<&RawClass> {
        self.by_type.get(ty)
    }

    /// Raw class → resolved type.
    pub fn type_map(&self) -> &HashMap<RawClass, Type> {
        &self.by_class
    }

    pub fn classes(&self) -> impl Iterator<Item = &RawClass> {
        self.types.iter().filter_map(|t| self.by_type.get(t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn into_types(self) -> Vec<Type> {
        self.types
    }
}

impl PartialEq for TypeClosure {
    fn eq(&self, other: &Self) -> bool {
        self.by_class == other.by_class
    }
}

impl Eq for TypeClosure {}

/// Erasure of a type descriptor.
///
/// Variables erase to their first bound, or to the root object class when
/// unbounded.
pub fn raw_type(introspector: &dyn TypeIntrospector, ty: &Type) -> Option<RawClass> {
    fn erase(
        introspector: &dyn TypeIntrospector,
        ty: &Type,
        seen: &mut Vec<TypeVariable>,
    ) -> Option<RawClass> {
        match ty {
            Type::Class(c) | Type::Raw(c) => Some(c.clone()),
            Type::Parameterized(p) => Some(p.raw.clone()),
            Type::GenericArray(component) => {
                erase(introspector, component, seen).map(|c| c.array_of())
            }
            Type::Variable(v) => {
                if seen.contains(v) {
                    return Some(RawClass::object());
                }
                seen.push(v.clone());
                match introspector.bounds(v).first() {
                    Some(bound) => erase(introspector, bound, seen),
                    None => Some(RawClass::object()),
                }
            }
        }
    }
    erase(introspector, ty, &mut Vec::new())
}

/// Computes the type closure of one root type.
pub struct HierarchyDiscovery<'a> {
    introspector: &'a dyn TypeIntrospector,
    root: Type,
    config: ResolverConfig,
}

impl<'a> HierarchyDiscovery<'a> {
    pub fn new(introspector: &'a dyn TypeIntrospector, root: Type) -> Self {
        Self {
            introspector,
            root,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Type {
        &self.root
    }

    /// The root with its own type parameters applied, or the erased class for
    /// raw-wrapper roots.
    pub fn resolved_type(&self) -> Type {
        match &self.root {
            Type::Class(c) => self_resolved(self.introspector, c),
            Type::Raw(c) => Type::Class(c.clone()),
            other => other.clone(),
        }
    }

    /// Walk the hierarchy. Every call runs an independent computation.
    pub fn discover(&self) -> Result<TypeClosure, ResolutionError> {
        let mut walk = Walk::new(self.introspector, &self.root, self.config.max_depth);
        match walk.discover_types(&self.root) {
            Ok(()) => {}
            Err(WalkError::Denied(denied)) => {
                tracing::trace!(root = %self.root, error = %denied, "hierarchy scan skipped");
            }
            Err(WalkError::Fatal(err)) => {
                tracing::error!(root = %self.root, error = %err, "type closure resolution aborted");
                return Err(err);
            }
        }
        let closure = walk.into_closure();
        tracing::debug!(root = %self.root, types = closure.len(), "type closure resolved");
        Ok(closure)
    }
}

fn self_resolved(introspector: &dyn TypeIntrospector, class: &RawClass) -> Type {
    let params = introspector.type_parameters(class);
    if params.is_empty() {
        return Type::Class(class.clone());
    }
    Type::parameterized_with_owner(
        class.clone(),
        params.into_iter().map(Type::Variable),
        introspector.declaring_class(class).map(Type::Class),
    )
}

/// Per-call resolution state.
struct Walk<'a> {
    introspector: &'a dyn TypeIntrospector,
    root: &'a Type,
    by_type: HashMap<Type, RawClass>,
    by_class: HashMap<RawClass, Type>,
    order: Vec<Type>,
    /// Raw class → already resolved parameterization.
    cache: HashMap<RawClass, Type>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Walk<'a> {
    fn new(introspector: &'a dyn TypeIntrospector, root: &'a Type, max_depth: usize) -> Self {
        Self {
            introspector,
            root,
            by_type: HashMap::new(),
            by_class: HashMap::new(),
            order: Vec::new(),
            cache: HashMap::new(),
            depth: 0,
            max_depth,
        }
    }

    fn descend<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, WalkError>,
    ) -> Result<R, WalkError> {
        if self.depth >= self.max_depth {
            return Err(WalkError::Fatal(ResolutionError::RecursionLimit {
                root: self.root.to_string(),
                limit: self.max_depth,
            }));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn add(&mut self, class: RawClass, ty: Type) {
        if let Some(previous) = self.by_class.remove(&class) {
            self.by_type.remove(&previous);
        }
        if let Some(previous) = self.by_type.remove(&ty) {
            self.by_class.remove(&previous);
        }
        self.by_type.insert(ty.clone(), class.clone());
        self.by_class.insert(class.clone(), ty.clone());
        self.order.push(ty.clone());
        self.cache.insert(class, ty);
    }

    fn into_closure(self) -> TypeClosure {
        let mut seen = HashSet::new();
        let types = self
            .order
            .into_iter()
            .filter(|t| self.by_type.contains_key(t) && seen.insert(t.clone()))
            .collect();
        TypeClosure {
            types,
            by_class: self.by_class,
            by_type: self.by_type,
        }
    }

    fn discover_types(&mut self, ty: &Type) -> Result<(), WalkError> {
        self.descend(|walk| match ty {
            Type::Raw(class) => {
                let erased = Type::Class(class.clone());
                walk.add(class.clone(), erased.clone());
                walk.discover_from_class(class, &erased)
            }
            Type::Class(class) => {
                let resolved = self_resolved(walk.introspector, class);
                walk.add(class.clone(), resolved.clone());
                walk.discover_from_class(class, &resolved)
            }
            Type::GenericArray(component) => {
                let Some(array_class) =
                    raw_type(walk.introspector, component).map(|c| c.array_of())
                else {
                    return Ok(());
                };
                let recorded = match &**component {
                    Type::Class(c) => Type::Class(c.array_of()),
                    _ => ty.clone(),
                };
                walk.add(array_class.clone(), recorded);
                walk.discover_from_class(&array_class, &Type::Class(array_class.clone()))
            }
            Type::Parameterized(p) => {
                walk.add(p.raw.clone(), ty.clone());
                walk.discover_from_class(&p.raw, ty)
            }
            Type::Variable(_) => Ok(()),
        })
    }

    fn discover_from_class(&mut self, class: &RawClass, binding: &Type) -> Result<(), WalkError> {
        match self.discover_supertypes(class, binding) {
            Err(WalkError::Denied(denied)) => {
                tracing::trace!(
                    class = %class,
                    error = %denied,
                    "security restriction while scanning hierarchy"
                );
                Ok(())
            }
            other => other,
        }
    }

    fn discover_supertypes(&mut self, class: &RawClass, binding: &Type) -> Result<(), WalkError> {
        if let Some(superclass) = self.introspector.generic_superclass(class)? {
            let resolved = self.resolve_type(Some(binding), &superclass)?;
            self.discover_types(&resolved)?;
        }
        for interface in self.introspector.generic_interfaces(class)? {
            let resolved = self.resolve_type(Some(binding), &interface)?;
            self.discover_types(&resolved)?;
        }
        Ok(())
    }

    fn resolve_type(&mut self, binding: Option<&Type>, ty: &Type) -> Result<Type, WalkError> {
        self.descend(|walk| match (ty, binding) {
            (Type::Parameterized(p), Some(Type::Parameterized(_))) => {
                walk.resolve_parameterized(binding, p)
            }
            (Type::Variable(v), Some(Type::Parameterized(b))) => walk.resolve_type_parameter(b, v),
            (
                Type::Parameterized(_) | Type::Variable(_),
                Some(Type::Class(c)) | Some(Type::Raw(c)),
            ) => {
                let up = walk.introspector.generic_superclass(c)?;
                walk.resolve_type(up.as_ref(), ty)
            }
            (Type::GenericArray(component), _) => {
                match walk.resolve_type(binding, component)? {
                    Type::Class(c) => Ok(Type::Class(c.array_of())),
                    other => Ok(Type::array(other)),
                }
            }
            _ => Ok(ty.clone()),
        })
    }

    fn resolve_parameterized(
        &mut self,
        binding: Option<&Type>,
        p: &ParameterizedType,
    ) -> Result<Type, WalkError> {
        let mut args = Vec::with_capacity(p.args.len());
        for arg in &p.args {
            args.push(self.resolve_type(binding, arg)?);
        }
        let owner = match &p.owner {
            Some(owner) => Some(self.resolve_type(binding, owner)?),
            None => None,
        };
        let resolved = Type::parameterized_with_owner(p.raw.clone(), args, owner);
        self.cache.insert(p.raw.clone(), resolved.clone());
        Ok(resolved)
    }

    fn resolve_type_parameter(
        &mut self,
        binding: &ParameterizedType,
        var: &TypeVariable,
    ) -> Result<Type, WalkError> {
        // Declared directly on the binding and bound to a concrete argument.
        let params = self.introspector.type_parameters(&binding.raw);
        for (param, actual) in params.iter().zip(&binding.args) {
            if actual.is_variable() {
                continue;
            }
            if param == var {
                return Ok(actual.clone());
            }
        }

        let var_ty = Type::Variable(var.clone());

        if let Some(super_raw) = self.introspector.superclass(&binding.raw) {
            let generic_super = match self.cache.get(&super_raw) {
                Some(cached) => Some(cached.clone()),
                None => self.introspector.generic_superclass(&binding.raw)?,
            };
            if let Some(generic_super) = generic_super {
                let resolved = self.resolve_type(Some(&generic_super), &var_ty)?;
                if !resolved.is_variable() {
                    return Ok(resolved);
                }
            }
        }

        for interface in self.introspector.generic_interfaces(&binding.raw)? {
            let interface = match &interface {
                Type::Parameterized(p) => self.cache.get(&p.raw).cloned().unwrap_or(interface),
                _ => interface,
            };
            let resolved = self.resolve_type(Some(&interface), &var_ty)?;
            if !resolved.is_variable() {
                return Ok(resolved);
            }
        }

        // Unbound generic, not an error.
        Ok(var_ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassDef, ClassTable, SERIALIZABLE};

    fn chain_table() -> ClassTable {
        let parent = ClassDef::class("Parent").type_param("P");
        let child = ClassDef::class("Child").type_param("T");
        let child_t = child.var("T");
        ClassTable::new()
            .with(parent)
            .with(child.extends(Type::parameterized("Parent", [child_t])))
            .with(
                ClassDef::class("Grandchild")
                    .extends(Type::parameterized("Child", [Type::class("String")])),
            )
    }

    #[test]
    fn non_generic_class_maps_each_ancestor_to_itself() {
        let table = ClassTable::new()
            .with(ClassDef::interface("Named"))
            .with(ClassDef::class("Base").implements(Type::class("Named")))
            .with(ClassDef::class("Leaf").extends(Type::class("Base")));

        let closure = HierarchyDiscovery::new(&table, Type::class("Leaf"))
            .discover()
            .unwrap();

        let expected: HashSet<Type> = ["Leaf", "Base", "Named", "Object"]
            .into_iter()
            .map(Type::class)
            .collect();
        assert_eq!(closure.iter().cloned().collect::<HashSet<_>>(), expected);
        for ty in closure.iter() {
            assert_eq!(closure.class_for(ty), ty.raw_class());
        }
    }

    #[test]
    fn variables_are_bound_through_three_levels() {
        let table = chain_table();
        let closure = HierarchyDiscovery::new(&table, Type::class("Grandchild"))
            .discover()
            .unwrap();

        let parent_of_string = Type::parameterized("Parent", [Type::class("String")]);
        assert!(closure.contains(&parent_of_string));
        assert_eq!(
            closure.type_for(&RawClass::named("Parent")),
            Some(&parent_of_string)
        );
    }

    #[test]
    fn generic_class_root_keeps_its_own_variables() {
        let table = chain_table();
        let discovery = HierarchyDiscovery::new(&table, Type::class("Child"));
        let closure = discovery.discover().unwrap();

        let t = Type::var("Child", "T");
        assert_eq!(discovery.resolved_type(), Type::parameterized("Child", [t.clone()]));
        assert_eq!(
            closure.type_for(&RawClass::named("Parent")),
            Some(&Type::parameterized("Parent", [t]))
        );
    }

    #[test]
    fn interface_arguments_follow_the_binding() {
        let iface = ClassDef::interface("Source").type_param("S");
        let holder = ClassDef::class("Holder").type_param("H");
        let h = holder.var("H");
        let table = ClassTable::new()
            .with(iface)
            .with(holder.implements(Type::parameterized(
                "Source",
                [Type::parameterized("Comparable", [h])],
            )));

        let root = Type::parameterized("Holder", [Type::class("Integer")]);
        let closure = HierarchyDiscovery::new(&table, root).discover().unwrap();

        assert_eq!(
            closure.type_for(&RawClass::named("Source")),
            Some(&Type::parameterized(
                "Source",
                [Type::parameterized("Comparable", [Type::class("Integer")])]
            ))
        );
    }

    #[test]
    fn raw_wrapper_records_erased_class() {
        let list = ClassDef::interface("List").type_param("E");
        let e = list.var("E");
        let table = ClassTable::new()
            .with(ClassDef::interface("Collection").type_param("C"))
            .with(list.implements(Type::parameterized("Collection", [e.clone()])));

        let closure = HierarchyDiscovery::new(&table, Type::raw("List"))
            .discover()
            .unwrap();

        assert_eq!(closure.type_for(&RawClass::named("List")), Some(&Type::class("List")));
        assert_eq!(
            closure.type_for(&RawClass::named("Collection")),
            Some(&Type::parameterized("Collection", [e]))
        );
    }

    #[test]
    fn later_path_overwrites_earlier_resolution() {
        let sink = ClassDef::interface("Sink").type_param("X");
        let base = ClassDef::class("Pipe").type_param("T");
        let t = base.var("T");
        let table = ClassTable::new()
            .with(sink)
            .with(base.implements(Type::parameterized("Sink", [t])))
            .with(
                ClassDef::class("Mixed")
                    .extends(Type::parameterized("Pipe", [Type::class("String")]))
                    .implements(Type::parameterized("Sink", [Type::class("Integer")])),
            );

        let closure = HierarchyDiscovery::new(&table, Type::class("Mixed"))
            .discover()
            .unwrap();

        let winner = Type::parameterized("Sink", [Type::class("Integer")]);
        assert_eq!(closure.type_for(&RawClass::named("Sink")), Some(&winner));
        assert!(!closure.contains(&Type::parameterized("Sink", [Type::class("String")])));
    }

    #[test]
    fn restricted_ancestor_is_skipped() {
        let table = ClassTable::new()
            .with(
                ClassDef::class("Sealed")
                    .implements(Type::class(SERIALIZABLE))
                    .restricted(),
            )
            .with(ClassDef::class("Visible").extends(Type::class("Sealed")));

        let closure = HierarchyDiscovery::new(&table, Type::class("Visible"))
            .discover()
            .unwrap();

        assert!(closure.contains(&Type::class("Visible")));
        assert!(closure.contains(&Type::class("Sealed")));
        assert!(!closure.contains_class(&RawClass::named(SERIALIZABLE)));
        assert!(!closure.contains_class(&RawClass::object()));
    }

    #[test]
    fn cyclic_hierarchy_hits_recursion_limit() {
        let table = ClassTable::new()
            .with(ClassDef::class("A").extends(Type::class("B")))
            .with(ClassDef::class("B").extends(Type::class("A")));

        let err = HierarchyDiscovery::new(&table, Type::class("A"))
            .with_config(ResolverConfig { max_depth: 32 })
            .discover()
            .unwrap_err();

        assert_eq!(
            err,
            ResolutionError::RecursionLimit {
                root: "A".to_owned(),
                limit: 32
            }
        );
    }

    #[test]
    fn erasure_of_variable_uses_first_bound() {
        let sorted = ClassDef::class("Sorted")
            .bounded_type_param(
                "T",
                [Type::parameterized("Comparable", [Type::var("Sorted", "T")])],
            )
            .type_param("U");
        let table = ClassTable::new().with(sorted);

        assert_eq!(
            raw_type(&table, &Type::var("Sorted", "T")),
            Some(RawClass::named("Comparable"))
        );
        assert_eq!(raw_type(&table, &Type::var("Sorted", "U")), Some(RawClass::object()));
    }
}
