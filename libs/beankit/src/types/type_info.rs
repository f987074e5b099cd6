use std::collections::HashSet;

use super::class_table::TypeIntrospector;
use super::hierarchy::raw_type;
use super::{RawClass, Type};

/// Raw classes of a set of types, split into classes and interfaces.
pub struct TypeInfo<'a> {
    introspector: &'a dyn TypeIntrospector,
    classes: Vec<RawClass>,
    interfaces: Vec<RawClass>,
}

impl<'a> TypeInfo<'a> {
    pub fn of<'t>(
        introspector: &'a dyn TypeIntrospector,
        types: impl IntoIterator<Item = &'t Type>,
    ) -> Self {
        let mut classes = Vec::new();
        let mut interfaces = Vec::new();
        for ty in types {
            let Some(raw) = raw_type(introspector, ty) else {
                continue;
            };
            if introspector.is_interface(&raw) {
                interfaces.push(raw);
            } else {
                classes.push(raw);
            }
        }
        Self {
            introspector,
            classes,
            interfaces,
        }
    }

    /// Most specific class, or the root object class if there is none.
    pub fn super_class(&self) -> RawClass {
        let mut iter = self.classes.iter();
        let Some(mut best) = iter.next() else {
            return RawClass::object();
        };
        for class in iter {
            if self.is_subclass_of(class, best) {
                best = class;
            }
        }
        best.clone()
    }

    /// First interface encountered.
    pub fn super_interface(&self) -> Option<&RawClass> {
        self.interfaces.first()
    }

    pub fn interfaces(&self) -> &[RawClass] {
        &self.interfaces
    }

    fn is_subclass_of(&self, class: &RawClass, ancestor: &RawClass) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(class.clone());
        while let Some(c) = current {
            if &c == ancestor {
                return true;
            }
            if !seen.insert(c.clone()) {
                return false;
            }
            current = self.introspector.superclass(&c);
        }
        false
    }
}
