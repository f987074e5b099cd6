//! Declarative class model, loadable from YAML.
//!
//! ```yaml
//! classes:
//!   - name: Parent
//!     type_params: [P]
//!   - name: Child
//!     type_params: [T]
//!     extends: Parent<T>
//!   - name: Sorted
//!     type_params:
//!       - name: T
//!         bounds: [Comparable<T>]
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::class_table::{ClassDef, ClassKind, ClassTable};
use super::parse::{parse_type, ParseError};
use super::{RawClass, Type, TypeVariable};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to parse class model")]
    Yaml(#[from] serde_yaml::Error),
    #[error("class '{class}': invalid type expression")]
    Type {
        class: String,
        #[source]
        source: ParseError,
    },
    #[error("class '{class}' references unknown class '{referenced}'")]
    UnknownClass { class: String, referenced: String },
    #[error("class '{0}' is declared more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassModel {
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    /// Overrides the interfaces implemented by array classes.
    #[serde(default)]
    pub array_interfaces: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub type_params: Vec<TypeParamDecl>,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub declared_in: Option<String>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeParamDecl {
    Name(String),
    Bounded { name: String, bounds: Vec<String> },
}

impl TypeParamDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeParamDecl::Name(n) | TypeParamDecl::Bounded { name: n, .. } => n,
        }
    }
}

impl ClassModel {
    pub fn from_yaml_str(s: &str) -> Result<Self, ModelError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Builtin classes plus the declared ones.
    pub fn build_table(&self) -> Result<ClassTable, ModelError> {
        let mut table = ClassTable::new();
        let mut declared = HashSet::new();

        for decl in &self.classes {
            if !declared.insert(decl.name.as_str()) {
                return Err(ModelError::Duplicate(decl.name.clone()));
            }
            table.insert(decl.to_def()?);
        }

        if let Some(names) = &self.array_interfaces {
            let interfaces = names
                .iter()
                .map(|n| parse_type(n, &[]))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| ModelError::Type {
                    class: "[]".to_owned(),
                    source,
                })?;
            table = table.with_array_interfaces(interfaces);
        }

        for decl in &self.classes {
            let Some(def) = table.get(&decl.name) else {
                continue;
            };
            let mut referenced = Vec::new();
            for ty in def
                .superclass
                .iter()
                .chain(def.interfaces.iter())
                .chain(def.type_params.iter().flat_map(|p| p.bounds.iter()))
            {
                collect_classes(ty, &mut referenced);
            }
            if let Some(owner) = &def.declaring_class {
                referenced.push(owner.clone());
            }
            for class in referenced {
                let name = class.element_name();
                if !table.contains(name) {
                    return Err(ModelError::UnknownClass {
                        class: decl.name.clone(),
                        referenced: name.to_owned(),
                    });
                }
            }
        }

        tracing::debug!(classes = self.classes.len(), "class model loaded");
        Ok(table)
    }
}

impl ClassDecl {
    fn to_def(&self) -> Result<ClassDef, ModelError> {
        let mut def = match self.kind {
            ClassKind::Class => ClassDef::class(&self.name),
            ClassKind::Interface => ClassDef::interface(&self.name),
            ClassKind::Primitive => ClassDef::primitive(&self.name),
        };
        let raw = def.raw();
        let vars: Vec<TypeVariable> = self
            .type_params
            .iter()
            .map(|p| TypeVariable::new(raw.clone(), p.name()))
            .collect();
        let parse = |expr: &str| {
            parse_type(expr, &vars).map_err(|source| ModelError::Type {
                class: self.name.clone(),
                source,
            })
        };

        for param in &self.type_params {
            let bounds = match param {
                TypeParamDecl::Name(_) => Vec::new(),
                TypeParamDecl::Bounded { bounds, .. } => bounds
                    .iter()
                    .map(|b| parse(b.as_str()))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            def = def.bounded_type_param(param.name(), bounds);
        }
        if let Some(extends) = &self.extends {
            def = def.extends(parse(extends.as_str())?);
        }
        for interface in &self.implements {
            def = def.implements(parse(interface.as_str())?);
        }
        if let Some(owner) = &self.declared_in {
            def = def.declared_in(owner);
        }
        if self.is_final {
            def = def.final_class();
        }
        if self.restricted {
            def = def.restricted();
        }
        Ok(def)
    }
}

fn collect_classes(ty: &Type, out: &mut Vec<RawClass>) {
    match ty {
        Type::Class(c) | Type::Raw(c) => out.push(c.clone()),
        Type::Parameterized(p) => {
            out.push(p.raw.clone());
            for arg in &p.args {
                collect_classes(arg, out);
            }
            if let Some(owner) = &p.owner {
                collect_classes(owner, out);
            }
        }
        Type::GenericArray(component) => collect_classes(component, out),
        Type::Variable(_) => {}
    }
}
