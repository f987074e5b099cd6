//! Scope identities and their classification.

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;

/// Scope identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    pub const DEPENDENT: Scope = Scope(Cow::Borrowed("Dependent"));
    pub const SINGLETON: Scope = Scope(Cow::Borrowed("Singleton"));
    pub const REQUEST: Scope = Scope(Cow::Borrowed("Request"));
    pub const APPLICATION: Scope = Scope(Cow::Borrowed("Application"));
    pub const SESSION: Scope = Scope(Cow::Borrowed("Session"));
    pub const CONVERSATION: Scope = Scope(Cow::Borrowed("Conversation"));

    pub fn custom(name: impl Into<String>) -> Self {
        Scope(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_dependent(&self) -> bool {
        *self == Scope::DEPENDENT
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    /// Builtin names map to the builtin scopes; anything else is a custom scope.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let builtin = [
            Scope::DEPENDENT,
            Scope::SINGLETON,
            Scope::REQUEST,
            Scope::APPLICATION,
            Scope::SESSION,
            Scope::CONVERSATION,
        ]
        .into_iter()
        .find(|scope| scope.name().eq_ignore_ascii_case(s.trim()));
        Ok(builtin.unwrap_or_else(|| Scope::custom(s.trim())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Instances are handed out directly, without a client proxy.
    Pseudo,
    Normal,
    /// Normal scope whose instances may be serialized across passivation.
    Passivating,
}

pub trait ScopeClassifier: Send + Sync {
    fn is_normal_scope(&self, scope: &Scope) -> bool;

    fn is_passivating_scope(&self, scope: &Scope) -> bool;
}

/// Known scopes. Unknown scopes are treated as pseudo-scopes.
#[derive(Debug)]
pub struct ScopeRegistry {
    kinds: DashMap<Scope, ScopeKind>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    pub fn new() -> Self {
        let kinds = DashMap::new();
        kinds.insert(Scope::DEPENDENT, ScopeKind::Pseudo);
        kinds.insert(Scope::SINGLETON, ScopeKind::Pseudo);
        kinds.insert(Scope::REQUEST, ScopeKind::Normal);
        kinds.insert(Scope::APPLICATION, ScopeKind::Normal);
        kinds.insert(Scope::SESSION, ScopeKind::Passivating);
        kinds.insert(Scope::CONVERSATION, ScopeKind::Passivating);
        Self { kinds }
    }

    /// Register or reclassify a scope.
    pub fn register(&self, scope: Scope, kind: ScopeKind) {
        tracing::debug!(scope = %scope, ?kind, "scope registered");
        self.kinds.insert(scope, kind);
    }

    pub fn kind(&self, scope: &Scope) -> Option<ScopeKind> {
        self.kinds.get(scope).map(|k| *k)
    }
}

impl ScopeClassifier for ScopeRegistry {
    fn is_normal_scope(&self, scope: &Scope) -> bool {
        matches!(
            self.kind(scope),
            Some(ScopeKind::Normal | ScopeKind::Passivating)
        )
    }

    fn is_passivating_scope(&self, scope: &Scope) -> bool {
        self.kind(scope) == Some(ScopeKind::Passivating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scopes_are_classified() {
        let scopes = ScopeRegistry::new();
        assert!(!scopes.is_normal_scope(&Scope::DEPENDENT));
        assert!(scopes.is_normal_scope(&Scope::REQUEST));
        assert!(!scopes.is_passivating_scope(&Scope::REQUEST));
        assert!(scopes.is_normal_scope(&Scope::SESSION));
        assert!(scopes.is_passivating_scope(&Scope::CONVERSATION));
    }

    #[test]
    fn custom_scope_can_be_registered() {
        let scopes = ScopeRegistry::new();
        let wizard = Scope::custom("Wizard");
        assert!(!scopes.is_normal_scope(&wizard));

        scopes.register(wizard.clone(), ScopeKind::Passivating);
        assert!(scopes.is_passivating_scope(&wizard));
        assert_eq!(wizard, Scope::custom("Wizard"));
    }

    #[test]
    fn parse_prefers_builtin_scopes() {
        assert_eq!("session".parse::<Scope>().unwrap(), Scope::SESSION);
        assert_eq!(" Request ".parse::<Scope>().unwrap(), Scope::REQUEST);
        assert_eq!("Wizard".parse::<Scope>().unwrap(), Scope::custom("Wizard"));
    }
}
