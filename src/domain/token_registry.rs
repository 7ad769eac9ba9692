//! Bearer credential lookup for the push endpoint.

use std::collections::HashMap;

use super::SubjectId;

/// Maps bearer credentials to the subject they authenticate.
#[derive(Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, SubjectId>,
}

impl TokenRegistry {
    /// Builds a registry from `(subject, token)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (SubjectId, String)>) -> Self {
        let tokens = pairs
            .into_iter()
            .map(|(subject, token)| (token, subject))
            .collect();
        Self { tokens }
    }

    /// Registers (or re-points) a credential.
    pub fn insert(&mut self, subject: SubjectId, token: impl Into<String>) {
        self.tokens.insert(token.into(), subject);
    }

    /// Resolves a credential to its subject.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<&SubjectId> {
        self.tokens.get(token)
    }

    /// Number of registered credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no credentials are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// Tokens are secrets; only the count is printed.
impl std::fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticates_known_token() {
        let registry = TokenRegistry::from_pairs([
            (SubjectId::from("1"), "alpha".to_string()),
            (SubjectId::from("2"), "beta".to_string()),
        ]);
        assert_eq!(registry.authenticate("beta"), Some(&SubjectId::from("2")));
        assert_eq!(registry.authenticate("gamma"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn debug_hides_tokens() {
        let mut registry = TokenRegistry::default();
        registry.insert(SubjectId::from("1"), "alpha");
        assert!(!format!("{registry:?}").contains("alpha"));
    }
}
