//! Caller identity
//!
//! Identity resolution is best effort: it never fails, it just reports
//! anonymous when nobody is signed in.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Identity {
    User(String),
    Anonymous,
}

impl Identity {
    pub fn from_option(user_id: Option<String>) -> Self {
        match user_id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => Identity::User(id),
            _ => Identity::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current(&self) -> Identity;
}

/// Identity fixed at startup (CLI `--user`, `VIBES_USER`, or config)
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self(Identity::from_option(user_id))
    }

    pub fn anonymous() -> Self {
        Self(Identity::Anonymous)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> Identity {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        assert_eq!(Identity::from_option(None), Identity::Anonymous);
        assert_eq!(Identity::from_option(Some("  ".into())), Identity::Anonymous);
        assert_eq!(
            Identity::from_option(Some(" u1 ".into())),
            Identity::User("u1".into())
        );
    }

    #[tokio::test]
    async fn test_static_identity() {
        let provider = StaticIdentity::new(Some("alice".into()));
        let identity = provider.current().await;
        assert_eq!(identity.user_id(), Some("alice"));
        assert!(identity.is_authenticated());
        assert!(!StaticIdentity::anonymous().current().await.is_authenticated());
    }
}
