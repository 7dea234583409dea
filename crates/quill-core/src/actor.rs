//! Actor context for a save operation.
//!
//! The stamper never reads ambient state: callers resolve an [`ActorInfo`]
//! per save (typically through an [`ActorResolver`] at the request boundary)
//! and pass it explicitly. Every field is optional; missing context is not an
//! error.

use serde::{Deserialize, Serialize};

/// Who or what produced a unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    /// Actor identity, stored as the record's `actor`.
    pub actor: Option<String>,
    /// Request origin (e.g. client address), stored as `source_context`.
    pub origin_address: Option<String>,
    /// Request agent (e.g. user agent), stored as `notes`.
    pub origin_agent: Option<String>,
    /// Caller-defined session correlation id.
    pub session_id: Option<String>,
}

impl ActorInfo {
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_origin_address(mut self, address: impl Into<String>) -> Self {
        self.origin_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_origin_agent(mut self, agent: impl Into<String>) -> Self {
        self.origin_agent = Some(agent.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Resolves the actor for the current save operation.
pub trait ActorResolver: Send + Sync {
    fn resolve(&self) -> Option<ActorInfo>;
}

/// Resolver returning a fixed actor (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticActor(pub Option<ActorInfo>);

impl ActorResolver for StaticActor {
    fn resolve(&self) -> Option<ActorInfo> {
        self.0.clone()
    }
}

impl<F> ActorResolver for F
where
    F: Fn() -> Option<ActorInfo> + Send + Sync,
{
    fn resolve(&self) -> Option<ActorInfo> {
        self()
    }
}
