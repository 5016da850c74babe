// Identity boundary: the engine receives an already-resolved actor and
// trusts its role. Authentication itself lives behind the Directory trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Approval chain roles. No hierarchy: a transition names exactly one role
/// and only that role may take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Requester,
    Reviewer,
    Approver,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Requester => write!(f, "Requester"),
            Role::Reviewer => write!(f, "Reviewer"),
            Role::Approver => write!(f, "Approver"),
        }
    }
}

/// A resolved identity acting on the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

/// Opaque login material handed to the directory for resolution.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user: String,
    pub secret: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("unknown or rejected credential for {user}")]
    UnknownActor { user: String },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory/auth boundary. Implementations resolve a credential to an
/// `Actor`; the engine performs no further identity verification.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve_actor(&self, credential: &Credential) -> Result<Actor, DirectoryError>;
}

/// In-memory directory for embedding and tests.
#[derive(Default)]
pub struct StaticDirectory {
    entries: HashMap<String, (String, Actor)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, secret: impl Into<String>, actor: Actor) -> Self {
        self.entries
            .insert(actor.id.clone(), (secret.into(), actor));
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn resolve_actor(&self, credential: &Credential) -> Result<Actor, DirectoryError> {
        match self.entries.get(&credential.user) {
            Some((secret, actor)) if *secret == credential.secret => Ok(actor.clone()),
            _ => Err(DirectoryError::UnknownActor {
                user: credential.user.clone(),
            }),
        }
    }
}
