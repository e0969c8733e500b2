//! The external AI collaborator seam.

use crate::core::Payload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request sent to an AI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequest {
    /// Task the collaborator is asked to perform.
    pub task: String,
    /// Prompt template id.
    pub prompt_id: String,
    /// Prompt template version.
    pub prompt_version: u32,
    /// Rendered prompt.
    pub prompt: String,
    /// Validated stage input the prompt was rendered from.
    pub input: Payload,
}

/// Errors reported by an AI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached.
    #[error("collaborator unreachable: {0}")]
    Unreachable(String),

    /// The collaborator refused the request.
    #[error("collaborator rejected the request: {0}")]
    Rejected(String),

    /// The collaborator answered with something that is not a response.
    #[error("collaborator returned an unusable answer: {0}")]
    Unusable(String),
}

/// An opaque, non-deterministic service that answers prompts.
///
/// Implementations return the raw response text. Parsing and contract
/// validation happen in [`AiBoundaryAdapter`](super::AiBoundaryAdapter).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiCollaborator: Send + Sync {
    /// Sends one request and returns the raw response text.
    async fn complete(&self, request: &AiRequest) -> Result<String, CollaboratorError>;
}
