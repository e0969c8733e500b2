//! AI boundary.
//!
//! Non-deterministic collaborators sit behind an [`AiBoundaryAdapter`]: it
//! renders a versioned prompt, bounds the call with a timeout, and lets a
//! response through only after it satisfied a schema contract.

mod adapter;
mod collaborator;
mod prompt;
mod stage;

pub use adapter::{ai_response_contract, AiBoundaryAdapter, DEFAULT_AI_TIMEOUT};
#[cfg(test)]
pub use collaborator::MockAiCollaborator;
pub use collaborator::{AiCollaborator, AiRequest, CollaboratorError};
pub use prompt::PromptTemplate;
pub use stage::AiStage;
