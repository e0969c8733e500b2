//! Test doubles for ingestflow pipelines.
//!
//! This module provides:
//! - Stages with fixed, failing, panicking, slow and recording behaviour
//! - A scripted AI collaborator
//! - An audit trail that rejects every append

mod mocks;

pub use mocks::{
    FailingAuditTrail, FailingStage, PanickingStage, RecordingStage, ScriptedCollaborator,
    SlowStage, StaticStage,
};
