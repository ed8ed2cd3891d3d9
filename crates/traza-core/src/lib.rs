//! # traza-core
//!
//! The deterministic traceability engine for Traza - THE LOGIC.
//!
//! This crate records how a curriculum's outcomes relate to each other and
//! answers the questions accreditation reviews ask of those relations.
//!
//! ## Relation Sets
//!
//! - outcome -> objective: which program objectives an outcome supports
//! - outcome -> criterion: which accreditation criteria an outcome evidences
//! - course outcome -> outcome: how strongly a course contributes
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Owns the curriculum catalog and the three relation sets
//! - Is deterministic: ordered maps only, integer coverage arithmetic
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod availability;
pub mod batch;
pub mod catalog;
#[cfg(test)]
mod fixtures;
pub mod matrix;
pub mod primitives;
pub mod relations;
pub mod session;
pub mod stats;
pub mod storage;
pub mod trace;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ContributionLevel, Course, CourseId, CourseOutcome, CourseOutcomeId, CourseOutcomeKind,
    Criterion, CriterionId, EntityRef, LearningOutcome, LinkId, Objective, ObjectiveId,
    OutcomeId, OutcomeKind, Program, ProgramCourseLink, ProgramId, RecordKind, Relation,
    RelationDraft, RelationId, RelationKind, RelationLink, RelationPatch, TrazaError,
};

// =============================================================================
// RE-EXPORTS: Stores
// =============================================================================

pub use catalog::{
    Catalog, CatalogCounts, CatalogSeed, EntityStore, KindDistribution, ObjectiveCatalog,
    OutcomeCatalog,
};
pub use relations::{MemoryRelations, RelationFilter, RelationStore};
pub use storage::RedbStore;

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use availability::{AvailabilityEngine, AvailabilityQuery, AvailableEntities};
pub use batch::{BatchEngine, BatchReport};
pub use matrix::{
    AxisEntry, Coverage, Matrix, MatrixCell, MatrixEngine, MatrixKind, MatrixRequest, MatrixStats,
};
pub use session::{RelationCounts, Session, SessionStatus, StorageBackend};
pub use stats::MappingStats;
pub use trace::{
    ChainEntry, ChainNode, CourseContribution, CourseTrace, LevelGroups, ObjectiveBranch,
    ObjectiveTrace, OutcomeBranch, TraceEngine,
};
