//! # Session Module
//!
//! The facade callers use: a curriculum catalog plus a relation store, with
//! one method per exposed operation.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: Uses `MemoryRelations` (fast, volatile)
//! - `Persistent`: Uses `RedbStore` for disk-backed ACID storage; the
//!   catalog snapshot is stored in the same database

use crate::availability::{AvailabilityEngine, AvailabilityQuery, AvailableEntities};
use crate::batch::{BatchEngine, BatchReport};
use crate::catalog::{Catalog, CatalogCounts, CatalogSeed, ObjectiveCatalog, OutcomeCatalog};
use crate::matrix::{Matrix, MatrixEngine, MatrixRequest};
use crate::relations::{MemoryRelations, RelationFilter, RelationStore};
use crate::stats::MappingStats;
use crate::storage::RedbStore;
use crate::trace::{CourseTrace, ObjectiveTrace, TraceEngine};
use crate::{
    ContributionLevel, CourseId, ProgramId, Relation, RelationDraft, RelationId, RelationKind,
    RelationLink, RelationPatch, TrazaError,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Log a storage error and fall back to the default value.
#[inline]
fn log_and_default<T: Default>(result: Result<T, TrazaError>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(context, error = %e, "storage error");
            T::default()
        }
    }
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory relation tables (fast, volatile).
    InMemory(MemoryRelations),
    /// Disk-backed relations using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryRelations::new())
    }
}

impl RelationStore for StorageBackend {
    fn insert(&mut self, draft: RelationDraft) -> Result<Relation, TrazaError> {
        match self {
            Self::InMemory(store) => store.insert(draft),
            Self::Persistent(store) => store.insert(draft),
        }
    }

    fn insert_many(
        &mut self,
        drafts: Vec<RelationDraft>,
    ) -> Result<Vec<Result<Relation, TrazaError>>, TrazaError> {
        match self {
            Self::InMemory(store) => store.insert_many(drafts),
            Self::Persistent(store) => store.insert_many(drafts),
        }
    }

    fn get(&self, kind: RelationKind, id: RelationId) -> Result<Option<Relation>, TrazaError> {
        match self {
            Self::InMemory(store) => store.get(kind, id),
            Self::Persistent(store) => store.get(kind, id),
        }
    }

    fn find_pair(&self, link: &RelationLink) -> Result<Option<Relation>, TrazaError> {
        match self {
            Self::InMemory(store) => store.find_pair(link),
            Self::Persistent(store) => store.find_pair(link),
        }
    }

    fn update(
        &mut self,
        kind: RelationKind,
        id: RelationId,
        patch: &RelationPatch,
    ) -> Result<Relation, TrazaError> {
        match self {
            Self::InMemory(store) => store.update(kind, id, patch),
            Self::Persistent(store) => store.update(kind, id, patch),
        }
    }

    fn remove(&mut self, kind: RelationKind, id: RelationId) -> Result<Relation, TrazaError> {
        match self {
            Self::InMemory(store) => store.remove(kind, id),
            Self::Persistent(store) => store.remove(kind, id),
        }
    }

    fn list(
        &self,
        kind: RelationKind,
        filter: &RelationFilter,
    ) -> Result<Vec<Relation>, TrazaError> {
        match self {
            Self::InMemory(store) => store.list(kind, filter),
            Self::Persistent(store) => store.list(kind, filter),
        }
    }

    fn count(&self, kind: RelationKind) -> Result<usize, TrazaError> {
        match self {
            Self::InMemory(store) => store.count(kind),
            Self::Persistent(store) => store.count(kind),
        }
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Number of stored relations per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationCounts {
    pub outcome_objective: usize,
    pub outcome_criterion: usize,
    pub course_outcome_outcome: usize,
}

/// Snapshot of what a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub persistent: bool,
    pub catalog: CatalogCounts,
    pub relations: RelationCounts,
}

// =============================================================================
// SESSION
// =============================================================================

/// A Session combines the curriculum catalog with a relation store.
///
/// Note: Session does NOT implement Clone; the redb handle cannot be cloned.
#[derive(Debug, Default)]
pub struct Session {
    /// Curriculum entities, always held in memory.
    catalog: Catalog,
    /// The relation storage backend (in-memory or persistent).
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory session over an existing catalog.
    #[must_use]
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            backend: StorageBackend::default(),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path and loads the
    /// catalog snapshot stored in it.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, TrazaError> {
        let store = RedbStore::open(path)?;
        let catalog = store.load_catalog()?;
        Ok(Self {
            catalog,
            backend: StorageBackend::Persistent(store),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Replace the catalog. Persistent sessions store the new snapshot.
    pub fn import_catalog(&mut self, seed: CatalogSeed) -> Result<CatalogCounts, TrazaError> {
        let catalog = Catalog::from_seed(seed)?;
        if let StorageBackend::Persistent(store) = &mut self.backend {
            store.save_catalog(&catalog)?;
        }
        let counts = catalog.counts();
        self.catalog = catalog;
        tracing::info!(
            programs = counts.programs,
            courses = counts.courses,
            outcomes = counts.outcomes,
            criteria = counts.criteria,
            "catalog imported"
        );
        Ok(counts)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let count = |kind: RelationKind| log_and_default(self.backend.count(kind), "status");
        SessionStatus {
            persistent: self.is_persistent(),
            catalog: self.catalog.counts(),
            relations: RelationCounts {
                outcome_objective: count(RelationKind::OutcomeObjective),
                outcome_criterion: count(RelationKind::OutcomeCriterion),
                course_outcome_outcome: count(RelationKind::CourseOutcomeOutcome),
            },
        }
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Create up to 50 relations of one kind, keeping the valid ones.
    pub fn create_batch(
        &mut self,
        kind: RelationKind,
        items: Vec<RelationDraft>,
    ) -> Result<BatchReport, TrazaError> {
        BatchEngine::create_batch(&self.catalog, &mut self.backend, kind, items)
    }

    /// Create one relation.
    pub fn create_single(&mut self, item: RelationDraft) -> Result<Relation, TrazaError> {
        BatchEngine::create_single(&self.catalog, &mut self.backend, item)
    }

    /// Change relation metadata. Endpoints never change.
    pub fn update_relation(
        &mut self,
        kind: RelationKind,
        id: RelationId,
        patch: &RelationPatch,
    ) -> Result<Relation, TrazaError> {
        patch.validate_for(kind)?;
        let relation = self.backend.update(kind, id, patch)?;
        tracing::info!(kind = %kind, id = %id, "relation updated");
        Ok(relation)
    }

    /// Hard-delete a relation.
    pub fn delete_relation(
        &mut self,
        kind: RelationKind,
        id: RelationId,
    ) -> Result<Relation, TrazaError> {
        let relation = self.backend.remove(kind, id)?;
        tracing::info!(kind = %kind, id = %id, "relation deleted");
        Ok(relation)
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn get_relation(
        &self,
        kind: RelationKind,
        id: RelationId,
    ) -> Result<Relation, TrazaError> {
        self.backend
            .get(kind, id)?
            .ok_or_else(|| TrazaError::NotFound(crate::EntityRef::relation(kind, id)))
    }

    /// Relations of one kind matching `filter`, newest first.
    ///
    /// A program restriction is resolved against the session catalog.
    pub fn list_relations(
        &self,
        kind: RelationKind,
        filter: &RelationFilter,
    ) -> Result<Vec<Relation>, TrazaError> {
        let filter = filter.clone().resolve_program(kind, &self.catalog)?;
        self.backend.list(kind, &filter)
    }

    pub fn get_matrix(&self, request: &MatrixRequest) -> Result<Matrix, TrazaError> {
        tracing::debug!(program = %request.program(), "materializing matrix");
        MatrixEngine::materialize(&self.catalog, &self.backend, request)
    }

    pub fn get_traceability(
        &self,
        course: CourseId,
        program: ProgramId,
        levels: &BTreeSet<ContributionLevel>,
    ) -> Result<CourseTrace, TrazaError> {
        TraceEngine::course_trace(&self.catalog, &self.backend, course, program, levels)
    }

    pub fn get_objective_traceability(
        &self,
        program: ProgramId,
        levels: &BTreeSet<ContributionLevel>,
    ) -> Result<ObjectiveTrace, TrazaError> {
        TraceEngine::objective_trace(&self.catalog, &self.backend, program, levels)
    }

    pub fn get_available(&self, query: AvailabilityQuery) -> Result<AvailableEntities, TrazaError> {
        AvailabilityEngine::available(&self.catalog, &self.backend, query)
    }

    pub fn mapping_stats(&self, program: ProgramId) -> Result<MappingStats, TrazaError> {
        MappingStats::for_program(&self.catalog, &self.backend, program)
    }

    pub fn objective_catalog(&self, program: ProgramId) -> Result<ObjectiveCatalog, TrazaError> {
        ObjectiveCatalog::build(&self.catalog, program)
    }

    pub fn outcome_catalog(&self, program: ProgramId) -> Result<OutcomeCatalog, TrazaError> {
        OutcomeCatalog::build(&self.catalog, program)
    }
}

// =============================================================================
// TESTS
// =============================================================================
