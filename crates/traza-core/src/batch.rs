//! # Batch Mutation Engine
//!
//! Validated creation of relations, one at a time or in batches.
//!
//! Batch creation is "create what is valid": every candidate is screened on
//! its own, rejected candidates are reported with a message, and the rest
//! are written together in one storage transaction. The transaction groups
//! writes for efficiency only; it commits whatever was staged. Only an
//! infrastructure failure aborts the whole call.
//!
//! Screening order per candidate:
//! 0. relation kind and metadata (level, justification)
//! 1. both endpoints exist
//! 2. both endpoints belong to the same program (R1, R3)
//! 3. the pair is not stored yet and not staged earlier in the batch

use crate::catalog::EntityStore;
use crate::primitives::MAX_BATCH_SIZE;
use crate::relations::RelationStore;
use crate::{
    EntityRef, ProgramId, Relation, RelationDraft, RelationId, RelationKind, RelationLink,
    TrazaError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Summary of a batch creation call.
///
/// `succeeded + failed == total_requested` and
/// `created_ids.len() == succeeded` always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One message per rejected candidate, in candidate order.
    pub errors: Vec<String>,
    /// Ids of created relations, in candidate order.
    pub created_ids: Vec<RelationId>,
}

/// Outcome of screening one candidate.
enum Slot {
    Rejected(String),
    Staged,
}

/// The BatchEngine owns every relation write that creates rows.
pub struct BatchEngine;

impl BatchEngine {
    /// Create a single relation. Fails with the first rule it breaks.
    pub fn create_single<E, R>(
        entities: &E,
        relations: &mut R,
        draft: RelationDraft,
    ) -> Result<Relation, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        Self::check_endpoints(entities, &draft)?;
        if relations.find_pair(&draft.link)?.is_some() {
            return Err(duplicate(&draft.link));
        }
        let relation = relations.insert(draft)?;
        tracing::info!(kind = %relation.kind(), id = %relation.id, "relation created");
        Ok(relation)
    }

    /// Create up to [`MAX_BATCH_SIZE`] relations of one kind.
    pub fn create_batch<E, R>(
        entities: &E,
        relations: &mut R,
        kind: RelationKind,
        candidates: Vec<RelationDraft>,
    ) -> Result<BatchReport, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        if candidates.is_empty() {
            return Err(TrazaError::InvalidRequest(
                "a batch must contain at least one relation".to_string(),
            ));
        }
        // One limit for every relation kind.
        if candidates.len() > MAX_BATCH_SIZE {
            return Err(TrazaError::InvalidRequest(format!(
                "a batch may contain at most {} relations (got {})",
                MAX_BATCH_SIZE,
                candidates.len()
            )));
        }

        let total_requested = candidates.len();
        let mut slots = Vec::with_capacity(total_requested);
        let mut staged = Vec::new();
        let mut pending: BTreeSet<(u64, u64)> = BTreeSet::new();

        for (index, draft) in candidates.into_iter().enumerate() {
            match Self::screen(entities, relations, kind, &draft, &pending) {
                Ok(()) => {
                    pending.insert(draft.link.pair());
                    staged.push(draft);
                    slots.push(Slot::Staged);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(index, error = %e, "batch candidate rejected");
                    slots.push(Slot::Rejected(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let mut inserted = relations.insert_many(staged)?.into_iter();
        let mut report = BatchReport {
            total_requested,
            ..BatchReport::default()
        };
        for slot in slots {
            let result = match slot {
                Slot::Rejected(message) => Err(message),
                Slot::Staged => inserted
                    .next()
                    .unwrap_or_else(|| {
                        Err(TrazaError::IoError("missing insert result".to_string()))
                    })
                    .map(|r| r.id)
                    .map_err(|e| e.to_string()),
            };
            match result {
                Ok(id) => {
                    report.succeeded += 1;
                    report.created_ids.push(id);
                }
                Err(message) => {
                    report.failed += 1;
                    report.errors.push(message);
                }
            }
        }

        tracing::info!(
            kind = %kind,
            total = report.total_requested,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch processed"
        );
        Ok(report)
    }

    /// Check metadata, endpoint existence and program scoping of a draft.
    ///
    /// Does not look at stored relations.
    pub fn check_endpoints<E: EntityStore + ?Sized>(
        entities: &E,
        draft: &RelationDraft,
    ) -> Result<(), TrazaError> {
        draft.validate()?;
        match draft.link {
            RelationLink::OutcomeObjective { outcome, objective } => {
                let outcome = entities.require_learning_outcome(outcome)?;
                let objective = entities.require_objective(objective)?;
                same_program(
                    (outcome.id.into(), outcome.program),
                    (objective.id.into(), objective.program),
                )
            }
            RelationLink::OutcomeCriterion { outcome, criterion } => {
                entities.require_learning_outcome(outcome)?;
                entities.require_criterion(criterion)?;
                Ok(())
            }
            RelationLink::CourseOutcomeOutcome {
                course_outcome,
                outcome,
            } => {
                let course_outcome = entities.require_course_outcome(course_outcome)?;
                let outcome = entities.require_learning_outcome(outcome)?;
                let program = entities.course_outcome_program(&course_outcome)?;
                same_program(
                    (course_outcome.id.into(), program),
                    (outcome.id.into(), outcome.program),
                )
            }
        }
    }

    fn screen<E, R>(
        entities: &E,
        relations: &R,
        kind: RelationKind,
        draft: &RelationDraft,
        pending: &BTreeSet<(u64, u64)>,
    ) -> Result<(), TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        if draft.kind() != kind {
            return Err(TrazaError::InvalidRequest(format!(
                "expected a {} relation, got {}",
                kind,
                draft.kind()
            )));
        }
        Self::check_endpoints(entities, draft)?;
        if pending.contains(&draft.link.pair()) || relations.find_pair(&draft.link)?.is_some() {
            return Err(duplicate(&draft.link));
        }
        Ok(())
    }
}

fn duplicate(link: &RelationLink) -> TrazaError {
    TrazaError::DuplicateRelation {
        kind: link.kind(),
        from: link.source(),
        to: link.target(),
    }
}

fn same_program(
    (left, left_program): (EntityRef, ProgramId),
    (right, right_program): (EntityRef, ProgramId),
) -> Result<(), TrazaError> {
    if left_program == right_program {
        return Ok(());
    }
    Err(TrazaError::InvalidRequest(format!(
        "{} belongs to program {} but {} belongs to program {}",
        left, left_program, right, right_program
    )))
}

// =============================================================================
// TESTS
// =============================================================================
