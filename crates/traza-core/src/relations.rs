//! # Relation Store
//!
//! CRUD over the three relation sets.
//!
//! Every relation kind has its own table, its own id sequence (starting at 1)
//! and a unique index on its (source, target) pair. The pair index is the
//! final guard against duplicates: whatever the callers checked beforehand,
//! a second row for the same pair is rejected with `Conflict`.
//!
//! `MemoryRelations` is the in-memory implementation; the redb-backed one
//! lives in [`crate::storage`].

use crate::catalog::EntityStore;
use crate::{
    ContributionLevel, EntityRef, ProgramId, Relation, RelationDraft, RelationId, RelationKind,
    RelationLink, RelationPatch, TrazaError,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// FILTER
// =============================================================================

/// Row filter for [`RelationStore::list`].
///
/// Empty or `None` fields do not filter. `levels` matches any of its members
/// and only ever matches rows that carry a contribution level.
///
/// `program` needs the entity catalog: relation stores ignore it, and
/// [`RelationFilter::resolve_program`] turns it into a source restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    pub sources: Option<BTreeSet<u64>>,
    pub targets: Option<BTreeSet<u64>>,
    pub active: Option<bool>,
    pub levels: BTreeSet<ContributionLevel>,
    pub program: Option<ProgramId>,
}

impl RelationFilter {
    /// Filter that only keeps active rows.
    #[must_use]
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sources(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.sources = Some(ids.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_targets(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.targets = Some(ids.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = ContributionLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_program(mut self, program: ProgramId) -> Self {
        self.program = Some(program);
        self
    }

    /// Replace the program restriction by the ids of the program's sources.
    ///
    /// Sources are the program's learning outcomes for R1 and R2, and the
    /// course outcomes of its course links for R3. Explicit `sources` are
    /// intersected with that set. Unknown programs are `NotFound`.
    pub fn resolve_program<E: EntityStore + ?Sized>(
        mut self,
        kind: RelationKind,
        entities: &E,
    ) -> Result<Self, TrazaError> {
        let Some(program) = self.program.take() else {
            return Ok(self);
        };
        entities.require_program(program)?;

        let owned: BTreeSet<u64> = match kind {
            RelationKind::OutcomeObjective | RelationKind::OutcomeCriterion => entities
                .outcomes_by_program(program, None)?
                .iter()
                .map(|o| o.id.0)
                .collect(),
            RelationKind::CourseOutcomeOutcome => {
                let mut ids = BTreeSet::new();
                for link in entities.links_by_program(program)? {
                    ids.extend(
                        entities
                            .course_outcomes_by_link(link.id)?
                            .iter()
                            .map(|o| o.id.0),
                    );
                }
                ids
            }
        };

        self.sources = Some(match self.sources.take() {
            Some(explicit) => explicit.intersection(&owned).copied().collect(),
            None => owned,
        });
        Ok(self)
    }

    #[must_use]
    pub fn matches(&self, relation: &Relation) -> bool {
        let (source, target) = relation.link.pair();
        if self.sources.as_ref().is_some_and(|s| !s.contains(&source)) {
            return false;
        }
        if self.targets.as_ref().is_some_and(|t| !t.contains(&target)) {
            return false;
        }
        if self.active.is_some_and(|a| relation.active != a) {
            return false;
        }
        if !self.levels.is_empty()
            && !relation
                .contribution
                .is_some_and(|level| self.levels.contains(&level))
        {
            return false;
        }
        true
    }
}

// =============================================================================
// RELATIONSTORE TRAIT
// =============================================================================

/// Storage operations over relation rows.
///
/// All fallible operations return `Result<T, TrazaError>` so that in-memory
/// and persistent backends behave uniformly.
pub trait RelationStore {
    /// Store a new relation. Fails with `Conflict` if the pair already exists,
    /// active or not. Metadata validation is the caller's concern.
    fn insert(&mut self, draft: RelationDraft) -> Result<Relation, TrazaError>;

    /// Store several relations in one storage transaction.
    ///
    /// The outer `Result` fails only on infrastructure errors, in which case
    /// nothing is written. Otherwise each draft gets its own result, a
    /// duplicate pair (also within the same call) being a per-item `Conflict`.
    fn insert_many(
        &mut self,
        drafts: Vec<RelationDraft>,
    ) -> Result<Vec<Result<Relation, TrazaError>>, TrazaError>;

    fn get(&self, kind: RelationKind, id: RelationId) -> Result<Option<Relation>, TrazaError>;

    /// Find the relation with exactly these endpoints.
    fn find_pair(&self, link: &RelationLink) -> Result<Option<Relation>, TrazaError>;

    /// Change relation metadata. Fails with `NotFound` if the row is absent.
    fn update(
        &mut self,
        kind: RelationKind,
        id: RelationId,
        patch: &RelationPatch,
    ) -> Result<Relation, TrazaError>;

    /// Hard-delete a relation. Fails with `NotFound` if the row is absent.
    fn remove(&mut self, kind: RelationKind, id: RelationId) -> Result<Relation, TrazaError>;

    /// Rows of one kind matching `filter`, newest first.
    fn list(&self, kind: RelationKind, filter: &RelationFilter)
    -> Result<Vec<Relation>, TrazaError>;

    fn count(&self, kind: RelationKind) -> Result<usize, TrazaError>;
}

/// Per-item error for a pair that is already stored.
pub(crate) fn pair_conflict(link: &RelationLink, existing: u64) -> TrazaError {
    TrazaError::Conflict(format!(
        "{} and {} are already related by {} relation {}",
        link.source(),
        link.target(),
        link.kind(),
        existing
    ))
}

pub(crate) fn missing_relation(kind: RelationKind, id: RelationId) -> TrazaError {
    TrazaError::NotFound(EntityRef::relation(kind, id))
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

/// One relation kind: rows plus the pair index.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationTable {
    rows: BTreeMap<RelationId, Relation>,
    pairs: BTreeMap<(u64, u64), RelationId>,
    next_id: u64,
}

impl Default for RelationTable {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            pairs: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl RelationTable {
    fn insert(&mut self, draft: RelationDraft) -> Result<Relation, TrazaError> {
        let pair = draft.link.pair();
        if let Some(existing) = self.pairs.get(&pair) {
            return Err(pair_conflict(&draft.link, existing.0));
        }
        let id = RelationId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let relation = draft.into_relation(id);
        self.pairs.insert(pair, id);
        self.rows.insert(id, relation.clone());
        Ok(relation)
    }
}

/// In-memory relation store backed by `BTreeMap` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRelations {
    outcome_objective: RelationTable,
    outcome_criterion: RelationTable,
    course_outcome_outcome: RelationTable,
}

impl MemoryRelations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: RelationKind) -> &RelationTable {
        match kind {
            RelationKind::OutcomeObjective => &self.outcome_objective,
            RelationKind::OutcomeCriterion => &self.outcome_criterion,
            RelationKind::CourseOutcomeOutcome => &self.course_outcome_outcome,
        }
    }

    fn table_mut(&mut self, kind: RelationKind) -> &mut RelationTable {
        match kind {
            RelationKind::OutcomeObjective => &mut self.outcome_objective,
            RelationKind::OutcomeCriterion => &mut self.outcome_criterion,
            RelationKind::CourseOutcomeOutcome => &mut self.course_outcome_outcome,
        }
    }
}

impl RelationStore for MemoryRelations {
    fn insert(&mut self, draft: RelationDraft) -> Result<Relation, TrazaError> {
        self.table_mut(draft.kind()).insert(draft)
    }

    fn insert_many(
        &mut self,
        drafts: Vec<RelationDraft>,
    ) -> Result<Vec<Result<Relation, TrazaError>>, TrazaError> {
        // No storage-level failures in memory.
        Ok(drafts.into_iter().map(|draft| self.insert(draft)).collect())
    }

    fn get(&self, kind: RelationKind, id: RelationId) -> Result<Option<Relation>, TrazaError> {
        Ok(self.table(kind).rows.get(&id).cloned())
    }

    fn find_pair(&self, link: &RelationLink) -> Result<Option<Relation>, TrazaError> {
        let table = self.table(link.kind());
        Ok(table
            .pairs
            .get(&link.pair())
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn update(
        &mut self,
        kind: RelationKind,
        id: RelationId,
        patch: &RelationPatch,
    ) -> Result<Relation, TrazaError> {
        let row = self
            .table_mut(kind)
            .rows
            .get_mut(&id)
            .ok_or_else(|| missing_relation(kind, id))?;
        patch.apply_to(row);
        Ok(row.clone())
    }

    fn remove(&mut self, kind: RelationKind, id: RelationId) -> Result<Relation, TrazaError> {
        let table = self.table_mut(kind);
        let relation = table
            .rows
            .remove(&id)
            .ok_or_else(|| missing_relation(kind, id))?;
        table.pairs.remove(&relation.link.pair());
        Ok(relation)
    }

    fn list(
        &self,
        kind: RelationKind,
        filter: &RelationFilter,
    ) -> Result<Vec<Relation>, TrazaError> {
        Ok(self
            .table(kind)
            .rows
            .values()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn count(&self, kind: RelationKind) -> Result<usize, TrazaError> {
        Ok(self.table(kind).rows.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CourseOutcomeId, ObjectiveId, OutcomeId};

    fn r1(outcome: u64, objective: u64) -> RelationDraft {
        RelationDraft::outcome_objective(OutcomeId(outcome), ObjectiveId(objective))
    }

    fn r3(course_outcome: u64, outcome: u64, level: ContributionLevel) -> RelationDraft {
        RelationDraft::course_outcome_outcome(
            CourseOutcomeId(course_outcome),
            OutcomeId(outcome),
            level,
        )
    }

    #[test]
    fn ids_start_at_one_per_kind() {
        let mut store = MemoryRelations::new();
        let a = store.insert(r1(1, 1)).expect("insert");
        let b = store
            .insert(r3(1, 1, ContributionLevel::High))
            .expect("insert");
        assert_eq!(a.id, RelationId(1));
        assert_eq!(b.id, RelationId(1));
        assert_eq!(store.count(RelationKind::OutcomeObjective).expect("count"), 1);
    }

    #[test]
    fn duplicate_pair_conflicts_even_when_inactive() {
        let mut store = MemoryRelations::new();
        store.insert(r1(1, 2).inactive()).expect("insert");
        let again = store.insert(r1(1, 2));
        assert!(matches!(again, Err(TrazaError::Conflict(_))));
        assert_eq!(store.count(RelationKind::OutcomeObjective).expect("count"), 1);
    }

    #[test]
    fn insert_many_reports_in_call_duplicates_per_item() {
        let mut store = MemoryRelations::new();
        let results = store
            .insert_many(vec![r1(1, 1), r1(1, 1), r1(2, 1)])
            .expect("insert_many");
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TrazaError::Conflict(_))));
        assert_eq!(
            results[2].as_ref().map(|r| r.id).expect("third"),
            RelationId(2)
        );
    }

    #[test]
    fn remove_frees_the_pair() {
        let mut store = MemoryRelations::new();
        let first = store.insert(r1(3, 4)).expect("insert");
        store
            .remove(RelationKind::OutcomeObjective, first.id)
            .expect("remove");
        let second = store.insert(r1(3, 4)).expect("reinsert");
        assert_eq!(second.id, RelationId(2));
        assert!(matches!(
            store.remove(RelationKind::OutcomeObjective, first.id),
            Err(TrazaError::NotFound(_))
        ));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let mut store = MemoryRelations::new();
        store.insert(r3(1, 1, ContributionLevel::High)).expect("a");
        store.insert(r3(1, 2, ContributionLevel::Low)).expect("b");
        store.insert(r3(2, 1, ContributionLevel::Medium)).expect("c");
        store
            .insert(r3(3, 1, ContributionLevel::High).inactive())
            .expect("d");

        let kind = RelationKind::CourseOutcomeOutcome;
        let all = store.list(kind, &RelationFilter::default()).expect("list");
        let ids: Vec<u64> = all.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);

        let filter = RelationFilter::active()
            .with_targets([1])
            .with_levels([ContributionLevel::High, ContributionLevel::Medium]);
        let ids: Vec<u64> = store
            .list(kind, &filter)
            .expect("list")
            .iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn update_unknown_row_is_not_found() {
        let mut store = MemoryRelations::new();
        let patch = RelationPatch {
            active: Some(false),
            ..RelationPatch::default()
        };
        assert!(matches!(
            store.update(RelationKind::OutcomeCriterion, RelationId(9), &patch),
            Err(TrazaError::NotFound(_))
        ));
    }
}
