//! # redb-backed Relation Storage
//!
//! A disk-backed relation store using the redb embedded database.
//!
//! redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! Each relation kind owns two tables: the rows (`id -> postcard bytes`) and
//! the pair index (`(source, target) -> id`). Id counters live in a shared
//! metadata table. The curriculum catalog is stored as a single postcard
//! encoded [`CatalogSeed`] snapshot.

use crate::catalog::{Catalog, CatalogSeed};
use crate::relations::{RelationFilter, RelationStore, missing_relation, pair_conflict};
use crate::{
    Relation, RelationDraft, RelationId, RelationKind, RelationLink, RelationPatch, TrazaError,
};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Rows of R1: RelationId(u64) -> serialized Relation bytes
const OUTCOME_OBJECTIVE_ROWS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("outcome_objective_rows");

/// Pair index of R1: (outcome_id, objective_id) -> RelationId
const OUTCOME_OBJECTIVE_PAIRS: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("outcome_objective_pairs");

/// Rows of R2: RelationId(u64) -> serialized Relation bytes
const OUTCOME_CRITERION_ROWS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("outcome_criterion_rows");

/// Pair index of R2: (outcome_id, criterion_id) -> RelationId
const OUTCOME_CRITERION_PAIRS: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("outcome_criterion_pairs");

/// Rows of R3: RelationId(u64) -> serialized Relation bytes
const COURSE_OUTCOME_ROWS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("course_outcome_outcome_rows");

/// Pair index of R3: (course_outcome_id, outcome_id) -> RelationId
const COURSE_OUTCOME_PAIRS: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("course_outcome_outcome_pairs");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Table for the catalog snapshot: key string -> serialized CatalogSeed bytes
const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog");

const CATALOG_KEY: &str = "seed";

type RowsTable = TableDefinition<'static, u64, &'static [u8]>;
type PairsTable = TableDefinition<'static, (u64, u64), u64>;

const fn tables(kind: RelationKind) -> (RowsTable, PairsTable) {
    match kind {
        RelationKind::OutcomeObjective => (OUTCOME_OBJECTIVE_ROWS, OUTCOME_OBJECTIVE_PAIRS),
        RelationKind::OutcomeCriterion => (OUTCOME_CRITERION_ROWS, OUTCOME_CRITERION_PAIRS),
        RelationKind::CourseOutcomeOutcome => (COURSE_OUTCOME_ROWS, COURSE_OUTCOME_PAIRS),
    }
}

const fn counter_key(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::OutcomeObjective => "next_id:outcome_objective",
        RelationKind::OutcomeCriterion => "next_id:outcome_criterion",
        RelationKind::CourseOutcomeOutcome => "next_id:course_outcome_outcome",
    }
}

fn decode(bytes: &[u8]) -> Result<Relation, TrazaError> {
    postcard::from_bytes(bytes).map_err(|e| TrazaError::SerializationError(e.to_string()))
}

fn encode(relation: &Relation) -> Result<Vec<u8>, TrazaError> {
    postcard::to_allocvec(relation).map_err(|e| TrazaError::SerializationError(e.to_string()))
}

/// A disk-backed relation store using redb.
///
/// Id counters are cached in memory and only advanced after a successful
/// commit.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next id to hand out, per relation kind.
    next_ids: BTreeMap<RelationKind, u64>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_ids", &self.next_ids)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a relation database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrazaError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| TrazaError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            for kind in RelationKind::ALL {
                let (rows, pairs) = tables(kind);
                let _ = write_txn
                    .open_table(rows)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
                let _ = write_txn
                    .open_table(pairs)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
            }
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(CATALOG)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
        }

        // Load id counters
        let read_txn = db
            .begin_read()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let meta = read_txn
            .open_table(METADATA)
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let mut next_ids = BTreeMap::new();
        for kind in RelationKind::ALL {
            let next = meta
                .get(counter_key(kind))
                .map_err(|e| TrazaError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(1);
            next_ids.insert(kind, next);
        }
        drop(meta);
        drop(read_txn);

        tracing::debug!(?next_ids, "opened relation database");
        Ok(Self { db, next_ids })
    }

    /// Load the stored catalog snapshot. An empty catalog if none was saved.
    pub fn load_catalog(&self) -> Result<Catalog, TrazaError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(CATALOG)
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let seed: Option<CatalogSeed> = table
            .get(CATALOG_KEY)
            .map_err(|e| TrazaError::IoError(e.to_string()))?
            .map(|data| postcard::from_bytes(data.value()))
            .transpose()
            .map_err(|e| TrazaError::SerializationError(e.to_string()))?;
        match seed {
            Some(seed) => Catalog::from_seed(seed),
            None => Ok(Catalog::new()),
        }
    }

    /// Replace the stored catalog snapshot in one transaction.
    pub fn save_catalog(&mut self, catalog: &Catalog) -> Result<(), TrazaError> {
        let bytes = postcard::to_allocvec(&catalog.to_seed())
            .map_err(|e| TrazaError::SerializationError(e.to_string()))?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(CATALOG)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            table
                .insert(CATALOG_KEY, bytes.as_slice())
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// RELATIONSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl RelationStore for RedbStore {
    fn insert(&mut self, draft: RelationDraft) -> Result<Relation, TrazaError> {
        let mut results = self.insert_many(vec![draft])?;
        results
            .pop()
            .unwrap_or_else(|| Err(TrazaError::IoError("empty insert result".to_string())))
    }

    fn insert_many(
        &mut self,
        drafts: Vec<RelationDraft>,
    ) -> Result<Vec<Result<Relation, TrazaError>>, TrazaError> {
        let mut next_ids = self.next_ids.clone();
        let mut results = Vec::with_capacity(drafts.len());

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        {
            for draft in drafts {
                let kind = draft.kind();
                let (rows_def, pairs_def) = tables(kind);
                let pair = draft.link.pair();

                let mut pairs = write_txn
                    .open_table(pairs_def)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
                let existing = pairs
                    .get(pair)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?
                    .map(|v| v.value());
                if let Some(existing) = existing {
                    results.push(Err(pair_conflict(&draft.link, existing)));
                    continue;
                }

                let next = next_ids.entry(kind).or_insert(1);
                let id = RelationId(*next);
                *next = next.saturating_add(1);

                let relation = draft.into_relation(id);
                let bytes = encode(&relation)?;
                let mut rows = write_txn
                    .open_table(rows_def)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
                rows.insert(id.0, bytes.as_slice())
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
                pairs
                    .insert(pair, id.0)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
                results.push(Ok(relation));
            }

            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            for (kind, next) in &next_ids {
                meta.insert(counter_key(*kind), *next)
                    .map_err(|e| TrazaError::IoError(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit.
        self.next_ids = next_ids;
        Ok(results)
    }

    fn get(&self, kind: RelationKind, id: RelationId) -> Result<Option<Relation>, TrazaError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(tables(kind).0)
            .map_err(|e| TrazaError::IoError(e.to_string()))?;

        match rows
            .get(id.0)
            .map_err(|e| TrazaError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn find_pair(&self, link: &RelationLink) -> Result<Option<Relation>, TrazaError> {
        let kind = link.kind();
        let id = {
            let read_txn = self
                .db
                .begin_read()
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            let pairs = read_txn
                .open_table(tables(kind).1)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            pairs
                .get(link.pair())
                .map_err(|e| TrazaError::IoError(e.to_string()))?
                .map(|v| v.value())
        };
        match id {
            Some(id) => self.get(kind, RelationId(id)),
            None => Ok(None),
        }
    }

    fn update(
        &mut self,
        kind: RelationKind,
        id: RelationId,
        patch: &RelationPatch,
    ) -> Result<Relation, TrazaError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let relation = {
            let mut rows = write_txn
                .open_table(tables(kind).0)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            let current = rows
                .get(id.0)
                .map_err(|e| TrazaError::IoError(e.to_string()))?
                .map(|data| decode(data.value()))
                .transpose()?;
            let mut relation = current.ok_or_else(|| missing_relation(kind, id))?;
            patch.apply_to(&mut relation);
            let bytes = encode(&relation)?;
            rows.insert(id.0, bytes.as_slice())
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            relation
        };
        write_txn
            .commit()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        Ok(relation)
    }

    fn remove(&mut self, kind: RelationKind, id: RelationId) -> Result<Relation, TrazaError> {
        let (rows_def, pairs_def) = tables(kind);
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let relation = {
            let mut rows = write_txn
                .open_table(rows_def)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            let removed = rows
                .remove(id.0)
                .map_err(|e| TrazaError::IoError(e.to_string()))?
                .map(|data| decode(data.value()))
                .transpose()?;
            let relation = removed.ok_or_else(|| missing_relation(kind, id))?;

            let mut pairs = write_txn
                .open_table(pairs_def)
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            pairs
                .remove(relation.link.pair())
                .map_err(|e| TrazaError::IoError(e.to_string()))?;
            relation
        };
        write_txn
            .commit()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        Ok(relation)
    }

    fn list(
        &self,
        kind: RelationKind,
        filter: &RelationFilter,
    ) -> Result<Vec<Relation>, TrazaError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(tables(kind).0)
            .map_err(|e| TrazaError::IoError(e.to_string()))?;

        let mut relations = Vec::new();
        for entry in rows
            .iter()
            .map_err(|e| TrazaError::IoError(e.to_string()))?
            .rev()
        {
            let (_, value) = entry.map_err(|e| TrazaError::IoError(e.to_string()))?;
            let relation = decode(value.value())?;
            if filter.matches(&relation) {
                relations.push(relation);
            }
        }
        Ok(relations)
    }

    fn count(&self, kind: RelationKind) -> Result<usize, TrazaError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(tables(kind).0)
            .map_err(|e| TrazaError::IoError(e.to_string()))?;
        Ok(rows.len().map_err(|e| TrazaError::IoError(e.to_string()))? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ContributionLevel, CourseOutcomeId, CriterionId, ObjectiveId, OutcomeId, Program,
        ProgramId,
    };
    use tempfile::tempdir;

    const TEXT: &str = "Addresses engineering analysis";

    fn r2(outcome: u64, criterion: u64) -> RelationDraft {
        RelationDraft::outcome_criterion(OutcomeId(outcome), CriterionId(criterion), TEXT)
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let a = store.insert(r2(1, 1)).expect("insert");
        let b = store.insert(r2(1, 2)).expect("insert");
        assert_eq!(a.id, RelationId(1));
        assert_eq!(b.id, RelationId(2));
        assert_eq!(store.count(RelationKind::OutcomeCriterion).expect("count"), 2);
        assert_eq!(store.count(RelationKind::OutcomeObjective).expect("count"), 0);

        let found = store
            .find_pair(&b.link)
            .expect("find")
            .expect("present");
        assert_eq!(found, b);
    }

    #[test]
    fn duplicate_pair_is_conflict() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.insert(r2(4, 4)).expect("insert");
        assert!(matches!(
            store.insert(r2(4, 4)),
            Err(TrazaError::Conflict(_))
        ));
    }

    #[test]
    fn insert_many_keeps_valid_items() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let results = store
            .insert_many(vec![r2(1, 1), r2(1, 1), r2(2, 2)])
            .expect("insert_many");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().map(|r| r.id).expect("third"),
            RelationId(2)
        );
        assert_eq!(store.count(RelationKind::OutcomeCriterion).expect("count"), 2);
    }

    #[test]
    fn persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store
                .insert(RelationDraft::outcome_objective(OutcomeId(1), ObjectiveId(1)))
                .expect("insert");
            store
                .insert(RelationDraft::course_outcome_outcome(
                    CourseOutcomeId(3),
                    OutcomeId(1),
                    ContributionLevel::Medium,
                ))
                .expect("insert");
        }

        {
            let mut store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.count(RelationKind::OutcomeObjective).expect("count"), 1);
            let next = store
                .insert(RelationDraft::outcome_objective(OutcomeId(2), ObjectiveId(1)))
                .expect("insert");
            assert_eq!(next.id, RelationId(2));

            let r3 = store
                .get(RelationKind::CourseOutcomeOutcome, RelationId(1))
                .expect("get")
                .expect("present");
            assert_eq!(r3.contribution, Some(ContributionLevel::Medium));
        }
    }

    #[test]
    fn update_and_remove() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let kind = RelationKind::OutcomeCriterion;

        let row = store.insert(r2(1, 1)).expect("insert");
        let patch = RelationPatch {
            active: Some(false),
            ..RelationPatch::default()
        };
        let updated = store.update(kind, row.id, &patch).expect("update");
        assert!(!updated.active);
        assert_eq!(updated.justification_text(), TEXT);

        store.remove(kind, row.id).expect("remove");
        assert!(store.get(kind, row.id).expect("get").is_none());
        assert!(store.find_pair(&row.link).expect("find").is_none());
        assert!(matches!(
            store.remove(kind, row.id),
            Err(TrazaError::NotFound(_))
        ));
        assert!(matches!(
            store.update(kind, row.id, &patch),
            Err(TrazaError::NotFound(_))
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        for criterion in 1..=3 {
            store.insert(r2(1, criterion)).expect("insert");
        }
        store.insert(r2(2, 1)).expect("insert");

        let filter = RelationFilter::default().with_sources([1]);
        let ids: Vec<u64> = store
            .list(RelationKind::OutcomeCriterion, &filter)
            .expect("list")
            .iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn catalog_snapshot_persists() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            assert!(store.load_catalog().expect("load").is_empty());

            let mut catalog = Catalog::new();
            catalog
                .insert_program(Program {
                    id: ProgramId(1),
                    code: "SW".into(),
                    name: "Software".into(),
                })
                .expect("program");
            store.save_catalog(&catalog).expect("save");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        let catalog = store.load_catalog().expect("load");
        assert_eq!(catalog.counts().programs, 1);
    }
}
