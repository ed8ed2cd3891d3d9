//! # Property-Based Tests
//!
//! Invariants of the batch, availability, matrix and chain engines, checked
//! with proptest over random relation sets on the shared curriculum.

mod common;

use common::{ISW, ISWD410, JUSTIFICATION};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;
use traza_core::{
    AvailabilityQuery, ContributionLevel, Coverage, CourseOutcomeId, CriterionId, ObjectiveId,
    OutcomeId, RelationDraft, RelationKind,
};

fn level() -> impl Strategy<Value = ContributionLevel> {
    prop_oneof![
        Just(ContributionLevel::High),
        Just(ContributionLevel::Medium),
        Just(ContributionLevel::Low),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every candidate is either created or reported, never both.
    #[test]
    fn batch_counts_add_up(
        pairs in vec((1u64..=4, 1u64..=3), 1..=20)
    ) {
        let mut session = common::session();
        let drafts = pairs
            .iter()
            .map(|&(o, c)| {
                RelationDraft::outcome_criterion(OutcomeId(o), CriterionId(c), JUSTIFICATION)
            })
            .collect();

        let report = session
            .create_batch(RelationKind::OutcomeCriterion, drafts)
            .expect("batch");

        prop_assert_eq!(report.total_requested, pairs.len());
        prop_assert_eq!(report.succeeded + report.failed, report.total_requested);
        prop_assert_eq!(report.created_ids.len(), report.succeeded);
        prop_assert_eq!(report.errors.len(), report.failed);
        prop_assert_eq!(session.status().relations.outcome_criterion, report.succeeded);

        // Outcome 4 and criterion 3 do not exist; every other distinct pair
        // is created exactly once.
        let valid: BTreeSet<_> = pairs.iter().filter(|&&(o, c)| o <= 3 && c <= 2).collect();
        prop_assert_eq!(report.succeeded, valid.len());
    }

    /// Coverage stays within half a hundredth of the exact ratio.
    #[test]
    fn coverage_rounds_half_up(rows in 0usize..60, cols in 0usize..60, seed in 0usize..10_000) {
        let total = rows * cols;
        let mapped = if total == 0 { 0 } else { seed % (total + 1) };

        let h = Coverage::from_counts(mapped, rows, cols).hundredths();

        if total == 0 {
            prop_assert_eq!(h, 0);
        } else {
            let t = total as u64;
            let s = mapped as u64 * 10_000;
            prop_assert!(2 * h * t <= 2 * s + t);
            prop_assert!(2 * s + t < 2 * (h + 1) * t);
            prop_assert!(h <= 10_000);
        }
    }

    /// Availability never offers an objective that is already linked.
    #[test]
    fn availability_excludes_linked_objectives(
        linked in btree_set(1u64..=2, 0..=2),
        deactivate in any::<bool>()
    ) {
        let mut session = common::session();
        for &objective in &linked {
            let mut draft = RelationDraft::outcome_objective(OutcomeId(1), ObjectiveId(objective));
            if deactivate {
                draft = draft.inactive();
            }
            session.create_single(draft).expect("create");
        }

        let available = session
            .get_available(AvailabilityQuery::ObjectivesForOutcome { outcome: OutcomeId(1) })
            .expect("query");
        let offered: BTreeSet<u64> = available.ids().into_iter().collect();

        prop_assert!(offered.is_disjoint(&linked));
        prop_assert_eq!(offered.len() + linked.len(), 2);
    }

    /// A course trace holds one chain per course outcome relation and
    /// criterion of its outcome.
    #[test]
    fn course_chain_count_matches_relations(
        criterion_pairs in btree_set((1u64..=2, 1u64..=2), 0..=4),
        course_pairs in btree_set((1u64..=2, 1u64..=2), 0..=4),
        levels in vec(level(), 4)
    ) {
        let mut session = common::session();
        for &(outcome, criterion) in &criterion_pairs {
            session
                .create_single(RelationDraft::outcome_criterion(
                    OutcomeId(outcome),
                    CriterionId(criterion),
                    JUSTIFICATION,
                ))
                .expect("criterion relation");
        }
        for (i, &(course_outcome, outcome)) in course_pairs.iter().enumerate() {
            session
                .create_single(RelationDraft::course_outcome_outcome(
                    CourseOutcomeId(course_outcome),
                    OutcomeId(outcome),
                    levels[i],
                ))
                .expect("course relation");
        }

        let expected: usize = course_pairs
            .iter()
            .map(|&(_, outcome)| criterion_pairs.iter().filter(|&&(o, _)| o == outcome).count())
            .sum();
        let trace = session
            .get_traceability(ISWD410, ISW, &BTreeSet::new())
            .expect("trace");

        prop_assert_eq!(trace.groups.len(), expected);
    }
}
