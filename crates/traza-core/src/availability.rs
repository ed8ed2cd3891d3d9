//! # Availability Query Engine
//!
//! "Which entities can still be related to this one?"
//!
//! Given a fixed endpoint of one relation kind, returns every entity of the
//! opposite kind in scope that is not yet related to it. Inactive relations
//! still occupy their pair, so their counterparts are excluded too.
//!
//! Results are ordered by code ascending, ties broken by id, except for
//! `OutcomesForCriterion` (see its variant).

use crate::catalog::EntityStore;
use crate::relations::{RelationFilter, RelationStore};
use crate::{
    CourseOutcome, CourseOutcomeId, Criterion, CriterionId, LearningOutcome, Objective,
    ObjectiveId, OutcomeId, OutcomeKind, ProgramId, RelationKind, TrazaError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A wizard-style lookup. The variant names the fixed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityQuery {
    /// Outcomes of the objective's program not yet linked to it (R1).
    OutcomesForObjective {
        objective: ObjectiveId,
        kind: Option<OutcomeKind>,
    },
    /// Objectives of the outcome's program not yet linked to it (R1).
    ObjectivesForOutcome { outcome: OutcomeId },
    /// Outcomes of any program (or of `program`) not yet linked to the
    /// criterion (R2).
    ///
    /// Ordered by program id, then kind with `GENERAL` before `SPECIFIC`,
    /// then code. That kind order is both the declaration order of
    /// [`OutcomeKind`] and the alphabetical order of its stored names.
    OutcomesForCriterion {
        criterion: CriterionId,
        kind: Option<OutcomeKind>,
        program: Option<ProgramId>,
    },
    /// Criteria not yet linked to the outcome (R2).
    CriteriaForOutcome { outcome: OutcomeId },
    /// Outcomes of the course outcome's program not yet linked to it (R3).
    OutcomesForCourseOutcome {
        course_outcome: CourseOutcomeId,
        kind: Option<OutcomeKind>,
    },
    /// Course outcomes of the outcome's program not yet linked to it (R3).
    CourseOutcomesForOutcome { outcome: OutcomeId },
}

/// Result of an availability lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "items", rename_all = "snake_case")]
pub enum AvailableEntities {
    Outcomes(Vec<LearningOutcome>),
    Objectives(Vec<Objective>),
    Criteria(Vec<Criterion>),
    CourseOutcomes(Vec<CourseOutcome>),
}

impl AvailableEntities {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Outcomes(v) => v.len(),
            Self::Objectives(v) => v.len(),
            Self::Criteria(v) => v.len(),
            Self::CourseOutcomes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw ids of the returned entities, in result order.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        match self {
            Self::Outcomes(v) => v.iter().map(|e| e.id.0).collect(),
            Self::Objectives(v) => v.iter().map(|e| e.id.0).collect(),
            Self::Criteria(v) => v.iter().map(|e| e.id.0).collect(),
            Self::CourseOutcomes(v) => v.iter().map(|e| e.id.0).collect(),
        }
    }
}

pub struct AvailabilityEngine;

impl AvailabilityEngine {
    pub fn available<E, R>(
        entities: &E,
        relations: &R,
        query: AvailabilityQuery,
    ) -> Result<AvailableEntities, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        match query {
            AvailabilityQuery::OutcomesForObjective { objective, kind } => {
                let objective = entities.require_objective(objective)?;
                let taken =
                    related_sources(relations, RelationKind::OutcomeObjective, objective.id.0)?;
                let outcomes = entities.outcomes_by_program(objective.program, kind)?;
                Ok(AvailableEntities::Outcomes(
                    outcomes
                        .into_iter()
                        .filter(|o| !taken.contains(&o.id.0))
                        .collect(),
                ))
            }
            AvailabilityQuery::ObjectivesForOutcome { outcome } => {
                let outcome = entities.require_learning_outcome(outcome)?;
                let taken =
                    related_targets(relations, RelationKind::OutcomeObjective, outcome.id.0)?;
                let objectives = entities.objectives_by_program(outcome.program)?;
                Ok(AvailableEntities::Objectives(
                    objectives
                        .into_iter()
                        .filter(|o| !taken.contains(&o.id.0))
                        .collect(),
                ))
            }
            AvailabilityQuery::OutcomesForCriterion {
                criterion,
                kind,
                program,
            } => {
                let criterion = entities.require_criterion(criterion)?;
                let taken =
                    related_sources(relations, RelationKind::OutcomeCriterion, criterion.id.0)?;
                let mut outcomes = match program {
                    Some(program) => entities.outcomes_by_program(program, kind)?,
                    None => entities.outcomes(kind)?,
                };
                outcomes.retain(|o| !taken.contains(&o.id.0));
                // Criteria are global, so group candidates by program first.
                outcomes.sort_by(|a, b| {
                    (a.program, a.kind, a.code.as_str(), a.id).cmp(&(
                        b.program,
                        b.kind,
                        b.code.as_str(),
                        b.id,
                    ))
                });
                Ok(AvailableEntities::Outcomes(outcomes))
            }
            AvailabilityQuery::CriteriaForOutcome { outcome } => {
                let outcome = entities.require_learning_outcome(outcome)?;
                let taken =
                    related_targets(relations, RelationKind::OutcomeCriterion, outcome.id.0)?;
                let criteria = entities.criteria()?;
                Ok(AvailableEntities::Criteria(
                    criteria
                        .into_iter()
                        .filter(|c| !taken.contains(&c.id.0))
                        .collect(),
                ))
            }
            AvailabilityQuery::OutcomesForCourseOutcome {
                course_outcome,
                kind,
            } => {
                let course_outcome = entities.require_course_outcome(course_outcome)?;
                let program = entities.course_outcome_program(&course_outcome)?;
                let taken = related_targets(
                    relations,
                    RelationKind::CourseOutcomeOutcome,
                    course_outcome.id.0,
                )?;
                let outcomes = entities.outcomes_by_program(program, kind)?;
                Ok(AvailableEntities::Outcomes(
                    outcomes
                        .into_iter()
                        .filter(|o| !taken.contains(&o.id.0))
                        .collect(),
                ))
            }
            AvailabilityQuery::CourseOutcomesForOutcome { outcome } => {
                let outcome = entities.require_learning_outcome(outcome)?;
                let taken =
                    related_sources(relations, RelationKind::CourseOutcomeOutcome, outcome.id.0)?;
                let mut course_outcomes = Vec::new();
                for link in entities.links_by_program(outcome.program)? {
                    course_outcomes.extend(entities.course_outcomes_by_link(link.id)?);
                }
                course_outcomes.retain(|c| !taken.contains(&c.id.0));
                course_outcomes
                    .sort_by(|a, b| (a.code.as_str(), a.id).cmp(&(b.code.as_str(), b.id)));
                Ok(AvailableEntities::CourseOutcomes(course_outcomes))
            }
        }
    }
}

/// Sources already related to `target`.
fn related_sources<R: RelationStore + ?Sized>(
    relations: &R,
    kind: RelationKind,
    target: u64,
) -> Result<BTreeSet<u64>, TrazaError> {
    let filter = RelationFilter::default().with_targets([target]);
    Ok(relations
        .list(kind, &filter)?
        .iter()
        .map(|r| r.link.pair().0)
        .collect())
}

/// Targets already related to `source`.
fn related_targets<R: RelationStore + ?Sized>(
    relations: &R,
    kind: RelationKind,
    source: u64,
) -> Result<BTreeSet<u64>, TrazaError> {
    let filter = RelationFilter::default().with_sources([source]);
    Ok(relations
        .list(kind, &filter)?
        .iter()
        .map(|r| r.link.pair().1)
        .collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, EE, JUSTIFICATION};
    use crate::relations::MemoryRelations;
    use crate::{ContributionLevel, LearningOutcome, RelationDraft};

    #[test]
    fn outcomes_for_objective_excludes_linked_and_other_programs() {
        let catalog = fixtures::catalog();
        let mut store = MemoryRelations::new();
        store
            .insert(RelationDraft::outcome_objective(OutcomeId(2), ObjectiveId(1)).inactive())
            .expect("insert");

        let result = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForObjective {
                objective: ObjectiveId(1),
                kind: None,
            },
        )
        .expect("query");
        assert_eq!(result.ids(), vec![1, 3]);

        let specific = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForObjective {
                objective: ObjectiveId(1),
                kind: Some(OutcomeKind::Specific),
            },
        )
        .expect("query");
        assert_eq!(specific.ids(), vec![3]);
    }

    #[test]
    fn outcomes_for_criterion_spans_programs() {
        let catalog = fixtures::catalog();
        let mut store = MemoryRelations::new();
        store
            .insert(RelationDraft::outcome_criterion(
                OutcomeId(1),
                CriterionId(1),
                JUSTIFICATION,
            ))
            .expect("insert");

        let all = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForCriterion {
                criterion: CriterionId(1),
                kind: None,
                program: None,
            },
        )
        .expect("query");
        assert_eq!(all.ids(), vec![2, 3, 4]);

        let scoped = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForCriterion {
                criterion: CriterionId(1),
                kind: None,
                program: Some(EE),
            },
        )
        .expect("query");
        assert_eq!(scoped.ids(), vec![4]);
    }

    #[test]
    fn outcomes_for_criterion_put_general_before_specific() {
        let mut catalog = fixtures::catalog();
        catalog
            .insert_outcome(LearningOutcome {
                id: OutcomeId(5),
                code: "RA0".into(),
                description: "Outcome RA0".into(),
                kind: OutcomeKind::Specific,
                program: fixtures::SW,
            })
            .expect("outcome");
        let store = MemoryRelations::new();

        let result = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForCriterion {
                criterion: CriterionId(1),
                kind: None,
                program: None,
            },
        )
        .expect("query");
        // SW: RA1 (general), then RA0, RA2, RA3 (specific); EE last.
        assert_eq!(result.ids(), vec![1, 5, 2, 3, 4]);
    }

    #[test]
    fn course_outcome_directions_follow_the_link_program() {
        let catalog = fixtures::catalog();
        let mut store = MemoryRelations::new();
        store
            .insert(RelationDraft::course_outcome_outcome(
                CourseOutcomeId(1),
                OutcomeId(1),
                ContributionLevel::High,
            ))
            .expect("insert");

        let outcomes = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::OutcomesForCourseOutcome {
                course_outcome: CourseOutcomeId(1),
                kind: None,
            },
        )
        .expect("query");
        assert_eq!(outcomes.ids(), vec![2, 3]);

        let course_outcomes = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::CourseOutcomesForOutcome {
                outcome: OutcomeId(1),
            },
        )
        .expect("query");
        // EE's course outcome 5 is out of scope; 1 is already linked.
        let ids = course_outcomes.ids();
        assert!(!ids.contains(&1));
        assert!(!ids.contains(&5));
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn missing_fixed_endpoint_is_not_found() {
        let catalog = fixtures::catalog();
        let store = MemoryRelations::new();
        let result = AvailabilityEngine::available(
            &catalog,
            &store,
            AvailabilityQuery::CriteriaForOutcome {
                outcome: OutcomeId(42),
            },
        );
        assert!(matches!(result, Err(TrazaError::NotFound(_))));
    }
}
