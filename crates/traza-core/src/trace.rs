//! # Traceability Chain Engine
//!
//! Multi-hop traversals across the three relation sets.
//!
//! - Course-rooted: Course → course outcome → learning outcome → criterion,
//!   grouped by the contribution level of the course outcome relation.
//! - Objective-rooted: Objective → learning outcome → course outcome → Course,
//!   for every objective of a program.
//!
//! Only active relations and active course outcomes take part. Each hop is
//! one bulk relation query.

use crate::catalog::EntityStore;
use crate::relations::{RelationFilter, RelationStore};
use crate::{
    ContributionLevel, Course, CourseId, CourseOutcome, CourseOutcomeId, Criterion,
    CriterionId, LearningOutcome, Objective, OutcomeId, Program, ProgramId, Relation,
    RelationKind, TrazaError,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Minimal description of an entity on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainNode {
    pub id: u64,
    pub code: String,
    pub description: String,
}

impl From<&CourseOutcome> for ChainNode {
    fn from(e: &CourseOutcome) -> Self {
        Self {
            id: e.id.0,
            code: e.code.clone(),
            description: e.description.clone(),
        }
    }
}

impl From<&LearningOutcome> for ChainNode {
    fn from(e: &LearningOutcome) -> Self {
        Self {
            id: e.id.0,
            code: e.code.clone(),
            description: e.description.clone(),
        }
    }
}

impl From<&Criterion> for ChainNode {
    fn from(e: &Criterion) -> Self {
        Self {
            id: e.id.0,
            code: e.code.clone(),
            description: e.description.clone(),
        }
    }
}

impl From<&Objective> for ChainNode {
    fn from(e: &Objective) -> Self {
        Self {
            id: e.id.0,
            code: e.code.clone(),
            description: e.description.clone(),
        }
    }
}

/// One course outcome → outcome → criterion chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEntry {
    pub course_outcome: ChainNode,
    pub outcome: ChainNode,
    /// Justification of the course outcome relation, empty if none.
    pub outcome_justification: String,
    pub criterion: ChainNode,
    pub criterion_justification: String,
    pub level: ContributionLevel,
}

/// Chain entries bucketed by contribution level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LevelGroups {
    pub high: Vec<ChainEntry>,
    pub medium: Vec<ChainEntry>,
    pub low: Vec<ChainEntry>,
}

impl LevelGroups {
    fn push(&mut self, entry: ChainEntry) {
        match entry.level {
            ContributionLevel::High => self.high.push(entry),
            ContributionLevel::Medium => self.medium.push(entry),
            ContributionLevel::Low => self.low.push(entry),
        }
    }

    #[must_use]
    pub fn get(&self, level: ContributionLevel) -> &[ChainEntry] {
        match level {
            ContributionLevel::High => &self.high,
            ContributionLevel::Medium => &self.medium,
            ContributionLevel::Low => &self.low,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Course-rooted traceability report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseTrace {
    pub course: Course,
    pub groups: LevelGroups,
}

/// A course reached from a learning outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseContribution {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub level: ContributionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeBranch {
    pub outcome: ChainNode,
    pub courses: Vec<CourseContribution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveBranch {
    pub objective: ChainNode,
    pub outcomes: Vec<OutcomeBranch>,
}

/// Objective-rooted traceability report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectiveTrace {
    pub program: Program,
    pub objectives: Vec<ObjectiveBranch>,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct TraceEngine;

impl TraceEngine {
    /// Trace a course of a program down to accreditation criteria.
    ///
    /// `levels` restricts the course outcome relations considered; empty
    /// means all levels.
    pub fn course_trace<E, R>(
        entities: &E,
        relations: &R,
        course: CourseId,
        program: ProgramId,
        levels: &BTreeSet<ContributionLevel>,
    ) -> Result<CourseTrace, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        let course = entities.require_course(course)?;
        let link = entities.resolve_link(program, course.id)?.ok_or_else(|| {
            TrazaError::InvalidRequest(format!(
                "course {} is not linked to program {}",
                course.id, program
            ))
        })?;
        let mut trace = CourseTrace {
            course,
            groups: LevelGroups::default(),
        };

        let course_outcomes: BTreeMap<u64, CourseOutcome> = entities
            .course_outcomes_by_link(link.id)?
            .into_iter()
            .filter(|c| c.active)
            .map(|c| (c.id.0, c))
            .collect();
        if course_outcomes.is_empty() {
            return Ok(trace);
        }

        let filter = RelationFilter::active()
            .with_sources(course_outcomes.keys().copied())
            .with_levels(levels.iter().copied());
        let r3 = relations.list(RelationKind::CourseOutcomeOutcome, &filter)?;
        if r3.is_empty() {
            return Ok(trace);
        }

        let outcome_ids: BTreeSet<u64> = r3.iter().map(|r| r.link.pair().1).collect();
        let filter = RelationFilter::active().with_sources(outcome_ids.iter().copied());
        let r2 = relations.list(RelationKind::OutcomeCriterion, &filter)?;
        if r2.is_empty() {
            return Ok(trace);
        }

        let mut r2_by_outcome: BTreeMap<u64, Vec<&Relation>> = BTreeMap::new();
        for relation in &r2 {
            r2_by_outcome
                .entry(relation.link.pair().0)
                .or_default()
                .push(relation);
        }
        let outcomes = load(outcome_ids.iter().copied(), |id| {
            entities.learning_outcome(OutcomeId(id))
        })?;
        let criterion_ids = r2.iter().map(|r| r.link.pair().1);
        let criteria = load(criterion_ids, |id| entities.criterion(CriterionId(id)))?;

        let mut entries = Vec::new();
        for r3_row in &r3 {
            let (course_outcome_id, outcome_id) = r3_row.link.pair();
            let (Some(course_outcome), Some(outcome), Some(level)) = (
                course_outcomes.get(&course_outcome_id),
                outcomes.get(&outcome_id),
                r3_row.contribution,
            ) else {
                continue;
            };
            for r2_row in r2_by_outcome.get(&outcome_id).into_iter().flatten() {
                let Some(criterion) = criteria.get(&r2_row.link.pair().1) else {
                    continue;
                };
                entries.push(ChainEntry {
                    course_outcome: course_outcome.into(),
                    outcome: outcome.into(),
                    outcome_justification: r3_row.justification_text().to_string(),
                    criterion: criterion.into(),
                    criterion_justification: r2_row.justification_text().to_string(),
                    level,
                });
            }
        }

        entries.sort_by(|a, b| {
            (&a.course_outcome.code, &a.outcome.code, &a.criterion.code).cmp(&(
                &b.course_outcome.code,
                &b.outcome.code,
                &b.criterion.code,
            ))
        });
        for entry in entries {
            trace.groups.push(entry);
        }
        tracing::debug!(
            course = %trace.course.code,
            chains = trace.groups.len(),
            "course trace computed"
        );
        Ok(trace)
    }

    /// Trace every objective of a program up to the courses contributing to
    /// it.
    ///
    /// When the program has no active objective relations, or none of their
    /// outcomes is reached by an active course outcome relation, every
    /// objective is returned with an empty outcome list. Otherwise objectives
    /// and outcomes without contributing courses are left out.
    pub fn objective_trace<E, R>(
        entities: &E,
        relations: &R,
        program: ProgramId,
        levels: &BTreeSet<ContributionLevel>,
    ) -> Result<ObjectiveTrace, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        let program = entities.require_program(program)?;
        let objectives = entities.objectives_by_program(program.id)?;
        let bare = |objectives: &[Objective]| {
            objectives
                .iter()
                .map(|o| ObjectiveBranch {
                    objective: o.into(),
                    outcomes: Vec::new(),
                })
                .collect::<Vec<_>>()
        };

        let filter = RelationFilter::active().with_targets(objectives.iter().map(|o| o.id.0));
        let r1 = if objectives.is_empty() {
            Vec::new()
        } else {
            relations.list(RelationKind::OutcomeObjective, &filter)?
        };
        if r1.is_empty() {
            return Ok(ObjectiveTrace {
                objectives: bare(&objectives),
                program,
            });
        }

        let outcome_ids: BTreeSet<u64> = r1.iter().map(|r| r.link.pair().0).collect();
        let filter = RelationFilter::active()
            .with_targets(outcome_ids.iter().copied())
            .with_levels(levels.iter().copied());
        let mut r3 = relations.list(RelationKind::CourseOutcomeOutcome, &filter)?;
        if r3.is_empty() {
            return Ok(ObjectiveTrace {
                objectives: bare(&objectives),
                program,
            });
        }
        // First contribution in relation-id order wins.
        r3.sort_by_key(|r| r.id);

        // outcome -> course -> contribution
        let mut courses_of: BTreeMap<u64, BTreeMap<CourseId, CourseContribution>> =
            BTreeMap::new();
        let mut course_cache: BTreeMap<CourseOutcomeId, Option<Course>> = BTreeMap::new();
        for relation in &r3 {
            let (course_outcome, outcome) = relation.link.pair();
            let Some(level) = relation.contribution else {
                continue;
            };
            let course_outcome = CourseOutcomeId(course_outcome);
            let course = match course_cache.get(&course_outcome) {
                Some(cached) => cached.clone(),
                None => {
                    let resolved = owning_course(entities, course_outcome, program.id)?;
                    course_cache.insert(course_outcome, resolved.clone());
                    resolved
                }
            };
            let Some(course) = course else {
                continue;
            };
            courses_of
                .entry(outcome)
                .or_default()
                .entry(course.id)
                .or_insert(CourseContribution {
                    id: course.id,
                    code: course.code,
                    name: course.name,
                    level,
                });
        }

        let outcomes = load(outcome_ids.iter().copied(), |id| {
            entities.learning_outcome(OutcomeId(id))
        })?;
        let mut outcomes_of: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        for relation in &r1 {
            let (outcome, objective) = relation.link.pair();
            outcomes_of.entry(objective).or_default().insert(outcome);
        }

        let mut branches = Vec::new();
        for objective in &objectives {
            let mut outcome_branches = Vec::new();
            for outcome_id in outcomes_of.get(&objective.id.0).into_iter().flatten() {
                let (Some(outcome), Some(courses)) =
                    (outcomes.get(outcome_id), courses_of.get(outcome_id))
                else {
                    continue;
                };
                let mut courses: Vec<CourseContribution> = courses.values().cloned().collect();
                courses.sort_by(|a, b| (&a.code, a.id).cmp(&(&b.code, b.id)));
                outcome_branches.push(OutcomeBranch {
                    outcome: outcome.into(),
                    courses,
                });
            }
            if outcome_branches.is_empty() {
                continue;
            }
            outcome_branches.sort_by(|a, b| {
                (&a.outcome.code, a.outcome.id).cmp(&(&b.outcome.code, b.outcome.id))
            });
            branches.push(ObjectiveBranch {
                objective: objective.into(),
                outcomes: outcome_branches,
            });
        }

        Ok(ObjectiveTrace {
            program,
            objectives: branches,
        })
    }
}

/// Look up every id once, dropping ids that no longer resolve.
fn load<T>(
    ids: impl Iterator<Item = u64>,
    mut lookup: impl FnMut(u64) -> Result<Option<T>, TrazaError>,
) -> Result<BTreeMap<u64, T>, TrazaError> {
    let mut found = BTreeMap::new();
    for id in ids {
        if found.contains_key(&id) {
            continue;
        }
        match lookup(id)? {
            Some(item) => {
                found.insert(id, item);
            }
            None => tracing::warn!(id, "relation endpoint missing from catalog"),
        }
    }
    Ok(found)
}

/// The course owning a course outcome through a link of `program`.
///
/// The course outcome's own active flag is not consulted; only the relation
/// rows leading to it are filtered.
fn owning_course<E: EntityStore + ?Sized>(
    entities: &E,
    id: CourseOutcomeId,
    program: ProgramId,
) -> Result<Option<Course>, TrazaError> {
    let Some(course_outcome) = entities.course_outcome(id)? else {
        return Ok(None);
    };
    match entities.link(course_outcome.link)? {
        Some(link) if link.program == program => entities.course(link.course),
        _ => Ok(None),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, EE, JUSTIFICATION, SW};
    use crate::relations::MemoryRelations;
    use crate::{ObjectiveId, RelationDraft};

    fn r3(course_outcome: u64, outcome: u64, level: ContributionLevel) -> RelationDraft {
        RelationDraft::course_outcome_outcome(
            CourseOutcomeId(course_outcome),
            OutcomeId(outcome),
            level,
        )
    }

    fn r2(outcome: u64, criterion: u64) -> RelationDraft {
        RelationDraft::outcome_criterion(OutcomeId(outcome), CriterionId(criterion), JUSTIFICATION)
    }

    fn chains() -> MemoryRelations {
        let mut store = MemoryRelations::new();
        store.insert(r3(2, 1, ContributionLevel::High)).expect("r3");
        store
            .insert(r3(1, 1, ContributionLevel::Low).with_justification("Lab work on sockets"))
            .expect("r3");
        store.insert(r3(1, 2, ContributionLevel::High)).expect("r3");
        store.insert(r3(3, 2, ContributionLevel::Medium)).expect("r3");
        store.insert(r2(1, 2)).expect("r2");
        store.insert(r2(1, 1)).expect("r2");
        store.insert(r2(2, 3)).expect("r2");
        store
    }

    #[test]
    fn course_trace_crosses_and_groups() {
        let catalog = fixtures::catalog();
        let store = chains();
        let trace =
            TraceEngine::course_trace(&catalog, &store, CourseId(10), SW, &BTreeSet::new())
                .expect("trace");

        // RAA3 is inactive, so its MEDIUM chain is dropped.
        assert!(trace.groups.medium.is_empty());
        // RAA1 -> RA2 -> EC3 and RAA2 -> RA1 -> {EC1, EC2}
        let high: Vec<(&str, &str, &str)> = trace
            .groups
            .high
            .iter()
            .map(|e| {
                (
                    e.course_outcome.code.as_str(),
                    e.outcome.code.as_str(),
                    e.criterion.code.as_str(),
                )
            })
            .collect();
        assert_eq!(
            high,
            vec![
                ("RAA1", "RA2", "EC3"),
                ("RAA2", "RA1", "EC1"),
                ("RAA2", "RA1", "EC2"),
            ]
        );
        assert_eq!(trace.groups.low.len(), 2);
        assert_eq!(trace.groups.low[0].outcome_justification, "Lab work on sockets");
        assert_eq!(trace.groups.high[0].outcome_justification, "");
        assert_eq!(trace.groups.high[0].criterion_justification, JUSTIFICATION);
    }

    #[test]
    fn course_trace_level_filter() {
        let catalog = fixtures::catalog();
        let store = chains();
        let levels = [ContributionLevel::Low].into_iter().collect();
        let trace =
            TraceEngine::course_trace(&catalog, &store, CourseId(10), SW, &levels).expect("trace");
        assert!(trace.groups.high.is_empty());
        assert_eq!(trace.groups.low.len(), 2);
    }

    #[test]
    fn course_without_outcomes_has_empty_groups() {
        let catalog = fixtures::catalog();
        let store = chains();
        let trace =
            TraceEngine::course_trace(&catalog, &store, CourseId(13), SW, &BTreeSet::new())
                .expect("trace");
        assert_eq!(trace.course.code, "ISWD414");
        assert!(trace.groups.is_empty());
    }

    #[test]
    fn course_trace_errors() {
        let catalog = fixtures::catalog();
        let store = chains();
        assert!(matches!(
            TraceEngine::course_trace(&catalog, &store, CourseId(404), SW, &BTreeSet::new()),
            Err(TrazaError::NotFound(_))
        ));
        assert!(matches!(
            TraceEngine::course_trace(&catalog, &store, CourseId(11), EE, &BTreeSet::new()),
            Err(TrazaError::InvalidRequest(_))
        ));
    }

    #[test]
    fn objective_trace_without_objective_links_lists_bare_objectives() {
        let catalog = fixtures::catalog();
        let store = chains();
        let trace =
            TraceEngine::objective_trace(&catalog, &store, SW, &BTreeSet::new()).expect("trace");
        assert_eq!(trace.objectives.len(), 2);
        assert!(trace.objectives.iter().all(|o| o.outcomes.is_empty()));
    }

    #[test]
    fn objective_trace_prunes_and_deduplicates() {
        let catalog = fixtures::catalog();
        let mut store = chains();
        store
            .insert(RelationDraft::outcome_objective(OutcomeId(1), ObjectiveId(1)))
            .expect("r1");
        store
            .insert(RelationDraft::outcome_objective(OutcomeId(3), ObjectiveId(2)))
            .expect("r1");

        let trace =
            TraceEngine::objective_trace(&catalog, &store, SW, &BTreeSet::new()).expect("trace");

        // OPP2 only reaches RA3, which no course outcome contributes to.
        assert_eq!(trace.objectives.len(), 1);
        let branch = &trace.objectives[0];
        assert_eq!(branch.objective.code, "OPP1");
        assert_eq!(branch.outcomes.len(), 1);
        let courses = &branch.outcomes[0].courses;
        // RAA2 (HIGH, relation 1) and RAA1 (LOW, relation 2) share course 10.
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].code, "ISWD410");
        assert_eq!(courses[0].level, ContributionLevel::High);
    }
}
