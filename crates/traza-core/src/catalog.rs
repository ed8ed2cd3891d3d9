//! # Entity Store
//!
//! Read-only access to the curriculum entities the relation engines consult.
//!
//! Curriculum records (programs, courses, objectives, outcomes, criteria) are
//! owned by the surrounding platform. The engine receives them as a
//! [`CatalogSeed`] and keeps them in a flat arena: one `BTreeMap` per kind,
//! keyed by id, with records pointing at each other through foreign-key ids.
//!
//! All listings are ordered by code ascending, ties broken by id.

use crate::{
    Course, CourseId, CourseOutcome, CourseOutcomeId, Criterion, CriterionId, EntityRef,
    LearningOutcome, LinkId, Objective, ObjectiveId, OutcomeId, OutcomeKind, Program,
    ProgramCourseLink, ProgramId, TrazaError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ENTITYSTORE TRAIT
// =============================================================================

/// Typed lookups and scoped listings over curriculum entities.
///
/// Lookups return owned records so that disk-backed implementations can
/// decode on demand.
pub trait EntityStore {
    fn program(&self, id: ProgramId) -> Result<Option<Program>, TrazaError>;

    fn course(&self, id: CourseId) -> Result<Option<Course>, TrazaError>;

    fn link(&self, id: LinkId) -> Result<Option<ProgramCourseLink>, TrazaError>;

    fn objective(&self, id: ObjectiveId) -> Result<Option<Objective>, TrazaError>;

    fn learning_outcome(&self, id: OutcomeId) -> Result<Option<LearningOutcome>, TrazaError>;

    fn course_outcome(&self, id: CourseOutcomeId) -> Result<Option<CourseOutcome>, TrazaError>;

    fn criterion(&self, id: CriterionId) -> Result<Option<Criterion>, TrazaError>;

    /// Objectives of one program.
    fn objectives_by_program(&self, program: ProgramId) -> Result<Vec<Objective>, TrazaError>;

    /// Learning outcomes of one program, optionally restricted to one kind.
    fn outcomes_by_program(
        &self,
        program: ProgramId,
        kind: Option<OutcomeKind>,
    ) -> Result<Vec<LearningOutcome>, TrazaError>;

    /// Learning outcomes of every program, optionally restricted to one kind.
    fn outcomes(&self, kind: Option<OutcomeKind>) -> Result<Vec<LearningOutcome>, TrazaError>;

    /// The global accreditation criterion catalog.
    fn criteria(&self) -> Result<Vec<Criterion>, TrazaError>;

    /// Program-course links of one program, ordered by link id.
    fn links_by_program(&self, program: ProgramId) -> Result<Vec<ProgramCourseLink>, TrazaError>;

    /// Course outcomes owned by one program-course link (active or not).
    fn course_outcomes_by_link(&self, link: LinkId) -> Result<Vec<CourseOutcome>, TrazaError>;

    /// Find the link associating `course` with `program`.
    fn resolve_link(
        &self,
        program: ProgramId,
        course: CourseId,
    ) -> Result<Option<ProgramCourseLink>, TrazaError>;

    // -------------------------------------------------------------------------
    // Provided: lookups that treat absence as an error
    // -------------------------------------------------------------------------

    fn require_program(&self, id: ProgramId) -> Result<Program, TrazaError> {
        self.program(id)?.ok_or(TrazaError::NotFound(id.into()))
    }

    fn require_course(&self, id: CourseId) -> Result<Course, TrazaError> {
        self.course(id)?.ok_or(TrazaError::NotFound(id.into()))
    }

    fn require_objective(&self, id: ObjectiveId) -> Result<Objective, TrazaError> {
        self.objective(id)?.ok_or(TrazaError::NotFound(id.into()))
    }

    fn require_learning_outcome(&self, id: OutcomeId) -> Result<LearningOutcome, TrazaError> {
        self.learning_outcome(id)?
            .ok_or(TrazaError::NotFound(id.into()))
    }

    fn require_course_outcome(&self, id: CourseOutcomeId) -> Result<CourseOutcome, TrazaError> {
        self.course_outcome(id)?
            .ok_or(TrazaError::NotFound(id.into()))
    }

    fn require_criterion(&self, id: CriterionId) -> Result<Criterion, TrazaError> {
        self.criterion(id)?.ok_or(TrazaError::NotFound(id.into()))
    }

    /// Program that owns a course outcome, through its link.
    fn course_outcome_program(&self, outcome: &CourseOutcome) -> Result<ProgramId, TrazaError> {
        self.link(outcome.link)?
            .map(|link| link.program)
            .ok_or(TrazaError::NotFound(outcome.link.into()))
    }
}

// =============================================================================
// SEED
// =============================================================================

/// Serializable snapshot of every curriculum record.
///
/// This is the import format of the catalog (one array per kind) and the
/// payload persisted by the redb backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub links: Vec<ProgramCourseLink>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default)]
    pub outcomes: Vec<LearningOutcome>,
    #[serde(default)]
    pub course_outcomes: Vec<CourseOutcome>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

/// Number of records per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub programs: usize,
    pub courses: usize,
    pub links: usize,
    pub objectives: usize,
    pub outcomes: usize,
    pub course_outcomes: usize,
    pub criteria: usize,
}

// =============================================================================
// CATALOG
// =============================================================================

/// In-memory arena implementation of [`EntityStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    programs: BTreeMap<ProgramId, Program>,
    courses: BTreeMap<CourseId, Course>,
    links: BTreeMap<LinkId, ProgramCourseLink>,
    link_index: BTreeMap<(ProgramId, CourseId), LinkId>,
    objectives: BTreeMap<ObjectiveId, Objective>,
    outcomes: BTreeMap<OutcomeId, LearningOutcome>,
    course_outcomes: BTreeMap<CourseOutcomeId, CourseOutcome>,
    criteria: BTreeMap<CriterionId, Criterion>,
}

fn duplicate_id(r: EntityRef) -> TrazaError {
    TrazaError::Conflict(format!("{} is already in the catalog", r))
}

fn by_code<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> (&str, K)) -> Vec<T> {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
    items
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a seed, inserting kinds in dependency order.
    pub fn from_seed(seed: CatalogSeed) -> Result<Self, TrazaError> {
        let mut catalog = Self::new();
        for program in seed.programs {
            catalog.insert_program(program)?;
        }
        for course in seed.courses {
            catalog.insert_course(course)?;
        }
        for criterion in seed.criteria {
            catalog.insert_criterion(criterion)?;
        }
        for link in seed.links {
            catalog.insert_link(link)?;
        }
        for objective in seed.objectives {
            catalog.insert_objective(objective)?;
        }
        for outcome in seed.outcomes {
            catalog.insert_outcome(outcome)?;
        }
        for course_outcome in seed.course_outcomes {
            catalog.insert_course_outcome(course_outcome)?;
        }
        Ok(catalog)
    }

    /// Snapshot the catalog back into its seed form, every kind ordered by id.
    #[must_use]
    pub fn to_seed(&self) -> CatalogSeed {
        CatalogSeed {
            programs: self.programs.values().cloned().collect(),
            courses: self.courses.values().cloned().collect(),
            links: self.links.values().copied().collect(),
            objectives: self.objectives.values().cloned().collect(),
            outcomes: self.outcomes.values().cloned().collect(),
            course_outcomes: self.course_outcomes.values().cloned().collect(),
            criteria: self.criteria.values().cloned().collect(),
        }
    }

    #[must_use]
    pub fn counts(&self) -> CatalogCounts {
        CatalogCounts {
            programs: self.programs.len(),
            courses: self.courses.len(),
            links: self.links.len(),
            objectives: self.objectives.len(),
            outcomes: self.outcomes.len(),
            course_outcomes: self.course_outcomes.len(),
            criteria: self.criteria.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.courses.is_empty() && self.criteria.is_empty()
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    pub fn insert_program(&mut self, program: Program) -> Result<(), TrazaError> {
        if self.programs.contains_key(&program.id) {
            return Err(duplicate_id(program.id.into()));
        }
        self.programs.insert(program.id, program);
        Ok(())
    }

    pub fn insert_course(&mut self, course: Course) -> Result<(), TrazaError> {
        if self.courses.contains_key(&course.id) {
            return Err(duplicate_id(course.id.into()));
        }
        self.courses.insert(course.id, course);
        Ok(())
    }

    pub fn insert_criterion(&mut self, criterion: Criterion) -> Result<(), TrazaError> {
        if self.criteria.contains_key(&criterion.id) {
            return Err(duplicate_id(criterion.id.into()));
        }
        self.criteria.insert(criterion.id, criterion);
        Ok(())
    }

    /// Insert a program-course link. At most one link per (program, course).
    pub fn insert_link(&mut self, link: ProgramCourseLink) -> Result<(), TrazaError> {
        if self.links.contains_key(&link.id) {
            return Err(duplicate_id(link.id.into()));
        }
        self.ensure_program(link.program)?;
        if !self.courses.contains_key(&link.course) {
            return Err(TrazaError::NotFound(link.course.into()));
        }
        if let Some(existing) = self.link_index.get(&(link.program, link.course)) {
            return Err(TrazaError::Conflict(format!(
                "course {} is already linked to program {} by link {}",
                link.course, link.program, existing
            )));
        }
        self.link_index.insert((link.program, link.course), link.id);
        self.links.insert(link.id, link);
        Ok(())
    }

    pub fn insert_objective(&mut self, objective: Objective) -> Result<(), TrazaError> {
        if self.objectives.contains_key(&objective.id) {
            return Err(duplicate_id(objective.id.into()));
        }
        self.ensure_program(objective.program)?;
        self.objectives.insert(objective.id, objective);
        Ok(())
    }

    pub fn insert_outcome(&mut self, outcome: LearningOutcome) -> Result<(), TrazaError> {
        if self.outcomes.contains_key(&outcome.id) {
            return Err(duplicate_id(outcome.id.into()));
        }
        self.ensure_program(outcome.program)?;
        self.outcomes.insert(outcome.id, outcome);
        Ok(())
    }

    pub fn insert_course_outcome(&mut self, outcome: CourseOutcome) -> Result<(), TrazaError> {
        if self.course_outcomes.contains_key(&outcome.id) {
            return Err(duplicate_id(outcome.id.into()));
        }
        if !self.links.contains_key(&outcome.link) {
            return Err(TrazaError::NotFound(outcome.link.into()));
        }
        self.course_outcomes.insert(outcome.id, outcome);
        Ok(())
    }

    fn ensure_program(&self, id: ProgramId) -> Result<(), TrazaError> {
        if self.programs.contains_key(&id) {
            Ok(())
        } else {
            Err(TrazaError::NotFound(id.into()))
        }
    }
}

impl EntityStore for Catalog {
    fn program(&self, id: ProgramId) -> Result<Option<Program>, TrazaError> {
        Ok(self.programs.get(&id).cloned())
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, TrazaError> {
        Ok(self.courses.get(&id).cloned())
    }

    fn link(&self, id: LinkId) -> Result<Option<ProgramCourseLink>, TrazaError> {
        Ok(self.links.get(&id).copied())
    }

    fn objective(&self, id: ObjectiveId) -> Result<Option<Objective>, TrazaError> {
        Ok(self.objectives.get(&id).cloned())
    }

    fn learning_outcome(&self, id: OutcomeId) -> Result<Option<LearningOutcome>, TrazaError> {
        Ok(self.outcomes.get(&id).cloned())
    }

    fn course_outcome(&self, id: CourseOutcomeId) -> Result<Option<CourseOutcome>, TrazaError> {
        Ok(self.course_outcomes.get(&id).cloned())
    }

    fn criterion(&self, id: CriterionId) -> Result<Option<Criterion>, TrazaError> {
        Ok(self.criteria.get(&id).cloned())
    }

    fn objectives_by_program(&self, program: ProgramId) -> Result<Vec<Objective>, TrazaError> {
        let items = self
            .objectives
            .values()
            .filter(|o| o.program == program)
            .cloned()
            .collect();
        Ok(by_code(items, |o: &Objective| (o.code.as_str(), o.id)))
    }

    fn outcomes_by_program(
        &self,
        program: ProgramId,
        kind: Option<OutcomeKind>,
    ) -> Result<Vec<LearningOutcome>, TrazaError> {
        let items = self
            .outcomes
            .values()
            .filter(|o| o.program == program && kind.is_none_or(|k| o.kind == k))
            .cloned()
            .collect();
        Ok(by_code(items, |o: &LearningOutcome| (o.code.as_str(), o.id)))
    }

    fn outcomes(&self, kind: Option<OutcomeKind>) -> Result<Vec<LearningOutcome>, TrazaError> {
        let items = self
            .outcomes
            .values()
            .filter(|o| kind.is_none_or(|k| o.kind == k))
            .cloned()
            .collect();
        Ok(by_code(items, |o: &LearningOutcome| (o.code.as_str(), o.id)))
    }

    fn criteria(&self) -> Result<Vec<Criterion>, TrazaError> {
        let items = self.criteria.values().cloned().collect();
        Ok(by_code(items, |c: &Criterion| (c.code.as_str(), c.id)))
    }

    fn links_by_program(&self, program: ProgramId) -> Result<Vec<ProgramCourseLink>, TrazaError> {
        Ok(self
            .links
            .values()
            .filter(|l| l.program == program)
            .copied()
            .collect())
    }

    fn course_outcomes_by_link(&self, link: LinkId) -> Result<Vec<CourseOutcome>, TrazaError> {
        let items = self
            .course_outcomes
            .values()
            .filter(|o| o.link == link)
            .cloned()
            .collect();
        Ok(by_code(items, |o: &CourseOutcome| (o.code.as_str(), o.id)))
    }

    fn resolve_link(
        &self,
        program: ProgramId,
        course: CourseId,
    ) -> Result<Option<ProgramCourseLink>, TrazaError> {
        Ok(self
            .link_index
            .get(&(program, course))
            .and_then(|id| self.links.get(id))
            .copied())
    }
}

// =============================================================================
// PROGRAM CATALOGS
// =============================================================================

/// Objectives of a program with their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveCatalog {
    pub program: Program,
    pub objectives: Vec<Objective>,
    pub total: usize,
}

impl ObjectiveCatalog {
    pub fn build<E: EntityStore + ?Sized>(
        entities: &E,
        program: ProgramId,
    ) -> Result<Self, TrazaError> {
        let program = entities.require_program(program)?;
        let objectives = entities.objectives_by_program(program.id)?;
        Ok(Self {
            total: objectives.len(),
            program,
            objectives,
        })
    }
}

/// Count of learning outcomes per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDistribution {
    pub general: usize,
    pub specific: usize,
}

/// Learning outcomes of a program with their distribution by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCatalog {
    pub program: Program,
    pub outcomes: Vec<LearningOutcome>,
    pub total: usize,
    pub distribution: KindDistribution,
}

impl OutcomeCatalog {
    pub fn build<E: EntityStore + ?Sized>(
        entities: &E,
        program: ProgramId,
    ) -> Result<Self, TrazaError> {
        let program = entities.require_program(program)?;
        let outcomes = entities.outcomes_by_program(program.id, None)?;
        let mut distribution = KindDistribution::default();
        for outcome in &outcomes {
            match outcome.kind {
                OutcomeKind::General => distribution.general += 1,
                OutcomeKind::Specific => distribution.specific += 1,
            }
        }
        Ok(Self {
            total: outcomes.len(),
            program,
            outcomes,
            distribution,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CourseOutcomeKind;

    fn seed() -> CatalogSeed {
        CatalogSeed {
            programs: vec![Program {
                id: ProgramId(1),
                code: "SW".into(),
                name: "Software".into(),
            }],
            courses: vec![Course {
                id: CourseId(10),
                code: "ISWD414".into(),
                name: "Distributed Systems".into(),
                active: true,
            }],
            links: vec![ProgramCourseLink {
                id: LinkId(100),
                program: ProgramId(1),
                course: CourseId(10),
            }],
            objectives: vec![],
            outcomes: vec![
                LearningOutcome {
                    id: OutcomeId(2),
                    code: "RA2".into(),
                    description: "Second".into(),
                    kind: OutcomeKind::Specific,
                    program: ProgramId(1),
                },
                LearningOutcome {
                    id: OutcomeId(1),
                    code: "RA1".into(),
                    description: "First".into(),
                    kind: OutcomeKind::General,
                    program: ProgramId(1),
                },
            ],
            course_outcomes: vec![CourseOutcome {
                id: CourseOutcomeId(5),
                code: "RAA1".into(),
                description: "Explains consensus".into(),
                kind: CourseOutcomeKind::Knowledge,
                link: LinkId(100),
                active: true,
            }],
            criteria: vec![],
        }
    }

    #[test]
    fn from_seed_builds_indexes() {
        let catalog = Catalog::from_seed(seed()).expect("seed");
        let link = catalog
            .resolve_link(ProgramId(1), CourseId(10))
            .expect("resolve")
            .expect("link");
        assert_eq!(link.id, LinkId(100));
        assert_eq!(catalog.course_outcomes_by_link(link.id).expect("list").len(), 1);
        assert_eq!(catalog.counts().outcomes, 2);
    }

    #[test]
    fn listings_are_ordered_by_code() {
        let catalog = Catalog::from_seed(seed()).expect("seed");
        let codes: Vec<_> = catalog
            .outcomes_by_program(ProgramId(1), None)
            .expect("list")
            .into_iter()
            .map(|o| o.code)
            .collect();
        assert_eq!(codes, vec!["RA1", "RA2"]);

        let general = catalog
            .outcomes_by_program(ProgramId(1), Some(OutcomeKind::General))
            .expect("list");
        assert_eq!(general.len(), 1);
    }

    #[test]
    fn dangling_foreign_keys_are_rejected() {
        let mut bad = seed();
        bad.links[0].program = ProgramId(9);
        assert!(matches!(
            Catalog::from_seed(bad),
            Err(TrazaError::NotFound(_))
        ));

        let mut bad = seed();
        bad.course_outcomes[0].link = LinkId(999);
        assert!(matches!(
            Catalog::from_seed(bad),
            Err(TrazaError::NotFound(_))
        ));
    }

    #[test]
    fn second_link_for_same_pair_conflicts() {
        let mut catalog = Catalog::from_seed(seed()).expect("seed");
        let again = ProgramCourseLink {
            id: LinkId(101),
            program: ProgramId(1),
            course: CourseId(10),
        };
        assert!(matches!(
            catalog.insert_link(again),
            Err(TrazaError::Conflict(_))
        ));
    }

    #[test]
    fn seed_snapshot_round_trips() {
        let catalog = Catalog::from_seed(seed()).expect("seed");
        let again = Catalog::from_seed(catalog.to_seed()).expect("reseed");
        assert_eq!(catalog, again);
    }

    #[test]
    fn outcome_catalog_counts_kinds() {
        let catalog = Catalog::from_seed(seed()).expect("seed");
        let summary = OutcomeCatalog::build(&catalog, ProgramId(1)).expect("build");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.distribution.general, 1);
        assert_eq!(summary.distribution.specific, 1);

        assert!(matches!(
            ObjectiveCatalog::build(&catalog, ProgramId(2)),
            Err(TrazaError::NotFound(_))
        ));
    }
}
