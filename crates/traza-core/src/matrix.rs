//! # Matrix Materialization Engine
//!
//! Dense row × column matrices over one relation kind, for visualization.
//!
//! Every matrix is built the same way:
//! 1. load both axes, scoped to a program (criteria are a global axis)
//! 2. load the relations whose endpoints lie on the axes with one bulk query
//! 3. index them by `(row, col)`
//! 4. emit one cell per `(row, col)` pair, in row-major order
//!
//! Coverage is kept in integer hundredths of a percent and only converted to
//! a floating-point number when serialized.

use crate::catalog::EntityStore;
use crate::primitives::COVERAGE_SCALE;
use crate::relations::{RelationFilter, RelationStore};
use crate::{
    ContributionLevel, Course, CourseId, CourseOutcome, CourseOutcomeId, Criterion,
    LearningOutcome, Objective, OutcomeKind, Program, ProgramId, Relation, RelationId,
    RelationKind, TrazaError,
};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// COVERAGE
// =============================================================================

/// Share of populated cells, in hundredths of a percent (round half up).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coverage {
    hundredths: u64,
}

impl Coverage {
    /// Coverage of `mapped` populated cells in a `rows × cols` matrix.
    /// Zero when either axis is empty.
    #[must_use]
    pub fn from_counts(mapped: usize, rows: usize, cols: usize) -> Self {
        let total = (rows as u64).saturating_mul(cols as u64);
        if total == 0 {
            return Self::default();
        }
        let scaled = (mapped as u64).saturating_mul(COVERAGE_SCALE);
        let hundredths = scaled.saturating_mul(2).saturating_add(total) / total.saturating_mul(2);
        Self { hundredths }
    }

    #[must_use]
    pub const fn hundredths(self) -> u64 {
        self.hundredths
    }

    /// Percentage with two decimals, for display and JSON output.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn as_percent(self) -> f64 {
        self.hundredths as f64 / 100.0
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.hundredths / 100, self.hundredths % 100)
    }
}

impl Serialize for Coverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// What to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixRequest {
    /// Objectives × learning outcomes of a program (R1).
    ObjectiveOutcome {
        program: ProgramId,
        outcome_kind: Option<OutcomeKind>,
        active_only: bool,
    },
    /// Learning outcomes of a program × all criteria (R2).
    OutcomeCriterion {
        program: ProgramId,
        outcome_kind: Option<OutcomeKind>,
        active_only: bool,
    },
    /// Course outcomes of one course in a program × learning outcomes (R3).
    CourseOutcomeOutcome {
        program: ProgramId,
        course: CourseId,
        outcome_kind: Option<OutcomeKind>,
        active_only: bool,
    },
    /// Active courses of a program × all criteria, through R3 then R2.
    CourseCriterion {
        program: ProgramId,
        levels: BTreeSet<ContributionLevel>,
        search: Option<String>,
    },
}

impl MatrixRequest {
    #[must_use]
    pub const fn program(&self) -> ProgramId {
        match self {
            Self::ObjectiveOutcome { program, .. }
            | Self::OutcomeCriterion { program, .. }
            | Self::CourseOutcomeOutcome { program, .. }
            | Self::CourseCriterion { program, .. } => *program,
        }
    }
}

/// Shape of a materialized matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixKind {
    ObjectiveOutcome,
    OutcomeCriterion,
    CourseOutcomeOutcome,
    CourseCriterion,
}

// =============================================================================
// OUTPUT
// =============================================================================

/// One entry of a matrix axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisEntry {
    pub id: u64,
    pub code: String,
    /// Description, or name for courses.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub active: bool,
}

impl From<&Objective> for AxisEntry {
    fn from(o: &Objective) -> Self {
        Self {
            id: o.id.0,
            code: o.code.clone(),
            label: o.description.clone(),
            kind: None,
            active: true,
        }
    }
}

impl From<&LearningOutcome> for AxisEntry {
    fn from(o: &LearningOutcome) -> Self {
        Self {
            id: o.id.0,
            code: o.code.clone(),
            label: o.description.clone(),
            kind: Some(o.kind.to_string()),
            active: true,
        }
    }
}

impl From<&CourseOutcome> for AxisEntry {
    fn from(o: &CourseOutcome) -> Self {
        Self {
            id: o.id.0,
            code: o.code.clone(),
            label: o.description.clone(),
            kind: Some(o.kind.to_string()),
            active: o.active,
        }
    }
}

impl From<&Criterion> for AxisEntry {
    fn from(c: &Criterion) -> Self {
        Self {
            id: c.id.0,
            code: c.code.clone(),
            label: c.description.clone(),
            kind: None,
            active: true,
        }
    }
}

impl From<&Course> for AxisEntry {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id.0,
            code: c.code.clone(),
            label: c.name.clone(),
            kind: None,
            active: c.active,
        }
    }
}

/// One `(row, col)` cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixCell {
    pub row: u64,
    pub col: u64,
    pub has_mapping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<RelationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution: Option<ContributionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Aggregated matrices: distinct contribution levels reaching the cell.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<ContributionLevel>,
    /// Aggregated matrices: number of distinct course outcomes involved.
    #[serde(skip_serializing_if = "is_zero")]
    pub contributing: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl MatrixCell {
    fn empty(row: u64, col: u64) -> Self {
        Self {
            row,
            col,
            has_mapping: false,
            relation_id: None,
            justification: None,
            contribution: None,
            active: None,
            levels: Vec::new(),
            contributing: 0,
        }
    }

    fn from_relation(row: u64, col: u64, relation: Relation) -> Self {
        Self {
            has_mapping: true,
            relation_id: Some(relation.id),
            justification: relation.justification,
            contribution: relation.contribution,
            active: Some(relation.active),
            ..Self::empty(row, col)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixStats {
    pub total_rows: usize,
    pub total_cols: usize,
    pub total_mappings: usize,
    pub coverage: Coverage,
}

/// A materialized matrix. `cells` is row-major over `rows` × `cols`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
    pub kind: MatrixKind,
    pub program: Program,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<Course>,
    pub rows: Vec<AxisEntry>,
    pub cols: Vec<AxisEntry>,
    pub cells: Vec<MatrixCell>,
    pub stats: MatrixStats,
}

impl Matrix {
    /// The cell at `(row, col)`, if both ids are on the axes.
    #[must_use]
    pub fn cell(&self, row: u64, col: u64) -> Option<&MatrixCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct MatrixEngine;

impl MatrixEngine {
    pub fn materialize<E, R>(
        entities: &E,
        relations: &R,
        request: &MatrixRequest,
    ) -> Result<Matrix, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        let program = entities.require_program(request.program())?;
        match request {
            MatrixRequest::ObjectiveOutcome {
                outcome_kind,
                active_only,
                ..
            } => {
                let objectives = entities.objectives_by_program(program.id)?;
                let outcomes = entities.outcomes_by_program(program.id, *outcome_kind)?;
                let filter = axis_filter(
                    outcomes.iter().map(|o| o.id.0),
                    objectives.iter().map(|o| o.id.0),
                    *active_only,
                );
                // Stored as outcome -> objective, shown as objective rows.
                let lookup = relations
                    .list(RelationKind::OutcomeObjective, &filter)?
                    .into_iter()
                    .map(|r| {
                        let (outcome, objective) = r.link.pair();
                        ((objective, outcome), r)
                    })
                    .collect();
                Ok(assemble(
                    MatrixKind::ObjectiveOutcome,
                    program,
                    None,
                    objectives.iter().map(AxisEntry::from).collect(),
                    outcomes.iter().map(AxisEntry::from).collect(),
                    lookup,
                ))
            }
            MatrixRequest::OutcomeCriterion {
                outcome_kind,
                active_only,
                ..
            } => {
                let outcomes = entities.outcomes_by_program(program.id, *outcome_kind)?;
                let criteria = entities.criteria()?;
                let filter = axis_filter(
                    outcomes.iter().map(|o| o.id.0),
                    criteria.iter().map(|c| c.id.0),
                    *active_only,
                );
                let lookup = relations
                    .list(RelationKind::OutcomeCriterion, &filter)?
                    .into_iter()
                    .map(|r| (r.link.pair(), r))
                    .collect();
                Ok(assemble(
                    MatrixKind::OutcomeCriterion,
                    program,
                    None,
                    outcomes.iter().map(AxisEntry::from).collect(),
                    criteria.iter().map(AxisEntry::from).collect(),
                    lookup,
                ))
            }
            MatrixRequest::CourseOutcomeOutcome {
                course,
                outcome_kind,
                active_only,
                ..
            } => {
                let course = entities.require_course(*course)?;
                let link = entities.resolve_link(program.id, course.id)?.ok_or_else(|| {
                    TrazaError::InvalidRequest(format!(
                        "course {} is not part of program {}",
                        course.code, program.code
                    ))
                })?;
                let mut course_outcomes = entities.course_outcomes_by_link(link.id)?;
                if *active_only {
                    course_outcomes.retain(|c| c.active);
                }
                let outcomes = entities.outcomes_by_program(program.id, *outcome_kind)?;
                let filter = axis_filter(
                    course_outcomes.iter().map(|c| c.id.0),
                    outcomes.iter().map(|o| o.id.0),
                    *active_only,
                );
                let lookup = relations
                    .list(RelationKind::CourseOutcomeOutcome, &filter)?
                    .into_iter()
                    .map(|r| (r.link.pair(), r))
                    .collect();
                Ok(assemble(
                    MatrixKind::CourseOutcomeOutcome,
                    program,
                    Some(course),
                    course_outcomes.iter().map(AxisEntry::from).collect(),
                    outcomes.iter().map(AxisEntry::from).collect(),
                    lookup,
                ))
            }
            MatrixRequest::CourseCriterion { levels, search, .. } => {
                Self::course_criterion(entities, relations, program, levels, search.as_deref())
            }
        }
    }

    /// Courses × criteria, aggregated over active course outcomes, active
    /// R3 rows (optionally restricted to `levels`) and active R2 rows.
    fn course_criterion<E, R>(
        entities: &E,
        relations: &R,
        program: Program,
        levels: &BTreeSet<ContributionLevel>,
        search: Option<&str>,
    ) -> Result<Matrix, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());

        // Rows: active courses of the program, with the course outcomes of
        // their link.
        let mut courses: Vec<Course> = Vec::new();
        let mut owner: BTreeMap<CourseOutcomeId, CourseId> = BTreeMap::new();
        for link in entities.links_by_program(program.id)? {
            let Some(course) = entities.course(link.course)? else {
                continue;
            };
            if !course.active {
                continue;
            }
            if let Some(needle) = &needle {
                let hit = course.code.to_lowercase().contains(needle)
                    || course.name.to_lowercase().contains(needle);
                if !hit {
                    continue;
                }
            }
            for course_outcome in entities.course_outcomes_by_link(link.id)? {
                if course_outcome.active {
                    owner.insert(course_outcome.id, course.id);
                }
            }
            courses.push(course);
        }
        courses.sort_by(|a, b| (a.code.as_str(), a.id).cmp(&(b.code.as_str(), b.id)));
        let criteria = entities.criteria()?;

        // Course outcome -> outcome, one bulk query.
        let r3_filter = RelationFilter::active()
            .with_sources(owner.keys().map(|id| id.0))
            .with_levels(levels.iter().copied());
        let r3 = if owner.is_empty() {
            Vec::new()
        } else {
            relations.list(RelationKind::CourseOutcomeOutcome, &r3_filter)?
        };

        // Outcome -> criterion, one bulk query.
        let reached: BTreeSet<u64> = r3.iter().map(|r| r.link.pair().1).collect();
        let r2 = if reached.is_empty() {
            Vec::new()
        } else {
            let filter = RelationFilter::active().with_sources(reached.iter().copied());
            relations.list(RelationKind::OutcomeCriterion, &filter)?
        };
        let mut criteria_of: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for relation in &r2 {
            let (outcome, criterion) = relation.link.pair();
            criteria_of.entry(outcome).or_default().push(criterion);
        }

        let mut aggregate: BTreeMap<(u64, u64), (BTreeSet<ContributionLevel>, BTreeSet<u64>)> =
            BTreeMap::new();
        for relation in &r3 {
            let (course_outcome, outcome) = relation.link.pair();
            let Some(course) = owner.get(&CourseOutcomeId(course_outcome)) else {
                continue;
            };
            for criterion in criteria_of.get(&outcome).into_iter().flatten() {
                let entry = aggregate.entry((course.0, *criterion)).or_default();
                if let Some(level) = relation.contribution {
                    entry.0.insert(level);
                }
                entry.1.insert(course_outcome);
            }
        }

        let rows: Vec<AxisEntry> = courses.iter().map(AxisEntry::from).collect();
        let cols: Vec<AxisEntry> = criteria.iter().map(AxisEntry::from).collect();
        let mut cells = Vec::with_capacity(rows.len().saturating_mul(cols.len()));
        let mut mapped = 0usize;
        for row in &rows {
            for col in &cols {
                let cell = match aggregate.remove(&(row.id, col.id)) {
                    Some((levels, contributing)) => {
                        mapped += 1;
                        MatrixCell {
                            has_mapping: true,
                            levels: levels.into_iter().collect(),
                            contributing: contributing.len(),
                            ..MatrixCell::empty(row.id, col.id)
                        }
                    }
                    None => MatrixCell::empty(row.id, col.id),
                };
                cells.push(cell);
            }
        }

        let stats = MatrixStats {
            total_rows: rows.len(),
            total_cols: cols.len(),
            total_mappings: mapped,
            coverage: Coverage::from_counts(mapped, rows.len(), cols.len()),
        };
        Ok(Matrix {
            kind: MatrixKind::CourseCriterion,
            program,
            course: None,
            rows,
            cols,
            cells,
            stats,
        })
    }
}

/// Filter selecting relations whose endpoints both lie on the axes.
fn axis_filter(
    sources: impl Iterator<Item = u64>,
    targets: impl Iterator<Item = u64>,
    active_only: bool,
) -> RelationFilter {
    let mut filter = RelationFilter::default()
        .with_sources(sources)
        .with_targets(targets);
    if active_only {
        filter.active = Some(true);
    }
    filter
}

fn assemble(
    kind: MatrixKind,
    program: Program,
    course: Option<Course>,
    rows: Vec<AxisEntry>,
    cols: Vec<AxisEntry>,
    mut lookup: BTreeMap<(u64, u64), Relation>,
) -> Matrix {
    let mut cells = Vec::with_capacity(rows.len().saturating_mul(cols.len()));
    let mut mapped = 0usize;
    for row in &rows {
        for col in &cols {
            let cell = match lookup.remove(&(row.id, col.id)) {
                Some(relation) => {
                    mapped += 1;
                    MatrixCell::from_relation(row.id, col.id, relation)
                }
                None => MatrixCell::empty(row.id, col.id),
            };
            cells.push(cell);
        }
    }
    let stats = MatrixStats {
        total_rows: rows.len(),
        total_cols: cols.len(),
        total_mappings: mapped,
        coverage: Coverage::from_counts(mapped, rows.len(), cols.len()),
    };
    Matrix {
        kind,
        program,
        course,
        rows,
        cols,
        cells,
        stats,
    }
}

// =============================================================================
// TESTS
// =============================================================================
