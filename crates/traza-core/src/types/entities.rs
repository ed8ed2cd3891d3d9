//! Curriculum entities.
//!
//! These records are created outside the engine and loaded as a catalog.
//! They reference each other through plain foreign-key ids.

use super::{
    CourseId, CourseOutcomeId, CourseOutcomeKind, CriterionId, LinkId, ObjectiveId, OutcomeId,
    OutcomeKind, ProgramId,
};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// An academic program (career).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub code: String,
    pub name: String,
}

/// A course. Belongs to programs only through `ProgramCourseLink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Association of a course with a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCourseLink {
    pub id: LinkId,
    pub program: ProgramId,
    pub course: CourseId,
}

/// A professional-profile objective of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    pub code: String,
    pub description: String,
    pub program: ProgramId,
}

/// A program-level learning outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub id: OutcomeId,
    pub code: String,
    pub description: String,
    pub kind: OutcomeKind,
    pub program: ProgramId,
}

/// A course-level learning outcome, owned by one program-course link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub id: CourseOutcomeId,
    pub code: String,
    pub description: String,
    pub kind: CourseOutcomeKind,
    pub link: LinkId,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// An external accreditation criterion. Global, not scoped to a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub code: String,
    pub description: String,
}
