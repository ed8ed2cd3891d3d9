//! Shared curriculum fixture for unit tests.
//!
//! Program 1 (SW) and program 2 (EE) share course 10 through different
//! links, so course outcomes of the same course differ per program.
//! Course 13 (ISWD414) is linked to SW but has no course outcomes.

use crate::catalog::{Catalog, CatalogSeed};
use crate::{
    Course, CourseId, CourseOutcome, CourseOutcomeId, CourseOutcomeKind, Criterion, CriterionId,
    LearningOutcome, LinkId, Objective, ObjectiveId, OutcomeId, OutcomeKind, Program,
    ProgramCourseLink, ProgramId,
};

pub(crate) const JUSTIFICATION: &str = "Evidence gathered from course assessments";

pub(crate) const SW: ProgramId = ProgramId(1);
pub(crate) const EE: ProgramId = ProgramId(2);

fn program(id: u64, code: &str, name: &str) -> Program {
    Program {
        id: ProgramId(id),
        code: code.into(),
        name: name.into(),
    }
}

fn course(id: u64, code: &str, name: &str, active: bool) -> Course {
    Course {
        id: CourseId(id),
        code: code.into(),
        name: name.into(),
        active,
    }
}

fn link(id: u64, program: ProgramId, course: u64) -> ProgramCourseLink {
    ProgramCourseLink {
        id: LinkId(id),
        program,
        course: CourseId(course),
    }
}

fn objective(id: u64, code: &str, program: ProgramId) -> Objective {
    Objective {
        id: ObjectiveId(id),
        code: code.into(),
        description: format!("Objective {}", code),
        program,
    }
}

fn outcome(id: u64, code: &str, kind: OutcomeKind, program: ProgramId) -> LearningOutcome {
    LearningOutcome {
        id: OutcomeId(id),
        code: code.into(),
        description: format!("Outcome {}", code),
        kind,
        program,
    }
}

fn course_outcome(
    id: u64,
    code: &str,
    kind: CourseOutcomeKind,
    link: u64,
    active: bool,
) -> CourseOutcome {
    CourseOutcome {
        id: CourseOutcomeId(id),
        code: code.into(),
        description: format!("Course outcome {}", code),
        kind,
        link: LinkId(link),
        active,
    }
}

fn criterion(id: u64, code: &str) -> Criterion {
    Criterion {
        id: CriterionId(id),
        code: code.into(),
        description: format!("Criterion {}", code),
    }
}

pub(crate) fn seed() -> CatalogSeed {
    CatalogSeed {
        programs: vec![program(1, "SW", "Software"), program(2, "EE", "Electronics")],
        courses: vec![
            course(10, "ISWD410", "Distributed Systems", true),
            course(11, "ISWD520", "Databases", true),
            course(12, "ISWD999", "Retired Lab", false),
            course(13, "ISWD414", "Cloud Seminar", true),
        ],
        links: vec![
            link(100, SW, 10),
            link(101, SW, 11),
            link(102, EE, 10),
            link(103, SW, 12),
            link(104, SW, 13),
        ],
        objectives: vec![
            objective(1, "OPP1", SW),
            objective(2, "OPP2", SW),
            objective(3, "OPP1", EE),
        ],
        outcomes: vec![
            outcome(1, "RA1", OutcomeKind::General, SW),
            outcome(2, "RA2", OutcomeKind::Specific, SW),
            outcome(3, "RA3", OutcomeKind::Specific, SW),
            outcome(4, "RA1", OutcomeKind::General, EE),
        ],
        course_outcomes: vec![
            course_outcome(1, "RAA1", CourseOutcomeKind::Knowledge, 100, true),
            course_outcome(2, "RAA2", CourseOutcomeKind::Skill, 100, true),
            course_outcome(3, "RAA3", CourseOutcomeKind::Attitude, 100, false),
            course_outcome(4, "RAA1", CourseOutcomeKind::Knowledge, 101, true),
            course_outcome(5, "RAA1", CourseOutcomeKind::Knowledge, 102, true),
            course_outcome(6, "RAA1", CourseOutcomeKind::Skill, 103, true),
        ],
        criteria: vec![criterion(1, "EC1"), criterion(2, "EC2"), criterion(3, "EC3")],
    }
}

pub(crate) fn catalog() -> Catalog {
    Catalog::from_seed(seed()).expect("fixture catalog is consistent")
}
