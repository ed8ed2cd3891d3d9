//! Curriculum shared by the integration tests.
//!
//! - Program 1 (ISW): objectives OPP1/OPP2, outcomes RA1 (general) and
//!   RA2 (specific), courses ISWD410 (two course outcomes) and ISWD414
//!   (none).
//! - Program 2 (IEL): objective OPP1, outcome RA1, course IELD200 with one
//!   course outcome.
//! - Criteria EC1 and EC2 are global.

#![allow(dead_code)]

use traza_core::{
    Catalog, CatalogSeed, Course, CourseId, CourseOutcome, CourseOutcomeId, CourseOutcomeKind,
    Criterion, CriterionId, LearningOutcome, LinkId, Objective, ObjectiveId, OutcomeId,
    OutcomeKind, Program, ProgramCourseLink, ProgramId, Session,
};

pub const ISW: ProgramId = ProgramId(1);
pub const IEL: ProgramId = ProgramId(2);

pub const ISWD410: CourseId = CourseId(10);
pub const ISWD414: CourseId = CourseId(11);
pub const IELD200: CourseId = CourseId(12);

pub const JUSTIFICATION: &str = "Assessed through the final design project";

pub fn seed() -> CatalogSeed {
    let course = |id: CourseId, code: &str| Course {
        id,
        code: code.to_string(),
        name: format!("Course {}", code),
        active: true,
    };
    let link = |id: u64, program: ProgramId, course: CourseId| ProgramCourseLink {
        id: LinkId(id),
        program,
        course,
    };
    let objective = |id: u64, code: &str, program: ProgramId| Objective {
        id: ObjectiveId(id),
        code: code.to_string(),
        description: format!("Program objective {}", code),
        program,
    };
    let outcome = |id: u64, code: &str, kind: OutcomeKind, program: ProgramId| LearningOutcome {
        id: OutcomeId(id),
        code: code.to_string(),
        description: format!("Learning outcome {}", code),
        kind,
        program,
    };
    let course_outcome = |id: u64, code: &str, kind: CourseOutcomeKind, link: u64| CourseOutcome {
        id: CourseOutcomeId(id),
        code: code.to_string(),
        description: format!("Course outcome {}", code),
        kind,
        link: LinkId(link),
        active: true,
    };
    let criterion = |id: u64, code: &str| Criterion {
        id: CriterionId(id),
        code: code.to_string(),
        description: format!("Accreditation criterion {}", code),
    };

    CatalogSeed {
        programs: vec![
            Program {
                id: ISW,
                code: "ISW".to_string(),
                name: "Software Engineering".to_string(),
            },
            Program {
                id: IEL,
                code: "IEL".to_string(),
                name: "Electrical Engineering".to_string(),
            },
        ],
        courses: vec![
            course(ISWD410, "ISWD410"),
            course(ISWD414, "ISWD414"),
            course(IELD200, "IELD200"),
        ],
        links: vec![
            link(100, ISW, ISWD410),
            link(101, ISW, ISWD414),
            link(102, IEL, IELD200),
        ],
        objectives: vec![
            objective(1, "OPP1", ISW),
            objective(2, "OPP2", ISW),
            objective(3, "OPP1", IEL),
        ],
        outcomes: vec![
            outcome(1, "RA1", OutcomeKind::General, ISW),
            outcome(2, "RA2", OutcomeKind::Specific, ISW),
            outcome(3, "RA1", OutcomeKind::General, IEL),
        ],
        course_outcomes: vec![
            course_outcome(1, "RAA1", CourseOutcomeKind::Knowledge, 100),
            course_outcome(2, "RAA2", CourseOutcomeKind::Skill, 100),
            course_outcome(3, "RAA1", CourseOutcomeKind::Knowledge, 102),
        ],
        criteria: vec![criterion(1, "EC1"), criterion(2, "EC2")],
    }
}

pub fn catalog() -> Catalog {
    Catalog::from_seed(seed()).expect("seed catalog")
}

pub fn session() -> Session {
    Session::with_catalog(catalog())
}
