//! # Core Type Definitions
//!
//! This module contains all core types for the Traza traceability engine:
//! - Entity and relation identifiers (`ProgramId`, `OutcomeId`, `RelationId`, ...)
//! - Classification enums (`OutcomeKind`, `ContributionLevel`, `RelationKind`)
//! - Curriculum entities (`entities` submodule)
//! - Relations and their mutation payloads (`relation` submodule)
//! - Error types (`TrazaError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier and enum types implement `Ord` so they can key
//! `BTreeMap`/`BTreeSet` collections and produce stable output ordering.

mod entities;
mod relation;

pub use entities::{
    Course, CourseOutcome, Criterion, LearningOutcome, Objective, Program, ProgramCourseLink,
};
pub use relation::{Relation, RelationDraft, RelationLink, RelationPatch};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw identifier value.
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl From<$name> for EntityRef {
            fn from(id: $name) -> Self {
                EntityRef::new($kind, id.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of an academic program.
    ProgramId => RecordKind::Program
);
id_type!(
    /// Identifier of a course (subject), independent of the programs offering it.
    CourseId => RecordKind::Course
);
id_type!(
    /// Identifier of a program-course link.
    /// Course learning outcomes hang off links, never off courses directly.
    LinkId => RecordKind::ProgramCourseLink
);
id_type!(
    /// Identifier of a professional-profile objective.
    ObjectiveId => RecordKind::Objective
);
id_type!(
    /// Identifier of a program-level learning outcome.
    OutcomeId => RecordKind::LearningOutcome
);
id_type!(
    /// Identifier of a course-level learning outcome.
    CourseOutcomeId => RecordKind::CourseOutcome
);
id_type!(
    /// Identifier of an accreditation criterion.
    CriterionId => RecordKind::Criterion
);

/// Identifier of a relation row.
///
/// Each relation kind has its own id sequence, so a `RelationId` is only
/// meaningful together with its `RelationKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationId(pub u64);

impl RelationId {
    /// Get the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CLASSIFICATIONS
// =============================================================================

/// Kind of a program-level learning outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    General,
    Specific,
}

impl OutcomeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Specific => "SPECIFIC",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeKind {
    type Err = TrazaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "specific" => Ok(Self::Specific),
            other => Err(TrazaError::InvalidRequest(format!(
                "unknown outcome kind '{}' (expected general or specific)",
                other
            ))),
        }
    }
}

/// Kind of a course-level learning outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseOutcomeKind {
    Knowledge,
    Skill,
    Attitude,
}

impl CourseOutcomeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Knowledge => "KNOWLEDGE",
            Self::Skill => "SKILL",
            Self::Attitude => "ATTITUDE",
        }
    }
}

impl fmt::Display for CourseOutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a course learning outcome contributes to a program outcome.
///
/// Declaration order is the grouping order of traceability reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionLevel {
    High,
    Medium,
    Low,
}

impl ContributionLevel {
    /// All levels in grouping order.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for ContributionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContributionLevel {
    type Err = TrazaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(TrazaError::InvalidRequest(format!(
                "unknown contribution level '{}' (expected high, medium or low)",
                other
            ))),
        }
    }
}

/// The three relation sets managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// R1: learning outcome -> professional-profile objective.
    OutcomeObjective,
    /// R2: learning outcome -> accreditation criterion.
    OutcomeCriterion,
    /// R3: course learning outcome -> learning outcome.
    CourseOutcomeOutcome,
}

impl RelationKind {
    pub const ALL: [Self; 3] = [
        Self::OutcomeObjective,
        Self::OutcomeCriterion,
        Self::CourseOutcomeOutcome,
    ];

    /// Short stable name, also used as the storage table suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutcomeObjective => "outcome_objective",
            Self::OutcomeCriterion => "outcome_criterion",
            Self::CourseOutcomeOutcome => "course_outcome_outcome",
        }
    }

    /// Kind of the source endpoint.
    #[must_use]
    pub const fn source_kind(self) -> RecordKind {
        match self {
            Self::OutcomeObjective | Self::OutcomeCriterion => RecordKind::LearningOutcome,
            Self::CourseOutcomeOutcome => RecordKind::CourseOutcome,
        }
    }

    /// Kind of the target endpoint.
    #[must_use]
    pub const fn target_kind(self) -> RecordKind {
        match self {
            Self::OutcomeObjective => RecordKind::Objective,
            Self::OutcomeCriterion => RecordKind::Criterion,
            Self::CourseOutcomeOutcome => RecordKind::LearningOutcome,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = TrazaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "r1" | "outcome_objective" => Ok(Self::OutcomeObjective),
            "r2" | "outcome_criterion" => Ok(Self::OutcomeCriterion),
            "r3" | "course_outcome_outcome" => Ok(Self::CourseOutcomeOutcome),
            other => Err(TrazaError::InvalidRequest(format!(
                "unknown relation kind '{}' (expected r1, r2 or r3)",
                other
            ))),
        }
    }
}

// =============================================================================
// RECORD REFERENCES
// =============================================================================

/// Kind of a stored record, used to describe missing or conflicting data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Program,
    Course,
    ProgramCourseLink,
    Objective,
    LearningOutcome,
    CourseOutcome,
    Criterion,
    Relation(RelationKind),
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program => f.write_str("Program"),
            Self::Course => f.write_str("Course"),
            Self::ProgramCourseLink => f.write_str("Program-course link"),
            Self::Objective => f.write_str("Objective"),
            Self::LearningOutcome => f.write_str("Learning outcome"),
            Self::CourseOutcome => f.write_str("Course learning outcome"),
            Self::Criterion => f.write_str("Accreditation criterion"),
            Self::Relation(kind) => write!(f, "Relation {}", kind),
        }
    }
}

/// A typed pointer to a record: kind plus raw id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: RecordKind,
    pub id: u64,
}

impl EntityRef {
    #[must_use]
    pub const fn new(kind: RecordKind, id: u64) -> Self {
        Self { kind, id }
    }

    /// Reference to a relation row of the given kind.
    #[must_use]
    pub const fn relation(kind: RelationKind, id: RelationId) -> Self {
        Self::new(RecordKind::Relation(kind), id.0)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Traza engine.
///
/// - No silent failures
/// - Use `Result<T, TrazaError>` for fallible operations
/// - The engine never panics; all errors are recoverable by the caller
#[derive(Debug, Error)]
pub enum TrazaError {
    /// A referenced entity, relation or program-course link is missing.
    #[error("{0} does not exist")]
    NotFound(EntityRef),

    /// The request is malformed or breaks a domain rule.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The (source, target) pair is already related.
    #[error("A {kind} relation between {from} and {to} already exists")]
    DuplicateRelation {
        kind: RelationKind,
        from: EntityRef,
        to: EntityRef,
    },

    /// A uniqueness constraint fired at the storage layer.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl TrazaError {
    /// Whether the error concerns a single request item rather than the
    /// infrastructure. Batch creation records recoverable errors per item
    /// and aborts on the others.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidRequest(_)
                | Self::DuplicateRelation { .. }
                | Self::Conflict(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
