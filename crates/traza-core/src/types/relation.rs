//! Relations between curriculum entities and their mutation payloads.

use super::{
    ContributionLevel, CourseOutcomeId, CriterionId, EntityRef, ObjectiveId, OutcomeId,
    RelationId, RelationKind, TrazaError,
};
use crate::primitives::{JUSTIFICATION_MAX_LEN, JUSTIFICATION_MIN_LEN};
use serde::{Deserialize, Serialize};

// =============================================================================
// ENDPOINTS
// =============================================================================

/// The endpoint pair of a relation. The variant fixes the relation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationLink {
    OutcomeObjective {
        outcome: OutcomeId,
        objective: ObjectiveId,
    },
    OutcomeCriterion {
        outcome: OutcomeId,
        criterion: CriterionId,
    },
    CourseOutcomeOutcome {
        course_outcome: CourseOutcomeId,
        outcome: OutcomeId,
    },
}

impl RelationLink {
    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        match self {
            Self::OutcomeObjective { .. } => RelationKind::OutcomeObjective,
            Self::OutcomeCriterion { .. } => RelationKind::OutcomeCriterion,
            Self::CourseOutcomeOutcome { .. } => RelationKind::CourseOutcomeOutcome,
        }
    }

    /// Raw (source, target) ids, the key of the uniqueness index.
    #[must_use]
    pub const fn pair(&self) -> (u64, u64) {
        match *self {
            Self::OutcomeObjective { outcome, objective } => (outcome.0, objective.0),
            Self::OutcomeCriterion { outcome, criterion } => (outcome.0, criterion.0),
            Self::CourseOutcomeOutcome {
                course_outcome,
                outcome,
            } => (course_outcome.0, outcome.0),
        }
    }

    /// Rebuild a link from its kind and raw endpoint ids.
    #[must_use]
    pub const fn from_pair(kind: RelationKind, source: u64, target: u64) -> Self {
        match kind {
            RelationKind::OutcomeObjective => Self::OutcomeObjective {
                outcome: OutcomeId(source),
                objective: ObjectiveId(target),
            },
            RelationKind::OutcomeCriterion => Self::OutcomeCriterion {
                outcome: OutcomeId(source),
                criterion: CriterionId(target),
            },
            RelationKind::CourseOutcomeOutcome => Self::CourseOutcomeOutcome {
                course_outcome: CourseOutcomeId(source),
                outcome: OutcomeId(target),
            },
        }
    }

    #[must_use]
    pub const fn source(&self) -> EntityRef {
        EntityRef::new(self.kind().source_kind(), self.pair().0)
    }

    #[must_use]
    pub const fn target(&self) -> EntityRef {
        EntityRef::new(self.kind().target_kind(), self.pair().1)
    }
}

// =============================================================================
// RELATION
// =============================================================================

/// A stored relation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub link: RelationLink,
    /// Only set for course-outcome relations.
    pub contribution: Option<ContributionLevel>,
    pub justification: Option<String>,
    pub active: bool,
}

impl Relation {
    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        self.link.kind()
    }

    /// Justification text, empty when none was recorded.
    #[must_use]
    pub fn justification_text(&self) -> &str {
        self.justification.as_deref().unwrap_or("")
    }
}

fn check_justification(text: &str) -> Result<(), TrazaError> {
    let len = text.chars().count();
    if !(JUSTIFICATION_MIN_LEN..=JUSTIFICATION_MAX_LEN).contains(&len) {
        return Err(TrazaError::InvalidRequest(format!(
            "justification must be between {} and {} characters (got {})",
            JUSTIFICATION_MIN_LEN, JUSTIFICATION_MAX_LEN, len
        )));
    }
    Ok(())
}

fn check_level(kind: RelationKind, level: Option<ContributionLevel>) -> Result<(), TrazaError> {
    match (kind, level) {
        (RelationKind::CourseOutcomeOutcome, None) => Err(TrazaError::InvalidRequest(
            "course outcome relations require a contribution level".to_string(),
        )),
        (RelationKind::OutcomeObjective | RelationKind::OutcomeCriterion, Some(_)) => {
            Err(TrazaError::InvalidRequest(format!(
                "{} relations do not carry a contribution level",
                kind
            )))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// DRAFT
// =============================================================================

/// A relation that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDraft {
    pub link: RelationLink,
    pub contribution: Option<ContributionLevel>,
    pub justification: Option<String>,
    pub active: bool,
}

impl RelationDraft {
    #[must_use]
    pub const fn new(link: RelationLink) -> Self {
        Self {
            link,
            contribution: None,
            justification: None,
            active: true,
        }
    }

    #[must_use]
    pub const fn outcome_objective(outcome: OutcomeId, objective: ObjectiveId) -> Self {
        Self::new(RelationLink::OutcomeObjective { outcome, objective })
    }

    #[must_use]
    pub fn outcome_criterion(
        outcome: OutcomeId,
        criterion: CriterionId,
        justification: impl Into<String>,
    ) -> Self {
        Self::new(RelationLink::OutcomeCriterion { outcome, criterion })
            .with_justification(justification)
    }

    #[must_use]
    pub fn course_outcome_outcome(
        course_outcome: CourseOutcomeId,
        outcome: OutcomeId,
        level: ContributionLevel,
    ) -> Self {
        let mut draft = Self::new(RelationLink::CourseOutcomeOutcome {
            course_outcome,
            outcome,
        });
        draft.contribution = Some(level);
        draft
    }

    #[must_use]
    pub fn with_justification(mut self, text: impl Into<String>) -> Self {
        self.justification = Some(text.into());
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> RelationKind {
        self.link.kind()
    }

    /// Check the metadata rules of the draft's relation kind.
    ///
    /// Endpoint existence and program scoping are checked by the batch engine.
    pub fn validate(&self) -> Result<(), TrazaError> {
        let kind = self.kind();
        check_level(kind, self.contribution)?;
        match (&self.justification, kind) {
            (None, RelationKind::OutcomeCriterion) => Err(TrazaError::InvalidRequest(
                "accreditation criterion relations require a justification".to_string(),
            )),
            (Some(text), _) => check_justification(text),
            (None, _) => Ok(()),
        }
    }

    #[must_use]
    pub fn into_relation(self, id: RelationId) -> Relation {
        Relation {
            id,
            link: self.link,
            contribution: self.contribution,
            justification: self.justification,
            active: self.active,
        }
    }
}

// =============================================================================
// PATCH
// =============================================================================

/// Metadata changes for an existing relation. Endpoints are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPatch {
    pub contribution: Option<ContributionLevel>,
    pub justification: Option<String>,
    pub active: Option<bool>,
}

impl RelationPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contribution.is_none() && self.justification.is_none() && self.active.is_none()
    }

    pub fn validate_for(&self, kind: RelationKind) -> Result<(), TrazaError> {
        if self.contribution.is_some() {
            check_level(kind, self.contribution)?;
        }
        if let Some(text) = &self.justification {
            check_justification(text)?;
        }
        Ok(())
    }

    /// Apply the patch in place. Callers validate first.
    pub fn apply_to(&self, relation: &mut Relation) {
        if let Some(level) = self.contribution {
            relation.contribution = Some(level);
        }
        if let Some(text) = &self.justification {
            relation.justification = Some(text.clone());
        }
        if let Some(active) = self.active {
            relation.active = active;
        }
    }
}
