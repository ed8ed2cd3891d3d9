//! # Mapping Statistics
//!
//! Objective mapping counters for one program.

use crate::catalog::EntityStore;
use crate::relations::{RelationFilter, RelationStore};
use crate::{ProgramId, RelationKind, TrazaError};
use serde::Serialize;
use std::collections::BTreeSet;

/// How far a program's outcomes and objectives are mapped to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappingStats {
    pub total_outcomes: usize,
    pub total_objectives: usize,
    /// Outcome-objective relations whose outcome belongs to the program.
    pub total_mappings: usize,
    pub outcomes_without_mappings: usize,
    pub objectives_without_mappings: usize,
}

impl MappingStats {
    pub fn for_program<E, R>(
        entities: &E,
        relations: &R,
        program: ProgramId,
    ) -> Result<Self, TrazaError>
    where
        E: EntityStore + ?Sized,
        R: RelationStore + ?Sized,
    {
        let program = entities.require_program(program)?;
        let outcomes = entities.outcomes_by_program(program.id, None)?;
        let objectives = entities.objectives_by_program(program.id)?;

        let filter = RelationFilter::default().with_sources(outcomes.iter().map(|o| o.id.0));
        let mappings = relations.list(RelationKind::OutcomeObjective, &filter)?;

        let mapped_outcomes: BTreeSet<u64> = mappings.iter().map(|r| r.link.pair().0).collect();
        let mapped_objectives: BTreeSet<u64> = mappings.iter().map(|r| r.link.pair().1).collect();

        Ok(Self {
            total_outcomes: outcomes.len(),
            total_objectives: objectives.len(),
            total_mappings: mappings.len(),
            outcomes_without_mappings: outcomes
                .iter()
                .filter(|o| !mapped_outcomes.contains(&o.id.0))
                .count(),
            objectives_without_mappings: objectives
                .iter()
                .filter(|o| !mapped_objectives.contains(&o.id.0))
                .count(),
        })
    }
}
