//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{CatalogSection, Endpoint, MatrixType, Target};
use crate::config::Backend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use traza_core::{
    AvailabilityQuery, AvailableEntities, Catalog, CatalogSeed, ContributionLevel, CourseId,
    CourseOutcomeId, CriterionId, Matrix, MatrixRequest, ObjectiveId, OutcomeId, OutcomeKind,
    ProgramId, Relation, RelationDraft, RelationFilter, RelationId, RelationKind, RelationLink,
    RelationPatch, Session, TrazaError,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a catalog or batch file (10 MB).
const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TrazaError> {
    let canonical = path.canonicalize().map_err(|e| {
        TrazaError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TrazaError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read an input file after checking its path and size.
fn read_input(path: &Path) -> Result<Vec<u8>, TrazaError> {
    let validated = validate_file_path(path)?;
    let metadata = std::fs::metadata(&validated)
        .map_err(|e| TrazaError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(TrazaError::InvalidRequest(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }

    std::fs::read(&validated).map_err(|e| TrazaError::IoError(format!("Read file: {}", e)))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(target: &Target, force: bool) -> Result<(), TrazaError> {
    if target.backend == Backend::Memory {
        println!("The memory backend needs no initialization");
        return Ok(());
    }

    if target.database.exists() {
        if !force {
            return Err(TrazaError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&target.database)
            .map_err(|e| TrazaError::IoError(format!("Remove database: {}", e)))?;
    }

    let _session = Session::with_redb(&target.database)?;
    println!("Initialized new redb database at {:?}", target.database);
    Ok(())
}

// =============================================================================
// CATALOG COMMANDS
// =============================================================================

/// Replace the curriculum catalog from a JSON seed file.
pub fn cmd_import_catalog(target: &Target, file: &Path) -> Result<(), TrazaError> {
    tracing::info!("Importing catalog from {:?}", file);

    let seed = read_catalog_seed(file)?;
    let mut session = open_session(target)?;
    let counts = session.import_catalog(seed)?;

    if target.json_mode {
        return print_json(&counts);
    }

    println!("Imported catalog:");
    println!("  Programs:        {}", counts.programs);
    println!("  Courses:         {}", counts.courses);
    println!("  Links:           {}", counts.links);
    println!("  Objectives:      {}", counts.objectives);
    println!("  Outcomes:        {}", counts.outcomes);
    println!("  Course outcomes: {}", counts.course_outcomes);
    println!("  Criteria:        {}", counts.criteria);
    Ok(())
}

/// Show the objectives or outcomes of a program.
pub fn cmd_catalog(
    target: &Target,
    program: u64,
    section: CatalogSection,
) -> Result<(), TrazaError> {
    let session = open_session(target)?;

    match section {
        CatalogSection::Objectives => {
            let catalog = session.objective_catalog(ProgramId(program))?;
            if target.json_mode {
                return print_json(&catalog);
            }
            println!("Objectives of {} ({})", catalog.program.code, catalog.total);
            for objective in &catalog.objectives {
                println!("  {:<8} {}", objective.code, objective.description);
            }
        }
        CatalogSection::Outcomes => {
            let catalog = session.outcome_catalog(ProgramId(program))?;
            if target.json_mode {
                return print_json(&catalog);
            }
            println!(
                "Outcomes of {} ({}: {} general, {} specific)",
                catalog.program.code,
                catalog.total,
                catalog.distribution.general,
                catalog.distribution.specific
            );
            for outcome in &catalog.outcomes {
                println!(
                    "  {:<8} {:<9} {}",
                    outcome.code, outcome.kind, outcome.description
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show catalog and relation counts.
pub fn cmd_status(target: &Target) -> Result<(), TrazaError> {
    let session = open_session(target)?;
    let status = session.status();

    if target.json_mode {
        let output = serde_json::json!({
            "database": target.database.to_string_lossy(),
            "backend": target.backend.as_str(),
            "status": status,
        });
        return print_json(&output);
    }

    println!("Traza Status");
    println!("============");
    println!("Database: {:?}", target.database);
    println!("Backend:  {}", target.backend.as_str());
    println!();
    println!("Programs:        {}", status.catalog.programs);
    println!("Courses:         {}", status.catalog.courses);
    println!("Objectives:      {}", status.catalog.objectives);
    println!("Outcomes:        {}", status.catalog.outcomes);
    println!("Course outcomes: {}", status.catalog.course_outcomes);
    println!("Criteria:        {}", status.catalog.criteria);
    println!();
    println!("Outcome-objective relations:        {}", status.relations.outcome_objective);
    println!("Outcome-criterion relations:        {}", status.relations.outcome_criterion);
    println!(
        "Course outcome-outcome relations:   {}",
        status.relations.course_outcome_outcome
    );
    Ok(())
}

// =============================================================================
// MUTATION COMMANDS
// =============================================================================

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub source: u64,
    pub target: u64,
    #[serde(default)]
    pub contribution: Option<ContributionLevel>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl BatchItem {
    #[must_use]
    pub fn into_draft(self, kind: RelationKind) -> RelationDraft {
        RelationDraft {
            link: RelationLink::from_pair(kind, self.source, self.target),
            contribution: self.contribution,
            justification: self.justification,
            active: self.active,
        }
    }
}

/// Create one relation.
pub fn cmd_create(
    target: &Target,
    kind: RelationKind,
    source: u64,
    to: u64,
    level: Option<ContributionLevel>,
    justification: Option<String>,
    active: bool,
) -> Result<(), TrazaError> {
    let item = BatchItem {
        source,
        target: to,
        contribution: level,
        justification,
        active,
    };

    let mut session = open_session(target)?;
    let relation = session.create_single(item.into_draft(kind))?;

    if target.json_mode {
        return print_json(&relation);
    }
    println!("Created {}", describe(&relation));
    Ok(())
}

/// Create relations listed in a JSON file.
pub fn cmd_batch(target: &Target, kind: RelationKind, file: &Path) -> Result<(), TrazaError> {
    let data = read_input(file)?;
    let items: Vec<BatchItem> = serde_json::from_slice(&data)
        .map_err(|e| TrazaError::SerializationError(format!("Batch file: {}", e)))?;
    let drafts = items.into_iter().map(|item| item.into_draft(kind)).collect();

    let mut session = open_session(target)?;
    let report = session.create_batch(kind, drafts)?;

    if target.json_mode {
        return print_json(&report);
    }

    println!(
        "Batch: {} requested, {} created, {} failed",
        report.total_requested, report.succeeded, report.failed
    );
    if !report.created_ids.is_empty() {
        let ids: Vec<String> = report.created_ids.iter().map(|id| id.to_string()).collect();
        println!("  Created ids: {}", ids.join(", "));
    }
    for error in &report.errors {
        println!("  Error: {}", error);
    }
    Ok(())
}

/// Change relation metadata.
pub fn cmd_update(
    target: &Target,
    kind: RelationKind,
    id: u64,
    level: Option<ContributionLevel>,
    justification: Option<String>,
    active: Option<bool>,
) -> Result<(), TrazaError> {
    let patch = RelationPatch {
        contribution: level,
        justification,
        active,
    };
    if patch.is_empty() {
        return Err(TrazaError::InvalidRequest(
            "Nothing to update. Pass --level, --justification or --active.".to_string(),
        ));
    }

    let mut session = open_session(target)?;
    let relation = session.update_relation(kind, RelationId(id), &patch)?;

    if target.json_mode {
        return print_json(&relation);
    }
    println!("Updated {}", describe(&relation));
    Ok(())
}

/// Delete a relation.
pub fn cmd_delete(target: &Target, kind: RelationKind, id: u64) -> Result<(), TrazaError> {
    let mut session = open_session(target)?;
    let relation = session.delete_relation(kind, RelationId(id))?;

    if target.json_mode {
        return print_json(&relation);
    }
    println!("Deleted {}", describe(&relation));
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// List relations of one kind.
pub fn cmd_list(
    target: &Target,
    kind: RelationKind,
    source: Option<u64>,
    to: Option<u64>,
    program: Option<u64>,
    active_only: bool,
) -> Result<(), TrazaError> {
    let mut filter = if active_only {
        RelationFilter::active()
    } else {
        RelationFilter::default()
    };
    if let Some(source) = source {
        filter = filter.with_sources([source]);
    }
    if let Some(to) = to {
        filter = filter.with_targets([to]);
    }
    if let Some(program) = program {
        filter = filter.with_program(ProgramId(program));
    }

    let session = open_session(target)?;
    let relations = session.list_relations(kind, &filter)?;

    if target.json_mode {
        return print_json(&relations);
    }
    println!("{} {} relations", relations.len(), kind);
    for relation in &relations {
        println!("  {}", describe(relation));
    }
    Ok(())
}

/// Translate a fixed endpoint into an availability query.
pub fn availability_query(
    kind: RelationKind,
    endpoint: Endpoint,
    id: u64,
    outcome_kind: Option<OutcomeKind>,
    program: Option<u64>,
) -> Result<AvailabilityQuery, TrazaError> {
    let query = match (kind, endpoint) {
        (RelationKind::OutcomeObjective, Endpoint::Objective) => {
            AvailabilityQuery::OutcomesForObjective {
                objective: ObjectiveId(id),
                kind: outcome_kind,
            }
        }
        (RelationKind::OutcomeObjective, Endpoint::Outcome) => {
            AvailabilityQuery::ObjectivesForOutcome {
                outcome: OutcomeId(id),
            }
        }
        (RelationKind::OutcomeCriterion, Endpoint::Criterion) => {
            AvailabilityQuery::OutcomesForCriterion {
                criterion: CriterionId(id),
                kind: outcome_kind,
                program: program.map(ProgramId),
            }
        }
        (RelationKind::OutcomeCriterion, Endpoint::Outcome) => {
            AvailabilityQuery::CriteriaForOutcome {
                outcome: OutcomeId(id),
            }
        }
        (RelationKind::CourseOutcomeOutcome, Endpoint::CourseOutcome) => {
            AvailabilityQuery::OutcomesForCourseOutcome {
                course_outcome: CourseOutcomeId(id),
                kind: outcome_kind,
            }
        }
        (RelationKind::CourseOutcomeOutcome, Endpoint::Outcome) => {
            AvailabilityQuery::CourseOutcomesForOutcome {
                outcome: OutcomeId(id),
            }
        }
        (kind, endpoint) => {
            return Err(TrazaError::InvalidRequest(format!(
                "A {:?} is not an endpoint of {} relations",
                endpoint, kind
            )));
        }
    };
    Ok(query)
}

/// List entities still open for a relation with a fixed endpoint.
pub fn cmd_available(
    target: &Target,
    kind: RelationKind,
    endpoint: Endpoint,
    id: u64,
    outcome_kind: Option<OutcomeKind>,
    program: Option<u64>,
) -> Result<(), TrazaError> {
    let query = availability_query(kind, endpoint, id, outcome_kind, program)?;
    let session = open_session(target)?;
    let available = session.get_available(query)?;

    if target.json_mode {
        return print_json(&available);
    }

    println!("{} available", available.len());
    match &available {
        AvailableEntities::Outcomes(items) => {
            for o in items {
                println!("  {:>4}  {:<8} {:<9} {}", o.id, o.code, o.kind, o.description);
            }
        }
        AvailableEntities::Objectives(items) => {
            for o in items {
                println!("  {:>4}  {:<8} {}", o.id, o.code, o.description);
            }
        }
        AvailableEntities::Criteria(items) => {
            for c in items {
                println!("  {:>4}  {:<8} {}", c.id, c.code, c.description);
            }
        }
        AvailableEntities::CourseOutcomes(items) => {
            for c in items {
                println!("  {:>4}  {:<8} {}", c.id, c.code, c.description);
            }
        }
    }
    Ok(())
}

/// Matrix command arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixArgs {
    pub matrix_type: MatrixType,
    pub program: u64,
    pub course: Option<u64>,
    pub outcome_kind: Option<OutcomeKind>,
    pub active_only: bool,
    pub levels: Vec<ContributionLevel>,
    pub search: Option<String>,
}

impl MatrixArgs {
    pub fn into_request(self) -> Result<MatrixRequest, TrazaError> {
        let program = ProgramId(self.program);
        let request = match self.matrix_type {
            MatrixType::ObjectiveOutcome => MatrixRequest::ObjectiveOutcome {
                program,
                outcome_kind: self.outcome_kind,
                active_only: self.active_only,
            },
            MatrixType::OutcomeCriterion => MatrixRequest::OutcomeCriterion {
                program,
                outcome_kind: self.outcome_kind,
                active_only: self.active_only,
            },
            MatrixType::CourseOutcomeOutcome => {
                let course = self.course.ok_or_else(|| {
                    TrazaError::InvalidRequest(
                        "--course is required for a course-outcome-outcome matrix".to_string(),
                    )
                })?;
                MatrixRequest::CourseOutcomeOutcome {
                    program,
                    course: CourseId(course),
                    outcome_kind: self.outcome_kind,
                    active_only: self.active_only,
                }
            }
            MatrixType::CourseCriterion => MatrixRequest::CourseCriterion {
                program,
                levels: self.levels.into_iter().collect(),
                search: self.search,
            },
        };
        Ok(request)
    }
}

/// Materialize and print a matrix.
pub fn cmd_matrix(target: &Target, args: MatrixArgs) -> Result<(), TrazaError> {
    let request = args.into_request()?;
    let session = open_session(target)?;
    let matrix = session.get_matrix(&request)?;

    if target.json_mode {
        return print_json(&matrix);
    }
    print_matrix(&matrix);
    Ok(())
}

/// Trace a course down to criteria.
pub fn cmd_trace(
    target: &Target,
    course: u64,
    program: u64,
    levels: &[ContributionLevel],
) -> Result<(), TrazaError> {
    let levels: BTreeSet<ContributionLevel> = levels.iter().copied().collect();
    let session = open_session(target)?;
    let trace = session.get_traceability(CourseId(course), ProgramId(program), &levels)?;

    if target.json_mode {
        return print_json(&trace);
    }

    println!("Traceability of {} - {}", trace.course.code, trace.course.name);
    for level in ContributionLevel::ALL {
        let entries = trace.groups.get(level);
        println!();
        println!("{} ({})", level, entries.len());
        for entry in entries {
            println!(
                "  {} -> {} -> {}",
                entry.course_outcome.code, entry.outcome.code, entry.criterion.code
            );
        }
    }
    Ok(())
}

/// Trace program objectives up to contributing courses.
pub fn cmd_trace_objectives(
    target: &Target,
    program: u64,
    levels: &[ContributionLevel],
) -> Result<(), TrazaError> {
    let levels: BTreeSet<ContributionLevel> = levels.iter().copied().collect();
    let session = open_session(target)?;
    let trace = session.get_objective_traceability(ProgramId(program), &levels)?;

    if target.json_mode {
        return print_json(&trace);
    }

    println!("Objective traceability of {}", trace.program.code);
    for branch in &trace.objectives {
        println!("{}  {}", branch.objective.code, branch.objective.description);
        for outcome in &branch.outcomes {
            println!("  {}", outcome.outcome.code);
            for course in &outcome.courses {
                println!("    {} [{}]", course.code, course.level);
            }
        }
    }
    Ok(())
}

/// Show objective mapping statistics.
pub fn cmd_stats(target: &Target, program: u64) -> Result<(), TrazaError> {
    let session = open_session(target)?;
    let stats = session.mapping_stats(ProgramId(program))?;

    if target.json_mode {
        return print_json(&stats);
    }

    println!("Mapping Statistics");
    println!("==================");
    println!("Outcomes:                    {}", stats.total_outcomes);
    println!("Objectives:                  {}", stats.total_objectives);
    println!("Mappings:                    {}", stats.total_mappings);
    println!("Outcomes without mappings:   {}", stats.outcomes_without_mappings);
    println!("Objectives without mappings: {}", stats.objectives_without_mappings);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the session for the resolved storage target.
///
/// The memory backend starts from the catalog file of the target; relations
/// created through it are lost when the process exits.
pub fn open_session(target: &Target) -> Result<Session, TrazaError> {
    match (target.backend, &target.catalog) {
        (Backend::Redb, _) => Session::with_redb(&target.database),
        (Backend::Memory, Some(file)) => {
            let catalog = Catalog::from_seed(read_catalog_seed(file)?)?;
            tracing::debug!("Loaded in-memory catalog from {:?}", file);
            Ok(Session::with_catalog(catalog))
        }
        (Backend::Memory, None) => Err(TrazaError::InvalidRequest(
            "The memory backend needs a catalog file (--catalog or storage.catalog)".to_string(),
        )),
    }
}

fn read_catalog_seed(file: &Path) -> Result<CatalogSeed, TrazaError> {
    let data = read_input(file)?;
    serde_json::from_slice(&data)
        .map_err(|e| TrazaError::SerializationError(format!("Catalog file: {}", e)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TrazaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TrazaError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// One-line description of a relation.
fn describe(relation: &Relation) -> String {
    let mut line = format!(
        "{} {}: {} -> {}",
        relation.kind(),
        relation.id,
        relation.link.source(),
        relation.link.target()
    );
    if let Some(level) = relation.contribution {
        line.push_str(&format!(" [{}]", level));
    }
    if !relation.active {
        line.push_str(" (inactive)");
    }
    line
}

/// Grid symbol of a cell: level initials, X, or a dot when unmapped.
fn cell_symbol(matrix: &Matrix, row: usize, col: usize) -> String {
    let Some(cell) = matrix.cells.get(row * matrix.cols.len() + col) else {
        return "?".to_string();
    };
    if !cell.has_mapping {
        return ".".to_string();
    }
    if !cell.levels.is_empty() {
        return cell.levels.iter().map(|l| &l.as_str()[..1]).collect();
    }
    match (cell.contribution, cell.active) {
        (_, Some(false)) => "-".to_string(),
        (Some(level), _) => level.as_str()[..1].to_string(),
        (None, _) => "X".to_string(),
    }
}

fn print_matrix(matrix: &Matrix) {
    match &matrix.course {
        Some(course) => println!("{} / {}", matrix.program.code, course.code),
        None => println!("{}", matrix.program.code),
    }
    let width = matrix
        .rows
        .iter()
        .map(|r| r.code.len())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut header = format!("{:width$}", "", width = width);
    for col in &matrix.cols {
        header.push_str(&format!(" {:>6}", col.code));
    }
    println!("{}", header);

    for (r, row) in matrix.rows.iter().enumerate() {
        let mut line = format!("{:width$}", row.code, width = width);
        for c in 0..matrix.cols.len() {
            line.push_str(&format!(" {:>6}", cell_symbol(matrix, r, c)));
        }
        println!("{}", line);
    }

    println!();
    println!(
        "{} rows x {} cols, {} mappings, coverage {}%",
        matrix.stats.total_rows,
        matrix.stats.total_cols,
        matrix.stats.total_mappings,
        matrix.stats.coverage
    );
}
