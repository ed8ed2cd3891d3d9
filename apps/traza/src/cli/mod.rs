//! # Traza CLI Module
//!
//! This module implements the CLI interface for Traza.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `import-catalog` - Load curriculum entities from a JSON file
//! - `status` - Show catalog and relation counts
//! - `create` / `batch` - Create one or many relations
//! - `update` / `delete` / `list` - Maintain stored relations
//! - `available` - Entities still open for a relation
//! - `matrix` - Materialize a coverage matrix
//! - `trace` / `trace-objectives` - Traceability chains
//! - `stats` - Objective mapping statistics
//! - `catalog` - Objectives or outcomes of a program

mod commands;

use crate::config::{Backend, Config};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use traza_core::{ContributionLevel, OutcomeKind, RelationKind, TrazaError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Traza - curriculum traceability
///
/// Maps learning outcomes to program objectives, accreditation criteria and
/// course outcomes, and reports coverage over those mappings.
#[derive(Parser, Debug)]
#[command(name = "traza")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database (default: traza.db)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (default: redb)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Catalog file loaded by the memory backend
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Configuration file (default: ./traza.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Fixed endpoint of an availability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Endpoint {
    Objective,
    Outcome,
    Criterion,
    CourseOutcome,
}

/// Matrix shape selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatrixType {
    ObjectiveOutcome,
    OutcomeCriterion,
    CourseOutcomeOutcome,
    CourseCriterion,
}

/// Program catalog section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogSection {
    Objectives,
    Outcomes,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Replace the curriculum catalog from a JSON file
    ImportCatalog {
        /// Path to the catalog file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show catalog and relation counts
    Status,

    /// Create one relation
    Create {
        /// Relation kind (r1, r2, r3 or the long name)
        #[arg(short, long)]
        kind: RelationKind,

        /// Source id (outcome for r1/r2, course outcome for r3)
        #[arg(short, long)]
        source: u64,

        /// Target id (objective, criterion or outcome)
        #[arg(short, long)]
        target: u64,

        /// Contribution level (r3 only)
        #[arg(short, long)]
        level: Option<ContributionLevel>,

        /// Justification text (required for r2)
        #[arg(short, long)]
        justification: Option<String>,

        /// Create the relation inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Create up to 50 relations of one kind from a JSON file
    Batch {
        #[arg(short, long)]
        kind: RelationKind,

        /// JSON array of {source, target, contribution?, justification?, active?}
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Change the metadata of a relation
    Update {
        #[arg(short, long)]
        kind: RelationKind,

        #[arg(short, long)]
        id: u64,

        #[arg(short, long)]
        level: Option<ContributionLevel>,

        #[arg(short, long)]
        justification: Option<String>,

        /// Set the active flag
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a relation
    Delete {
        #[arg(short, long)]
        kind: RelationKind,

        #[arg(short, long)]
        id: u64,
    },

    /// List relations of one kind, newest first
    List {
        #[arg(short, long)]
        kind: RelationKind,

        #[arg(short, long)]
        source: Option<u64>,

        #[arg(short, long)]
        target: Option<u64>,

        /// Only relations whose source belongs to this program
        #[arg(short, long)]
        program: Option<u64>,

        /// Only active relations
        #[arg(long)]
        active_only: bool,
    },

    /// List entities that can still be related to a fixed endpoint
    Available {
        /// Relation kind the lookup is about
        #[arg(short, long)]
        kind: RelationKind,

        /// Kind of the fixed endpoint
        #[arg(long = "for", value_enum)]
        endpoint: Endpoint,

        /// Id of the fixed endpoint
        #[arg(short, long)]
        id: u64,

        /// Restrict outcome results to one kind
        #[arg(long)]
        outcome_kind: Option<OutcomeKind>,

        /// Restrict criterion lookups to one program
        #[arg(short, long)]
        program: Option<u64>,
    },

    /// Materialize a coverage matrix
    Matrix {
        #[arg(short = 't', long = "type", value_enum)]
        matrix_type: MatrixType,

        #[arg(short, long)]
        program: u64,

        /// Course id (course-outcome-outcome only)
        #[arg(short, long)]
        course: Option<u64>,

        #[arg(long)]
        outcome_kind: Option<OutcomeKind>,

        /// Ignore inactive relations
        #[arg(long)]
        active_only: bool,

        /// Contribution levels (course-criterion only), comma-separated
        #[arg(short, long, value_delimiter = ',')]
        levels: Vec<ContributionLevel>,

        /// Course code or name filter (course-criterion only)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Trace a course down to accreditation criteria
    Trace {
        #[arg(short, long)]
        course: u64,

        #[arg(short, long)]
        program: u64,

        /// Contribution levels, comma-separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        levels: Vec<ContributionLevel>,
    },

    /// Trace program objectives up to contributing courses
    TraceObjectives {
        #[arg(short, long)]
        program: u64,

        #[arg(short, long, value_delimiter = ',')]
        levels: Vec<ContributionLevel>,
    },

    /// Show objective mapping statistics of a program
    Stats {
        #[arg(short, long)]
        program: u64,
    },

    /// Show objectives or outcomes of a program
    Catalog {
        #[arg(short, long)]
        program: u64,

        #[arg(short, long, value_enum, default_value = "outcomes")]
        section: CatalogSection,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Storage location and output mode resolved from flags and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub database: PathBuf,
    pub backend: Backend,
    /// Seed for the memory backend.
    pub catalog: Option<PathBuf>,
    pub json_mode: bool,
}

impl Target {
    /// Flags win over the config file.
    #[must_use]
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            database: cli
                .database
                .clone()
                .unwrap_or_else(|| config.storage.database.clone()),
            backend: cli.backend.unwrap_or(config.storage.backend),
            catalog: cli
                .catalog
                .clone()
                .or_else(|| config.storage.catalog.clone()),
            json_mode: cli.json_mode,
        }
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &Config) -> Result<(), TrazaError> {
    let target = Target::resolve(&cli, config);

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&target, force),
        Some(Commands::ImportCatalog { file }) => cmd_import_catalog(&target, &file),
        Some(Commands::Status) | None => cmd_status(&target),
        Some(Commands::Create {
            kind,
            source,
            target: to,
            level,
            justification,
            inactive,
        }) => cmd_create(&target, kind, source, to, level, justification, !inactive),
        Some(Commands::Batch { kind, file }) => cmd_batch(&target, kind, &file),
        Some(Commands::Update {
            kind,
            id,
            level,
            justification,
            active,
        }) => cmd_update(&target, kind, id, level, justification, active),
        Some(Commands::Delete { kind, id }) => cmd_delete(&target, kind, id),
        Some(Commands::List {
            kind,
            source,
            target: to,
            program,
            active_only,
        }) => cmd_list(&target, kind, source, to, program, active_only),
        Some(Commands::Available {
            kind,
            endpoint,
            id,
            outcome_kind,
            program,
        }) => cmd_available(&target, kind, endpoint, id, outcome_kind, program),
        Some(Commands::Matrix {
            matrix_type,
            program,
            course,
            outcome_kind,
            active_only,
            levels,
            search,
        }) => cmd_matrix(
            &target,
            MatrixArgs {
                matrix_type,
                program,
                course,
                outcome_kind,
                active_only,
                levels,
                search,
            },
        ),
        Some(Commands::Trace {
            course,
            program,
            levels,
        }) => cmd_trace(&target, course, program, &levels),
        Some(Commands::TraceObjectives { program, levels }) => {
            cmd_trace_objectives(&target, program, &levels)
        }
        Some(Commands::Stats { program }) => cmd_stats(&target, program),
        Some(Commands::Catalog { program, section }) => cmd_catalog(&target, program, section),
    }
}
