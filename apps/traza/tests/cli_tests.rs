//! CLI command tests over a temporary redb database.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use traza::cli::{
    BatchItem, Endpoint, MatrixArgs, MatrixType, Target, cmd_available, cmd_batch, cmd_create,
    cmd_delete, cmd_import_catalog, cmd_init, cmd_list, cmd_matrix, cmd_status, cmd_trace,
    cmd_update, open_session,
};
use traza::config::Backend;
use traza_core::{ContributionLevel, RelationId, RelationKind, TrazaError};

const CATALOG: &str = r#"{
  "programs": [{"id": 1, "code": "ISW", "name": "Software Engineering"}],
  "courses": [{"id": 10, "code": "ISWD410", "name": "Software Design"}],
  "links": [{"id": 100, "program": 1, "course": 10}],
  "objectives": [
    {"id": 1, "code": "OPP1", "description": "Design software systems", "program": 1}
  ],
  "outcomes": [
    {"id": 1, "code": "RA1", "description": "Apply design patterns",
     "kind": "GENERAL", "program": 1},
    {"id": 2, "code": "RA2", "description": "Model requirements",
     "kind": "SPECIFIC", "program": 1}
  ],
  "course_outcomes": [
    {"id": 1, "code": "RAA1", "description": "Build a layered app", "kind": "SKILL", "link": 100}
  ],
  "criteria": [{"id": 1, "code": "EC1", "description": "Engineering design"}]
}"#;

const JUSTIFICATION: &str = "Covered by the capstone design review";

fn setup() -> (TempDir, Target) {
    let dir = tempfile::tempdir().unwrap();
    let target = Target {
        database: dir.path().join("traza.redb"),
        backend: Backend::Redb,
        catalog: None,
        json_mode: false,
    };
    cmd_init(&target, false).unwrap();

    let catalog = write_file(dir.path(), "catalog.json", CATALOG);
    cmd_import_catalog(&target, &catalog).unwrap();
    (dir, target)
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn init_refuses_existing_database_without_force() {
    let (_dir, target) = setup();

    let result = cmd_init(&target, false);
    assert!(matches!(result, Err(TrazaError::Conflict(_))));

    cmd_init(&target, true).unwrap();
    let session = open_session(&target).unwrap();
    assert!(session.catalog().is_empty());
}

#[test]
fn import_catalog_persists_entities() {
    let (_dir, target) = setup();

    let status = open_session(&target).unwrap().status();
    assert!(status.persistent);
    assert_eq!(status.catalog.programs, 1);
    assert_eq!(status.catalog.outcomes, 2);
    assert_eq!(status.catalog.course_outcomes, 1);
    cmd_status(&target).unwrap();
}

#[test]
fn create_update_delete_round_trip() {
    let (_dir, target) = setup();

    cmd_create(
        &target,
        RelationKind::CourseOutcomeOutcome,
        1,
        1,
        Some(ContributionLevel::Medium),
        None,
        true,
    )
    .unwrap();

    cmd_update(
        &target,
        RelationKind::CourseOutcomeOutcome,
        1,
        Some(ContributionLevel::High),
        None,
        None,
    )
    .unwrap();
    let relation = open_session(&target)
        .unwrap()
        .get_relation(RelationKind::CourseOutcomeOutcome, RelationId(1))
        .unwrap();
    assert_eq!(relation.contribution, Some(ContributionLevel::High));

    cmd_delete(&target, RelationKind::CourseOutcomeOutcome, 1).unwrap();
    let result = cmd_delete(&target, RelationKind::CourseOutcomeOutcome, 1);
    assert!(matches!(result, Err(TrazaError::NotFound(_))));
}

#[test]
fn update_without_changes_is_rejected() {
    let (_dir, target) = setup();
    let result = cmd_update(&target, RelationKind::OutcomeObjective, 1, None, None, None);
    assert!(matches!(result, Err(TrazaError::InvalidRequest(_))));
}

#[test]
fn batch_file_creates_valid_items() {
    let (dir, target) = setup();
    let items = vec![
        BatchItem {
            source: 1,
            target: 1,
            contribution: None,
            justification: Some(JUSTIFICATION.to_string()),
            active: true,
        },
        // Criterion 9 does not exist.
        BatchItem {
            source: 2,
            target: 9,
            contribution: None,
            justification: Some(JUSTIFICATION.to_string()),
            active: true,
        },
        BatchItem {
            source: 2,
            target: 1,
            contribution: None,
            justification: Some(JUSTIFICATION.to_string()),
            active: true,
        },
    ];
    let file = write_file(
        dir.path(),
        "batch.json",
        &serde_json::to_string(&items).unwrap(),
    );

    cmd_batch(&target, RelationKind::OutcomeCriterion, &file).unwrap();

    let status = open_session(&target).unwrap().status();
    assert_eq!(status.relations.outcome_criterion, 2);
}

#[test]
fn malformed_batch_file_is_a_serialization_error() {
    let (dir, target) = setup();
    let file = write_file(dir.path(), "batch.json", "{not json");

    let result = cmd_batch(&target, RelationKind::OutcomeObjective, &file);
    assert!(matches!(result, Err(TrazaError::SerializationError(_))));
}

#[test]
fn matrix_and_trace_commands_run_in_json_mode() {
    let (_dir, mut target) = setup();
    target.json_mode = true;

    cmd_create(
        &target,
        RelationKind::OutcomeCriterion,
        1,
        1,
        None,
        Some(JUSTIFICATION.to_string()),
        true,
    )
    .unwrap();
    cmd_create(
        &target,
        RelationKind::CourseOutcomeOutcome,
        1,
        1,
        Some(ContributionLevel::High),
        None,
        true,
    )
    .unwrap();

    cmd_matrix(
        &target,
        MatrixArgs {
            matrix_type: MatrixType::CourseCriterion,
            program: 1,
            course: None,
            outcome_kind: None,
            active_only: true,
            levels: Vec::new(),
            search: Some("iswd".to_string()),
        },
    )
    .unwrap();
    cmd_trace(&target, 10, 1, &[ContributionLevel::High]).unwrap();

    let trace = open_session(&target)
        .unwrap()
        .get_traceability(
            traza_core::CourseId(10),
            traza_core::ProgramId(1),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(trace.groups.high.len(), 1);
}

#[test]
fn missing_input_file_is_an_io_error() {
    let (dir, target) = setup();
    let result = cmd_import_catalog(&target, &dir.path().join("absent.json"));
    assert!(matches!(result, Err(TrazaError::IoError(_))));
}

#[test]
fn memory_backend_reads_from_catalog_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = Target {
        database: dir.path().join("unused.redb"),
        backend: Backend::Memory,
        catalog: Some(write_file(dir.path(), "catalog.json", CATALOG)),
        json_mode: true,
    };

    let session = open_session(&target).unwrap();
    assert!(!session.is_persistent());
    assert_eq!(session.status().catalog.outcomes, 2);

    cmd_available(
        &target,
        RelationKind::OutcomeObjective,
        Endpoint::Objective,
        1,
        None,
        None,
    )
    .unwrap();
    cmd_matrix(
        &target,
        MatrixArgs {
            matrix_type: MatrixType::ObjectiveOutcome,
            program: 1,
            course: None,
            outcome_kind: None,
            active_only: false,
            levels: Vec::new(),
            search: None,
        },
    )
    .unwrap();
    cmd_list(
        &target,
        RelationKind::OutcomeCriterion,
        None,
        None,
        Some(1),
        false,
    )
    .unwrap();

    assert!(!target.database.exists());
}

#[test]
fn memory_backend_without_catalog_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let target = Target {
        database: dir.path().join("unused.redb"),
        backend: Backend::Memory,
        catalog: None,
        json_mode: false,
    };

    let result = cmd_matrix(
        &target,
        MatrixArgs {
            matrix_type: MatrixType::ObjectiveOutcome,
            program: 1,
            course: None,
            outcome_kind: None,
            active_only: false,
            levels: Vec::new(),
            search: None,
        },
    );
    assert!(matches!(result, Err(TrazaError::InvalidRequest(_))));
}

#[test]
fn list_filters_by_program() {
    let (_dir, target) = setup();
    cmd_create(
        &target,
        RelationKind::OutcomeObjective,
        1,
        1,
        None,
        None,
        true,
    )
    .unwrap();

    let kind = RelationKind::OutcomeObjective;
    cmd_list(&target, kind, None, None, Some(1), true).unwrap();
    let result = cmd_list(&target, kind, None, None, Some(7), true);
    assert!(matches!(result, Err(TrazaError::NotFound(_))));
}
