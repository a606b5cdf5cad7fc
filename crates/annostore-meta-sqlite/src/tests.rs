//! Integration tests for `SqliteMetadata` against an in-memory database.

use annostore_core::{
  DocumentRef, ProjectId,
  layer::{FeatureDefinition, LayerDefinition, LayerKind, project_schema},
  metadata::{AnnotationDocumentState, MetadataStore, SourceDocumentState},
};
use chrono::{TimeZone, Utc};

use crate::{Error, SqliteMetadata};

fn store() -> SqliteMetadata { SqliteMetadata::open_in_memory().expect("in-memory store") }

// ─── Projects and layers ─────────────────────────────────────────────────────

#[test]
fn create_and_find_project() {
  let s = store();
  let id = s.create_project("corpus").unwrap();
  assert_eq!(s.project_by_name("corpus").unwrap(), Some(id));
  assert_eq!(s.project_by_name("missing").unwrap(), None);
  assert!(matches!(s.create_project("corpus"), Err(Error::Database(_))));
}

#[test]
fn layers_round_trip_in_creation_order() {
  let s = store();
  let project = s.create_project("p").unwrap();
  let entity = LayerDefinition::span("Entity")
    .with_feature(FeatureDefinition::simple("value", "string"));
  let relation = LayerDefinition {
    name:     "Rel".into(),
    kind:     LayerKind::Relation { attach: "Entity".into() },
    built_in: false,
    features: vec![],
  };
  s.add_layer(project, &entity).unwrap();
  s.add_layer(project, &relation).unwrap();

  let layers = s.list_layers(project).unwrap();
  assert_eq!(layers, vec![entity.clone(), relation]);
  assert!(project_schema(&layers).unwrap().get("Rel").is_some());

  assert!(matches!(
    s.add_layer(project, &entity),
    Err(Error::DuplicateLayer { .. })
  ));
  assert!(matches!(
    s.add_layer(ProjectId(99), &entity),
    Err(Error::ProjectNotFound(ProjectId(99)))
  ));
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[test]
fn documents_start_new_and_change_state() {
  let s = store();
  let project = s.create_project("p").unwrap();
  let doc = s.create_document(project, "a.txt", "text").unwrap();

  let fetched = s.get_document(doc).unwrap().unwrap();
  assert_eq!(fetched.name, "a.txt");
  assert_eq!(fetched.format, "text");
  assert_eq!(fetched.state, SourceDocumentState::New);
  assert_eq!(fetched.timestamp, None);

  s.set_document_state(doc, SourceDocumentState::AnnotationInProgress).unwrap();
  let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
  s.touch_document(doc, at).unwrap();
  let fetched = s.get_document(doc).unwrap().unwrap();
  assert_eq!(fetched.state, SourceDocumentState::AnnotationInProgress);
  assert_eq!(fetched.timestamp, Some(at));

  assert_eq!(s.list_documents(project).unwrap().len(), 1);
  assert!(s.get_document(DocumentRef::new(project.0, 999)).unwrap().is_none());
}

#[test]
fn updates_on_missing_document_fail() {
  let s = store();
  let ghost = DocumentRef::new(1, 1);
  assert!(matches!(
    s.set_document_state(ghost, SourceDocumentState::New),
    Err(Error::DocumentNotFound(_))
  ));
  assert!(matches!(
    s.create_annotation_document(ghost, "alice"),
    Err(Error::DocumentNotFound(_))
  ));
}

#[test]
fn annotation_documents_are_created_once_and_touched() {
  let s = store();
  let project = s.create_project("p").unwrap();
  let doc = s.create_document(project, "a.txt", "text").unwrap();

  assert!(s.annotation_document(doc, "alice").unwrap().is_none());
  let created = s.create_annotation_document(doc, "alice").unwrap();
  assert_eq!(created.state, AnnotationDocumentState::New);

  let at = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 0).unwrap();
  s.touch_annotation_document(doc, "alice", at, AnnotationDocumentState::InProgress)
    .unwrap();
  let again = s.create_annotation_document(doc, "alice").unwrap();
  assert_eq!(again.state, AnnotationDocumentState::InProgress);
  assert_eq!(again.timestamp, Some(at));

  assert!(matches!(
    s.touch_annotation_document(doc, "bob", at, AnnotationDocumentState::InProgress),
    Err(Error::DocumentNotFound(_))
  ));
}

#[test]
fn remove_document_drops_annotation_rows() {
  let s = store();
  let project = s.create_project("p").unwrap();
  let doc = s.create_document(project, "a.txt", "text").unwrap();
  s.create_annotation_document(doc, "alice").unwrap();
  s.create_annotation_document(doc, "bob").unwrap();
  assert_eq!(s.list_annotation_documents(doc).unwrap().len(), 2);

  s.remove_document(doc).unwrap();
  assert!(s.get_document(doc).unwrap().is_none());
  assert!(s.list_annotation_documents(doc).unwrap().is_empty());
  s.remove_document(doc).unwrap();
}
