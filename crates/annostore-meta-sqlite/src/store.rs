//! [`SqliteMetadata`], the SQLite implementation of [`MetadataStore`].

use std::{path::Path, sync::Arc};

use annostore_core::{
  DocumentId, DocumentRef, ProjectId,
  layer::LayerDefinition,
  metadata::{
    AnnotationDocument, AnnotationDocumentState, MetadataStore, SourceDocument,
    SourceDocumentState,
  },
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{
    RawAnnotationDocument, RawSourceDocument, decode_id, decode_layer, encode_dt,
    encode_id, encode_layer, project_id,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Project, layer and document metadata backed by a single SQLite file.
///
/// Clones share one connection, serialised behind a mutex.
#[derive(Clone)]
pub struct SqliteMetadata {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadata {
  /// Open (or create) a database at `path` and run schema initialisation.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::init(Connection::open(path)?)
  }

  /// A private in-memory database. Used by the tests.
  pub fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory()?) }

  fn init(conn: Connection) -> Result<Self> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  // ── Administration ────────────────────────────────────────────────────

  pub fn create_project(&self, name: &str) -> Result<ProjectId> {
    let conn = self.conn.lock();
    conn.execute(
      "INSERT INTO projects (name, created_at) VALUES (?1, ?2)",
      params![name, encode_dt(Utc::now())],
    )?;
    let id = project_id(conn.last_insert_rowid())?;
    debug!(project = %id, name, "project created");
    Ok(id)
  }

  pub fn project_by_name(&self, name: &str) -> Result<Option<ProjectId>> {
    let conn = self.conn.lock();
    let raw: Option<i64> = conn
      .query_row(
        "SELECT project_id FROM projects WHERE name = ?1",
        params![name],
        |row| row.get(0),
      )
      .optional()?;
    raw.map(project_id).transpose()
  }

  /// Append a layer to a project. Layer names are unique per project.
  pub fn add_layer(&self, project: ProjectId, layer: &LayerDefinition) -> Result<()> {
    let definition = encode_layer(layer)?;
    let conn = self.conn.lock();
    ensure_project(&conn, project)?;
    let taken: bool = conn
      .query_row(
        "SELECT 1 FROM layers WHERE project_id = ?1 AND name = ?2",
        params![encode_id(project.0), layer.name],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false);
    if taken {
      return Err(Error::DuplicateLayer { project, name: layer.name.clone() });
    }
    conn.execute(
      "INSERT INTO layers (project_id, name, definition) VALUES (?1, ?2, ?3)",
      params![encode_id(project.0), layer.name, definition],
    )?;
    debug!(project = %project, layer = %layer.name, "layer added");
    Ok(())
  }

  /// Register a new source document in state `New`.
  pub fn create_document(
    &self,
    project: ProjectId,
    name: &str,
    format: &str,
  ) -> Result<DocumentRef> {
    let conn = self.conn.lock();
    ensure_project(&conn, project)?;
    conn.execute(
      "INSERT INTO source_documents (project_id, name, format, state)
       VALUES (?1, ?2, ?3, ?4)",
      params![encode_id(project.0), name, format, SourceDocumentState::New.as_str()],
    )?;
    let doc = DocumentRef { project, document: DocumentId(decode_id(conn.last_insert_rowid())?) };
    debug!(document = %doc, name, "document created");
    Ok(doc)
  }

  pub fn list_documents(&self, project: ProjectId) -> Result<Vec<SourceDocument>> {
    let conn = self.conn.lock();
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM source_documents WHERE project_id = ?1 ORDER BY document_id",
      RawSourceDocument::COLUMNS
    ))?;
    let raws = stmt
      .query_map(params![encode_id(project.0)], RawSourceDocument::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawSourceDocument::into_document).collect()
  }

  pub fn list_annotation_documents(
    &self,
    document: DocumentRef,
  ) -> Result<Vec<AnnotationDocument>> {
    let conn = self.conn.lock();
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM annotation_documents WHERE document_id = ?1 ORDER BY user",
      RawAnnotationDocument::COLUMNS
    ))?;
    let raws = stmt
      .query_map(params![encode_id(document.document.0)], RawAnnotationDocument::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(|raw| raw.into_document(document)).collect()
  }
}

fn ensure_project(conn: &Connection, project: ProjectId) -> Result<()> {
  let found = conn
    .query_row(
      "SELECT 1 FROM projects WHERE project_id = ?1",
      params![encode_id(project.0)],
      |_| Ok(()),
    )
    .optional()?;
  found.ok_or(Error::ProjectNotFound(project))
}

fn fetch_annotation_document(
  conn: &Connection,
  document: DocumentRef,
  user: &str,
) -> Result<Option<AnnotationDocument>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {} FROM annotation_documents WHERE document_id = ?1 AND user = ?2",
        RawAnnotationDocument::COLUMNS
      ),
      params![encode_id(document.document.0), user],
      RawAnnotationDocument::from_row,
    )
    .optional()?;
  raw.map(|r| r.into_document(document)).transpose()
}

fn require_changed(changed: usize, document: DocumentRef) -> Result<()> {
  if changed == 0 { Err(Error::DocumentNotFound(document)) } else { Ok(()) }
}

// ─── MetadataStore impl ──────────────────────────────────────────────────────

impl MetadataStore for SqliteMetadata {
  type Error = Error;

  fn get_document(&self, document: DocumentRef) -> Result<Option<SourceDocument>> {
    let conn = self.conn.lock();
    let raw = conn
      .query_row(
        &format!(
          "SELECT {} FROM source_documents WHERE project_id = ?1 AND document_id = ?2",
          RawSourceDocument::COLUMNS
        ),
        params![encode_id(document.project.0), encode_id(document.document.0)],
        RawSourceDocument::from_row,
      )
      .optional()?;
    raw.map(RawSourceDocument::into_document).transpose()
  }

  fn list_layers(&self, project: ProjectId) -> Result<Vec<LayerDefinition>> {
    let conn = self.conn.lock();
    let mut stmt = conn
      .prepare("SELECT definition FROM layers WHERE project_id = ?1 ORDER BY layer_id")?;
    let rows = stmt
      .query_map(params![encode_id(project.0)], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.iter().map(|s| decode_layer(s)).collect()
  }

  fn annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
  ) -> Result<Option<AnnotationDocument>> {
    fetch_annotation_document(&self.conn.lock(), document, user)
  }

  fn create_annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
  ) -> Result<AnnotationDocument> {
    let conn = self.conn.lock();
    if let Some(existing) = fetch_annotation_document(&conn, document, user)? {
      return Ok(existing);
    }
    conn
      .execute(
        "INSERT INTO annotation_documents (document_id, user, state) VALUES (?1, ?2, ?3)",
        params![
          encode_id(document.document.0),
          user,
          AnnotationDocumentState::New.as_str()
        ],
      )
      .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
          if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
          Error::DocumentNotFound(document)
        }
        other => Error::Database(other),
      })?;
    debug!(document = %document, user, "annotation document created");
    Ok(AnnotationDocument {
      document,
      user: user.to_owned(),
      state: AnnotationDocumentState::New,
      timestamp: None,
      sentence_accessed: 0,
    })
  }

  fn set_document_state(
    &self,
    document: DocumentRef,
    state: SourceDocumentState,
  ) -> Result<()> {
    let changed = self.conn.lock().execute(
      "UPDATE source_documents SET state = ?1 WHERE project_id = ?2 AND document_id = ?3",
      params![
        state.as_str(),
        encode_id(document.project.0),
        encode_id(document.document.0)
      ],
    )?;
    require_changed(changed, document)
  }

  fn touch_document(&self, document: DocumentRef, at: DateTime<Utc>) -> Result<()> {
    let changed = self.conn.lock().execute(
      "UPDATE source_documents SET timestamp = ?1 WHERE project_id = ?2 AND document_id = ?3",
      params![
        encode_dt(at),
        encode_id(document.project.0),
        encode_id(document.document.0)
      ],
    )?;
    require_changed(changed, document)
  }

  fn touch_annotation_document(
    &self,
    document: DocumentRef,
    user: &str,
    at: DateTime<Utc>,
    state: AnnotationDocumentState,
  ) -> Result<()> {
    let changed = self.conn.lock().execute(
      "UPDATE annotation_documents SET timestamp = ?1, state = ?2
       WHERE document_id = ?3 AND user = ?4",
      params![encode_dt(at), state.as_str(), encode_id(document.document.0), user],
    )?;
    require_changed(changed, document)
  }

  fn remove_document(&self, document: DocumentRef) -> Result<()> {
    let conn = self.conn.lock();
    conn.execute(
      "DELETE FROM annotation_documents WHERE document_id = ?1",
      params![encode_id(document.document.0)],
    )?;
    conn.execute(
      "DELETE FROM source_documents WHERE project_id = ?1 AND document_id = ?2",
      params![encode_id(document.project.0), encode_id(document.document.0)],
    )?;
    debug!(document = %document, "document metadata removed");
    Ok(())
  }
}
