//! [`Repository`], the persistence facade the annotation workflow talks to.
//!
//! Composes the snapshot store, the schema migrator, the injected validator,
//! the format registry and a metadata backend. Metadata is only updated after
//! the store reported success; the two are not transactionally joined.

use std::{path::Path, sync::Arc};

use annostore_codec::upgrade;
use annostore_core::{
  AnnotationState, BoxError, DocumentRef, FormatReader, FormatWriter, MetadataStore,
  Principal, Schema, Snapshot, SnapshotKey, Validator,
  layer::{LayerDefinition, LayerKind, project_schema},
  metadata::{AnnotationDocumentState, SourceDocument, SourceDocumentState},
  schema::TYPE_TAGSET_DESCRIPTION,
  state::FeatureValue,
};
use annostore_store_fs::{
  HistoryEntry, Reconciliation, RetentionOutcome, SnapshotStore, Error as StoreError,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::{Error, Result, formats::FormatRegistry, segment::ensure_segmentation};

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
  /// The snapshot was migrated to the current project schema and saved.
  Upgraded,
  /// The snapshot already carried the current schema; nothing was written.
  AlreadyCurrent,
}

/// An exported file, ready to be written wherever the caller wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
  pub file_name: String,
  pub bytes:     Vec<u8>,
}

// ─── Repository ──────────────────────────────────────────────────────────────

pub struct Repository<M> {
  store:     SnapshotStore,
  metadata:  M,
  validator: Arc<dyn Validator>,
  formats:   FormatRegistry,
}

impl<M: MetadataStore> Repository<M> {
  /// The validator is installed on the store as well, so it runs around
  /// every snapshot read and write.
  pub fn new(
    store: SnapshotStore,
    metadata: M,
    validator: Arc<dyn Validator>,
    formats: FormatRegistry,
  ) -> Self {
    let store = store.with_validator(validator.clone());
    Self { store, metadata, validator, formats }
  }

  pub fn store(&self) -> &SnapshotStore { &self.store }

  pub fn metadata(&self) -> &M { &self.metadata }

  pub fn formats(&self) -> &FormatRegistry { &self.formats }

  fn meta<T>(result: Result<T, M::Error>) -> Result<T> {
    result.map_err(|e| Error::Metadata(Box::new(e)))
  }

  fn source_document(&self, doc: DocumentRef) -> Result<SourceDocument> {
    Self::meta(self.metadata.get_document(doc))?.ok_or(Error::DocumentNotFound(doc))
  }

  fn layers(&self, doc: DocumentRef) -> Result<Vec<LayerDefinition>> {
    Self::meta(self.metadata.list_layers(doc.project))
  }

  /// The current schema of the document's project.
  pub fn project_schema(&self, doc: DocumentRef) -> Result<Schema> {
    Ok(project_schema(&self.layers(doc)?)?)
  }

  // ── Import ────────────────────────────────────────────────────────────

  /// Convert a source file into the document's initial snapshot and store
  /// both. Any failure is reported as [`Error::ImportFailed`]; the caller
  /// decides whether to drop the metadata row.
  pub fn import_document(
    &self,
    doc: DocumentRef,
    raw: &[u8],
    reader: &dyn FormatReader,
  ) -> Result<()> {
    let source = self.source_document(doc)?;
    let import = || -> Result<(), BoxError> {
      let snapshot = self.convert(&source, raw, reader)?;
      self.store.write_source(doc, &source.name, raw)?;
      self.store.write(&initial_key(doc), &snapshot)?;
      Ok(())
    };
    import().map_err(|source| Error::ImportFailed { document: doc, source })?;
    info!(document = %doc, format = reader.format_id(), "document imported");
    Ok(())
  }

  fn convert(
    &self,
    source: &SourceDocument,
    raw: &[u8],
    reader: &dyn FormatReader,
  ) -> Result<Snapshot, BoxError> {
    let schema = self.project_schema(source.document)?;
    let mut state = reader.convert(raw, &schema)?;
    ensure_segmentation(&mut state);
    stamp_document_metadata(&mut state, source);
    let mut snapshot = Snapshot::new(schema, state);
    self.validator.repair(&mut snapshot)?;
    Ok(snapshot)
  }

  /// The initial snapshot, converting the stored source file on first use.
  /// Concurrent callers wait for one conversion instead of repeating it.
  fn initial_snapshot(&self, source: &SourceDocument) -> Result<Snapshot> {
    let doc = source.document;
    let reader = self.formats.reader(&source.format)?;
    let mut converted = false;
    let snapshot = self
      .store
      .read_or_create(&initial_key(doc), || -> Result<Snapshot, BoxError> {
        let raw = self.store.read_source(doc, &source.name)?;
        let snapshot = self.convert(source, &raw, reader.as_ref())?;
        converted = true;
        Ok(snapshot)
      })
      .map_err(|source| Error::ImportFailed { document: doc, source })?;
    if converted {
      info!(document = %doc, "initial snapshot created from source file");
    }
    Ok(snapshot)
  }

  // ── Editing ───────────────────────────────────────────────────────────

  /// The snapshot `principal` should edit, creating it from the initial
  /// snapshot if the principal has none yet.
  ///
  /// For users this also registers the annotation document and moves a
  /// `New` source document to `AnnotationInProgress`. Existing snapshots are
  /// returned as stored, without a schema upgrade, so object ids stay stable.
  pub fn open_for_edit(&self, doc: DocumentRef, principal: &Principal) -> Result<Snapshot> {
    let source = self.source_document(doc)?;
    if let Principal::User(user) = principal {
      Self::meta(self.metadata.create_annotation_document(doc, user))?;
      if source.state == SourceDocumentState::New {
        Self::meta(
          self
            .metadata
            .set_document_state(doc, SourceDocumentState::AnnotationInProgress),
        )?;
      }
    }

    let key = SnapshotKey::new(doc, principal.clone());
    match self.store.read(&key) {
      Ok(snapshot) => return Ok(snapshot),
      Err(StoreError::NotFound(_)) => {}
      Err(e) => return Err(e.into()),
    }

    let initial = self.initial_snapshot(&source)?;
    if *principal == Principal::Initial {
      return Ok(initial);
    }
    // A save by the same principal may have landed since the read above.
    Ok(self.store.read_or_create(&key, || Ok::<_, StoreError>(initial))?)
  }

  /// Read the live snapshot of `principal` without side effects.
  pub fn read(&self, doc: DocumentRef, principal: &Principal) -> Result<Snapshot> {
    Ok(self.store.read(&SnapshotKey::new(doc, principal.clone()))?)
  }

  /// Persist `snapshot` as the live snapshot of `principal` and record the
  /// save in the metadata store.
  pub fn save(
    &self,
    doc: DocumentRef,
    principal: &Principal,
    snapshot: &mut Snapshot,
  ) -> Result<RetentionOutcome> {
    snapshot.state.metadata.document_id = Some(principal.to_string());
    let outcome = self.store.write(&SnapshotKey::new(doc, principal.clone()), snapshot)?;

    let now = Utc::now();
    match principal {
      Principal::Curation => Self::meta(self.metadata.touch_document(doc, now))?,
      Principal::User(user) => {
        Self::meta(self.metadata.create_annotation_document(doc, user))?;
        Self::meta(self.metadata.touch_annotation_document(
          doc,
          user,
          now,
          AnnotationDocumentState::InProgress,
        ))?;
      }
      Principal::Initial | Principal::Correction => {}
    }
    debug!(document = %doc, principal = %principal, "snapshot saved");
    Ok(outcome)
  }

  /// Migrate the stored snapshot to the project's current schema and save
  /// it. Running it again is a no-op.
  pub fn upgrade_schema(
    &self,
    doc: DocumentRef,
    principal: &Principal,
  ) -> Result<UpgradeOutcome> {
    let snapshot = self.read(doc, principal)?;
    let schema = self.project_schema(doc)?;
    if snapshot.schema == schema {
      return Ok(UpgradeOutcome::AlreadyCurrent);
    }
    let mut upgraded = upgrade(&snapshot, &schema)?;
    self.save(doc, principal, &mut upgraded)?;
    info!(document = %doc, principal = %principal, "snapshot upgraded to project schema");
    Ok(UpgradeOutcome::Upgraded)
  }

  // ── Export ────────────────────────────────────────────────────────────

  /// Render a principal's snapshot with `writer`. The stored snapshot is
  /// upgraded in memory only.
  pub fn export(
    &self,
    doc: DocumentRef,
    principal: &Principal,
    writer: &dyn FormatWriter,
  ) -> Result<Export> {
    let source = self.source_document(doc)?;
    let layers = self.layers(doc)?;
    let schema = project_schema(&layers)?;

    let mut snapshot = upgrade(&self.read(doc, principal)?, &schema)?;
    stamp_document_metadata(&mut snapshot.state, &source);
    refresh_tagsets(&mut snapshot.state, &layers);

    let bytes = writer.write(&snapshot).map_err(Error::Export)?;
    let file_name = export_file_name(&source.name, writer.extension());
    info!(document = %doc, principal = %principal, file = %file_name, "snapshot exported");
    Ok(Export { file_name, bytes })
  }

  // ── Removal, history, recovery ────────────────────────────────────────

  pub fn remove_annotation(&self, doc: DocumentRef, principal: &Principal) -> Result<bool> {
    Ok(self.store.remove(&SnapshotKey::new(doc, principal.clone()))?)
  }

  /// Delete everything stored for a document, then its metadata.
  pub fn remove_document(&self, doc: DocumentRef) -> Result<()> {
    self.store.remove_document(doc)?;
    Self::meta(self.metadata.remove_document(doc))?;
    info!(document = %doc, "document removed");
    Ok(())
  }

  pub fn history(&self, doc: DocumentRef, principal: &Principal) -> Result<Vec<HistoryEntry>> {
    Ok(self.store.history(&SnapshotKey::new(doc, principal.clone()))?)
  }

  pub fn restore(
    &self,
    doc: DocumentRef,
    principal: &Principal,
    timestamp: i64,
  ) -> Result<RetentionOutcome> {
    Ok(self.store.restore(&SnapshotKey::new(doc, principal.clone()), timestamp)?)
  }

  /// Repair interrupted writes across the whole repository.
  pub fn reconcile(&self) -> Result<Vec<(SnapshotKey, Reconciliation)>> {
    Ok(self.store.reconcile_all()?)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn initial_key(doc: DocumentRef) -> SnapshotKey { SnapshotKey::new(doc, Principal::Initial) }

fn stamp_document_metadata(state: &mut AnnotationState, source: &SourceDocument) {
  let doc = source.document;
  let meta = &mut state.metadata;
  meta.document_title = Some(source.name.clone());
  meta.collection_id = Some(doc.project.to_string());
  meta.document_base_uri = Some(format!("annostore:project/{}/", doc.project));
  meta.document_uri = Some(format!(
    "annostore:project/{}/document/{}/{}",
    doc.project, doc.document, source.name
  ));
}

/// Replace all tagset descriptions with one per tagset-bearing feature of a
/// non-chain layer.
fn refresh_tagsets(state: &mut AnnotationState, layers: &[LayerDefinition]) {
  let stale: Vec<_> = state.select(TYPE_TAGSET_DESCRIPTION).map(|o| o.id).collect();
  for id in stale {
    state.remove(id);
  }
  for layer in layers.iter().filter(|l| l.kind != LayerKind::Chain) {
    for tagset in layer.features.iter().filter_map(|f| f.tagset.as_ref()) {
      let id = state.add(TYPE_TAGSET_DESCRIPTION, 0, 0);
      state.set_feature(id, "layer", FeatureValue::String(layer.name.clone()));
      state.set_feature(id, "name", FeatureValue::String(tagset.clone()));
    }
  }
}

fn export_file_name(source_name: &str, extension: &str) -> String {
  let stem = Path::new(source_name)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or(source_name);
  format!("{stem}.{extension}")
}
