//! Re-hosting a snapshot's content under a grown schema.

use annostore_core::{AnnotationState, Schema, Snapshot};

use crate::{SchemaError, transport::Transport};

/// Carry `state`, written under `old_schema`, over to `new_schema`.
///
/// `new_schema` must contain every type and feature of `old_schema` with the
/// same definition; otherwise this fails before touching anything. Object
/// ids, offsets, feature values, metadata and text are preserved; features
/// that only exist in `new_schema` are filled with their defaults.
pub fn migrate(
  state: &AnnotationState,
  old_schema: &Schema,
  new_schema: &Schema,
) -> Result<AnnotationState, SchemaError> {
  let missing = old_schema.missing_from(new_schema);
  if !missing.is_empty() {
    return Err(SchemaError::NotSuperset { missing });
  }

  let transport = Transport::capture(state, old_schema)?;
  let mut target = AnnotationState::default();
  transport.restore(old_schema, new_schema, &mut target)?;
  Ok(target)
}

/// [`migrate`] a snapshot and swap in the new schema.
pub fn upgrade(snapshot: &Snapshot, new_schema: &Schema) -> Result<Snapshot, SchemaError> {
  let state = migrate(&snapshot.state, &snapshot.schema, new_schema)?;
  Ok(Snapshot::new(new_schema.clone(), state))
}
