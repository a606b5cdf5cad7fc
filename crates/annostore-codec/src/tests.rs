use annostore_core::{
  AnnotationState, Schema, Snapshot,
  layer::{FeatureDefinition, LayerDefinition, project_schema},
  schema::{FeatureRange, PrimitiveType, TYPE_ANNOTATION, TypeDescriptor},
  state::{FeatureValue, ObjectId},
};
use sha2::{Digest, Sha256};

use super::*;

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn ner_schema() -> Schema {
  project_schema(&[
    LayerDefinition::span("NamedEntity")
      .with_feature(FeatureDefinition::simple("value", "string")),
  ])
  .unwrap()
}

fn grown_schema() -> Schema {
  project_schema(&[
    LayerDefinition::span("NamedEntity")
      .with_feature(FeatureDefinition::simple("value", "string"))
      .with_feature(FeatureDefinition::simple("confidence", "float")),
    LayerDefinition::span("Lemma")
      .with_feature(FeatureDefinition::simple("value", "string")),
  ])
  .unwrap()
}

fn sample_state() -> AnnotationState {
  let mut state = AnnotationState::new("Ada Lovelace wrote notes.");
  state.metadata.document_title = Some("notes.txt".into());
  state.add("Sentence", 0, 25);
  state.add("Token", 0, 3);
  let removed = state.add("Token", 4, 12);
  state.remove(removed);
  let ne = state.add("NamedEntity", 0, 12);
  state.set_feature(ne, "value", FeatureValue::String("PER".into()));
  state
}

fn frame(body: &[u8]) -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(MAGIC);
  out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
  out.extend_from_slice(&(body.len() as u64).to_le_bytes());
  out.extend_from_slice(&Sha256::digest(body));
  out.extend_from_slice(body);
  out
}

// ─── Codec ───────────────────────────────────────────────────────────────────

#[test]
fn decode_returns_what_was_encoded() {
  let snapshot = Snapshot::new(ner_schema(), sample_state());
  let bytes = encode_snapshot(&snapshot).unwrap();
  assert_eq!(&bytes[..8], MAGIC);
  assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
}

#[test]
fn non_finite_floats_are_not_encoded() {
  let mut state = sample_state();
  let ne = state.select("NamedEntity").next().unwrap().id;
  state.set_feature(ne, "confidence", FeatureValue::Float(f64::NAN));
  assert!(matches!(
    encode(&state, &grown_schema()),
    Err(Error::NonFiniteFloat { object, ref feature }) if object == ne.0 && feature == "confidence"
  ));

  state.set_feature(ne, "confidence", FeatureValue::Float(0.25));
  let (back, _) = decode(&encode(&state, &grown_schema()).unwrap()).unwrap();
  assert_eq!(back, state);
}

#[test]
fn short_input_is_truncated() {
  let err = decode(b"ANNO").unwrap_err();
  assert!(matches!(err, Error::Truncated { actual: 4, .. }));

  let bytes = encode(&sample_state(), &ner_schema()).unwrap();
  let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
  assert!(matches!(err, Error::Truncated { .. }));
}

#[test]
fn header_fields_are_checked() {
  let mut bytes = encode(&sample_state(), &ner_schema()).unwrap();

  let mut bad_magic = bytes.clone();
  bad_magic[0] = b'X';
  assert!(matches!(decode(&bad_magic), Err(Error::BadMagic)));

  let mut bad_version = bytes.clone();
  bad_version[8] = 9;
  assert!(matches!(decode(&bad_version), Err(Error::UnsupportedVersion(9))));

  bytes.extend_from_slice(b"xx");
  assert!(matches!(decode(&bytes), Err(Error::TrailingBytes(2))));
}

#[test]
fn corrupted_body_fails_checksum() {
  let mut bytes = encode(&sample_state(), &ner_schema()).unwrap();
  let last = bytes.len() - 2;
  bytes[last] ^= 0x20;
  match decode(&bytes) {
    Err(Error::ChecksumMismatch { expected, actual }) => {
      assert_eq!(expected.len(), 64);
      assert_ne!(expected, actual);
    }
    other => panic!("expected checksum mismatch, got {other:?}"),
  }
}

#[test]
fn well_framed_garbage_is_a_body_error() {
  let bytes = frame(b"{\"schema\": 1}");
  assert!(matches!(decode(&bytes), Err(Error::Body(_))));
}

// ─── Migration ───────────────────────────────────────────────────────────────

#[test]
fn migrate_preserves_identity_and_fills_defaults() {
  let state = sample_state();
  let migrated = migrate(&state, &ner_schema(), &grown_schema()).unwrap();

  assert_eq!(migrated.len(), state.len());
  assert_eq!(migrated.next_id(), state.next_id());
  assert_eq!(migrated.text, state.text);
  assert_eq!(migrated.metadata, state.metadata);
  for object in state.objects() {
    let carried = migrated.get(object.id).unwrap();
    assert_eq!(carried.type_name, object.type_name);
    assert_eq!((carried.begin, carried.end), (object.begin, object.end));
  }

  let ne = migrated.select("NamedEntity").next().unwrap();
  assert_eq!(ne.feature("value"), Some(&FeatureValue::String("PER".into())));
  assert_eq!(ne.feature("confidence"), Some(&FeatureValue::Float(0.0)));
  // The removed token's id stays retired.
  assert!(migrated.get(ObjectId(2)).is_none());
}

#[test]
fn migrate_is_idempotent() {
  let once = migrate(&sample_state(), &ner_schema(), &grown_schema()).unwrap();
  let twice = migrate(&once, &grown_schema(), &grown_schema()).unwrap();
  assert_eq!(once, twice);
}

#[test]
fn migrate_rejects_shrinking_schema() {
  let err = migrate(&sample_state(), &grown_schema(), &ner_schema()).unwrap_err();
  match err {
    SchemaError::NotSuperset { missing } => {
      assert!(missing.contains(&"Lemma".to_string()));
      assert!(missing.contains(&"NamedEntity:confidence".to_string()));
    }
    other => panic!("unexpected error {other:?}"),
  }
}

#[test]
fn migrate_rejects_non_conforming_objects() {
  let mut state = sample_state();
  state.add("Lemma", 0, 3);
  let err = migrate(&state, &ner_schema(), &grown_schema()).unwrap_err();
  assert!(matches!(err, SchemaError::NonConforming { .. }));

  let mut typed_wrong = AnnotationState::new("x");
  let id = typed_wrong.add("Pos", 0, 1);
  typed_wrong.set_feature(id, "tag", FeatureValue::Integer(3));
  let mut schema = Schema::builtin();
  schema
    .add_type(
      TypeDescriptor::new("Pos", TYPE_ANNOTATION)
        .with_feature("tag", FeatureRange::primitive(PrimitiveType::String)),
    )
    .unwrap();
  assert!(matches!(
    migrate(&typed_wrong, &schema, &schema),
    Err(SchemaError::NonConforming { object: 0, .. })
  ));
}

#[test]
fn upgrade_swaps_embedded_schema() {
  let snapshot = Snapshot::new(ner_schema(), sample_state());
  let upgraded = upgrade(&snapshot, &grown_schema()).unwrap();
  assert_eq!(upgraded.schema, grown_schema());
  assert!(snapshot.schema.is_subset_of(&upgraded.schema));
  let bytes = encode_snapshot(&upgraded).unwrap();
  assert_eq!(decode_snapshot(&bytes).unwrap(), upgraded);
}
