//! Pluggable consistency checks run around every snapshot read and write.
//!
//! The snapshot store calls [`Validator::analyze`] before every write (a
//! failure aborts the write) and [`Validator::repair`] after every read and on
//! import. Implementations are injected; the store does not know which one it
//! is talking to.

use std::collections::HashSet;

use thiserror::Error;

use crate::state::{FeatureValue, ObjectId, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", findings.join("; "))]
pub struct ValidationError {
  pub findings: Vec<String>,
}

impl ValidationError {
  pub fn new(findings: Vec<String>) -> Self { Self { findings } }
}

pub trait Validator: Send + Sync {
  /// Best-effort structural fix-up.
  fn repair(&self, snapshot: &mut Snapshot) -> Result<(), ValidationError>;

  /// Check the snapshot without modifying it.
  fn analyze(&self, snapshot: &Snapshot) -> Result<(), ValidationError>;
}

// ─── NoopValidator ───────────────────────────────────────────────────────────

/// Accepts everything and repairs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
  fn repair(&self, _snapshot: &mut Snapshot) -> Result<(), ValidationError> { Ok(()) }

  fn analyze(&self, _snapshot: &Snapshot) -> Result<(), ValidationError> { Ok(()) }
}

// ─── StructuralValidator ─────────────────────────────────────────────────────

/// Checks that every object conforms to the embedded schema and that every
/// reference resolves.
///
/// `repair` fills undeclared-but-missing features with their defaults, nulls
/// dangling references and drops dangling links. It cannot fix objects of
/// unknown types and reports them as failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
  fn repair(&self, snapshot: &mut Snapshot) -> Result<(), ValidationError> {
    let ids: HashSet<ObjectId> = snapshot.state.objects().map(|o| o.id).collect();
    let schema = &snapshot.schema;
    let mut unknown = Vec::new();

    for object in snapshot.state.objects_mut() {
      let Some(ty) = schema.get(&object.type_name) else {
        unknown.push(format!("object {} has unknown type {:?}", object.id.0, object.type_name));
        continue;
      };
      for feature in &ty.features {
        object
          .features
          .entry(feature.name.clone())
          .or_insert_with(|| feature.range.default_value());
      }
      for value in object.features.values_mut() {
        match value {
          FeatureValue::Reference(target) if !ids.contains(target) => {
            *value = FeatureValue::Null;
          }
          FeatureValue::Links(links) => links.retain(|l| ids.contains(&l.target)),
          _ => {}
        }
      }
    }

    if unknown.is_empty() { Ok(()) } else { Err(ValidationError::new(unknown)) }
  }

  fn analyze(&self, snapshot: &Snapshot) -> Result<(), ValidationError> {
    let state = &snapshot.state;
    let text_len = state.text_len();
    let mut findings = Vec::new();

    for object in state.objects() {
      let id = object.id.0;
      if object.begin > object.end || object.end > text_len {
        findings.push(format!(
          "object {id} has invalid offsets [{}, {}) for text of length {text_len}",
          object.begin, object.end
        ));
      }
      let Some(ty) = snapshot.schema.get(&object.type_name) else {
        findings.push(format!("object {id} has unknown type {:?}", object.type_name));
        continue;
      };
      for (name, value) in &object.features {
        let Some(feature) = ty.feature(name) else {
          findings.push(format!("object {id} sets undeclared feature {name:?}"));
          continue;
        };
        if !feature.range.admits(value) {
          findings.push(format!("object {id} feature {name:?} holds a mistyped value"));
        }
        for target in value.targets() {
          if state.get(target).is_none() {
            findings.push(format!(
              "object {id} feature {name:?} points at missing object {}",
              target.0
            ));
          }
        }
      }
    }

    if findings.is_empty() { Ok(()) } else { Err(ValidationError::new(findings)) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    schema::{FeatureRange, PrimitiveType, Schema, TYPE_ANNOTATION, TypeDescriptor},
    state::{AnnotationState, Link},
  };

  fn schema() -> Schema {
    let mut schema = Schema::builtin();
    schema
      .add_type(
        TypeDescriptor::new("Entity", TYPE_ANNOTATION)
          .with_feature("value", FeatureRange::primitive(PrimitiveType::String))
          .with_feature("confidence", FeatureRange::primitive(PrimitiveType::Float))
          .with_feature("head", FeatureRange::reference("Token"))
          .with_feature("args", FeatureRange::LinkArray {
            link_type:      "ArgLink".into(),
            role_feature:   "role".into(),
            target_feature: "target".into(),
            target_type:    "Token".into(),
          }),
      )
      .unwrap();
    schema
  }

  #[test]
  fn analyze_accepts_conforming_snapshot() {
    let mut state = AnnotationState::new("Berlin is big");
    let token = state.add("Token", 0, 6);
    let entity = state.add("Entity", 0, 6);
    state.set_feature(entity, "value", FeatureValue::String("LOC".into()));
    state.set_feature(entity, "head", FeatureValue::Reference(token));
    let snapshot = Snapshot::new(schema(), state);
    StructuralValidator.analyze(&snapshot).unwrap();
  }

  #[test]
  fn analyze_reports_each_problem() {
    let mut state = AnnotationState::new("short");
    let entity = state.add("Entity", 3, 99);
    state.set_feature(entity, "value", FeatureValue::Integer(1));
    state.set_feature(entity, "head", FeatureValue::Reference(ObjectId(77)));
    state.set_feature(entity, "bogus", FeatureValue::Null);
    state.add("Nope", 0, 1);
    let err = StructuralValidator
      .analyze(&Snapshot::new(schema(), state))
      .unwrap_err();
    assert_eq!(err.findings.len(), 5, "{:?}", err.findings);
  }

  #[test]
  fn repair_fills_defaults_and_drops_dangling_targets() {
    let mut state = AnnotationState::new("a b");
    let token = state.add("Token", 0, 1);
    let entity = state.add("Entity", 0, 3);
    state.set_feature(entity, "head", FeatureValue::Reference(ObjectId(500)));
    state.set_feature(
      entity,
      "args",
      FeatureValue::Links(vec![
        Link { role: "kept".into(), target: token },
        Link { role: "gone".into(), target: ObjectId(501) },
      ]),
    );
    let mut snapshot = Snapshot::new(schema(), state);
    StructuralValidator.repair(&mut snapshot).unwrap();

    let repaired = snapshot.state.get(entity).unwrap();
    assert_eq!(repaired.feature("head"), Some(&FeatureValue::Null));
    assert_eq!(repaired.feature("confidence"), Some(&FeatureValue::Float(0.0)));
    assert_eq!(
      repaired.feature("args"),
      Some(&FeatureValue::Links(vec![Link { role: "kept".into(), target: token }]))
    );
    StructuralValidator.analyze(&snapshot).unwrap();
  }

  #[test]
  fn repair_cannot_fix_unknown_types() {
    let mut state = AnnotationState::new("x");
    state.add("Mystery", 0, 1);
    let mut snapshot = Snapshot::new(schema(), state);
    assert!(StructuralValidator.repair(&mut snapshot).is_err());
  }
}
