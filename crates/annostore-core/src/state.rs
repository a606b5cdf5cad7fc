//! Annotation state: the graph of typed, feature-bearing objects anchored
//! over a document's text.
//!
//! Objects are addressed by an [`ObjectId`] that is stable for the lifetime of
//! the state: ids are handed out monotonically and never reused, and schema
//! migration carries them over unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

// ─── Values ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

/// One element of a role-labeled link array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub role:   String,
  pub target: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
  Null,
  String(String),
  Integer(i64),
  Float(f64),
  Boolean(bool),
  Reference(ObjectId),
  Links(Vec<Link>),
}

impl FeatureValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  /// Every object id this value points at.
  pub fn targets(&self) -> Vec<ObjectId> {
    match self {
      Self::Reference(id) => vec![*id],
      Self::Links(links) => links.iter().map(|l| l.target).collect(),
      _ => Vec::new(),
    }
  }
}

// ─── Objects ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationObject {
  pub id:        ObjectId,
  pub type_name: String,
  /// Start offset in Unicode scalar values, inclusive.
  pub begin:     usize,
  /// End offset in Unicode scalar values, exclusive.
  pub end:       usize,
  #[serde(default)]
  pub features:  BTreeMap<String, FeatureValue>,
}

impl AnnotationObject {
  pub fn feature(&self, name: &str) -> Option<&FeatureValue> { self.features.get(name) }

  pub fn set(&mut self, name: impl Into<String>, value: FeatureValue) {
    self.features.insert(name.into(), value);
  }
}

/// Descriptive metadata carried inside every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
  /// Set to the principal's name each time the snapshot is saved.
  pub document_id:       Option<String>,
  pub document_title:    Option<String>,
  pub document_uri:      Option<String>,
  pub document_base_uri: Option<String>,
  pub collection_id:     Option<String>,
  pub language:          Option<String>,
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationState {
  pub metadata: DocumentMetadata,
  pub text:     String,
  objects:      BTreeMap<ObjectId, AnnotationObject>,
  next_id:      u64,
}

impl AnnotationState {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into(), ..Self::default() }
  }

  /// Length of the text in Unicode scalar values; the upper bound for offsets.
  pub fn text_len(&self) -> usize { self.text.chars().count() }

  /// The slice of text covered by `[begin, end)`, if the range is valid.
  pub fn covered_text(&self, begin: usize, end: usize) -> Option<&str> {
    if begin > end {
      return None;
    }
    let mut indices = self.text.char_indices().map(|(i, _)| i).chain([self.text.len()]);
    let start = indices.nth(begin)?;
    let stop = if end == begin { start } else { indices.nth(end - begin - 1)? };
    Some(&self.text[start..stop])
  }

  /// Create a new object with no features and return its id.
  pub fn add(&mut self, type_name: impl Into<String>, begin: usize, end: usize) -> ObjectId {
    let id = ObjectId(self.next_id);
    self.next_id += 1;
    self.objects.insert(id, AnnotationObject {
      id,
      type_name: type_name.into(),
      begin,
      end,
      features: BTreeMap::new(),
    });
    id
  }

  /// Insert an object under its existing id, replacing any object with that
  /// id. Future ids are allocated above it.
  pub fn insert(&mut self, object: AnnotationObject) {
    self.next_id = self.next_id.max(object.id.0 + 1);
    self.objects.insert(object.id, object);
  }

  pub fn get(&self, id: ObjectId) -> Option<&AnnotationObject> { self.objects.get(&id) }

  pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut AnnotationObject> {
    self.objects.get_mut(&id)
  }

  pub fn remove(&mut self, id: ObjectId) -> Option<AnnotationObject> {
    self.objects.remove(&id)
  }

  /// Set a feature on an existing object. Returns `false` if no such object.
  pub fn set_feature(
    &mut self,
    id: ObjectId,
    name: impl Into<String>,
    value: FeatureValue,
  ) -> bool {
    match self.objects.get_mut(&id) {
      Some(object) => {
        object.set(name, value);
        true
      }
      None => false,
    }
  }

  /// All objects in id order.
  pub fn objects(&self) -> impl Iterator<Item = &AnnotationObject> { self.objects.values() }

  pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut AnnotationObject> {
    self.objects.values_mut()
  }

  /// Objects of exactly the given type, in id order.
  pub fn select<'a>(
    &'a self,
    type_name: &'a str,
  ) -> impl Iterator<Item = &'a AnnotationObject> + 'a {
    self.objects.values().filter(move |o| o.type_name == type_name)
  }

  pub fn contains_type(&self, type_name: &str) -> bool {
    self.select(type_name).next().is_some()
  }

  pub fn len(&self) -> usize { self.objects.len() }

  pub fn is_empty(&self) -> bool { self.objects.is_empty() }

  /// The id the next [`add`](Self::add) will hand out.
  pub fn next_id(&self) -> u64 { self.next_id }

  /// Make sure ids below `next` are never handed out again.
  pub fn reserve_ids(&mut self, next: u64) { self.next_id = self.next_id.max(next); }

  /// Drop all content, metadata and text, returning to the empty state.
  pub fn clear(&mut self) { *self = Self::default(); }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// An annotation state together with the schema it was written under. This
/// is the unit the snapshot store reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub schema: Schema,
  pub state:  AnnotationState,
}

impl Snapshot {
  pub fn new(schema: Schema, state: AnnotationState) -> Self { Self { schema, state } }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_monotonic_and_never_reused() {
    let mut state = AnnotationState::new("Hello world");
    let a = state.add("Token", 0, 5);
    let b = state.add("Token", 6, 11);
    state.remove(b);
    let c = state.add("Token", 6, 11);
    assert_eq!(a, ObjectId(0));
    assert_eq!(c, ObjectId(2));
    assert_eq!(state.len(), 2);
  }

  #[test]
  fn insert_preserves_id_and_bumps_allocator() {
    let mut state = AnnotationState::default();
    state.insert(AnnotationObject {
      id:        ObjectId(41),
      type_name: "Sentence".into(),
      begin:     0,
      end:       0,
      features:  BTreeMap::new(),
    });
    assert_eq!(state.next_id(), 42);
    assert_eq!(state.add("Token", 0, 0), ObjectId(42));
  }

  #[test]
  fn covered_text_uses_character_offsets() {
    let state = AnnotationState::new("Grüße, Welt");
    assert_eq!(state.covered_text(0, 5), Some("Grüße"));
    assert_eq!(state.covered_text(7, 11), Some("Welt"));
    assert_eq!(state.covered_text(3, 3), Some(""));
    assert_eq!(state.covered_text(7, 12), None);
    assert_eq!(state.text_len(), 11);
  }

  #[test]
  fn select_filters_by_type() {
    let mut state = AnnotationState::new("a b");
    state.add("Token", 0, 1);
    state.add("Sentence", 0, 3);
    state.add("Token", 2, 3);
    assert_eq!(state.select("Token").count(), 2);
    assert!(state.contains_type("Sentence"));
    assert!(!state.contains_type("Lemma"));
  }
}
