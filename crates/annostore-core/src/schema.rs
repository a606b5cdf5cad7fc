//! The annotation schema: an ordered list of object types with typed features.
//!
//! A schema is plain data. It is built from the project's layer definitions
//! (see [`crate::layer::project_schema`]), embedded in every stored snapshot,
//! and compared structurally when a snapshot is migrated. Declaration order is
//! significant: it defines the positional layout used by the migrator's
//! transport encoding.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, state::FeatureValue};

// ─── Built-in type names ─────────────────────────────────────────────────────

/// Root of all non-annotation types (link types hang off this).
pub const TYPE_TOP: &str = "Top";
/// Root of all types anchored to text offsets.
pub const TYPE_ANNOTATION: &str = "Annotation";
pub const TYPE_SENTENCE: &str = "Sentence";
pub const TYPE_TOKEN: &str = "Token";
/// Records which tagset a layer's tags were drawn from.
pub const TYPE_TAGSET_DESCRIPTION: &str = "TagsetDescription";

// ─── Feature ranges ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
  String,
  Integer,
  Float,
  Boolean,
}

impl PrimitiveType {
  /// Recognise a primitive type name as used in feature definitions.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "string" => Some(Self::String),
      "integer" => Some(Self::Integer),
      "float" => Some(Self::Float),
      "boolean" => Some(Self::Boolean),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::String => "string",
      Self::Integer => "integer",
      Self::Float => "float",
      Self::Boolean => "boolean",
    }
  }
}

/// What values a feature may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureRange {
  Primitive { primitive: PrimitiveType },
  /// A reference to another object of the named type.
  Reference { target: String },
  /// An array of role-labeled links to objects of `target_type`. Each link
  /// is described by `link_type`, whose role and target features are named
  /// here so the layout survives export to formats that materialise links.
  LinkArray {
    link_type:      String,
    role_feature:   String,
    target_feature: String,
    target_type:    String,
  },
}

impl FeatureRange {
  pub fn primitive(primitive: PrimitiveType) -> Self {
    Self::Primitive { primitive }
  }

  pub fn reference(target: impl Into<String>) -> Self {
    Self::Reference { target: target.into() }
  }

  /// The value a feature holds before anything was assigned to it.
  pub fn default_value(&self) -> FeatureValue {
    match self {
      Self::Primitive { primitive: PrimitiveType::String } => FeatureValue::Null,
      Self::Primitive { primitive: PrimitiveType::Integer } => {
        FeatureValue::Integer(0)
      }
      Self::Primitive { primitive: PrimitiveType::Float } => {
        FeatureValue::Float(0.0)
      }
      Self::Primitive { primitive: PrimitiveType::Boolean } => {
        FeatureValue::Boolean(false)
      }
      Self::Reference { .. } => FeatureValue::Null,
      Self::LinkArray { .. } => FeatureValue::Links(Vec::new()),
    }
  }

  /// Whether `value` is admissible for this range. `Null` is admissible for
  /// strings and references only. Floats must be finite.
  pub fn admits(&self, value: &FeatureValue) -> bool {
    match (self, value) {
      (Self::Primitive { primitive: PrimitiveType::String }, FeatureValue::Null)
      | (Self::Primitive { primitive: PrimitiveType::String }, FeatureValue::String(_))
      | (Self::Primitive { primitive: PrimitiveType::Integer }, FeatureValue::Integer(_))
      | (Self::Primitive { primitive: PrimitiveType::Boolean }, FeatureValue::Boolean(_))
      | (Self::Reference { .. }, FeatureValue::Null)
      | (Self::Reference { .. }, FeatureValue::Reference(_))
      | (Self::LinkArray { .. }, FeatureValue::Links(_)) => true,
      (Self::Primitive { primitive: PrimitiveType::Float }, FeatureValue::Float(f)) => {
        f.is_finite()
      }
      _ => false,
    }
  }
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
  pub name:  String,
  pub range: FeatureRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
  pub name:      String,
  /// Empty only for [`TYPE_TOP`].
  pub supertype: String,
  pub features:  Vec<FeatureDescriptor>,
}

impl TypeDescriptor {
  pub fn new(name: impl Into<String>, supertype: impl Into<String>) -> Self {
    Self { name: name.into(), supertype: supertype.into(), features: Vec::new() }
  }

  /// Builder-style feature declaration.
  pub fn with_feature(mut self, name: impl Into<String>, range: FeatureRange) -> Self {
    self.features.push(FeatureDescriptor { name: name.into(), range });
    self
  }

  pub fn feature(&self, name: &str) -> Option<&FeatureDescriptor> {
    self.features.iter().find(|f| f.name == name)
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  types: Vec<TypeDescriptor>,
}

impl Schema {
  /// An empty schema without even the built-in roots.
  pub fn new() -> Self { Self::default() }

  /// The fixed base schema every project schema starts from.
  pub fn builtin() -> Self {
    let string = FeatureRange::primitive(PrimitiveType::String);
    Self {
      types: vec![
        TypeDescriptor::new(TYPE_TOP, ""),
        TypeDescriptor::new(TYPE_ANNOTATION, TYPE_TOP),
        TypeDescriptor::new(TYPE_SENTENCE, TYPE_ANNOTATION),
        TypeDescriptor::new(TYPE_TOKEN, TYPE_ANNOTATION),
        TypeDescriptor::new(TYPE_TAGSET_DESCRIPTION, TYPE_ANNOTATION)
          .with_feature("layer", string.clone())
          .with_feature("name", string),
      ],
    }
  }

  pub fn types(&self) -> &[TypeDescriptor] { &self.types }

  pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
    self.types.iter().find(|t| t.name == name)
  }

  /// Declaration index of a type; the transport layout refers to types by it.
  pub fn position(&self, name: &str) -> Option<usize> {
    self.types.iter().position(|t| t.name == name)
  }

  /// Append a type. Re-adding an identical definition is a no-op; a
  /// different definition under an existing name is rejected.
  pub fn add_type(&mut self, descriptor: TypeDescriptor) -> Result<()> {
    match self.get(&descriptor.name) {
      Some(existing) if *existing == descriptor => Ok(()),
      Some(_) => Err(Error::ConflictingType(descriptor.name)),
      None => {
        self.types.push(descriptor);
        Ok(())
      }
    }
  }

  /// Append every type of `other` that is not already present.
  pub fn merge(&mut self, other: &Schema) -> Result<()> {
    for descriptor in &other.types {
      self.add_type(descriptor.clone())?;
    }
    Ok(())
  }

  /// Elements of `self` that are absent from, or defined differently in,
  /// `other`. Types are reported as `Type`, features as `Type:feature`.
  pub fn missing_from(&self, other: &Schema) -> Vec<String> {
    let mut missing = Vec::new();
    for ty in &self.types {
      let Some(theirs) = other.get(&ty.name) else {
        missing.push(ty.name.clone());
        continue;
      };
      if theirs.supertype != ty.supertype {
        missing.push(ty.name.clone());
        continue;
      }
      for feature in &ty.features {
        if theirs.feature(&feature.name) != Some(feature) {
          missing.push(format!("{}:{}", ty.name, feature.name));
        }
      }
    }
    missing
  }

  pub fn is_subset_of(&self, other: &Schema) -> bool {
    self.missing_from(other).is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pos_type() -> TypeDescriptor {
    TypeDescriptor::new("POS", TYPE_ANNOTATION)
      .with_feature("PosValue", FeatureRange::primitive(PrimitiveType::String))
  }

  #[test]
  fn builtin_contains_roots_and_segmentation() {
    let schema = Schema::builtin();
    assert_eq!(schema.position(TYPE_TOP), Some(0));
    assert!(schema.get(TYPE_TOKEN).is_some());
    assert!(schema.get(TYPE_SENTENCE).is_some());
    assert!(schema.get(TYPE_TAGSET_DESCRIPTION).unwrap().feature("layer").is_some());
  }

  #[test]
  fn add_type_is_idempotent_but_rejects_conflicts() {
    let mut schema = Schema::builtin();
    schema.add_type(pos_type()).unwrap();
    schema.add_type(pos_type()).unwrap();
    assert_eq!(schema.types().len(), Schema::builtin().types().len() + 1);

    let conflicting = TypeDescriptor::new("POS", TYPE_ANNOTATION)
      .with_feature("PosValue", FeatureRange::primitive(PrimitiveType::Integer));
    assert!(matches!(
      schema.add_type(conflicting),
      Err(Error::ConflictingType(name)) if name == "POS"
    ));
  }

  #[test]
  fn subset_detects_missing_and_changed_features() {
    let old = {
      let mut s = Schema::builtin();
      s.add_type(pos_type()).unwrap();
      s
    };
    let mut grown = old.clone();
    grown
      .add_type(TypeDescriptor::new("Lemma", TYPE_ANNOTATION))
      .unwrap();
    assert!(old.is_subset_of(&grown));
    assert!(!grown.is_subset_of(&old));
    assert_eq!(grown.missing_from(&old), vec!["Lemma".to_string()]);

    let mut changed = Schema::builtin();
    changed
      .add_type(
        TypeDescriptor::new("POS", TYPE_ANNOTATION)
          .with_feature("PosValue", FeatureRange::reference("Token")),
      )
      .unwrap();
    assert_eq!(old.missing_from(&changed), vec!["POS:PosValue".to_string()]);
  }

  #[test]
  fn default_values_follow_range() {
    assert_eq!(
      FeatureRange::primitive(PrimitiveType::Integer).default_value(),
      FeatureValue::Integer(0)
    );
    assert_eq!(FeatureRange::reference("Token").default_value(), FeatureValue::Null);
    assert!(FeatureRange::reference("Token").admits(&FeatureValue::Null));
    let float = FeatureRange::primitive(PrimitiveType::Float);
    assert!(float.admits(&FeatureValue::Float(1.5)));
    assert!(!float.admits(&FeatureValue::Float(f64::NAN)));
    assert!(!float.admits(&FeatureValue::Float(f64::NEG_INFINITY)));
    assert!(
      !FeatureRange::primitive(PrimitiveType::Boolean)
        .admits(&FeatureValue::String("yes".into()))
    );
  }
}
