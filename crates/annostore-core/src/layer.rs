//! Project layer definitions and the schema derived from them.
//!
//! Layers are configured per project in the metadata store. The schema a
//! snapshot is written under is always `builtin + project_schema(layers)`,
//! computed at call time by a pure function.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  schema::{
    FeatureDescriptor, FeatureRange, PrimitiveType, Schema, TYPE_ANNOTATION,
    TYPE_TOP, TypeDescriptor,
  },
};

/// Feature pointing from a relation to its source endpoint.
pub const FEAT_REL_SOURCE: &str = "Governor";
/// Feature pointing from a relation to its target endpoint.
pub const FEAT_REL_TARGET: &str = "Dependent";

// ─── Definitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
  Span,
  /// A relation between two annotations of the `attach` layer.
  Relation { attach: String },
  /// A coreference-style chain, stored as a chain head plus linked list.
  Chain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValueMode {
  #[default]
  None,
  Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
  #[default]
  None,
  WithRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDefinition {
  pub name:           String,
  /// A primitive name (`string`, `integer`, `float`, `boolean`) or the name
  /// of the referenced type.
  pub type_name:      String,
  #[serde(default)]
  pub multi_value:    MultiValueMode,
  #[serde(default)]
  pub link_mode:      LinkMode,
  /// Name of the generated link type for `Array` + `WithRole` features.
  #[serde(default)]
  pub link_type_name: Option<String>,
  #[serde(default)]
  pub role_feature:   Option<String>,
  #[serde(default)]
  pub target_feature: Option<String>,
  /// Tagset the feature's values are drawn from, if any.
  #[serde(default)]
  pub tagset:         Option<String>,
}

impl FeatureDefinition {
  /// A single-valued feature of the given type.
  pub fn simple(name: impl Into<String>, type_name: impl Into<String>) -> Self {
    Self {
      name:           name.into(),
      type_name:      type_name.into(),
      multi_value:    MultiValueMode::None,
      link_mode:      LinkMode::None,
      link_type_name: None,
      role_feature:   None,
      target_feature: None,
      tagset:         None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
  pub name:     String,
  pub kind:     LayerKind,
  /// Built-in layers are already part of [`Schema::builtin`].
  #[serde(default)]
  pub built_in: bool,
  #[serde(default)]
  pub features: Vec<FeatureDefinition>,
}

impl LayerDefinition {
  pub fn span(name: impl Into<String>) -> Self {
    Self { name: name.into(), kind: LayerKind::Span, built_in: false, features: vec![] }
  }

  pub fn with_feature(mut self, feature: FeatureDefinition) -> Self {
    self.features.push(feature);
    self
  }
}

// ─── Schema construction ─────────────────────────────────────────────────────

/// Build the full schema for a project: the built-in base schema merged with
/// one or more types per custom layer.
pub fn project_schema(layers: &[LayerDefinition]) -> Result<Schema> {
  let mut schema = Schema::builtin();
  for layer in layers.iter().filter(|l| !l.built_in) {
    match &layer.kind {
      LayerKind::Span => {
        let mut td = TypeDescriptor::new(&layer.name, TYPE_ANNOTATION);
        for feature in &layer.features {
          generate_feature(&mut schema, &mut td, &layer.name, feature)?;
        }
        schema.add_type(td)?;
      }
      LayerKind::Relation { attach } => {
        if attach.is_empty() {
          return Err(Error::MissingAttachLayer(layer.name.clone()));
        }
        let mut td = TypeDescriptor::new(&layer.name, TYPE_ANNOTATION)
          .with_feature(FEAT_REL_TARGET, FeatureRange::reference(attach))
          .with_feature(FEAT_REL_SOURCE, FeatureRange::reference(attach));
        for feature in &layer.features {
          generate_feature(&mut schema, &mut td, &layer.name, feature)?;
        }
        schema.add_type(td)?;
      }
      LayerKind::Chain => {
        let link = format!("{}Link", layer.name);
        let string = FeatureRange::primitive(PrimitiveType::String);
        schema.add_type(
          TypeDescriptor::new(format!("{}Chain", layer.name), TYPE_ANNOTATION)
            .with_feature("first", FeatureRange::reference(&link)),
        )?;
        schema.add_type(
          TypeDescriptor::new(&link, TYPE_ANNOTATION)
            .with_feature("next", FeatureRange::reference(&link))
            .with_feature("referenceType", string.clone())
            .with_feature("referenceRelation", string),
        )?;
      }
    }
  }
  Ok(schema)
}

fn generate_feature(
  schema: &mut Schema,
  td: &mut TypeDescriptor,
  layer: &str,
  feature: &FeatureDefinition,
) -> Result<()> {
  match (feature.multi_value, feature.link_mode) {
    (MultiValueMode::None, _) => {
      let range = match PrimitiveType::from_name(&feature.type_name) {
        Some(primitive) => FeatureRange::primitive(primitive),
        None => FeatureRange::reference(&feature.type_name),
      };
      td.features.push(FeatureDescriptor {
        name: feature.name.clone(),
        range,
      });
      Ok(())
    }
    (MultiValueMode::Array, LinkMode::WithRole) => {
      let link_type = feature
        .link_type_name
        .clone()
        .unwrap_or_else(|| format!("{layer}.{}Link", feature.name));
      let role_feature = feature.role_feature.clone().unwrap_or_else(|| "role".into());
      let target_feature =
        feature.target_feature.clone().unwrap_or_else(|| "target".into());

      schema.add_type(
        TypeDescriptor::new(&link_type, TYPE_TOP)
          .with_feature(&role_feature, FeatureRange::primitive(PrimitiveType::String))
          .with_feature(&target_feature, FeatureRange::reference(&feature.type_name)),
      )?;
      td.features.push(FeatureDescriptor {
        name:  feature.name.clone(),
        range: FeatureRange::LinkArray {
          link_type,
          role_feature,
          target_feature,
          target_type: feature.type_name.clone(),
        },
      });
      Ok(())
    }
    (MultiValueMode::Array, LinkMode::None) => Err(Error::UnsupportedFeatureMode {
      feature: feature.name.clone(),
      mode:    "array without link role".into(),
    }),
  }
}
