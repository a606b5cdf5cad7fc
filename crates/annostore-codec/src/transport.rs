//! Positional transport encoding used by the migrator.
//!
//! Objects are captured by type index and by feature slot, both in the source
//! schema's declaration order. No names are stored, so the buffer can only be
//! read back against the schema it was captured under.

use annostore_core::{
  AnnotationState, Schema,
  state::{AnnotationObject, DocumentMetadata, FeatureValue, ObjectId},
};

use crate::SchemaError;

pub(crate) struct Transport {
  metadata: DocumentMetadata,
  text:     String,
  next_id:  u64,
  objects:  Vec<TransportObject>,
}

struct TransportObject {
  id:         ObjectId,
  type_index: usize,
  begin:      usize,
  end:        usize,
  /// One slot per feature of the type; `None` if the feature was never set.
  slots:      Vec<Option<FeatureValue>>,
}

impl Transport {
  /// Capture `state` in the positional layout of `schema`.
  pub(crate) fn capture(
    state: &AnnotationState,
    schema: &Schema,
  ) -> Result<Self, SchemaError> {
    let mut objects = Vec::with_capacity(state.len());
    for object in state.objects() {
      let non_conforming = |reason: String| SchemaError::NonConforming {
        object: object.id.0,
        reason,
      };
      let type_index = schema
        .position(&object.type_name)
        .ok_or_else(|| non_conforming(format!("unknown type {:?}", object.type_name)))?;
      let ty = &schema.types()[type_index];

      if let Some(name) = object.features.keys().find(|n| ty.feature(n).is_none()) {
        return Err(non_conforming(format!(
          "feature {name:?} is not declared on {:?}",
          ty.name
        )));
      }

      let mut slots = Vec::with_capacity(ty.features.len());
      for feature in &ty.features {
        let value = object.features.get(&feature.name);
        if let Some(value) = value
          && !feature.range.admits(value)
        {
          return Err(non_conforming(format!(
            "feature {:?} holds a value outside its range",
            feature.name
          )));
        }
        slots.push(value.cloned());
      }

      objects.push(TransportObject {
        id: object.id,
        type_index,
        begin: object.begin,
        end: object.end,
        slots,
      });
    }

    Ok(Self {
      metadata: state.metadata.clone(),
      text: state.text.clone(),
      next_id: state.next_id(),
      objects,
    })
  }

  /// Rebuild the captured content into `target`, which is cleared first.
  ///
  /// Slots are resolved by position against `source` (the schema the buffer
  /// was captured under). Features that only `dest` declares receive their
  /// default value.
  pub(crate) fn restore(
    self,
    source: &Schema,
    dest: &Schema,
    target: &mut AnnotationState,
  ) -> Result<(), SchemaError> {
    target.clear();
    target.metadata = self.metadata;
    target.text = self.text;

    for object in self.objects {
      let old_ty = &source.types()[object.type_index];
      let new_ty = dest.get(&old_ty.name).ok_or_else(|| SchemaError::NotSuperset {
        missing: vec![old_ty.name.clone()],
      })?;

      let mut restored = AnnotationObject {
        id:        object.id,
        type_name: old_ty.name.clone(),
        begin:     object.begin,
        end:       object.end,
        features:  Default::default(),
      };
      for (feature, slot) in old_ty.features.iter().zip(object.slots) {
        if let Some(value) = slot {
          restored.set(feature.name.clone(), value);
        }
      }
      for feature in &new_ty.features {
        if old_ty.feature(&feature.name).is_none() {
          restored.set(feature.name.clone(), feature.range.default_value());
        }
      }
      target.insert(restored);
    }

    target.reserve_ids(self.next_id);
    Ok(())
  }
}
