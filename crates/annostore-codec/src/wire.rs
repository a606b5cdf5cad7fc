//! The binary envelope around a snapshot body.
//!
//! ```text
//! magic "ANNOSNAP" (8) | version u16 LE (2) | body length u64 LE (8)
//!   | SHA-256 of body (32) | body (JSON: {"schema": …, "state": …})
//! ```

use annostore_core::{AnnotationState, Schema, state::FeatureValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

pub const MAGIC: &[u8; 8] = b"ANNOSNAP";
pub const FORMAT_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;
pub const HEADER_LEN: usize = MAGIC.len() + 2 + 8 + DIGEST_LEN;

#[derive(Serialize)]
struct BodyRef<'a> {
  schema: &'a Schema,
  state:  &'a AnnotationState,
}

#[derive(Deserialize)]
struct Body {
  schema: Schema,
  state:  AnnotationState,
}

pub(crate) fn encode(state: &AnnotationState, schema: &Schema) -> Result<Vec<u8>> {
  check_finite(state)?;
  let body = serde_json::to_vec(&BodyRef { schema, state })?;
  let digest = Sha256::digest(&body);

  let mut out = Vec::with_capacity(HEADER_LEN + body.len());
  out.extend_from_slice(MAGIC);
  out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
  out.extend_from_slice(&(body.len() as u64).to_le_bytes());
  out.extend_from_slice(&digest);
  out.extend_from_slice(&body);
  Ok(out)
}

fn check_finite(state: &AnnotationState) -> Result<()> {
  for object in state.objects() {
    for (name, value) in &object.features {
      if let FeatureValue::Float(f) = value
        && !f.is_finite()
      {
        return Err(Error::NonFiniteFloat { object: object.id.0, feature: name.clone() });
      }
    }
  }
  Ok(())
}

pub(crate) fn decode(bytes: &[u8]) -> Result<(AnnotationState, Schema)> {
  if bytes.len() < HEADER_LEN {
    return Err(Error::Truncated {
      expected: HEADER_LEN as u64,
      actual:   bytes.len() as u64,
    });
  }
  let (header, rest) = bytes.split_at(HEADER_LEN);
  let (magic, header) = header.split_at(MAGIC.len());
  if magic != MAGIC {
    return Err(Error::BadMagic);
  }
  let (version, header) = header.split_at(2);
  let version = u16::from_le_bytes([version[0], version[1]]);
  if version != FORMAT_VERSION {
    return Err(Error::UnsupportedVersion(version));
  }
  let (len, expected_digest) = header.split_at(8);
  let mut len_bytes = [0u8; 8];
  len_bytes.copy_from_slice(len);
  let body_len = u64::from_le_bytes(len_bytes);

  let available = rest.len() as u64;
  if available < body_len {
    return Err(Error::Truncated {
      expected: HEADER_LEN as u64 + body_len,
      actual:   bytes.len() as u64,
    });
  }
  if available > body_len {
    return Err(Error::TrailingBytes(available - body_len));
  }

  let actual_digest = Sha256::digest(rest);
  if actual_digest.as_slice() != expected_digest {
    return Err(Error::ChecksumMismatch {
      expected: hex::encode(expected_digest),
      actual:   hex::encode(actual_digest),
    });
  }

  let body: Body = serde_json::from_slice(rest)?;
  Ok((body.state, body.schema))
}
