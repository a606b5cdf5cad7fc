//! Fallback tokenization and sentence splitting for freshly imported text.
//!
//! Readers for richer formats usually bring their own segmentation. Plain
//! text does not, and the annotation workflow needs both layers, so the
//! facade adds whichever of them is missing.

use annostore_core::{
  AnnotationState,
  schema::{TYPE_SENTENCE, TYPE_TOKEN},
};

/// Add `Token` and `Sentence` objects unless the state already has some.
pub fn ensure_segmentation(state: &mut AnnotationState) {
  let chars: Vec<char> = state.text.chars().collect();
  if !state.contains_type(TYPE_TOKEN) {
    for (begin, end) in tokens(&chars) {
      state.add(TYPE_TOKEN, begin, end);
    }
  }
  if !state.contains_type(TYPE_SENTENCE) {
    for (begin, end) in sentences(&chars) {
      state.add(TYPE_SENTENCE, begin, end);
    }
  }
}

/// Runs of alphanumerics, with every other non-space character on its own.
fn tokens(chars: &[char]) -> Vec<(usize, usize)> {
  let mut out = Vec::new();
  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    if c.is_whitespace() {
      i += 1;
    } else if c.is_alphanumeric() {
      let start = i;
      while i < chars.len() && chars[i].is_alphanumeric() {
        i += 1;
      }
      out.push((start, i));
    } else {
      out.push((i, i + 1));
      i += 1;
    }
  }
  out
}

/// Sentences end at `.`, `!` or `?` followed by whitespace or end of text.
fn sentences(chars: &[char]) -> Vec<(usize, usize)> {
  let mut out = Vec::new();
  let mut start = None;
  for (i, &c) in chars.iter().enumerate() {
    if start.is_none() && !c.is_whitespace() {
      start = Some(i);
    }
    let terminal = matches!(c, '.' | '!' | '?')
      && chars.get(i + 1).is_none_or(|next| next.is_whitespace());
    if terminal && let Some(begin) = start.take() {
      out.push((begin, i + 1));
    }
  }
  if let Some(begin) = start {
    let mut end = chars.len();
    while end > begin && chars[end - 1].is_whitespace() {
      end -= 1;
    }
    out.push((begin, end));
  }
  out
}
