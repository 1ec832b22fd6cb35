//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Record timestamp as stored in documents: milliseconds since the Unix epoch, as a string.
pub fn now_millis() -> String {
  chrono::Utc::now().timestamp_millis().to_string()
}

/// Percent-encode a single URL path component.
/// Same unreserved set as JavaScript's `encodeURIComponent`, so subjects like
/// `auth0|abc` become `auth0%7Cabc`.
pub fn encode_component(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for b in s.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9'
      | b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => out.push(b as char),
      _ => out.push_str(&format!("%{:02X}", b)),
    }
  }
  out
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) { end -= 1; }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_placeholder() {
    let out = fill_template("Q: {question} / A: {answer} / {answer}", &[("question", "2+2"), ("answer", "4")]);
    assert_eq!(out, "Q: 2+2 / A: 4 / 4");
  }

  #[test]
  fn encodes_like_encode_uri_component() {
    assert_eq!(encode_component("auth0|64f0c1"), "auth0%7C64f0c1");
    assert_eq!(encode_component("google-oauth2|1 2"), "google-oauth2%7C1%202");
    assert_eq!(encode_component("a.b_c~d"), "a.b_c~d");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let t = trunc_for_log("ñañañañaña", 3);
    assert!(t.starts_with("ña"));
    assert!(t.ends_with("(15 bytes total)"));
  }
}
