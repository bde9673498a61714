//! Recovering typed data from whatever the local model sent back.
//!
//! Small local models regularly ignore the requested schema: they wrap JSON in
//! prose, nest it under the transport's `response` envelope, put the array under
//! an arbitrary key, or emit the whole sentence as a JSON *key*. Every payload is
//! first decoded into a [`Payload`] variant and each variant is handled explicitly.
//! Nothing in here panics or returns an error.

use serde_json::{Map, Value};

use crate::domain::QuestCategory;

/// Returned when the model sent nothing usable at all.
pub const NO_FEEDBACK: &str = "No feedback could be retrieved.";

/// Field names accepted as the feedback text, in priority order.
const FEEDBACK_FIELDS: [&str; 4] = ["feedback", "response", "text", "content"];
/// Keys under which models like to nest the quest array.
const QUEST_LIST_KEYS: [&str; 3] = ["quests", "tasks", "data"];
const CONTENT_FIELDS: [&str; 5] = ["content", "task", "quest", "text", "description"];
const CATEGORY_FIELDS: [&str; 2] = ["type", "category"];
const XP_FIELDS: [&str; 4] = ["xp", "xpReward", "xp_reward", "reward"];
/// Largest per-quest reward accepted from the model; anything above is ignored.
pub const MAX_QUEST_XP: u64 = 1000;

/// Anything shorter is not treated as a sentence by the last-resort heuristic.
const SENTENCE_MIN_CHARS: usize = 20;

/// A quest as proposed by the model, before ids/defaults are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestDraft {
  pub content: String,
  pub category: Option<QuestCategory>,
  pub xp_hint: Option<u64>,
}

/// Decoded shape of an (already unwrapped) model payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
  /// Text with no recoverable JSON inside.
  PlainText(String),
  /// Text that contained parseable JSON (possibly surrounded by prose).
  EmbeddedJson(Value),
  Object(Map<String, Value>),
  Array(Vec<Value>),
  /// Numbers, booleans, null.
  Unrecognized(Value),
}

/// Which JSON shapes to look for inside text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Locate {
  /// First `{` to last `}` only.
  Object,
  /// Whole text, then `[`..`]`, then `{`..`}`.
  ObjectOrArray,
}

impl Payload {
  fn decode(value: &Value, locate: Locate) -> Self {
    match value {
      Value::String(text) => decode_text(text, locate),
      Value::Object(map) => Payload::Object(map.clone()),
      Value::Array(items) => Payload::Array(items.clone()),
      other => Payload::Unrecognized(other.clone()),
    }
  }
}

fn decode_text(text: &str, locate: Locate) -> Payload {
  let trimmed = text.trim();
  let embedded = match locate {
    Locate::Object => slice_between(trimmed, '{', '}').and_then(parse_json),
    Locate::ObjectOrArray => parse_json(trimmed)
      .filter(|v| v.is_object() || v.is_array())
      .or_else(|| slice_between(trimmed, '[', ']').and_then(parse_json))
      .or_else(|| slice_between(trimmed, '{', '}').and_then(parse_json)),
  };
  match embedded {
    Some(v) => Payload::EmbeddedJson(v),
    None => Payload::PlainText(trimmed.to_string()),
  }
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
  let start = text.find(open)?;
  let end = text.rfind(close)?;
  if end <= start {
    return None;
  }
  text.get(start..=end)
}

fn parse_json(text: &str) -> Option<Value> {
  serde_json::from_str::<Value>(text).ok()
}

/// Strip the transport envelope once: `{"response": ...}` (generate API) or
/// `{"message": {"content": ...}}` (chat API). Objects that already carry one of
/// the `direct` keys are payloads themselves and are left alone.
fn unwrap_envelope<'a>(raw: &'a Value, direct: &[&str]) -> &'a Value {
  let Some(map) = raw.as_object() else { return raw };
  if direct.iter().any(|k| map.contains_key(*k)) {
    return raw;
  }
  if let Some(inner) = map.get("response").filter(|v| !v.is_null()) {
    return inner;
  }
  if let Some(inner) = map.get("message").and_then(|m| m.get("content")) {
    return inner;
  }
  raw
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
  map.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Pull the grading feedback out of a model payload. Always returns some text.
pub fn extract_feedback(raw: &Value) -> String {
  let inner = unwrap_envelope(raw, &FEEDBACK_FIELDS[..1]);
  match Payload::decode(inner, Locate::Object) {
    Payload::PlainText(text) if text.is_empty() => NO_FEEDBACK.to_string(),
    Payload::PlainText(text) => text,
    Payload::EmbeddedJson(Value::Object(map)) | Payload::Object(map) => feedback_from_object(&map),
    Payload::EmbeddedJson(other) | Payload::Unrecognized(other) => render_fallback(&other),
    Payload::Array(items) => render_fallback(&Value::Array(items)),
  }
}

fn feedback_from_object(map: &Map<String, Value>) -> String {
  for key in FEEDBACK_FIELDS {
    if let Some(text) = non_empty_str(map, key) {
      return text.to_string();
    }
  }
  // Small models sometimes emit `{"<the whole sentence>": ""}`.
  let longest = map
    .iter()
    .flat_map(|(k, v)| std::iter::once(k.as_str()).chain(v.as_str()))
    .map(str::trim)
    .max_by_key(|s| s.chars().count());
  match longest {
    Some(s) if s.chars().count() > SENTENCE_MIN_CHARS => s.to_string(),
    _ => render_fallback(&Value::Object(map.clone())),
  }
}

fn render_fallback(value: &Value) -> String {
  match value {
    Value::Null => NO_FEEDBACK.to_string(),
    Value::Object(m) if m.is_empty() => NO_FEEDBACK.to_string(),
    other => other.to_string(),
  }
}

// ---------------------------------------------------------------------------
// Quest drafts
// ---------------------------------------------------------------------------

/// Recover the quest list. An empty result means no quest array was found.
pub fn extract_quest_drafts(raw: &Value) -> Vec<QuestDraft> {
  let inner = unwrap_envelope(raw, &QUEST_LIST_KEYS);
  let value = match Payload::decode(inner, Locate::ObjectOrArray) {
    Payload::EmbeddedJson(v) => v,
    Payload::Object(map) => Value::Object(map),
    Payload::Array(items) => Value::Array(items),
    Payload::PlainText(_) | Payload::Unrecognized(_) => return Vec::new(),
  };

  let items = match value {
    Value::Array(items) => items,
    Value::Object(mut map) => {
      let key = QUEST_LIST_KEYS.into_iter().find(|k| map.get(*k).is_some_and(Value::is_array));
      match key.and_then(|k| map.remove(k)) {
        Some(Value::Array(items)) => items,
        _ => return Vec::new(),
      }
    }
    _ => return Vec::new(),
  };

  items.iter().filter_map(draft_from_value).collect()
}

fn draft_from_value(item: &Value) -> Option<QuestDraft> {
  match item {
    Value::String(s) if !s.trim().is_empty() => Some(QuestDraft {
      content: s.trim().to_string(),
      category: None,
      xp_hint: None,
    }),
    Value::Object(map) => {
      let content = CONTENT_FIELDS.iter().find_map(|k| non_empty_str(map, k))?;
      let category = CATEGORY_FIELDS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .and_then(QuestCategory::parse);
      let xp_hint = XP_FIELDS.iter().find_map(|k| map.get(*k).and_then(xp_value));
      Some(QuestDraft { content: content.to_string(), category, xp_hint })
    }
    _ => None,
  }
}

fn xp_value(v: &Value) -> Option<u64> {
  let xp = match v {
    Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.floor() as u64)),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.floor() as u64))
    }
    _ => None,
  };
  xp.filter(|xp| *xp <= MAX_QUEST_XP)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn feedback_inside_prose() {
    let raw = json!("Sure! { \"feedback\": \"Good job.\" } thanks");
    assert_eq!(extract_feedback(&raw), "Good job.");
  }

  #[test]
  fn feedback_inside_response_envelope() {
    let raw = json!({ "response": "{\"feedback\":\"Nice work\"}" });
    assert_eq!(extract_feedback(&raw), "Nice work");
  }

  #[test]
  fn feedback_from_ollama_body() {
    let raw = json!({
      "model": "llama3",
      "created_at": "2024-05-01T10:00:00Z",
      "response": "{\n  \"feedback\": \"Correct, but name the second law too.\"\n}",
      "done": true
    });
    assert_eq!(extract_feedback(&raw), "Correct, but name the second law too.");
  }

  #[test]
  fn feedback_accepts_alternative_field_names() {
    assert_eq!(extract_feedback(&json!({ "text": "Solid." })), "Solid.");
    assert_eq!(extract_feedback(&json!("{\"content\": \"Mostly right.\"}")), "Mostly right.");
  }

  #[test]
  fn direct_feedback_field_wins_over_envelope() {
    let raw = json!({ "feedback": "Use the formula.", "response": "ignored" });
    assert_eq!(extract_feedback(&raw), "Use the formula.");
  }

  #[test]
  fn sentence_emitted_as_key_is_recovered() {
    let raw = json!({ "Your answer is correct but lacks an example.": "" });
    assert_eq!(extract_feedback(&raw), "Your answer is correct but lacks an example.");
  }

  #[test]
  fn short_unknown_fields_are_serialized() {
    let raw = json!({ "ok": true, "s": "fine" });
    let out = extract_feedback(&raw);
    assert!(out.contains("\"ok\":true"));
  }

  #[test]
  fn plain_text_and_broken_json_fall_back_to_text() {
    assert_eq!(extract_feedback(&json!("  Great answer!  ")), "Great answer!");
    assert_eq!(extract_feedback(&json!("{feedback: oops")), "{feedback: oops");
    assert_eq!(extract_feedback(&json!("")), NO_FEEDBACK);
    assert_eq!(extract_feedback(&Value::Null), NO_FEEDBACK);
  }

  #[test]
  fn drafts_nested_under_quests_key() {
    let raw = json!({ "quests": [{ "content": "Explain X", "type": "review", "xp": 80 }] });
    let drafts = extract_quest_drafts(&raw);
    assert_eq!(
      drafts,
      vec![QuestDraft {
        content: "Explain X".into(),
        category: Some(QuestCategory::Review),
        xp_hint: Some(80),
      }]
    );
  }

  #[test]
  fn drafts_from_envelope_with_prose() {
    let raw = json!({
      "response": "Here are your quests:\n[{\"content\": \"Define entropy\", \"type\": \"learning\", \"xp\": \"120\"}, {\"task\": \"Summarize chapter 2\"}]\nGood luck!"
    });
    let drafts = extract_quest_drafts(&raw);
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].xp_hint, Some(120));
    assert_eq!(drafts[1].content, "Summarize chapter 2");
    assert_eq!(drafts[1].category, None);
  }

  #[test]
  fn drafts_under_tasks_and_data_keys() {
    let tasks = json!("{\"tasks\": [\"Recall the three axioms\"]}");
    assert_eq!(extract_quest_drafts(&tasks)[0].content, "Recall the three axioms");
    let data = json!({ "data": [{ "content": "Prep: list key terms", "type": "prep", "xp": 40.7 }] });
    let d = &extract_quest_drafts(&data)[0];
    assert_eq!(d.category, Some(QuestCategory::Prep));
    assert_eq!(d.xp_hint, Some(40));
  }

  #[test]
  fn no_array_anywhere_yields_empty() {
    assert!(extract_quest_drafts(&json!({ "message": "I cannot help with that" })).is_empty());
    assert!(extract_quest_drafts(&json!("no json here")).is_empty());
    assert!(extract_quest_drafts(&json!({ "quest": { "content": "x" } })).is_empty());
    assert!(extract_quest_drafts(&json!(42)).is_empty());
    assert!(extract_quest_drafts(&Value::Null).is_empty());
  }

  #[test]
  fn malformed_entries_are_skipped() {
    let raw = json!([{ "content": "" }, 7, { "content": "Keep me", "xp": -5 }]);
    let drafts = extract_quest_drafts(&raw);
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].xp_hint, None);
  }

  #[test]
  fn oversized_rewards_are_dropped() {
    let raw = json!([
      { "content": "Float overflow", "xp": 1e19 },
      { "content": "Huge string", "xp": "18446744073709551615" },
      { "content": "Just above", "reward": 1001 },
      { "content": "At the cap", "xpReward": "1000" },
    ]);
    let hints: Vec<_> = extract_quest_drafts(&raw).iter().map(|d| d.xp_hint).collect();
    assert_eq!(hints, vec![None, None, None, Some(MAX_QUEST_XP)]);
  }

  #[test]
  fn decode_classifies_payloads() {
    assert!(matches!(Payload::decode(&json!("hi"), Locate::Object), Payload::PlainText(_)));
    assert!(matches!(Payload::decode(&json!("x {\"a\":1} y"), Locate::Object), Payload::EmbeddedJson(_)));
    assert!(matches!(Payload::decode(&json!([1]), Locate::Object), Payload::Array(_)));
    assert!(matches!(Payload::decode(&json!(true), Locate::Object), Payload::Unrecognized(_)));
  }
}
