//! Prompt assembly for quest generation and answer review.
//!
//! Pure functions; the only randomness (which completed module is offered for
//! review) comes from the caller-supplied RNG.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::config::Prompts;
use crate::domain::{Module, ModuleStatus};
use crate::error::{AppError, Result};
use crate::util::{collapse_whitespace, fill_template, truncate_chars};

/// Extracted text must be longer than this to count as real content.
pub const USABLE_CONTENT_MIN_CHARS: usize = 50;
pub const CURRENT_EXCERPT_CHARS: usize = 1500;
pub const REVIEW_EXCERPT_CHARS: usize = 1000;

/// Response style applied to review prompts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Persona {
  Tutor,
  GrumpyFrench,
  Robot,
}

impl Persona {
  pub const ALL: [Persona; 3] = [Persona::Tutor, Persona::GrumpyFrench, Persona::Robot];

  pub fn key(&self) -> &'static str {
    match self {
      Persona::Tutor => "persona-default",
      Persona::GrumpyFrench => "persona-french-grumpy",
      Persona::Robot => "persona-robot",
    }
  }

  pub fn lookup(key: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|p| p.key() == key)
  }

  /// Unknown keys fall back to the friendly tutor.
  pub fn from_key(key: &str) -> Self {
    Self::lookup(key).unwrap_or(Persona::Tutor)
  }

  pub fn style(&self) -> &'static str {
    match self {
      Persona::Tutor =>
        "Answer as a friendly, motivating tutor. Address the student directly and encourage them.",
      Persona::GrumpyFrench =>
        "Answer with a very strong French accent (e.g. 'Sacrebleu', 'Mon Dieu'). Be a little annoyed by mistakes and somewhat arrogant, but stay factually correct.",
      Persona::Robot =>
        "Answer as a cold, logical AI. No emotions. Use phrases like 'Analysis complete', 'Error rate computed'. Facts only.",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExcerptKind {
  Current,
  Review,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Excerpt {
  pub title: String,
  pub text: String,
  pub kind: ExcerptKind,
}

pub fn has_usable_content(text: Option<&str>) -> bool {
  text.is_some_and(|t| t.trim().chars().count() > USABLE_CONTENT_MIN_CHARS)
}

fn excerpt(m: &Module, kind: ExcerptKind, max_chars: usize) -> Excerpt {
  let raw = m.extracted_content.as_deref().unwrap_or_default();
  Excerpt {
    title: m.title.clone(),
    text: collapse_whitespace(truncate_chars(raw, max_chars)),
    kind,
  }
}

/// All active modules with content, plus at most one randomly chosen completed
/// module with content. Fails with `NoContext` when there is nothing to use.
pub fn gather_excerpts<R: Rng + ?Sized>(modules: &[Module], rng: &mut R) -> Result<Vec<Excerpt>> {
  let usable = |m: &&Module| has_usable_content(m.extracted_content.as_deref());

  let mut excerpts: Vec<Excerpt> = modules
    .iter()
    .filter(|m| m.status == ModuleStatus::Active)
    .filter(usable)
    .map(|m| excerpt(m, ExcerptKind::Current, CURRENT_EXCERPT_CHARS))
    .collect();

  let completed: Vec<&Module> = modules
    .iter()
    .filter(|m| m.status == ModuleStatus::Completed)
    .filter(usable)
    .collect();
  if let Some(m) = completed.choose(rng) {
    excerpts.push(excerpt(m, ExcerptKind::Review, REVIEW_EXCERPT_CHARS));
  }

  if excerpts.is_empty() {
    return Err(AppError::NoContext);
  }
  Ok(excerpts)
}

pub fn render_context(excerpts: &[Excerpt]) -> String {
  let mut context = String::from("STUDY CONTEXT:\n");
  for e in excerpts {
    let label = match e.kind {
      ExcerptKind::Current => "current",
      ExcerptKind::Review => "review",
    };
    context.push_str(&format!("MODULE ({label}): {}\nEXCERPT: {}\n\n", e.title, e.text));
  }
  context
}

pub fn quest_prompt(prompts: &Prompts, excerpts: &[Excerpt], count: usize) -> String {
  let context = render_context(excerpts);
  let count = count.to_string();
  fill_template(&prompts.quest_master_template, &[("count", &count), ("context", &context)])
}

pub fn review_prompt(prompts: &Prompts, persona: Persona, quest: &str, answer: &str) -> String {
  fill_template(
    &prompts.review_template,
    &[("persona", persona.style()), ("quest", quest), ("answer", answer)],
  )
}
