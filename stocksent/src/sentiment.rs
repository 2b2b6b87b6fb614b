// stocksent/src/sentiment.rs

//! Local sentiment scoring and keyword extraction.
//!
//! [`SentimentScorer`] is a pure capability: no I/O, no failure. Every score
//! lies in [-1.0, 1.0] and an empty input scores exactly 0.0.
//!
//! [`LexiconScorer`] uses a small finance-oriented word list. A sentence
//! scores `(pos - neg) / (pos + neg)` over the lexicon words it contains
//! (0.0 when it has none); a negator ("not", "no", ...) within the previous
//! two words flips a hit. A text scores the mean of its sentences and a batch
//! scores the mean of its texts.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

pub trait SentimentScorer: Send + Sync {
  /// Cheaper scoring: each headline is treated as a single sentence.
  fn score_headlines(&self, headlines: &[String]) -> f64;
  /// Headline plus summary, split into sentences.
  fn score_full_texts(&self, texts: &[String]) -> f64;
  /// Up to `k` most frequent eligible words, most frequent first.
  fn top_keywords(&self, texts: &[String], k: usize) -> Vec<String>;
}

static POSITIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  [
    "beat", "beats", "exceed", "exceeds", "exceeded", "strong", "stronger", "strongest", "surge", "surges",
    "surged", "rally", "rallies", "rallied", "gain", "gains", "gained", "growth", "grow", "grows", "upgrade",
    "upgrades", "upgraded", "outperform", "outperforms", "record", "profit", "profitable", "profits", "rise",
    "rises", "rose", "soar", "soars", "soared", "boost", "boosts", "boosted", "bullish", "optimistic",
    "upbeat", "positive", "improve", "improves", "improved", "improvement", "improvements", "praise",
    "praises", "praised", "win", "wins", "success", "successful", "launch", "launches", "innovative",
    "expand", "expands", "expansion", "dividend", "buyback", "raise", "raises", "raised", "recover",
    "recovers", "recovery", "robust", "solid", "momentum", "breakthrough", "approval", "approved", "top",
    "tops", "jump", "jumps", "jumped", "climb", "climbs", "climbed", "good", "great", "best", "better",
  ]
  .into_iter()
  .collect()
});

static NEGATIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  [
    "miss", "misses", "missed", "weak", "weaker", "weakness", "plunge", "plunges", "plunged", "fall",
    "falls", "fell", "drop", "drops", "dropped", "decline", "declines", "declined", "downgrade",
    "downgrades", "downgraded", "underperform", "loss", "losses", "lose", "loses", "warning", "warns",
    "warned", "concern", "concerns", "worry", "worries", "fear", "fears", "risk", "risks", "lawsuit",
    "sue", "sued", "probe", "investigation", "fraud", "recall", "recalls", "bearish", "pessimistic",
    "negative", "slump", "slumps", "slumped", "crash", "crashes", "cut", "cuts", "layoff", "layoffs",
    "pressure", "pressures", "uncertainty", "uncertain", "weigh", "weighs", "weighed", "fine", "fined",
    "penalty", "delay", "delays", "delayed", "halt", "halts", "halted", "regulatory", "issue", "issues",
    "bad", "worse", "worst", "sink", "sinks", "sank", "tumble", "tumbles", "tumbled", "default", "debt",
  ]
  .into_iter()
  .collect()
});

static NEGATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  ["not", "no", "never", "without", "nor", "isn't", "wasn't", "don't", "doesn't", "didn't", "won't", "can't"]
    .into_iter()
    .collect()
});

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  [
    "the", "and", "for", "with", "that", "from", "this", "have", "will", "are", "has", "was", "but", "not",
    "you", "they", "their", "his", "her", "its", "our", "can", "all", "more", "one", "two", "three", "into",
    "over", "after", "about", "than", "said", "says", "new", "been", "were", "also", "what", "which", "who",
    "how", "why", "out", "per", "amid",
  ]
  .into_iter()
  .collect()
});

/// Lower-cased word tokens; keeps inner apostrophes ("isn't") and drops a trailing "'s".
fn tokenize(text: &str) -> Vec<String> {
  text
    .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
    .map(|w| w.trim_matches(|c: char| c == '\'' || c == '\u{2019}').replace('\u{2019}', "'").to_lowercase())
    .map(|w| w.strip_suffix("'s").map(str::to_string).unwrap_or(w))
    .filter(|w| !w.is_empty())
    .collect()
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
  text.split(|c: char| matches!(c, '.' | '!' | '?' | ';' | '\n')).map(str::trim).filter(|s| !s.is_empty())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
  let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
  if n == 0 { 0.0 } else { sum / n as f64 }
}

#[derive(Debug, Default, Clone)]
pub struct LexiconScorer;

impl LexiconScorer {
  pub fn new() -> Self {
    Self
  }

  fn score_sentence(sentence: &str) -> f64 {
    let tokens = tokenize(sentence);
    let (mut pos, mut neg) = (0u32, 0u32);
    for (i, token) in tokens.iter().enumerate() {
      let polarity = if POSITIVE.contains(token.as_str()) {
        1
      } else if NEGATIVE.contains(token.as_str()) {
        -1
      } else {
        continue;
      };
      let negated = tokens[i.saturating_sub(2)..i].iter().any(|t| NEGATORS.contains(t.as_str()));
      if (polarity > 0) != negated { pos += 1; } else { neg += 1; }
    }
    if pos + neg == 0 {
      0.0
    } else {
      (pos as f64 - neg as f64) / (pos + neg) as f64
    }
  }

  fn score_text(text: &str) -> f64 {
    mean(split_sentences(text).map(Self::score_sentence))
  }
}

impl SentimentScorer for LexiconScorer {
  fn score_headlines(&self, headlines: &[String]) -> f64 {
    mean(headlines.iter().map(|h| Self::score_sentence(h)))
  }

  fn score_full_texts(&self, texts: &[String]) -> f64 {
    mean(texts.iter().map(|t| Self::score_text(t)))
  }

  fn top_keywords(&self, texts: &[String], k: usize) -> Vec<String> {
    // word -> (count, first position seen)
    let mut freq: HashMap<String, (usize, usize)> = HashMap::new();
    let mut position = 0usize;
    for text in texts {
      for word in tokenize(text) {
        position += 1;
        if word.chars().count() <= 2 || STOP_WORDS.contains(word.as_str()) || NEGATORS.contains(word.as_str()) {
          continue;
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
          continue;
        }
        freq.entry(word).or_insert((0, position)).0 += 1;
      }
    }
    let mut ranked: Vec<(String, (usize, usize))> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(k).map(|(w, _)| w).collect()
  }
}
