//! Postprocessing of merged predictions: score initialization, auto
//! acceptance, POS-context disambiguation and override application.
//!
//! Locked tokens are never touched by any pass here — the lock means a human
//! already decided.

use std::collections::HashMap;
use std::path::Path;

use crate::corpus::store::Corpus;
use crate::corpus::token::{Field, Token, PLACEHOLDER};
use crate::corpus::CorpusError;

/// Acceptance thresholds for postprocessing decisions.
pub mod thresholds {
    /// Minimum share of a form's occurrences one reading needs before it is
    /// accepted for that form.
    pub const ACCEPT: f64 = 0.6;
}

type Reading = (String, String);

/// Applies the postprocessing passes to a freshly merged corpus.
pub struct Postprocessor<'a> {
    corpus: &'a mut Corpus,
    override_corpus: Option<Corpus>,
}

impl<'a> Postprocessor<'a> {
    /// Load the model's override corpus from
    /// `<model_dir>/override/override.conllu` when present.
    pub fn new(corpus: &'a mut Corpus, model_dir: &Path) -> Result<Self, CorpusError> {
        let path = model_dir.join("override").join("override.conllu");
        let override_corpus = if path.is_file() {
            Some(Corpus::from_file(&path, false)?)
        } else {
            None
        };
        Ok(Self {
            corpus,
            override_corpus,
        })
    }

    /// Construct with an explicit override corpus (or none).
    pub fn with_override(corpus: &'a mut Corpus, override_corpus: Option<Corpus>) -> Self {
        Self {
            corpus,
            override_corpus,
        }
    }

    /// SCORE ← `0.00` for every unlocked token holding a predicted lemma;
    /// tokens without one keep the placeholder.
    pub fn initialize_scores(&mut self) {
        for token in self.corpus.tokens_mut() {
            if token.is_locked() {
                continue;
            }
            if token.get(Field::Lemma) != PLACEHOLDER {
                token.set(Field::Score, "0.00");
            }
        }
    }

    /// Accept the majority reading of every form whose top (LEMMA, XPOS)
    /// share across the corpus reaches `threshold`: unlocked occurrences get
    /// that reading and the share as their SCORE.
    pub fn fill_unambiguous(&mut self, threshold: f64) {
        let accepted = self.majority_readings(threshold, None);
        let mut changed = 0usize;
        for token in self.corpus.tokens_mut() {
            if token.is_locked() {
                continue;
            }
            if let Some((reading, share)) = accepted.get(token.get(Field::Form)) {
                apply_reading(token, reading, *share);
                changed += 1;
            }
        }
        tracing::info!(tokens = changed, "auto-accepted readings");
    }

    /// For forms still unresolved (SCORE `0.00`), pick the majority reading
    /// among occurrences sharing the same XPOS context when its share reaches
    /// `threshold`.
    pub fn disambiguate_by_pos_context(&mut self, threshold: f64) {
        let accepted = self.majority_readings(threshold, Some(Field::XposCtx));
        let mut changed = 0usize;
        for token in self.corpus.tokens_mut() {
            if token.is_locked() || token.get(Field::Score) != "0.00" {
                continue;
            }
            let key = format!("{}\u{1}{}", token.get(Field::Form), token.get(Field::XposCtx));
            if let Some((reading, share)) = accepted.get(&key) {
                apply_reading(token, reading, *share);
                changed += 1;
            }
        }
        tracing::info!(tokens = changed, "disambiguated by POS context");
    }

    /// Force LEMMA/XPOS from the override corpus for every unlocked token
    /// whose FORM matches an override entry; SCORE ← `1.00`. Later entries
    /// win, so the newest correction dominates.
    pub fn apply_override(&mut self) {
        let Some(override_corpus) = &self.override_corpus else {
            return;
        };
        let mut map: HashMap<String, Reading> = HashMap::new();
        for token in override_corpus.tokens() {
            map.insert(
                token.get(Field::Form).to_string(),
                (
                    token.get(Field::Lemma).to_string(),
                    token.get(Field::Xpos).to_string(),
                ),
            );
        }

        let mut forced = 0usize;
        for token in self.corpus.tokens_mut() {
            if token.is_locked() {
                continue;
            }
            if let Some((lemma, xpos)) = map.get(token.get(Field::Form)) {
                if lemma != PLACEHOLDER {
                    token.set(Field::Lemma, lemma.clone());
                }
                if xpos != PLACEHOLDER {
                    token.set(Field::Xpos, xpos.clone());
                }
                token.set(Field::Score, "1.00");
                forced += 1;
            }
        }
        tracing::info!(tokens = forced, "override readings applied");
    }

    /// Tally readings per form (or per form + context field) and keep those
    /// whose top reading's share reaches `threshold`. Ties break towards the
    /// lexicographically smallest reading, keeping reruns deterministic.
    fn majority_readings(
        &self,
        threshold: f64,
        group_by: Option<Field>,
    ) -> HashMap<String, (Reading, f64)> {
        let mut tallies: HashMap<String, HashMap<Reading, usize>> = HashMap::new();
        for token in self.corpus.tokens() {
            if token.get(Field::Lemma) == PLACEHOLDER {
                continue;
            }
            let key = match group_by {
                Some(field) => format!("{}\u{1}{}", token.get(Field::Form), token.get(field)),
                None => token.get(Field::Form).to_string(),
            };
            let reading = (
                token.get(Field::Lemma).to_string(),
                token.get(Field::Xpos).to_string(),
            );
            *tallies.entry(key).or_default().entry(reading).or_default() += 1;
        }

        let mut accepted = HashMap::new();
        for (key, readings) in tallies {
            let total: usize = readings.values().sum();
            let top = readings
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));
            if let Some((reading, count)) = top {
                let share = count as f64 / total as f64;
                if share >= threshold {
                    accepted.insert(key, (reading, share));
                }
            }
        }
        accepted
    }
}

fn apply_reading(token: &mut Token, reading: &Reading, share: f64) {
    token.set(Field::Lemma, reading.0.clone());
    if reading.1 != PLACEHOLDER {
        token.set(Field::Xpos, reading.1.clone());
    }
    token.set(Field::Score, format!("{share:.2}"));
}
