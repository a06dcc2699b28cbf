//! In-memory CoNLL-U+ corpus with field-level bulk access and persistence.
//!
//! Document token order is the single source of positional truth for every
//! merge in the pipeline: all bulk operations (`rows`, `update_value`,
//! `get_contexts`) walk sentences and tokens in file order.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use regex::Regex;

use crate::config;
use crate::corpus::context;
use crate::corpus::token::{Field, Token, PLACEHOLDER};
use crate::corpus::CorpusError;

/// Ordered tokens plus the comment lines preceding them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub comments: Vec<String>,
    pub tokens: Vec<Token>,
}

/// An annotated corpus: ordered sentences of ordered tokens.
#[derive(Debug, Clone)]
pub struct Corpus {
    sentences: Vec<Sentence>,
    origin: String,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            sentences: Vec::new(),
            origin: "<memory>".to_string(),
        }
    }

    /// Load a corpus from disk. With `validate` on, broken per-sentence ID
    /// sequencing is a hard error; off, it is deferred to the caller.
    pub fn from_file(path: &Path, validate: bool) -> Result<Self, CorpusError> {
        let text = fs::read_to_string(path)?;
        let corpus = Self::parse(&text, &path.display().to_string(), validate)?;
        tracing::info!(
            path = %path.display(),
            tokens = corpus.word_count(),
            sentences = corpus.sentence_count(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Parse CoNLL-U+ text. Rows may carry 10 (plain CoNLL-U) to 17 columns;
    /// missing extended columns are padded with placeholders.
    pub fn parse_str(text: &str, validate: bool) -> Result<Self, CorpusError> {
        Self::parse(text, "<memory>", validate)
    }

    fn parse(text: &str, origin: &str, validate: bool) -> Result<Self, CorpusError> {
        let mut sentences = Vec::new();
        let mut current = Sentence::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                if !current.tokens.is_empty() {
                    sentences.push(std::mem::take(&mut current));
                }
                continue;
            }
            if line.starts_with('#') {
                current.comments.push(line.to_string());
                continue;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            let token = Token::from_columns(&columns).ok_or_else(|| CorpusError::MalformedRow {
                path: origin.to_string(),
                line: idx + 1,
                found: columns.len(),
            })?;
            current.tokens.push(token);
        }
        if !current.tokens.is_empty() {
            sentences.push(current);
        }

        let corpus = Self {
            sentences,
            origin: origin.to_string(),
        };
        if validate {
            corpus.validate()?;
        }
        Ok(corpus)
    }

    /// Build a corpus from raw transliterated text, one unit (= sentence) per
    /// line, words separated by spaces. `#` lines become comments of the next
    /// unit; forms are normalized on the way in; the first word of each unit
    /// heads the rest (`0/root`, others `1/child`).
    pub fn from_text_lines(lines: &[&str]) -> Self {
        let mut sentences = Vec::new();
        let mut comments = Vec::new();

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                comments.push(line.to_string());
                continue;
            }
            let mut tokens = Vec::new();
            for (i, word) in line.split_whitespace().enumerate() {
                let mut token = Token::new(i + 1, &normalize_transliteration(word));
                if i == 0 {
                    token.set(Field::Head, "0");
                    token.set(Field::Deprel, "root");
                } else {
                    token.set(Field::Head, "1");
                    token.set(Field::Deprel, "child");
                }
                tokens.push(token);
            }
            sentences.push(Sentence {
                comments: std::mem::take(&mut comments),
                tokens,
            });
        }

        Self {
            sentences,
            origin: "<memory>".to_string(),
        }
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(|s| s.tokens.len()).sum()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.sentences.iter().flat_map(|s| s.tokens.iter())
    }

    pub fn tokens_mut(&mut self) -> impl Iterator<Item = &mut Token> {
        self.sentences.iter_mut().flat_map(|s| s.tokens.iter_mut())
    }

    /// Check per-sentence ID sequencing: 1..n, strictly increasing.
    pub fn validate(&self) -> Result<(), CorpusError> {
        for (s_idx, sentence) in self.sentences.iter().enumerate() {
            for (t_idx, token) in sentence.tokens.iter().enumerate() {
                let expected = t_idx + 1;
                if token.get(Field::Id) != expected.to_string() {
                    return Err(CorpusError::BrokenIdSequence {
                        path: self.origin.clone(),
                        sentence: s_idx + 1,
                        expected,
                        found: token.get(Field::Id).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Normalize every FORM. Idempotent: applying it twice equals once.
    pub fn normalize(&mut self) {
        for token in self.tokens_mut() {
            let normalized = normalize_transliteration(token.get(Field::Form));
            token.set(Field::Form, normalized);
        }
    }

    /// Per-token context windows over `field`, clipped at sentence edges.
    pub fn get_contexts(&self, field: Field, size: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(self.word_count());
        for sentence in &self.sentences {
            let values: Vec<&str> = sentence.tokens.iter().map(|t| t.get(field)).collect();
            context::sentence_windows(&values, size, &mut out);
        }
        out
    }

    /// Lazy row iterator over all tokens for the named fields, in document
    /// order.
    pub fn rows<'a>(&'a self, fields: &'a [Field]) -> impl Iterator<Item = Vec<&'a str>> + 'a {
        self.sentences.iter().flat_map(move |sentence| {
            sentence
                .tokens
                .iter()
                .map(move |token| fields.iter().map(|f| token.get(*f)).collect())
        })
    }

    /// Positional bulk assignment: value i goes to token i in document order.
    /// A length mismatch is an error — never truncation or wraparound.
    /// Assignments to LEMMA/XPOS skip locked tokens (the position still
    /// consumes its value).
    pub fn update_value(&mut self, field: Field, values: &[String]) -> Result<(), CorpusError> {
        let expected = self.word_count();
        if values.len() != expected {
            return Err(CorpusError::LengthMismatch {
                field: field.name(),
                expected,
                actual: values.len(),
            });
        }
        let protected = matches!(field, Field::Lemma | Field::Xpos);
        for (token, value) in self.tokens_mut().zip(values) {
            if protected && token.is_locked() {
                continue;
            }
            token.set(field, value.clone());
        }
        Ok(())
    }

    /// Set `field` to one constant on every token, locks included. Used to
    /// reset the transient context fields before persistence.
    pub fn force_value(&mut self, field: Field, value: &str) {
        for token in self.tokens_mut() {
            token.set(field, value);
        }
    }

    /// Blank LEMMA: for numeral tokens only (`numbers` = true) or for every
    /// unlocked token (`numbers` = false). Locked tokens are never touched.
    pub fn unlemmatize(&mut self, numbers: bool) {
        let numeral = Regex::new(r"^[0-9]+([./][0-9]+)?(\([^)]*\))?$").unwrap();
        for token in self.tokens_mut() {
            if token.is_locked() {
                continue;
            }
            if !numbers || numeral.is_match(token.get(Field::Form)) {
                token.set(Field::Lemma, PLACEHOLDER);
            }
        }
    }

    /// Merge a tab-separated correction file (FORM, LEMMA[, XPOS, …] per row,
    /// `#` comments skipped) into this corpus: one locked single-token
    /// sentence per row. Returns the number of rows merged.
    pub fn read_corrections(&mut self, path: &Path) -> Result<usize, CorpusError> {
        let text = fs::read_to_string(path)?;
        let origin = path.display().to_string();
        let mut added = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            let form = cols.first().map(|c| c.trim()).unwrap_or_default();
            let lemma = cols.get(1).map(|c| c.trim()).unwrap_or_default();
            if form.is_empty() || lemma.is_empty() {
                return Err(CorpusError::MalformedCorrection {
                    path: origin,
                    line: idx + 1,
                });
            }
            let mut token = Token::new(1, form);
            token.set(Field::Lemma, lemma);
            if let Some(xpos) = cols.get(2).map(|c| c.trim()).filter(|c| !c.is_empty()) {
                token.set(Field::Xpos, xpos);
            }
            token.set(Field::Lock, "1");
            self.sentences.push(Sentence {
                comments: Vec::new(),
                tokens: vec![token],
            });
            added += 1;
        }

        tracing::info!(file = %origin, rows = added, "correction rows merged");
        Ok(added)
    }

    /// Persist the corpus. `add_info` prepends a provenance header. The file
    /// is synced to disk before returning so callers may safely delete the
    /// data's source afterwards.
    pub fn write_file(&self, path: &Path, add_info: bool) -> Result<(), CorpusError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut out = String::new();
        if add_info {
            out.push_str(&format!("# {} v{}\n", config::APP_NAME, config::APP_VERSION));
            out.push_str(&format!("# generated: {}\n", Utc::now().to_rfc3339()));
            out.push_str(&format!(
                "# tokens: {} sentences: {}\n",
                self.word_count(),
                self.sentence_count()
            ));
        }
        for sentence in &self.sentences {
            for comment in &sentence.comments {
                out.push_str(comment);
                out.push('\n');
            }
            for token in &sentence.tokens {
                out.push_str(&token.to_line());
                out.push('\n');
            }
            out.push('\n');
        }

        let mut file = File::create(path)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
        tracing::info!(path = %path.display(), tokens = self.word_count(), "corpus written");
        Ok(())
    }

    /// Derive the lemma-frequency side artifact: tab-separated
    /// `count FORM LEMMA XPOS` rows, highest count first, lexicographic
    /// tiebreak.
    pub fn make_lemmalists(&self, path: &Path) -> Result<(), CorpusError> {
        let mut counts: HashMap<(String, String, String), usize> = HashMap::new();
        for token in self.tokens() {
            if token.get(Field::Lemma) == PLACEHOLDER {
                continue;
            }
            let key = (
                token.get(Field::Form).to_string(),
                token.get(Field::Lemma).to_string(),
                token.get(Field::Xpos).to_string(),
            );
            *counts.entry(key).or_default() += 1;
        }

        let mut entries: Vec<_> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut out = String::new();
        for ((form, lemma, xpos), count) in entries {
            out.push_str(&format!("{count}\t{form}\t{lemma}\t{xpos}\n"));
        }

        let mut file = File::create(path)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
        tracing::info!(path = %path.display(), "lemma list written");
        Ok(())
    }
}

/// Normalize one transliterated form. All rules are idempotent:
/// ASCII digraphs to their diacritic signs, `ḫ` unified to plain `h`,
/// determinatives in `{…}` lowercased, sign-index digits to subscripts.
pub fn normalize_transliteration(form: &str) -> String {
    let mut out = form
        .replace("sz", "š")
        .replace("Sz", "Š")
        .replace("SZ", "Š")
        .replace("s,", "ṣ")
        .replace("S,", "Ṣ")
        .replace("t,", "ṭ")
        .replace("T,", "Ṭ")
        .replace('ḫ', "h")
        .replace('Ḫ', "H");

    let determinative = Regex::new(r"\{[^}]*\}").unwrap();
    out = determinative
        .replace_all(&out, |caps: &regex::Captures| caps[0].to_lowercase())
        .into_owned();

    let index = Regex::new(r"(\p{L})([0-9]+)").unwrap();
    index
        .replace_all(&out, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], to_subscript(&caps[2]))
        })
        .into_owned()
}

fn to_subscript(digits: &str) -> String {
    digits
        .chars()
        .map(|c| match c {
            '0' => '₀',
            '1' => '₁',
            '2' => '₂',
            '3' => '₃',
            '4' => '₄',
            '5' => '₅',
            '6' => '₆',
            '7' => '₇',
            '8' => '₈',
            '9' => '₉',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# text: šum-ma a-wi-lum\n\
1\tšum-ma\t_\t_\t_\t_\t0\troot\t_\t_\t_\t_\t_\t_\t_\t_\t_\n\
2\ta-wi-lum\t_\t_\t_\t_\t1\tchild\t_\t_\t_\t_\t_\t_\t_\t_\t_\n\
\n\
1\tin-šu\t_\t_\t_\t_\t0\troot\t_\t_\t_\t_\t_\t_\t_\t_\t_\n";

    fn sample() -> Corpus {
        Corpus::parse_str(SAMPLE, true).unwrap()
    }

    fn values(n: usize, prefix: &str) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn parses_sentences_and_comments() {
        let corpus = sample();
        assert_eq!(corpus.sentence_count(), 2);
        assert_eq!(corpus.word_count(), 3);
        assert_eq!(corpus.sentences()[0].comments.len(), 1);
        assert_eq!(corpus.sentences()[1].tokens[0].get(Field::Form), "in-šu");
    }

    #[test]
    fn pads_plain_conllu_rows() {
        let text = "1\ta\t_\t_\t_\t_\t0\troot\t_\t_\n";
        let corpus = Corpus::parse_str(text, true).unwrap();
        assert_eq!(corpus.tokens().next().unwrap().get(Field::Lock), PLACEHOLDER);
    }

    #[test]
    fn rejects_malformed_row() {
        let err = Corpus::parse_str("1\tonly-two\n", false).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedRow { line: 1, found: 2, .. }));
    }

    #[test]
    fn validation_catches_broken_id_sequence() {
        let text = "1\ta\t_\t_\t_\t_\t0\troot\t_\t_\n3\tb\t_\t_\t_\t_\t1\tchild\t_\t_\n";
        let err = Corpus::parse_str(text, true).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::BrokenIdSequence { sentence: 1, expected: 2, .. }
        ));
        // Validation off defers the problem.
        assert!(Corpus::parse_str(text, false).is_ok());
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut corpus = Corpus::from_text_lines(&["szum-ma {D}UTU a-wi-lum2 s,a-bat 3(disz)"]);
        let once: Vec<String> = corpus.tokens().map(|t| t.get(Field::Form).to_string()).collect();
        corpus.normalize();
        let twice: Vec<String> = corpus.tokens().map(|t| t.get(Field::Form).to_string()).collect();
        assert_eq!(once, twice);
        assert_eq!(once[0], "šum-ma");
        assert_eq!(once[1], "{d}UTU");
        assert_eq!(once[2], "a-wi-lum₂");
        assert_eq!(once[3], "ṣa-bat");
        // A leading numeral digit is not a sign index and stays plain.
        assert_eq!(once[4], "3(diš)");
    }

    #[test]
    fn update_value_assigns_positionally() {
        let mut corpus = sample();
        corpus.update_value(Field::Xpos, &values(3, "T")).unwrap();
        let tags: Vec<&str> = corpus.tokens().map(|t| t.get(Field::Xpos)).collect();
        assert_eq!(tags, vec!["T0", "T1", "T2"]);
    }

    #[test]
    fn update_value_rejects_length_mismatch() {
        let mut corpus = sample();
        let err = corpus.update_value(Field::Xpos, &values(2, "T")).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::LengthMismatch { field: "xpos", expected: 3, actual: 2 }
        ));
        // Nothing was assigned.
        assert!(corpus.tokens().all(|t| t.get(Field::Xpos) == PLACEHOLDER));
    }

    #[test]
    fn locked_tokens_keep_lemma_and_xpos() {
        let mut corpus = sample();
        {
            let first = corpus.tokens_mut().next().unwrap();
            first.set(Field::Lemma, "šumma");
            first.set(Field::Xpos, "CNJ");
            first.set(Field::Lock, "1");
        }
        corpus.update_value(Field::Lemma, &values(3, "L")).unwrap();
        corpus.update_value(Field::Xpos, &values(3, "X")).unwrap();
        let first = corpus.tokens().next().unwrap();
        assert_eq!(first.get(Field::Lemma), "šumma");
        assert_eq!(first.get(Field::Xpos), "CNJ");
        // The position still consumed its value: token 2 got value index 1.
        assert_eq!(corpus.tokens().nth(1).unwrap().get(Field::Lemma), "L1");
        // Non-protected fields are assigned even on locked tokens.
        corpus.update_value(Field::Score, &values(3, "S")).unwrap();
        assert_eq!(corpus.tokens().next().unwrap().get(Field::Score), "S0");
    }

    #[test]
    fn force_value_hits_every_token() {
        let mut corpus = sample();
        corpus.update_value(Field::FormCtx, &values(3, "ctx")).unwrap();
        corpus.force_value(Field::FormCtx, PLACEHOLDER);
        assert!(corpus.tokens().all(|t| t.get(Field::FormCtx) == PLACEHOLDER));
    }

    #[test]
    fn unlemmatize_blanks_numerals_only() {
        let mut corpus = Corpus::from_text_lines(&["šum-ma 3(diš) 1/2 a-na"]);
        let lemmas: Vec<String> = vec!["šumma", "eš", "mišil", "ana"]
            .into_iter()
            .map(String::from)
            .collect();
        corpus.update_value(Field::Lemma, &lemmas).unwrap();
        corpus.unlemmatize(true);
        let got: Vec<&str> = corpus.tokens().map(|t| t.get(Field::Lemma)).collect();
        assert_eq!(got, vec!["šumma", PLACEHOLDER, PLACEHOLDER, "ana"]);
    }

    #[test]
    fn get_contexts_stay_within_sentences() {
        let corpus = sample();
        let contexts = corpus.get_contexts(Field::Form, 2);
        assert_eq!(contexts.len(), 3);
        assert_eq!(contexts[0], "«šum-ma» a-wi-lum");
        assert_eq!(contexts[1], "šum-ma «a-wi-lum»");
        // Second sentence sees none of the first.
        assert_eq!(contexts[2], "«in-šu»");
    }

    #[test]
    fn rows_walk_document_order() {
        let corpus = sample();
        let rows: Vec<Vec<&str>> = corpus.rows(&[Field::Id, Field::Form]).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["1", "šum-ma"]);
        assert_eq!(rows[2], vec!["1", "in-šu"]);
    }

    #[test]
    fn read_corrections_appends_locked_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch1.tsv");
        fs::write(&path, "# reviewed 2026-01\nšum-ma\tšumma\tCNJ\na-na\tana\n").unwrap();

        let mut corpus = Corpus::new();
        let added = corpus.read_corrections(&path).unwrap();
        assert_eq!(added, 2);
        assert_eq!(corpus.sentence_count(), 2);
        let first = corpus.tokens().next().unwrap();
        assert_eq!(first.get(Field::Form), "šum-ma");
        assert_eq!(first.get(Field::Lemma), "šumma");
        assert_eq!(first.get(Field::Xpos), "CNJ");
        assert!(first.is_locked());
        // Second row has no XPOS column.
        assert_eq!(corpus.tokens().nth(1).unwrap().get(Field::Xpos), PLACEHOLDER);
    }

    #[test]
    fn read_corrections_rejects_lemmaless_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        fs::write(&path, "šum-ma\n").unwrap();
        let err = Corpus::new().read_corrections(&path).unwrap_err();
        assert!(matches!(err, CorpusError::MalformedCorrection { line: 1, .. }));
    }

    #[test]
    fn write_and_reload_preserves_counts_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.conllu");
        let corpus = sample();
        corpus.write_file(&path, true).unwrap();

        let reloaded = Corpus::from_file(&path, true).unwrap();
        assert_eq!(reloaded.word_count(), corpus.word_count());
        assert_eq!(reloaded.sentence_count(), corpus.sentence_count());

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&format!("# {} v{}", config::APP_NAME, config::APP_VERSION)));
        assert!(text.contains("# tokens: 3 sentences: 2"));
    }

    #[test]
    fn write_without_info_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.conllu");
        sample().write_file(&path, false).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# text:"));
    }

    #[test]
    fn lemmalist_is_sorted_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lemmas.tsv");
        let mut corpus = Corpus::from_text_lines(&["a-na a-na šum-ma"]);
        corpus
            .update_value(
                Field::Lemma,
                &["ana".to_string(), "ana".to_string(), "šumma".to_string()],
            )
            .unwrap();
        corpus
            .update_value(
                Field::Xpos,
                &["PRP".to_string(), "PRP".to_string(), "CNJ".to_string()],
            )
            .unwrap();
        corpus.make_lemmalists(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "2\ta-na\tana\tPRP\n1\tšum-ma\tšumma\tCNJ\n");
    }

    #[test]
    fn from_text_lines_builds_unit_per_line() {
        let corpus = Corpus::from_text_lines(&[
            "# tablet A",
            "šum-ma a-wi-lum",
            "in-šu u-hap-pa-du",
        ]);
        assert_eq!(corpus.sentence_count(), 2);
        assert_eq!(corpus.sentences()[0].comments, vec!["# tablet A"]);
        let first = &corpus.sentences()[0].tokens;
        assert_eq!(first[0].get(Field::Head), "0");
        assert_eq!(first[0].get(Field::Deprel), "root");
        assert_eq!(first[1].get(Field::Head), "1");
        assert_eq!(first[1].get(Field::Deprel), "child");
        corpus.validate().unwrap();
    }
}
