//! Feature-line builders for the two predictor stages.
//!
//! The tagger consumes one line per token built from the FORM context window;
//! the lemmatizer consumes the segmented form plus positional POS features
//! from the XPOS window. The same builders write every stage input, and the
//! merge step never re-parses them, so the encodings only have to be stable
//! within one pipeline version.

use crate::corpus::context::split_window;

/// Segment a transliterated form into predictor input units.
///
/// Modes: 0 = logo-syllabic (split on the sign separators `-` and `.`),
/// 1 = Sumerian (as 0, with `{…}` determinative groups as their own units),
/// 2 = plain character sequence.
pub fn segment_form(form: &str, tokenizer: u8) -> String {
    match tokenizer {
        2 => {
            let chars: Vec<String> = form.chars().map(String::from).collect();
            chars.join(" ")
        }
        1 => split_units(form, true).join(" "),
        _ => split_units(form, false).join(" "),
    }
}

fn split_units(form: &str, isolate_determinatives: bool) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = form.chars();

    while let Some(c) = chars.next() {
        match c {
            '-' | '.' => {
                if !current.is_empty() {
                    units.push(std::mem::take(&mut current));
                }
            }
            '{' if isolate_determinatives => {
                if !current.is_empty() {
                    units.push(std::mem::take(&mut current));
                }
                let mut group = String::from('{');
                for d in chars.by_ref() {
                    group.push(d);
                    if d == '}' {
                        break;
                    }
                }
                units.push(group);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    if units.is_empty() {
        // Separator-only forms pass through whole.
        units.push(form.to_string());
    }
    units
}

/// Tagger feature line from a FORM context window: every window word
/// segmented, words joined by the `■` boundary, the target kept inside its
/// `« »` markers.
pub fn tagger_line(formctx: &str, tokenizer: u8) -> String {
    match split_window(formctx) {
        Some((left, target, right)) => {
            let mut words: Vec<String> = Vec::with_capacity(left.len() + right.len() + 1);
            for w in left {
                words.push(segment_form(w, tokenizer));
            }
            words.push(format!("« {} »", segment_form(target, tokenizer)));
            for w in right {
                words.push(segment_form(w, tokenizer));
            }
            words.join(" ■ ")
        }
        None => segment_form(formctx, tokenizer),
    }
}

/// Lemmatizer feature line: segmented form plus positional POS features from
/// the XPOS window (`P<n>=` before, `POS=` target, `N<n>=` after; clipped
/// positions are simply absent).
pub fn lemmatizer_line(form: &str, xposctx: &str, tokenizer: u8) -> String {
    let segmented = segment_form(form, tokenizer);
    let mut features = Vec::new();
    if let Some((left, target, right)) = split_window(xposctx) {
        for (i, value) in left.iter().enumerate() {
            features.push(format!("P{}={}", left.len() - i, value));
        }
        features.push(format!("POS={target}"));
        for (i, value) in right.iter().enumerate() {
            features.push(format!("N{}={}", i + 1, value));
        }
    }
    if features.is_empty() {
        segmented
    } else {
        format!("{} {}", segmented, features.join(" "))
    }
}
