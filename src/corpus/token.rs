//! The 17-field CoNLL-U+ token record.
//!
//! The first ten columns are plain CoNLL-U; the remainder carry the
//! bookkeeping this pipeline needs: translation (ENG), normalization (NORM),
//! language code (LANG), transient context windows (FORMCTX/XPOSCTX),
//! disambiguation score (SCORE) and the manual-correction lock (LOCK).

/// Empty-value marker used throughout CoNLL-U.
pub const PLACEHOLDER: &str = "_";

/// Addressable columns of a CoNLL-U+ row, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Form,
    Lemma,
    Upos,
    Xpos,
    Feats,
    Head,
    Deprel,
    Deps,
    Misc,
    Eng,
    Norm,
    Lang,
    FormCtx,
    XposCtx,
    Score,
    Lock,
}

impl Field {
    pub const COUNT: usize = 17;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Id,
        Field::Form,
        Field::Lemma,
        Field::Upos,
        Field::Xpos,
        Field::Feats,
        Field::Head,
        Field::Deprel,
        Field::Deps,
        Field::Misc,
        Field::Eng,
        Field::Norm,
        Field::Lang,
        Field::FormCtx,
        Field::XposCtx,
        Field::Score,
        Field::Lock,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Form => "form",
            Field::Lemma => "lemma",
            Field::Upos => "upos",
            Field::Xpos => "xpos",
            Field::Feats => "feats",
            Field::Head => "head",
            Field::Deprel => "deprel",
            Field::Deps => "deps",
            Field::Misc => "misc",
            Field::Eng => "eng",
            Field::Norm => "norm",
            Field::Lang => "lang",
            Field::FormCtx => "formctx",
            Field::XposCtx => "xposctx",
            Field::Score => "score",
            Field::Lock => "lock",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// One annotated token row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    fields: [String; Field::COUNT],
}

impl Token {
    /// Fresh token with only ID and FORM set.
    pub fn new(id: usize, form: &str) -> Self {
        let mut token = Self::placeholder();
        token.set(Field::Id, id.to_string());
        token.set(Field::Form, form);
        token
    }

    fn placeholder() -> Self {
        Self {
            fields: std::array::from_fn(|_| PLACEHOLDER.to_string()),
        }
    }

    /// Build from parsed columns. Accepts plain 10-column CoNLL-U rows and
    /// pads the extended columns with placeholders; returns `None` outside
    /// the 10..=17 column range.
    pub fn from_columns(columns: &[&str]) -> Option<Self> {
        if columns.len() < 10 || columns.len() > Field::COUNT {
            return None;
        }
        let mut token = Self::placeholder();
        for (i, value) in columns.iter().enumerate() {
            token.fields[i] = (*value).to_string();
        }
        Some(token)
    }

    pub fn get(&self, field: Field) -> &str {
        &self.fields[field.index()]
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields[field.index()] = value.into();
    }

    /// A locked token holds manually corrected LEMMA/XPOS values that no
    /// automatic pass may overwrite.
    pub fn is_locked(&self) -> bool {
        self.get(Field::Lock) != PLACEHOLDER
    }

    pub fn to_line(&self) -> String {
        self.fields.join("\t")
    }
}
