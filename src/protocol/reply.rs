//! Reply sentences and their projection into records.

use std::collections::HashMap;

/// A flattened view of one `!re` sentence: attribute keys mapped to their
/// values.
pub type Record = HashMap<String, String>;

/// The tag word opening a reply sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTag {
    /// `!re`, one result row.
    Re,
    /// `!done`, terminates a reply stream.
    Done,
    /// `!trap`, a command failure reported by the router.
    Trap,
    /// `!fatal`, an unrecoverable connection error.
    Fatal,
}

impl ReplyTag {
    /// Parses the first word of a reply sentence.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "!re" => Some(Self::Re),
            "!done" => Some(Self::Done),
            "!trap" => Some(Self::Trap),
            "!fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// A parsed protocol sentence: one or more words in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    words: Vec<String>,
}

impl Sentence {
    /// Creates a sentence from its words.
    pub fn new(words: Vec<String>) -> Self {
        debug_assert!(!words.is_empty());
        Self { words }
    }

    /// The words of the sentence.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The reply tag, if the first word is one.
    pub fn tag(&self) -> Option<ReplyTag> {
        ReplyTag::from_word(&self.words[0])
    }

    /// Looks up the value of an `=key=value` attribute word.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        let prefix = format!("={key}=");
        self.words.iter().find_map(|word| word.strip_prefix(&prefix))
    }

    /// Flattens the sentence's attribute words into a record.
    ///
    /// Each word of shape `=key=value` contributes one entry; the value
    /// keeps any further `=` characters verbatim. Words without the
    /// leading `=` are ignored, and a repeated key keeps its last value.
    pub fn record(&self) -> Record {
        let mut record = Record::new();
        for word in &self.words {
            let Some(rest) = word.strip_prefix('=') else {
                continue;
            };

            match rest.split_once('=') {
                Some((key, value)) => record.insert(key.to_owned(), value.to_owned()),
                None => record.insert(rest.to_owned(), String::new()),
            };
        }

        record
    }
}

/// Projects the collected sentences of one reply into its records, one per
/// `!re` sentence. All other sentences are dropped.
pub fn collect_records(sentences: &[Sentence]) -> Vec<Record> {
    sentences
        .iter()
        .filter(|sentence| sentence.tag() == Some(ReplyTag::Re))
        .map(Sentence::record)
        .collect()
}
