//! A resumable parser turning a byte stream into sentences.

use super::{decode_length, ProtocolError, Sentence};

/// A push parser for the sentence stream.
///
/// The transport read loop feeds it chunks as they arrive, in whatever
/// fragmentation TCP produced. The parser yields every sentence completed
/// by the new bytes and keeps the bytes of an unfinished sentence buffered
/// until the next feed, so no split point in the stream is ever lost.
#[derive(Debug, Default)]
pub struct SentenceParser {
    buf: Vec<u8>,
}

impl SentenceParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the buffered bytes and parses as many complete
    /// sentences as they now contain.
    ///
    /// Sentences consisting of only the terminator word are consumed but
    /// not emitted. Word bodies are decoded as UTF-8 with replacement of
    /// invalid sequences.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Sentence>, ProtocolError> {
        self.buf.extend_from_slice(chunk);

        let mut sentences = Vec::new();
        let mut consumed = 0;

        'sentences: loop {
            let mut pos = consumed;
            let mut words = Vec::new();

            loop {
                let Some((len, width)) = decode_length(&self.buf[pos..])? else {
                    break 'sentences;
                };

                pos += width;
                if len == 0 {
                    break;
                }

                let end = pos + len as usize;
                if self.buf.len() < end {
                    break 'sentences;
                }

                words.push(String::from_utf8_lossy(&self.buf[pos..end]).into_owned());
                pos = end;
            }

            consumed = pos;

            // A lone terminator is not a sentence.
            if !words.is_empty() {
                sentences.push(Sentence::new(words));
            }
        }

        self.buf.drain(..consumed);
        Ok(sentences)
    }

    /// The bytes of the unfinished sentence still waiting for more input.
    pub fn residual(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::super::encode_sentence;
    use super::*;

    fn words(sentence: &Sentence) -> Vec<&str> {
        sentence.words().iter().map(String::as_str).collect()
    }

    #[test]
    fn whole_buffer() {
        let mut buf = encode_sentence(&["!re", "=name=ether1"]).unwrap();
        buf.extend(encode_sentence(&["!done"]).unwrap());

        let mut parser = SentenceParser::new();
        let sentences = parser.feed(&buf).unwrap();

        assert_eq!(sentences.len(), 2);
        assert_eq!(words(&sentences[0]), ["!re", "=name=ether1"]);
        assert_eq!(words(&sentences[1]), ["!done"]);
        assert!(parser.residual().is_empty());
    }

    #[test]
    fn byte_at_a_time() {
        let mut buf = encode_sentence(&["!re", "=name=ether1"]).unwrap();
        buf.extend(encode_sentence(&["!re", "=name=ether2"]).unwrap());
        buf.extend(encode_sentence(&["!done"]).unwrap());

        let mut parser = SentenceParser::new();
        let mut sentences = Vec::new();
        for byte in &buf {
            sentences.extend(parser.feed(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(sentences.len(), 3);
        assert_eq!(words(&sentences[0]), ["!re", "=name=ether1"]);
        assert_eq!(words(&sentences[1]), ["!re", "=name=ether2"]);
        assert_eq!(words(&sentences[2]), ["!done"]);
        assert!(parser.residual().is_empty());
    }

    #[test]
    fn chunking_is_invisible() {
        let mut buf = encode_sentence(&["!re", "=comment=a=b", "=addr=1.2.3.4/24"]).unwrap();
        buf.extend(encode_sentence(&["!done"]).unwrap());

        let mut whole = SentenceParser::new();
        let expected = whole.feed(&buf).unwrap();

        for split in 0..=buf.len() {
            let mut parser = SentenceParser::new();
            let mut sentences = parser.feed(&buf[..split]).unwrap();
            sentences.extend(parser.feed(&buf[split..]).unwrap());

            assert_eq!(sentences, expected, "split at {split}");
            assert!(parser.residual().is_empty(), "split at {split}");
        }
    }

    #[test]
    fn partial_sentence_stays_buffered() {
        let buf = encode_sentence(&["!re", "=name=ether1"]).unwrap();
        let cut = buf.len() - 4;

        let mut parser = SentenceParser::new();
        assert!(parser.feed(&buf[..cut]).unwrap().is_empty());
        assert_eq!(parser.residual(), &buf[..cut]);

        let sentences = parser.feed(&buf[cut..]).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(words(&sentences[0]), ["!re", "=name=ether1"]);
        assert!(parser.residual().is_empty());
    }

    #[test]
    fn empty_sentence_is_skipped() {
        let mut buf = vec![0x00];
        buf.extend(encode_sentence(&["!done"]).unwrap());
        buf.push(0x00);

        let mut parser = SentenceParser::new();
        let sentences = parser.feed(&buf).unwrap();

        assert_eq!(sentences.len(), 1);
        assert_eq!(words(&sentences[0]), ["!done"]);
        assert!(parser.residual().is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = vec![0x03, b'!', b'r', b'e'];
        buf.extend([0x02, 0xFF, 0xFE]);
        buf.push(0x00);

        let mut parser = SentenceParser::new();
        let sentences = parser.feed(&buf).unwrap();

        assert_eq!(sentences.len(), 1);
        assert_eq!(words(&sentences[0]), ["!re", "\u{FFFD}\u{FFFD}"]);
    }

    #[test]
    fn invalid_length_prefix_is_an_error() {
        let mut parser = SentenceParser::new();

        assert_matches!(
            parser.feed(&[0xF8, 0x00]),
            Err(ProtocolError::InvalidLength(0xF8))
        );
    }
}
