//! Permissive tag/value tokenizer.
//!
//! Splits a raw byte buffer into `(tag, value)` tokens. The on-wire field
//! separator is SOH (`0x01`); the pretty-print pipe (`|`) is accepted
//! interchangeably, so captures pasted from logs tokenize as-is.
//!
//! The tokenizer is deliberately lenient: segments with no `=`, an empty or
//! non-numeric tag, or no content at all are discarded and scanning
//! continues. Callers routinely feed partially garbled captures; dropping
//! the garbage and keeping the rest is the useful behavior.

use dynafix_dictionary::Dictionary;

/// The on-wire field separator.
pub const SOH: u8 = 0x01;

pub(crate) fn is_separator(byte: u8) -> bool {
    byte == SOH || byte == b'|'
}

/// One `tag=value` occurrence, borrowing the input buffer. `start`/`end` are
/// the byte offsets of the token within the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToken<'a> {
    pub tag: u32,
    pub value: &'a [u8],
    pub start: usize,
    pub end: usize,
}

/// A lazy token stream over one wire message.
///
/// The dictionary supplies the one piece of schema knowledge tokenization
/// needs: which fields are `LENGTH`-typed. After such a field, the value of
/// the matching `DATA`-typed field that follows is read as exactly that many
/// raw bytes, separators included, which is how `RawData` and its kin
/// survive embedded SOH bytes. A `LENGTH` field whose successor is not
/// `DATA`-typed (`BodyLength` in the FIX 4.3+ dictionaries, for one) has no
/// effect on tokenization. The declared length wins over the actual payload:
/// a short declaration truncates the value (the unaccounted tail is
/// discarded up to the next separator), and a long declaration absorbs the
/// bytes of whatever fields follow.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    dict: &'a Dictionary,
    bytes: &'a [u8],
    pos: usize,
    pending_data_len: Option<usize>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(dict: &'a Dictionary, bytes: &'a [u8]) -> Self {
        Self {
            dict,
            bytes,
            pos: 0,
            pending_data_len: None,
        }
    }

    /// Parses `DIGITS "="` at `start`; `None` on any malformation.
    fn read_tag(&self, start: usize) -> Option<(u32, usize)> {
        let mut i = start;
        let mut tag: u32 = 0;
        let mut digits = 0usize;
        while i < self.bytes.len() {
            match self.bytes[i] {
                byte @ b'0'..=b'9' => {
                    tag = tag.checked_mul(10)?.checked_add(u32::from(byte - b'0'))?;
                    digits += 1;
                    i += 1;
                }
                b'=' => break,
                _ => return None,
            }
        }
        if digits == 0 || i >= self.bytes.len() {
            return None;
        }
        Some((tag, i))
    }

    /// Skips past the next separator (or to the end of input).
    fn skip_segment(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && !is_separator(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos > start {
            log::trace!(
                "discarding malformed segment at byte {start}: {:?}",
                String::from_utf8_lossy(&self.bytes[start..self.pos])
            );
        }
        self.pos += 1;
    }

    fn is_length_field(&self, tag: u32) -> bool {
        self.dict
            .field_by_tag(tag)
            .is_some_and(|field| field.is_length())
    }

    fn is_data_field(&self, tag: u32) -> bool {
        self.dict
            .field_by_tag(tag)
            .is_some_and(|field| field.is_data())
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = RawToken<'a>;

    fn next(&mut self) -> Option<RawToken<'a>> {
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let Some((tag, eq_index)) = self.read_tag(start) else {
                self.skip_segment();
                continue;
            };
            let value_start = eq_index + 1;

            // A pending declared length is spent on the next well-formed
            // field, but only a DATA-typed partner gets the raw read.
            let pending = self.pending_data_len.take();
            if let (Some(declared_len), true) = (pending, self.is_data_field(tag)) {
                // Raw read: the previous LENGTH field dictates the size.
                let value_end = value_start
                    .saturating_add(declared_len)
                    .min(self.bytes.len());
                let value = &self.bytes[value_start..value_end];
                self.pos = value_end;
                while self.pos < self.bytes.len() && !is_separator(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                if self.pos > value_end {
                    log::debug!(
                        "field {tag}: declared length {declared_len} leaves {} unaccounted bytes",
                        self.pos - value_end
                    );
                }
                self.pos += 1;
                return Some(RawToken {
                    tag,
                    value,
                    start,
                    end: value_end,
                });
            }

            let mut value_end = value_start;
            while value_end < self.bytes.len() && !is_separator(self.bytes[value_end]) {
                value_end += 1;
            }
            let value = &self.bytes[value_start..value_end];
            self.pos = value_end + 1;
            if self.is_length_field(tag) {
                if let Some(len) = std::str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                {
                    self.pending_data_len = Some(len);
                }
            }
            return Some(RawToken {
                tag,
                value,
                start,
                end: value_end,
            });
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dict() -> Dictionary {
        Dictionary::fix42().unwrap()
    }

    fn tags_and_values(bytes: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let dict = dict();
        Tokenizer::new(&dict, bytes)
            .map(|token| (token.tag, token.value.to_vec()))
            .collect()
    }

    #[test]
    fn soh_and_pipe_are_interchangeable() {
        let with_pipe = tags_and_values(b"8=FIX.4.2|35=0|10=000|");
        let with_soh = tags_and_values(b"8=FIX.4.2\x0135=0\x0110=000\x01");
        assert_eq!(with_pipe, with_soh);
        assert_eq!(
            with_pipe,
            vec![
                (8, b"FIX.4.2".to_vec()),
                (35, b"0".to_vec()),
                (10, b"000".to_vec()),
            ]
        );
    }

    #[test]
    fn final_separator_is_optional() {
        assert_eq!(
            tags_and_values(b"8=FIX.4.2|35=0"),
            vec![(8, b"FIX.4.2".to_vec()), (35, b"0".to_vec())]
        );
    }

    #[test]
    fn malformed_segments_are_dropped() {
        // Empty segments, missing `=`, non-numeric tags, empty tags, stray
        // garbage: all skipped without aborting the scan.
        let bytes = b"8=FIX.4.2|||a|A=A|==|=|22|=asdf|9001=12345|35=0|";
        assert_eq!(
            tags_and_values(bytes),
            vec![
                (8, b"FIX.4.2".to_vec()),
                (9001, b"12345".to_vec()),
                (35, b"0".to_vec()),
            ]
        );
    }

    #[test]
    fn tag_zero_is_a_token_like_any_other() {
        // Any non-empty digit run is a tag; nothing on the wire outlaws "0".
        assert_eq!(
            tags_and_values(b"0=x|35=0|"),
            vec![(0, b"x".to_vec()), (35, b"0".to_vec())]
        );
    }

    #[test]
    fn empty_values_are_legal_tokens() {
        assert_eq!(
            tags_and_values(b"112=|35=0|"),
            vec![(112, b"".to_vec()), (35, b"0".to_vec())]
        );
    }

    #[test]
    fn length_prefixed_value_keeps_embedded_separators() {
        let bytes = b"95=20|96=AAAAAAAAAAAAAAAA\x01AAA|10=213|";
        let tokens = tags_and_values(bytes);
        assert_eq!(
            tokens,
            vec![
                (95, b"20".to_vec()),
                (96, b"AAAAAAAAAAAAAAAA\x01AAA".to_vec()),
                (10, b"213".to_vec()),
            ]
        );
    }

    #[test]
    fn under_length_truncates_and_resynchronizes() {
        let bytes = b"95=17|96=AAAAAAAAAAAAAAAA\x01AAA|10=213|";
        let tokens = tags_and_values(bytes);
        assert_eq!(
            tokens,
            vec![
                (95, b"17".to_vec()),
                (96, b"AAAAAAAAAAAAAAAA\x01".to_vec()),
                (10, b"213".to_vec()),
            ]
        );
    }

    #[test]
    fn over_length_absorbs_following_fields() {
        let bytes = b"95=23|96=AAAAAAAAAAAAAAAA\x01AAA\x0110=213\x01";
        let tokens = tags_and_values(bytes);
        // 23 bytes reach into the checksum field; its remnants are dropped.
        assert_eq!(
            tokens,
            vec![
                (95, b"23".to_vec()),
                (96, b"AAAAAAAAAAAAAAAA\x01AAA\x0110".to_vec()),
            ]
        );
    }

    #[test]
    fn length_fields_without_a_data_partner_are_inert() {
        // BodyLength is LENGTH-typed in FIX 4.4, but MsgType is no raw-data
        // field; tokenization must not swallow it.
        let dict = Dictionary::fix44().unwrap();
        let bytes = b"8=FIX.4.4|9=20|35=0|49=A|56=B|10=000|";
        let tags: Vec<u32> = Tokenizer::new(&dict, bytes).map(|t| t.tag).collect();
        assert_eq!(tags, [8, 9, 35, 49, 56, 10]);
    }

    #[test]
    fn length_beyond_buffer_consumes_the_remainder() {
        let bytes = b"95=9999|96=abc\x01def";
        let tokens = tags_and_values(bytes);
        assert_eq!(
            tokens,
            vec![(95, b"9999".to_vec()), (96, b"abc\x01def".to_vec())]
        );
    }

    #[test]
    fn token_byte_ranges_index_the_input() {
        let bytes = b"8=FIX.4.2|35=0|";
        let dict = dict();
        let tokens: Vec<_> = Tokenizer::new(&dict, bytes).collect();
        assert_eq!(tokens[0].start, 0);
        assert_eq!(&bytes[tokens[0].start..tokens[0].end], b"8=FIX.4.2");
        assert_eq!(&bytes[tokens[1].start..tokens[1].end], b"35=0");
    }
}
