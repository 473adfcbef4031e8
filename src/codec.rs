//! Encoding of scalar and compound values into a single tab-safe field.
//!
//! Every special character is written as `%XX`, the uppercase hex of its UTF-8
//! bytes. `%`, tab, newline and carriage return are always escaped; callers add
//! the delimiters of the structure they are flattening (`:` and space for
//! count-maps, the item separator for string sequences). Decoding accepts any
//! `%XX` sequence, so a value escaped with a larger special set still decodes
//! with [`unescape`].
//!
//! # Formats
//!
//! - **Scalar string**: `New York:1` → `New%20York%3A1`
//! - **Count-map**: `[("a", 1), ("b:c", 2)]` → `a:1 b%3Ac:2`. Items are split on
//!   spaces and each item on its *last* colon.
//! - **String sequence**: `["New York", "a,b"]` with `,` → `New York,a%2Cb`. An
//!   empty item is written as `%FF` so that `[""]` and `[]` stay distinct. No
//!   string escapes to `%FF` (0xFF never occurs in UTF-8) and a delimiter can
//!   be neither `%` nor a hex digit, so the marker is unambiguous.
//!
//! ```
//! use textdb::codec::{decode_count_map, encode_count_map};
//!
//! let encoded = encode_count_map(vec![("a", 1), ("b", 2)]);
//! assert_eq!(encoded, "a:1 b:2");
//! assert_eq!(
//!     decode_count_map(&encoded).unwrap(),
//!     vec![("a".to_string(), 1), ("b".to_string(), 2)]
//! );
//! ```

use crate::error::{Result, TextdbError};
use std::fmt::Write as _;

/// Characters escaped in every encoded value.
const ALWAYS_ESCAPED: [char; 4] = ['%', '\t', '\n', '\r'];

/// Extra characters escaped by [`encode_string`] and inside count-map tokens.
pub const SCALAR_SPECIALS: [char; 2] = [':', ' '];

/// Separator between count-map items.
pub const COUNT_MAP_ITEM_SEP: char = ' ';

/// Separator between a count-map token and its count.
pub const COUNT_MAP_COUNT_SEP: char = ':';

/// Stand-in for an empty item inside an encoded string sequence.
const EMPTY_ITEM: &str = "%FF";

/// Escape `s` so that it holds none of the always-escaped characters nor any of `extra`.
pub fn escape(s: &str, extra: &[char]) -> String {
    let special = |c: char| ALWAYS_ESCAPED.contains(&c) || extra.contains(&c);
    if !s.chars().any(special) {
        return s.to_owned();
    }

    let mut out = String::with_capacity(s.len() + 8);
    let mut buf = [0u8; 4];
    for c in s.chars() {
        if special(c) {
            for b in c.encode_utf8(&mut buf).bytes() {
                // Writing to a String cannot fail.
                let _ = write!(out, "%{b:02X}");
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse [`escape`] for any special set.
///
/// Fails on a `%` that is not followed by two hex digits, or when the decoded
/// bytes are not valid UTF-8.
pub fn unescape(token: &str) -> Result<String> {
    if !token.contains('%') {
        return Ok(token.to_owned());
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let (hi, lo) = match bytes.get(i + 1..i + 3) {
            Some(&[hi, lo]) => (hex_value(hi), hex_value(lo)),
            _ => (None, None),
        };
        match (hi, lo) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => {
                return Err(TextdbError::decode(format!(
                    "malformed escape at byte {i} in {token:?}"
                )));
            }
        }
        i += 3;
    }

    String::from_utf8(out)
        .map_err(|_| TextdbError::decode(format!("escaped bytes are not UTF-8 in {token:?}")))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Encode a scalar string: escapes `%`, tab, newline, carriage return, `:` and space.
pub fn encode_string(s: &str) -> String {
    escape(s, &SCALAR_SPECIALS)
}

/// Exact inverse of [`encode_string`].
pub fn decode_string(token: &str) -> Result<String> {
    unescape(token)
}

/// Encode `token:count` pairs, space separated, in the order given.
///
/// Duplicate tokens are written as-is; pre-aggregate if the consumer expects
/// unique keys.
pub fn encode_count_map<K, I>(pairs: I) -> String
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, i64)>,
{
    let mut out = String::new();
    for (idx, (token, count)) in pairs.into_iter().enumerate() {
        if idx > 0 {
            out.push(COUNT_MAP_ITEM_SEP);
        }
        out.push_str(&encode_string(token.as_ref()));
        out.push(COUNT_MAP_COUNT_SEP);
        let _ = write!(out, "{count}");
    }
    out
}

/// Decode a count-map written by [`encode_count_map`], preserving order and duplicates.
pub fn decode_count_map(token: &str) -> Result<Vec<(String, i64)>> {
    if token.is_empty() {
        return Ok(Vec::new());
    }
    token
        .split(COUNT_MAP_ITEM_SEP)
        .map(|item| {
            let (word, count) = item.rsplit_once(COUNT_MAP_COUNT_SEP).ok_or_else(|| {
                TextdbError::decode(format!("count-map item {item:?} has no count"))
            })?;
            let count = count.parse::<i64>().map_err(|e| {
                TextdbError::decode(format!("bad count in count-map item {item:?}: {e}"))
            })?;
            Ok((unescape(word)?, count))
        })
        .collect()
}

fn check_delimiter(delim: char) {
    assert!(
        delim != '%' && !delim.is_ascii_hexdigit(),
        "sequence delimiter {delim:?} collides with the escape syntax"
    );
}

/// Encode a sequence of strings joined by `delim`.
///
/// # Panics
///
/// Panics if `delim` is `%` or an ASCII hex digit, which would be ambiguous with
/// the escape syntax.
pub fn encode_string_seq<S, I>(items: I, delim: char) -> String
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    check_delimiter(delim);
    let mut out = String::new();
    for (idx, item) in items.into_iter().enumerate() {
        if idx > 0 {
            out.push(delim);
        }
        let item = item.as_ref();
        if item.is_empty() {
            out.push_str(EMPTY_ITEM);
        } else {
            out.push_str(&escape(item, &[delim]));
        }
    }
    out
}

/// Decode a sequence written by [`encode_string_seq`] with the same `delim`.
///
/// # Panics
///
/// Panics under the same conditions as [`encode_string_seq`].
pub fn decode_string_seq(token: &str, delim: char) -> Result<Vec<String>> {
    check_delimiter(delim);
    if token.is_empty() {
        return Ok(Vec::new());
    }
    token
        .split(delim)
        .map(|item| {
            if item == EMPTY_ITEM {
                Ok(String::new())
            } else {
                unescape(item)
            }
        })
        .collect()
}
