//! One textdb record: tab-separated values aligned to a [`Schema`](crate::Schema).

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Field separator within a data line.
pub const FIELD_SEP: char = '\t';

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Split a data line on tabs, keeping trailing empty fields.
    ///
    /// A trailing `\r` left over from CRLF input is dropped first.
    pub fn from_line(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        Self {
            values: line.split(FIELD_SEP).map(str::to_owned).collect(),
        }
    }

    /// Join the values with tabs (no trailing newline).
    pub fn to_line(&self) -> String {
        self.values.join("\t")
    }

    /// Write the row followed by a newline.
    pub fn write_line<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for (idx, value) in self.values.iter().enumerate() {
            if idx > 0 {
                w.write_all(b"\t")?;
            }
            w.write_all(value.as_bytes())?;
        }
        w.write_all(b"\n")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(String::as_str)
    }

    /// Replace the value at `idx`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    pub fn set(&mut self, idx: usize, value: impl Into<String>) -> String {
        std::mem::replace(&mut self.values[idx], value.into())
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    /// Index of the first value holding a raw tab, newline or carriage return.
    pub fn find_unescaped(&self) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.contains(['\t', '\n', '\r']))
    }
}

impl From<Vec<String>> for Row {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl From<Vec<&str>> for Row {
    fn from(values: Vec<&str>) -> Self {
        Self::new(values.into_iter().map(str::to_owned).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_trailing_empty_fields() {
        let row = Row::from_line("a\t\tb\t\t");
        assert_eq!(row.values(), ["a", "", "b", "", ""]);
        assert_eq!(row.to_line(), "a\t\tb\t\t");
    }

    #[test]
    fn empty_line_is_one_empty_field() {
        assert_eq!(Row::from_line("").len(), 1);
    }

    #[test]
    fn strips_carriage_return() {
        assert_eq!(Row::from_line("x\ty\r").values(), ["x", "y"]);
    }

    #[test]
    fn detects_raw_separators() {
        let row = Row::from(vec!["ok", "bad\nvalue"]);
        assert_eq!(row.find_unescaped(), Some(1));
    }
}
