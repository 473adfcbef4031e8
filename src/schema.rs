//! Corpus schema: ordered field names plus fixed (corpus-level) metadata.
//!
//! # Schema file format
//!
//! ```text
//! title	vol	span	coord	unigram-counts
//! corpus-type	generic
//! split	training
//! ```
//!
//! The first line that is neither empty nor a `#` comment holds the
//! tab-separated field names. Every following non-empty line is a
//! `key<TAB>value` fixed-field assignment. Names, keys and values are escaped
//! with [`codec::escape`](crate::codec::escape), so any string survives a
//! write/read cycle.
//!
//! A [`Schema`] is immutable: the `with_*` methods return new instances.

use crate::codec::{escape, unescape};
use crate::error::{Result, TextdbError};
use crate::io::lines::{create_writer, open_reader};
use crate::row::Row;
use anyhow::Context;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

const COMMENT_PREFIX: char = '#';

/// Characters escaped in schema names and keys, on top of the always-escaped set.
const NAME_SPECIALS: [char; 1] = [COMMENT_PREFIX];

#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<String>,
    fixed_fields: BTreeMap<String, String>,
    index: HashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.fixed_fields == other.fixed_fields
    }
}

impl Eq for Schema {}

impl Schema {
    /// Build a schema from field names and fixed fields.
    ///
    /// Fails with [`TextdbError::SchemaFormat`] when the field list is empty, a
    /// name is empty, or a name appears twice.
    pub fn new<F, S, X, K, V>(fields: F, fixed_fields: X) -> Result<Self>
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
        X: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(TextdbError::schema("field list is empty"));
        }

        let mut index = HashMap::with_capacity(fields.len());
        for (idx, name) in fields.iter().enumerate() {
            if name.is_empty() {
                return Err(TextdbError::schema(format!("field #{} has an empty name", idx + 1)));
            }
            if index.insert(name.clone(), idx).is_some() {
                return Err(TextdbError::schema(format!("duplicate field name '{name}'")));
            }
        }

        let fixed_fields = fixed_fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Ok(Self {
            fields,
            fixed_fields,
            index,
        })
    }

    /// Build a schema without fixed fields.
    pub fn from_fields<F, S>(fields: F) -> Result<Self>
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(fields, std::iter::empty::<(String, String)>())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields, i.e. the number of values every row must carry.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fixed_fields(&self) -> &BTreeMap<String, String> {
        &self.fixed_fields
    }

    pub fn get_fixed_field(&self, key: &str) -> Option<&str> {
        self.fixed_fields.get(key).map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TextdbError::UnknownField(name.to_owned()))
    }

    /// Value of field `name` in `row`.
    pub fn get_field<'r>(&self, row: &'r Row, name: &str) -> Result<&'r str> {
        let idx = self.field_index(name)?;
        row.get(idx).ok_or(TextdbError::RowShape {
            expected: self.len(),
            found: row.len(),
        })
    }

    /// Like [`get_field`](Self::get_field), falling back to a fixed field of the same name.
    pub fn get_value<'a>(&'a self, row: &'a Row, name: &str) -> Result<&'a str> {
        match self.get_field(row, name) {
            Err(TextdbError::UnknownField(_)) => self
                .get_fixed_field(name)
                .ok_or_else(|| TextdbError::UnknownField(name.to_owned())),
            other => other,
        }
    }

    /// Check that `row` carries exactly one value per field.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() == self.len() {
            Ok(())
        } else {
            Err(TextdbError::RowShape {
                expected: self.len(),
                found: row.len(),
            })
        }
    }

    /// Split a data line and check it against this schema.
    pub fn parse_row(&self, line: &str) -> Result<Row> {
        let row = Row::from_line(line);
        self.check_row(&row)?;
        Ok(row)
    }

    /// Parse the contents of a schema file.
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: Option<Vec<String>> = None;
        let mut fixed = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            // Whitespace is data: a field may be named " ".
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
                continue;
            }

            let decode = |s: &str| {
                unescape(s).map_err(|e| TextdbError::schema(format!("line {line_no}: {e}")))
            };

            if fields.is_none() {
                fields = Some(line.split('\t').map(decode).collect::<Result<_>>()?);
                continue;
            }

            let mut parts = line.split('\t');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(TextdbError::schema(format!(
                    "line {line_no}: expected 'key<TAB>value', got {line:?}"
                )));
            };
            let key = decode(key)?;
            if fixed.contains_key(&key) {
                return Err(TextdbError::schema(format!(
                    "line {line_no}: duplicate fixed field '{key}'"
                )));
            }
            fixed.insert(key, decode(value)?);
        }

        let fields = fields.ok_or_else(|| TextdbError::schema("missing field list"))?;
        Self::new(fields, fixed)
    }

    /// Render the schema file contents; fixed fields are written in key order.
    pub fn to_schema_text(&self) -> String {
        let mut out = self
            .fields
            .iter()
            .map(|f| escape(f, &NAME_SPECIALS))
            .collect::<Vec<_>>()
            .join("\t");
        out.push('\n');
        for (key, value) in &self.fixed_fields {
            out.push_str(&escape(key, &NAME_SPECIALS));
            out.push('\t');
            out.push_str(&escape(value, &[]));
            out.push('\n');
        }
        out
    }

    /// Read a schema file; compressed schema files are decompressed by extension.
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut text = String::new();
        open_reader(path)?
            .read_to_string(&mut text)
            .with_context(|| format!("read schema {}", path.display()))?;
        let schema =
            Self::parse(&text).with_context(|| format!("parse schema {}", path.display()))?;
        Ok(schema)
    }

    /// Write the schema file, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut w = create_writer(path)?;
        w.write_all(self.to_schema_text().as_bytes())
            .and_then(|_| w.finish())
            .with_context(|| format!("write schema {}", path.display()))?;
        Ok(())
    }

    /// New schema with `names` appended after the existing fields.
    pub fn with_fields_added<I, S>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = self
            .fields
            .iter()
            .cloned()
            .chain(names.into_iter().map(Into::into));
        Self::new(fields, self.fixed_fields.clone())
    }

    /// New schema without `names`; every name must exist.
    pub fn with_fields_removed<I, S>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = HashSet::new();
        for name in names {
            let name = name.as_ref();
            self.field_index(name)?;
            removed.insert(name.to_owned());
        }
        let fields = self.fields.iter().filter(|f| !removed.contains(*f)).cloned();
        Self::new(fields, self.fixed_fields.clone())
    }

    /// New schema with fields renamed in place; every old name must exist.
    pub fn with_fields_renamed<I, K, V>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = self.fields.clone();
        for (old, new) in mapping {
            let idx = self.field_index(old.as_ref())?;
            fields[idx] = new.into();
        }
        Self::new(fields, self.fixed_fields.clone())
    }

    /// Same fields, with `overrides` laid over the fixed fields.
    pub fn clone_with_changes<I, K, V>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = self.clone();
        for (k, v) in overrides {
            out.fixed_fields.insert(k.into(), v.into());
        }
        out
    }

    /// Prepare a mapping from rows of this schema to rows of `target`.
    ///
    /// Every field of `target` must exist in this schema.
    pub fn projection(&self, target: &Schema) -> Result<Projection> {
        let indices = target
            .fields
            .iter()
            .map(|f| self.field_index(f))
            .collect::<Result<_>>()?;
        Ok(Projection {
            indices,
            source_len: self.len(),
        })
    }

    /// Reorder `row` into the field order of `target`.
    pub fn project_row(&self, row: &Row, target: &Schema) -> Result<Row> {
        self.projection(target)?.apply(row)
    }
}

/// Precomputed field mapping between two schemas, see [`Schema::projection`].
#[derive(Clone, Debug)]
pub struct Projection {
    indices: Vec<usize>,
    source_len: usize,
}

impl Projection {
    pub fn apply(&self, row: &Row) -> Result<Row> {
        if row.len() != self.source_len {
            return Err(TextdbError::RowShape {
                expected: self.source_len,
                found: row.len(),
            });
        }
        Ok(self
            .indices
            .iter()
            .map(|&idx| row.values()[idx].clone())
            .collect())
    }
}
