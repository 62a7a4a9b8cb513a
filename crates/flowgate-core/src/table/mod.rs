//! Columns and tables over ragged, dynamically-typed JSON values.
//!
//! Mirrors the `dframe` package this system is modelled on: a [`Column`] is
//! an append-only sequence of [`serde_json::Value`]s with a nullable flag, an
//! optional formatter and a null placeholder; a [`Table`] owns a set of
//! uniquely-named columns that are kept length-reconciled (see
//! [`Table::append`]).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("column names must be unique within a table: '{0}' already exists")]
    DuplicateColumn(String),
    #[error("cannot expand column '{0}' because it is not nullable")]
    NotNullable(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// Renders a single cell value to its textual representation.
pub type StringFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

fn default_formatter(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A named, append-only, possibly-nullable sequence of JSON values.
#[derive(Clone)]
pub struct Column {
    name: String,
    nullable: bool,
    formatter: Option<StringFormatter>,
    nil_placeholder: String,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            formatter: None,
            nil_placeholder: String::new(),
            values: Vec::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_formatter(mut self, formatter: StringFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn with_nil_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.nil_placeholder = placeholder.into();
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pads the column with `Value::Null` up to `len`, failing if the column
    /// is not nullable and is actually shorter than `len`.
    fn pad_to(&mut self, len: usize) -> Result<(), TableError> {
        if self.values.len() >= len {
            return Ok(());
        }
        if !self.nullable {
            return Err(TableError::NotNullable(self.name.clone()));
        }
        self.values.resize(len, Value::Null);
        Ok(())
    }

    fn string_value(&self, index: usize) -> String {
        match &self.values[index] {
            Value::Null => self.nil_placeholder.clone(),
            other => match &self.formatter {
                Some(f) => f(other),
                None => default_formatter(other),
            },
        }
    }
}

/// An ordered set of uniquely-named, length-reconciled columns.
///
/// See SPEC_FULL.md §4.8 for the append/compact/select/limit algorithms;
/// all are implemented here exactly as specified.
#[derive(Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    name_index: HashMap<String, usize>,
    num_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> Result<Self, TableError> {
        let mut table = Self::new();
        for column in columns {
            table.append(column)?;
        }
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Appends `column`, reconciling its length against the table's current
    /// row count `R`:
    /// - first column appended sets `R`;
    /// - a shorter nullable column is padded with nulls up to `R`;
    /// - a shorter non-nullable column fails the append;
    /// - a longer column expands every existing nullable column up to its
    ///   length (failing if any existing column is non-nullable), then `R`
    ///   becomes the new column's length.
    pub fn append(&mut self, mut column: Column) -> Result<(), TableError> {
        if self.name_index.contains_key(&column.name) {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if self.columns.is_empty() {
            self.num_rows = column.values.len();
        } else if column.values.len() < self.num_rows {
            column.pad_to(self.num_rows)?;
        } else if column.values.len() > self.num_rows {
            let new_len = column.values.len();
            for existing in &mut self.columns {
                existing.pad_to(new_len)?;
            }
            self.num_rows = new_len;
        }
        self.name_index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Truncates all columns to the first `n` rows. A no-op if `n >=
    /// num_rows()`.
    pub fn limit(&mut self, n: usize) {
        if n >= self.num_rows {
            return;
        }
        for column in &mut self.columns {
            column.values.truncate(n);
        }
        self.num_rows = n;
    }

    /// Trims trailing rows in which every column's value is null. Idempotent
    /// and never increases the row count.
    pub fn compact(&mut self) {
        if self.num_rows == 0 {
            return;
        }
        let mut new_num_rows = self.num_rows;
        for i in (1..self.num_rows).rev() {
            let all_null = self.columns.iter().all(|c| c.values[i] == Value::Null);
            if all_null {
                new_num_rows = i;
            }
        }
        if new_num_rows != self.num_rows {
            self.limit(new_num_rows);
        }
    }

    /// Projects to `names`, in the given order, then compacts. A no-op
    /// (besides the always-run compact) iff `names` equals the current
    /// column name list in order.
    pub fn select(&mut self, names: &[&str]) -> Result<(), TableError> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let index = self
                .name_index
                .get(*name)
                .copied()
                .ok_or_else(|| TableError::UnknownColumn((*name).to_string()))?;
            columns.push(self.columns[index].clone());
        }
        self.columns = columns;
        self.name_index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        self.compact();
        Ok(())
    }

    /// Materialises an `R x C` grid of strings, applying each column's
    /// formatter (or the default textual representation) to each value, and
    /// the column's null placeholder to `Value::Null`.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        if self.num_rows == 0 {
            return Vec::new();
        }
        (0..self.num_rows)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| column.string_value(row))
                    .collect()
            })
            .collect()
    }
}
