//! Table Module
//! Strongly-typed, immutable in-memory table used by every pipeline stage.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Column '{column}' expects {expected:?} values, found {found}")]
    TypeMismatch {
        column: String,
        expected: ColumnKind,
        found: String,
    },
    #[error("Column name conflict on '{0}'")]
    NameConflict(String),
}

/// Semantic type of a column, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the cell; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Missing => "missing",
        }
    }

    /// Coerce into `kind`, or `None` when the value cannot live in such a column.
    fn conform(self, kind: ColumnKind) -> Option<Value> {
        match (kind, self) {
            (_, Value::Missing) => Some(Value::Missing),
            (ColumnKind::Float, Value::Float(v)) if v.is_nan() => Some(Value::Missing),
            (ColumnKind::Float, Value::Float(v)) => Some(Value::Float(v)),
            (ColumnKind::Float, Value::Int(v)) => Some(Value::Float(v as f64)),
            (ColumnKind::Integer, Value::Int(v)) => Some(Value::Int(v)),
            (ColumnKind::Text, Value::Text(s)) => Some(Value::Text(s)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:.4}", v),
            Value::Missing => write!(f, "-"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Missing
        } else {
            Value::Float(v)
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::from).unwrap_or(Value::Missing)
    }
}

/// Column name plus semantic type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered rows over a fixed, typed column set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, validating row width and cell types against the schema.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
        }

        let width = columns.len();
        let mut checked = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(TableError::RowWidth {
                    row: i,
                    found: row.len(),
                    expected: width,
                });
            }
            let mut out = Vec::with_capacity(width);
            for (value, col) in row.into_iter().zip(&columns) {
                let found = value.type_name();
                match value.conform(col.kind) {
                    Some(v) => out.push(v),
                    None => {
                        return Err(TableError::TypeMismatch {
                            column: col.name.clone(),
                            expected: col.kind,
                            found: found.to_string(),
                        })
                    }
                }
            }
            checked.push(out);
        }

        Ok(Self {
            name: name.into(),
            columns,
            rows: checked,
        })
    }

    /// Empty table sharing this table's name and schema.
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// Keep the schema, replace the rows. Rows must come from a table with the same schema.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    pub fn column_def(&self, name: &str) -> Result<&ColumnDef, TableError> {
        let idx = self.column_index(name)?;
        Ok(&self.columns[idx])
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn value(&self, row: usize, column: &str) -> Result<Option<&Value>, TableError> {
        let idx = self.column_index(column)?;
        Ok(self.rows.get(row).map(|r| &r[idx]))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Project onto `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self, TableError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>, _>>()?;

        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();

        Self::new(self.name.clone(), columns, rows)
    }

    /// Drop `name` if present.
    pub fn drop_column(&self, name: &str) -> Self {
        let Ok(idx) = self.column_index(name) else {
            return self.clone();
        };
        let mut columns = self.columns.clone();
        columns.remove(idx);
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.remove(idx);
                r
            })
            .collect();
        Self {
            name: self.name.clone(),
            columns,
            rows,
        }
    }

    /// Append a column derived from each row.
    pub fn with_column<F>(&self, def: ColumnDef, derive: F) -> Result<Self, TableError>
    where
        F: Fn(&[Value]) -> Value,
    {
        if self.has_column(&def.name) {
            return Err(TableError::NameConflict(def.name));
        }
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut out = r.clone();
                out.push(derive(r));
                out
            })
            .collect();
        let mut columns = self.columns.clone();
        columns.push(def);
        Self::new(self.name.clone(), columns, rows)
    }

    /// Rename columns in place of their definitions; callers check conflicts.
    pub(crate) fn with_column_names(&self, names: Vec<String>) -> Self {
        let columns = self
            .columns
            .iter()
            .zip(names)
            .map(|(c, name)| ColumnDef::new(name, c.kind))
            .collect();
        Self {
            name: self.name.clone(),
            columns,
            rows: self.rows.clone(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c.name, w = w))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<w$}", v, w = w))
                .collect();
            writeln!(f, "{}", line.join(" | "))?;
        }
        Ok(())
    }
}
