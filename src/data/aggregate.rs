//! Aggregator Module
//! Group-by means, top-N rankings and key joins over typed tables.

use crate::data::table::{ColumnDef, ColumnKind, Table, TableError, Value};
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Sort order for rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Hashable, ordered view of a key cell. Float columns cannot be keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum KeyPart {
    Int(i64),
    Text(String),
}

impl KeyPart {
    fn from_value(value: &Value) -> Option<KeyPart> {
        match value {
            Value::Int(v) => Some(KeyPart::Int(*v)),
            Value::Text(s) => Some(KeyPart::Text(s.clone())),
            _ => None,
        }
    }
}

fn key_column(table: &Table, name: &str) -> Result<(usize, ColumnDef), TableError> {
    let idx = table.column_index(name)?;
    let def = table.columns()[idx].clone();
    if def.kind == ColumnKind::Float {
        return Err(TableError::TypeMismatch {
            column: def.name,
            expected: ColumnKind::Text,
            found: "float".to_string(),
        });
    }
    Ok((idx, def))
}

/// Composite key of a row, or `None` if any key cell is missing.
fn row_key(row: &[Value], idx: &[usize]) -> Option<Vec<KeyPart>> {
    idx.iter().map(|&i| KeyPart::from_value(&row[i])).collect()
}

fn numeric_column(table: &Table, name: &str) -> Result<usize, TableError> {
    let idx = table.column_index(name)?;
    let kind = table.columns()[idx].kind;
    if !kind.is_numeric() {
        return Err(TableError::TypeMismatch {
            column: name.to_string(),
            expected: ColumnKind::Float,
            found: "text".to_string(),
        });
    }
    Ok(idx)
}

/// Relational aggregation operations.
pub struct Aggregator;

impl Aggregator {
    /// One row per distinct non-missing `key`, ascending, with the mean of each value column.
    ///
    /// Missing cells are left out of both numerator and denominator; a group with no
    /// present value yields `Missing`.
    pub fn group_mean(table: &Table, key: &str, value_columns: &[&str]) -> Result<Table, TableError> {
        let (key_idx, key_def) = key_column(table, key)?;
        let value_idx = value_columns
            .iter()
            .map(|c| numeric_column(table, c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups: BTreeMap<KeyPart, (Value, Vec<Vec<f64>>)> = BTreeMap::new();
        for row in table.rows() {
            let Some(k) = KeyPart::from_value(&row[key_idx]) else {
                continue;
            };
            let entry = groups
                .entry(k)
                .or_insert_with(|| (row[key_idx].clone(), vec![Vec::new(); value_idx.len()]));
            for (slot, &i) in entry.1.iter_mut().zip(&value_idx) {
                if let Some(v) = row[i].as_f64() {
                    slot.push(v);
                }
            }
        }

        let mut columns = vec![key_def];
        columns.extend(
            value_columns
                .iter()
                .map(|c| ColumnDef::new(*c, ColumnKind::Float)),
        );

        let rows = groups
            .into_values()
            .map(|(key_value, samples)| {
                let mut row = vec![key_value];
                row.extend(samples.into_iter().map(|s| {
                    if s.is_empty() {
                        Value::Missing
                    } else {
                        Value::from(s.mean())
                    }
                }));
                row
            })
            .collect();

        let out = Table::new(table.name(), columns, rows)?;
        debug!(table = table.name(), key, groups = out.row_count(), "group mean");
        Ok(out)
    }

    /// The first `n` groups of `group_mean(table, key, [value])` ordered by the mean.
    ///
    /// Missing means sort last in either direction; ties keep ascending key order.
    pub fn top_n(
        table: &Table,
        key: &str,
        value: &str,
        n: usize,
        direction: SortDirection,
    ) -> Result<Table, TableError> {
        let grouped = Self::group_mean(table, key, &[value])?;
        let mut rows = grouped.rows().to_vec();

        // Stable sort over key-ordered groups keeps ties in key order.
        rows.sort_by(|a, b| match (a[1].as_f64(), b[1].as_f64()) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        rows.truncate(n);

        Ok(grouped.with_rows(rows))
    }

    /// Inner join on `keys`, preserving `left`'s row order.
    ///
    /// Non-key columns present on both sides are renamed `<table>.<column>` on
    /// each side, or `<table>.left.<column>` / `<table>.right.<column>` when both
    /// tables share a name. Rows whose key has a missing cell never match.
    pub fn join(left: &Table, right: &Table, keys: &[&str]) -> Result<Table, TableError> {
        let left_keys = keys
            .iter()
            .map(|k| key_column(left, k).map(|(i, _)| i))
            .collect::<Result<Vec<_>, _>>()?;
        let right_keys = keys
            .iter()
            .map(|k| key_column(right, k).map(|(i, _)| i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut index: HashMap<Vec<KeyPart>, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows().iter().enumerate() {
            if let Some(k) = row_key(row, &right_keys) {
                index.entry(k).or_default().push(i);
            }
        }

        let left_names: HashSet<&str> = left.columns().iter().map(|c| c.name.as_str()).collect();
        let right_names: HashSet<&str> = right.columns().iter().map(|c| c.name.as_str()).collect();
        let (left_prefix, right_prefix) = if left.name() == right.name() {
            (format!("{}.left", left.name()), format!("{}.right", right.name()))
        } else {
            (left.name().to_string(), right.name().to_string())
        };
        let qualify = |prefix: &str, def: &ColumnDef, other: &HashSet<&str>| {
            if !keys.contains(&def.name.as_str()) && other.contains(def.name.as_str()) {
                ColumnDef::new(format!("{}.{}", prefix, def.name), def.kind)
            } else {
                def.clone()
            }
        };

        let right_extra: Vec<usize> = (0..right.columns().len())
            .filter(|i| !right_keys.contains(i))
            .collect();

        let mut columns: Vec<ColumnDef> = left
            .columns()
            .iter()
            .map(|c| qualify(&left_prefix, c, &right_names))
            .collect();
        columns.extend(
            right_extra
                .iter()
                .map(|&i| qualify(&right_prefix, &right.columns()[i], &left_names)),
        );

        let mut rows = Vec::new();
        for row in left.rows() {
            let Some(k) = row_key(row, &left_keys) else {
                continue;
            };
            let Some(matches) = index.get(&k) else {
                continue;
            };
            for &m in matches {
                let other = &right.rows()[m];
                let mut out = row.clone();
                out.extend(right_extra.iter().map(|&i| other[i].clone()));
                rows.push(out);
            }
        }

        let name = format!("{}+{}", left.name(), right.name());
        let out = Table::new(name, columns, rows)?;
        debug!(
            left = left.row_count(),
            right = right.row_count(),
            joined = out.row_count(),
            "inner join"
        );
        Ok(out)
    }
}
