//! Data Processor Module
//! Reshaping (melt / pivot / rename) and derived columns.

use crate::data::table::{ColumnDef, ColumnKind, Table, TableError, Value};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How a missing treatment share enters the treatment-gap column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTreatment {
    /// Missing counts as 0% treated, so the gap is 100%.
    #[default]
    AssumeUntreated,
    /// Missing treatment gives a missing gap.
    Propagate,
}

/// Hashable form of an id cell. Floats hash by bit pattern with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdCell {
    Text(String),
    Int(i64),
    Float(u64),
    Missing,
}

impl From<&Value> for IdCell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Text(s) => IdCell::Text(s.clone()),
            Value::Int(v) => IdCell::Int(*v),
            Value::Float(v) => IdCell::Float((*v + 0.0).to_bits()),
            Value::Missing => IdCell::Missing,
        }
    }
}

/// Handles reshaping and derived-column operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Transform wide value columns into long format.
    ///
    /// `value_columns` pairs each source column with the label written into the
    /// category column. Output columns: `[ids.., category_name, value_name]`,
    /// one row per (value column, input row) in value-column-major order.
    pub fn melt(
        table: &Table,
        id_columns: &[&str],
        value_columns: &[(&str, &str)],
        category_name: &str,
        value_name: &str,
    ) -> Result<Table, TableError> {
        let id_idx = id_columns
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sources = Vec::with_capacity(value_columns.len());
        for (column, label) in value_columns {
            let idx = table.column_index(column)?;
            if !table.columns()[idx].kind.is_numeric() {
                return Err(TableError::TypeMismatch {
                    column: column.to_string(),
                    expected: ColumnKind::Float,
                    found: "text".to_string(),
                });
            }
            sources.push((idx, *label));
        }

        let mut columns: Vec<ColumnDef> = id_idx.iter().map(|&i| table.columns()[i].clone()).collect();
        columns.push(ColumnDef::new(category_name, ColumnKind::Text));
        columns.push(ColumnDef::new(value_name, ColumnKind::Float));

        let mut rows = Vec::with_capacity(table.row_count() * sources.len());
        for (value_idx, label) in &sources {
            for row in table.rows() {
                let mut out: Vec<Value> = id_idx.iter().map(|&i| row[i].clone()).collect();
                out.push(Value::from(*label));
                out.push(row[*value_idx].clone());
                rows.push(out);
            }
        }

        let long = Table::new(table.name(), columns, rows)?;
        debug!(
            table = table.name(),
            wide_rows = table.row_count(),
            long_rows = long.row_count(),
            "melt"
        );
        Ok(long)
    }

    /// Inverse of [`DataProcessor::melt`]: one column per category value.
    ///
    /// Rows follow the first appearance of each id tuple and columns the first
    /// appearance of each category. Combinations never seen are `Missing`.
    pub fn pivot(
        table: &Table,
        id_columns: &[&str],
        category: &str,
        value: &str,
    ) -> Result<Table, TableError> {
        let id_idx = id_columns
            .iter()
            .map(|c| table.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let cat_idx = table.column_index(category)?;
        let val_idx = table.column_index(value)?;
        let value_kind = table.columns()[val_idx].kind;

        let mut categories: Vec<String> = Vec::new();
        let mut ids: Vec<Vec<Value>> = Vec::new();
        let mut slots: HashMap<Vec<IdCell>, usize> = HashMap::new();
        let mut cells: Vec<HashMap<String, Value>> = Vec::new();

        for row in table.rows() {
            let Some(cat) = row[cat_idx].as_str() else {
                continue;
            };
            if !categories.iter().any(|c| c == cat) {
                categories.push(cat.to_string());
            }

            let key: Vec<IdCell> = id_idx.iter().map(|&i| IdCell::from(&row[i])).collect();
            let slot = *slots.entry(key).or_insert_with(|| {
                ids.push(id_idx.iter().map(|&i| row[i].clone()).collect());
                cells.push(HashMap::new());
                ids.len() - 1
            });
            cells[slot].insert(cat.to_string(), row[val_idx].clone());
        }

        let mut columns: Vec<ColumnDef> = id_idx.iter().map(|&i| table.columns()[i].clone()).collect();
        columns.extend(categories.iter().map(|c| ColumnDef::new(c.clone(), value_kind)));

        let rows = ids
            .into_iter()
            .zip(cells)
            .map(|(mut row, mut by_cat)| {
                row.extend(
                    categories
                        .iter()
                        .map(|c| by_cat.remove(c).unwrap_or(Value::Missing)),
                );
                row
            })
            .collect();

        Table::new(table.name(), columns, rows)
    }

    /// One-to-one column rename.
    ///
    /// Fails with `NameConflict` if two columns would end up with the same name,
    /// and with `UnknownColumn` if a source column does not exist.
    pub fn rename_columns(table: &Table, mapping: &[(&str, &str)]) -> Result<Table, TableError> {
        let mut renames: HashMap<&str, &str> = HashMap::new();
        for (from, to) in mapping {
            table.column_index(from)?;
            if renames.insert(from, to).is_some_and(|prev| prev != *to) {
                return Err(TableError::NameConflict(from.to_string()));
            }
        }

        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(table.columns().len());
        for col in table.columns() {
            let name = renames
                .get(col.name.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| col.name.clone());
            if !seen.insert(name.clone()) {
                return Err(TableError::NameConflict(name));
            }
            names.push(name);
        }

        Ok(table.with_column_names(names))
    }

    /// Append `gap_column = 100 - treatment_column`.
    pub fn treatment_gap(
        table: &Table,
        treatment_column: &str,
        gap_column: &str,
        policy: MissingTreatment,
    ) -> Result<Table, TableError> {
        let idx = table.column_index(treatment_column)?;
        table.with_column(ColumnDef::new(gap_column, ColumnKind::Float), |row| {
            match (row[idx].as_f64(), policy) {
                (Some(treated), _) => Value::from(100.0 - treated),
                (None, MissingTreatment::AssumeUntreated) => Value::Float(100.0),
                (None, MissingTreatment::Propagate) => Value::Missing,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide() -> Table {
        Table::new(
            "forecast",
            vec![
                ColumnDef::new("Year", ColumnKind::Integer),
                ColumnDef::new("Pred_Prevalence_Depression", ColumnKind::Float),
                ColumnDef::new("Pred_Prevalence_Anxiety", ColumnKind::Float),
            ],
            vec![
                vec![Value::Int(2020), Value::Float(4.5), Value::Float(5.0)],
                vec![Value::Int(2021), Value::Float(4.6), Value::Missing],
                vec![Value::Int(2022), Value::Float(4.7), Value::Float(5.2)],
            ],
        )
        .unwrap()
    }

    const PAIRS: [(&str, &str); 2] = [
        ("Pred_Prevalence_Depression", "Depression"),
        ("Pred_Prevalence_Anxiety", "Anxiety"),
    ];

    #[test]
    fn melt_emits_k_times_r_rows_with_labels() {
        let long = DataProcessor::melt(&wide(), &["Year"], &PAIRS, "Disorder", "Prevalence").unwrap();

        assert_eq!(long.row_count(), 6);
        assert_eq!(long.column_names(), vec!["Year", "Disorder", "Prevalence"]);
        assert_eq!(
            long.rows()[0],
            vec![Value::Int(2020), Value::from("Depression"), Value::Float(4.5)]
        );
        assert_eq!(
            long.rows()[4],
            vec![Value::Int(2021), Value::from("Anxiety"), Value::Missing]
        );
    }

    #[test]
    fn pivot_recovers_the_renamed_wide_table() {
        let long = DataProcessor::melt(&wide(), &["Year"], &PAIRS, "Disorder", "Prevalence").unwrap();
        let back = DataProcessor::pivot(&long, &["Year"], "Disorder", "Prevalence").unwrap();
        let expected = DataProcessor::rename_columns(&wide(), &PAIRS).unwrap();
        assert_eq!(back, expected);
    }

    #[test]
    fn pivot_groups_repeated_ids_in_first_appearance_order() {
        let long = Table::new(
            "long",
            vec![
                ColumnDef::new("Entity", ColumnKind::Text),
                ColumnDef::new("Weight", ColumnKind::Float),
                ColumnDef::new("Disorder", ColumnKind::Text),
                ColumnDef::new("Value", ColumnKind::Float),
            ],
            vec![
                vec!["Chad".into(), Value::Float(1.0), "x".into(), Value::Float(1.0)],
                vec!["Peru".into(), Value::Float(2.0), "x".into(), Value::Float(2.0)],
                vec!["Chad".into(), Value::Float(1.0), "y".into(), Value::Float(3.0)],
            ],
        )
        .unwrap();

        let wide = DataProcessor::pivot(&long, &["Entity", "Weight"], "Disorder", "Value").unwrap();
        assert_eq!(wide.column_names(), vec!["Entity", "Weight", "x", "y"]);
        assert_eq!(
            wide.rows(),
            &[
                vec!["Chad".into(), Value::Float(1.0), Value::Float(1.0), Value::Float(3.0)],
                vec!["Peru".into(), Value::Float(2.0), Value::Float(2.0), Value::Missing],
            ]
        );
    }

    #[test]
    fn melt_rejects_text_value_columns() {
        let t = Table::new(
            "t",
            vec![
                ColumnDef::new("Entity", ColumnKind::Text),
                ColumnDef::new("Year", ColumnKind::Integer),
            ],
            vec![],
        )
        .unwrap();
        assert!(DataProcessor::melt(&t, &["Year"], &[("Entity", "E")], "c", "v").is_err());
    }

    #[test]
    fn rename_detects_conflicts() {
        let t = wide();
        let err = DataProcessor::rename_columns(
            &t,
            &[
                ("Pred_Prevalence_Depression", "Value"),
                ("Pred_Prevalence_Anxiety", "Value"),
            ],
        )
        .unwrap_err();
        assert_eq!(err, TableError::NameConflict("Value".into()));

        let err = DataProcessor::rename_columns(&t, &[("Pred_Prevalence_Anxiety", "Year")]).unwrap_err();
        assert_eq!(err, TableError::NameConflict("Year".into()));

        let err = DataProcessor::rename_columns(&t, &[("Code", "Iso")]).unwrap_err();
        assert_eq!(err, TableError::UnknownColumn("Code".into()));
    }

    #[test]
    fn rename_swaps_are_allowed() {
        let t = wide();
        let out = DataProcessor::rename_columns(
            &t,
            &[
                ("Pred_Prevalence_Depression", "Pred_Prevalence_Anxiety"),
                ("Pred_Prevalence_Anxiety", "Pred_Prevalence_Depression"),
            ],
        )
        .unwrap();
        assert_eq!(
            out.column_names(),
            vec!["Year", "Pred_Prevalence_Anxiety", "Pred_Prevalence_Depression"]
        );
        assert_eq!(out.rows(), t.rows());
    }

    #[test]
    fn treatment_gap_policies() {
        let t = Table::new(
            "treatment_gap",
            vec![
                ColumnDef::new("Entity", ColumnKind::Text),
                ColumnDef::new("Treated", ColumnKind::Float),
            ],
            vec![
                vec!["X".into(), Value::Missing],
                vec!["Y".into(), Value::Float(12.5)],
            ],
        )
        .unwrap();

        let gap = DataProcessor::treatment_gap(&t, "Treated", "Gap", MissingTreatment::AssumeUntreated)
            .unwrap();
        assert_eq!(gap.value(0, "Gap").unwrap(), Some(&Value::Float(100.0)));
        assert_eq!(gap.value(1, "Gap").unwrap(), Some(&Value::Float(87.5)));

        let gap = DataProcessor::treatment_gap(&t, "Treated", "Gap", MissingTreatment::Propagate).unwrap();
        assert_eq!(gap.value(0, "Gap").unwrap(), Some(&Value::Missing));
    }
}
