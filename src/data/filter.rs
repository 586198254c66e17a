//! Filter Engine Module
//! Country / year / disorder selection applied to immutable tables.

use crate::data::loader::{ENTITY, YEAR};
use crate::data::table::{Table, TableError};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid year range: {lo} > {hi}")]
    InvertedRange { lo: i64, hi: i64 },
    #[error("{0}")]
    Table(#[from] TableError),
}

/// Inclusive year interval with `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    lo: i64,
    hi: i64,
}

impl YearRange {
    pub fn new(lo: i64, hi: i64) -> Result<Self, FilterError> {
        if lo > hi {
            return Err(FilterError::InvertedRange { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn single(year: i64) -> Self {
        Self { lo: year, hi: year }
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn contains(&self, year: i64) -> bool {
        self.lo <= year && year <= self.hi
    }

    /// Clamp both ends into `bounds`; a range entirely outside collapses onto the nearest edge.
    pub fn clamp_to(&self, bounds: YearRange) -> YearRange {
        let lo = self.lo.clamp(bounds.lo, bounds.hi);
        let hi = self.hi.clamp(bounds.lo, bounds.hi);
        YearRange { lo, hi }
    }
}

/// The user's current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub countries: BTreeSet<String>,
    pub years: YearRange,
    /// Selection order matters: views take the first few.
    pub disorders: Vec<String>,
}

impl FilterSpec {
    pub fn new<C, D>(countries: C, years: YearRange, disorders: D) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for d in disorders {
            let d = d.into();
            if !unique.contains(&d) {
                unique.push(d);
            }
        }
        Self {
            countries: countries.into_iter().map(Into::into).collect(),
            years,
            disorders: unique,
        }
    }
}

/// Stateless row filters. Every function returns a new table.
pub struct FilterEngine;

impl FilterEngine {
    /// Rows with `Entity` in `countries` and `Year` in `years`, original order kept.
    pub fn filter_by_country_and_year(
        table: &Table,
        countries: &BTreeSet<String>,
        years: YearRange,
    ) -> Result<Table, FilterError> {
        let entity = table.column_index(ENTITY)?;
        let year = table.column_index(YEAR)?;

        let rows: Vec<_> = table
            .rows()
            .iter()
            .filter(|r| {
                r[entity].as_str().is_some_and(|e| countries.contains(e))
                    && r[year].as_i64().is_some_and(|y| years.contains(y))
            })
            .cloned()
            .collect();

        debug!(
            table = table.name(),
            before = table.row_count(),
            after = rows.len(),
            "country/year filter"
        );
        Ok(table.with_rows(rows))
    }

    /// Rows for a single year.
    pub fn filter_year(table: &Table, year: i64) -> Result<Table, FilterError> {
        let idx = table.column_index(YEAR)?;
        let rows = table
            .rows()
            .iter()
            .filter(|r| r[idx].as_i64() == Some(year))
            .cloned()
            .collect();
        Ok(table.with_rows(rows))
    }

    /// Rows for a single entity.
    pub fn filter_entity(table: &Table, entity: &str) -> Result<Table, FilterError> {
        let idx = table.column_index(ENTITY)?;
        let rows = table
            .rows()
            .iter()
            .filter(|r| r[idx].as_str() == Some(entity))
            .cloned()
            .collect();
        Ok(table.with_rows(rows))
    }

    /// Distinct entities of one table, sorted.
    pub fn countries(table: &Table) -> Result<BTreeSet<String>, FilterError> {
        Ok(table
            .column(ENTITY)?
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    /// Entities present in every table, sorted. No tables means no countries.
    pub fn intersect_countries(tables: &[&Table]) -> Result<Vec<String>, FilterError> {
        let mut iter = tables.iter();
        let Some(first) = iter.next() else {
            return Ok(Vec::new());
        };

        let mut common = Self::countries(first)?;
        for table in iter {
            let other = Self::countries(table)?;
            common.retain(|c| other.contains(c));
        }
        Ok(common.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::{ColumnDef, ColumnKind, Value};

    fn prevalence(rows: &[(&str, i64, f64)]) -> Table {
        Table::new(
            "prevalence",
            vec![
                ColumnDef::new(ENTITY, ColumnKind::Text),
                ColumnDef::new(YEAR, ColumnKind::Integer),
                ColumnDef::new("Depression", ColumnKind::Float),
            ],
            rows.iter()
                .map(|(e, y, v)| vec![Value::from(*e), Value::Int(*y), Value::Float(*v)])
                .collect(),
        )
        .unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            YearRange::new(2019, 1990).unwrap_err(),
            FilterError::InvertedRange { lo: 2019, hi: 1990 }
        );
    }

    #[test]
    fn clamp_keeps_order() {
        let bounds = YearRange::new(1990, 2019).unwrap();
        let r = YearRange::new(1980, 2030).unwrap().clamp_to(bounds);
        assert_eq!((r.lo(), r.hi()), (1990, 2019));
        let r = YearRange::new(2025, 2030).unwrap().clamp_to(bounds);
        assert_eq!((r.lo(), r.hi()), (2019, 2019));
    }

    #[test]
    fn keeps_matching_rows_in_order() {
        let t = prevalence(&[
            ("India", 2019, 3.1),
            ("Brazil", 1990, 4.0),
            ("Chad", 2019, 2.0),
            ("Brazil", 2019, 4.2),
        ]);
        let out = FilterEngine::filter_by_country_and_year(
            &t,
            &set(&["Brazil", "India"]),
            YearRange::single(2019),
        )
        .unwrap();

        let entities: Vec<_> = out
            .column(ENTITY)
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(entities, vec!["India", "Brazil"]);
    }

    #[test]
    fn full_selection_is_identity() {
        let t = prevalence(&[("India", 2019, 3.1), ("Brazil", 1990, 4.0)]);
        let all = FilterEngine::countries(&t).unwrap();
        let out = FilterEngine::filter_by_country_and_year(
            &t,
            &all,
            YearRange::new(1990, 2019).unwrap(),
        )
        .unwrap();
        assert_eq!(out, t);
    }

    #[test]
    fn no_match_gives_empty_table_with_schema() {
        let t = prevalence(&[("India", 2019, 3.1)]);
        let out =
            FilterEngine::filter_by_country_and_year(&t, &set(&["Peru"]), YearRange::single(2019))
                .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.column_names(), t.column_names());
    }

    #[test]
    fn intersection_is_sorted_commutative_and_idempotent() {
        let a = prevalence(&[("India", 2019, 3.1), ("Brazil", 2019, 4.2), ("Chad", 2019, 1.0)]);
        let b = prevalence(&[("Chad", 2019, 1.0), ("India", 2018, 3.0), ("Peru", 2019, 2.0)]);

        let ab = FilterEngine::intersect_countries(&[&a, &b]).unwrap();
        let ba = FilterEngine::intersect_countries(&[&b, &a]).unwrap();
        assert_eq!(ab, vec!["Chad", "India"]);
        assert_eq!(ab, ba);

        let aa = FilterEngine::intersect_countries(&[&a, &a]).unwrap();
        assert_eq!(aa, FilterEngine::intersect_countries(&[&a]).unwrap());
        assert_eq!(aa, vec!["Brazil", "Chad", "India"]);
        assert!(FilterEngine::intersect_countries(&[]).unwrap().is_empty());
    }

    #[test]
    fn single_value_filters() {
        let t = prevalence(&[("India", 2019, 3.1), ("Brazil", 2018, 4.0), ("Brazil", 2019, 4.2)]);
        assert_eq!(FilterEngine::filter_year(&t, 2019).unwrap().row_count(), 2);
        let brazil = FilterEngine::filter_entity(&t, "Brazil").unwrap();
        assert_eq!(brazil.row_count(), 2);
        assert!(FilterEngine::filter_entity(&t, "Peru").unwrap().is_empty());
    }

    #[test]
    fn disorder_selection_drops_duplicates_keeping_order() {
        let spec = FilterSpec::new(
            ["Brazil"],
            YearRange::single(2019),
            ["Anxiety", "Depression", "Anxiety"],
        );
        assert_eq!(spec.disorders, vec!["Anxiety", "Depression"]);
    }
}
