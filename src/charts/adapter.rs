//! Presentation Adapter Module
//! Binds reshaped tables to chart encodings and decides warn-vs-render.

use crate::data::{ColumnKind, Table};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Chart family requested by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Scatter,
    /// Map coloured by value; `x` holds full country names.
    Choropleth,
    Bar,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Choropleth => "choropleth",
            ChartKind::Bar => "bar",
        };
        write!(f, "{}", name)
    }
}

/// Which encoding channel a column is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingRole {
    X,
    Y,
    Color,
    Hover,
}

impl fmt::Display for EncodingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingRole::X => "x",
            EncodingRole::Y => "y",
            EncodingRole::Color => "color",
            EncodingRole::Hover => "hover",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Encoding '{role}' refers to missing column '{column}'")]
    MissingColumn { role: EncodingRole, column: String },
    #[error("Encoding '{role}' column '{column}' must be {expected}")]
    WrongKind {
        role: EncodingRole,
        column: String,
        expected: &'static str,
    },
}

/// Abstract encodings of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingSpec {
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub hover: Option<String>,
    pub title: String,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub markers: bool,
}

impl EncodingSpec {
    pub fn new(x: impl Into<String>, y: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            color: None,
            hover: None,
            title: title.into(),
            x_label: None,
            y_label: None,
            markers: false,
        }
    }

    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.color = Some(column.into());
        self
    }

    pub fn hover(mut self, column: impl Into<String>) -> Self {
        self.hover = Some(column.into());
        self
    }

    pub fn axis_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn markers(mut self) -> Self {
        self.markers = true;
        self
    }
}

/// Backend-agnostic chart input: kind, bindings and the data behind them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub kind: ChartKind,
    pub encoding: EncodingSpec,
    pub data: Table,
}

/// One named (x, y) series.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl ChartPayload {
    /// Split numeric (x, y) points by the color column, in first-appearance order.
    /// Rows with a missing coordinate are skipped.
    pub fn series(&self) -> Vec<Series> {
        let (Ok(x), Ok(y)) = (
            self.data.column_index(&self.encoding.x),
            self.data.column_index(&self.encoding.y),
        ) else {
            return Vec::new();
        };
        let color = self
            .encoding
            .color
            .as_deref()
            .and_then(|c| self.data.column_index(c).ok());

        let mut series: Vec<Series> = Vec::new();
        for row in self.data.rows() {
            let (Some(px), Some(py)) = (row[x].as_f64(), row[y].as_f64()) else {
                continue;
            };
            let name = match color {
                Some(c) => row[c].to_string(),
                None => self.encoding.y.clone(),
            };
            match series.iter_mut().find(|s| s.name == name) {
                Some(s) => s.points.push((px, py)),
                None => series.push(Series {
                    name,
                    points: vec![(px, py)],
                }),
            }
        }
        series
    }

    /// (label, value) pairs for categorical charts, skipping missing values.
    pub fn categories(&self) -> Vec<(String, f64)> {
        let (Ok(x), Ok(y)) = (
            self.data.column_index(&self.encoding.x),
            self.data.column_index(&self.encoding.y),
        ) else {
            return Vec::new();
        };
        self.data
            .rows()
            .iter()
            .filter_map(|r| r[y].as_f64().map(|v| (r[x].to_string(), v)))
            .collect()
    }
}

/// User-facing, non-error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewWarning {
    /// No disorder or no country selected.
    EmptySelection,
    /// Valid filters, but no rows matched.
    EmptyResult,
    /// The comparison view needs two different disorders.
    DuplicateDisorders,
}

impl ViewWarning {
    pub fn message(&self) -> &'static str {
        match self {
            ViewWarning::EmptySelection => {
                "Select at least one disorder and one country to display this view."
            }
            ViewWarning::EmptyResult => {
                "No data available for the selected countries and year range."
            }
            ViewWarning::DuplicateDisorders => {
                "Select two different disorders to compare predicted prevalence."
            }
        }
    }
}

/// What a view shows after the pipeline ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Chart(ChartPayload),
    /// Tabular preview of the data behind a chart.
    Preview(Table),
    Warning(ViewWarning),
    /// The view's data could not be loaded.
    Failed(String),
}

/// Maps reshaped tables onto chart payloads.
pub struct PresentationAdapter;

impl PresentationAdapter {
    /// Validate `encoding` against `table` and build the payload.
    pub fn to_chart_input(
        table: &Table,
        kind: ChartKind,
        encoding: EncodingSpec,
    ) -> Result<ChartPayload, EncodingError> {
        let x_kind = Self::bound_kind(table, EncodingRole::X, &encoding.x)?;
        let y_kind = Self::bound_kind(table, EncodingRole::Y, &encoding.y)?;
        if let Some(color) = &encoding.color {
            Self::bound_kind(table, EncodingRole::Color, color)?;
        }
        if let Some(hover) = &encoding.hover {
            Self::bound_kind(table, EncodingRole::Hover, hover)?;
        }

        if !y_kind.is_numeric() {
            return Err(EncodingError::WrongKind {
                role: EncodingRole::Y,
                column: encoding.y,
                expected: "numeric",
            });
        }
        match kind {
            ChartKind::Line | ChartKind::Scatter if !x_kind.is_numeric() => {
                return Err(EncodingError::WrongKind {
                    role: EncodingRole::X,
                    column: encoding.x,
                    expected: "numeric",
                });
            }
            ChartKind::Choropleth if x_kind != ColumnKind::Text => {
                return Err(EncodingError::WrongKind {
                    role: EncodingRole::X,
                    column: encoding.x,
                    expected: "country names",
                });
            }
            _ => {}
        }

        Ok(ChartPayload {
            kind,
            encoding,
            data: table.clone(),
        })
    }

    /// Build the payload, or a warning when there is nothing to draw.
    ///
    /// Encoding errors are reported even for empty tables.
    pub fn present(
        table: &Table,
        kind: ChartKind,
        encoding: EncodingSpec,
    ) -> Result<ViewOutcome, EncodingError> {
        let payload = Self::to_chart_input(table, kind, encoding)?;
        if payload.data.is_empty() {
            return Ok(ViewOutcome::Warning(ViewWarning::EmptyResult));
        }
        Ok(ViewOutcome::Chart(payload))
    }

    fn bound_kind(table: &Table, role: EncodingRole, column: &str) -> Result<ColumnKind, EncodingError> {
        table
            .column_def(column)
            .map(|d| d.kind)
            .map_err(|_| EncodingError::MissingColumn {
                role,
                column: column.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ColumnDef, Value};

    fn long() -> Table {
        Table::new(
            "global",
            vec![
                ColumnDef::new("Year", ColumnKind::Integer),
                ColumnDef::new("Disorder", ColumnKind::Text),
                ColumnDef::new("Prevalence (%)", ColumnKind::Float),
            ],
            vec![
                vec![Value::Int(2018), "Depression".into(), Value::Float(3.5)],
                vec![Value::Int(2019), "Depression".into(), Value::Float(3.6)],
                vec![Value::Int(2018), "Anxiety".into(), Value::Missing],
                vec![Value::Int(2019), "Anxiety".into(), Value::Float(4.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn missing_column_is_named() {
        let err = PresentationAdapter::to_chart_input(
            &long(),
            ChartKind::Line,
            EncodingSpec::new("Year", "Prevalence", "t"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EncodingError::MissingColumn {
                role: EncodingRole::Y,
                column: "Prevalence".into()
            }
        );
        assert!(err.to_string().contains("Prevalence"));

        let err = PresentationAdapter::to_chart_input(
            &long(),
            ChartKind::Line,
            EncodingSpec::new("Year", "Prevalence (%)", "t").color("Entity"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EncodingError::MissingColumn {
                role: EncodingRole::Color,
                ..
            }
        ));
    }

    #[test]
    fn choropleth_needs_text_locations() {
        let err = PresentationAdapter::to_chart_input(
            &long(),
            ChartKind::Choropleth,
            EncodingSpec::new("Year", "Prevalence (%)", "map"),
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::WrongKind { role: EncodingRole::X, .. }));
    }

    #[test]
    fn series_split_by_color_and_skip_missing() {
        let payload = PresentationAdapter::to_chart_input(
            &long(),
            ChartKind::Line,
            EncodingSpec::new("Year", "Prevalence (%)", "t").color("Disorder"),
        )
        .unwrap();
        let series = payload.series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "Depression");
        assert_eq!(series[0].points, vec![(2018.0, 3.5), (2019.0, 3.6)]);
        assert_eq!(series[1].points, vec![(2019.0, 4.0)]);
    }

    #[test]
    fn empty_table_becomes_warning_but_bad_encoding_still_fails() {
        let empty = long().empty_like();
        let outcome = PresentationAdapter::present(
            &empty,
            ChartKind::Line,
            EncodingSpec::new("Year", "Prevalence (%)", "t"),
        )
        .unwrap();
        assert_eq!(outcome, ViewOutcome::Warning(ViewWarning::EmptyResult));

        assert!(PresentationAdapter::present(
            &empty,
            ChartKind::Line,
            EncodingSpec::new("Year", "Nope", "t"),
        )
        .is_err());
    }

    #[test]
    fn payload_serializes_bindings_and_rows() {
        let payload = PresentationAdapter::to_chart_input(
            &long(),
            ChartKind::Bar,
            EncodingSpec::new("Disorder", "Prevalence (%)", "bars"),
        )
        .unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["encoding"]["x"], "Disorder");
        assert_eq!(json["data"]["rows"][2][2], serde_json::Value::Null);
        assert_eq!(payload.categories().len(), 3);
    }
}
