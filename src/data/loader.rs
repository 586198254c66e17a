//! CSV Data Loader Module
//! Reads the dashboard sources with Polars and converts them into typed tables.

use crate::data::table::{ColumnDef, ColumnKind, Table, TableError, Value};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ENTITY: &str = "Entity";
pub const YEAR: &str = "Year";

/// Identifier column present in some exports; never used downstream.
const DROPPED_COLUMN: &str = "Code";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("{source_name}: missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },
    #[error("{source_name}: column '{column}' has unsupported type {dtype}")]
    UnsupportedType {
        source_name: String,
        column: String,
        dtype: String,
    },
    #[error("{0}")]
    Table(#[from] TableError),
}

/// The four datasets the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    Prevalence,
    Dalys,
    TreatmentGap,
    Forecast,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::Prevalence,
        SourceId::Dalys,
        SourceId::TreatmentGap,
        SourceId::Forecast,
    ];

    /// File name used when no explicit path is configured.
    pub fn default_file_name(self) -> &'static str {
        match self {
            SourceId::Prevalence => "1-saude_mental.csv",
            SourceId::Dalys => "2-dalys.csv",
            SourceId::TreatmentGap => "5-gap_tratamento.csv",
            SourceId::Forecast => "previsoes_prevalencia_por_pais_2020_2040.csv",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            SourceId::Prevalence => "prevalence",
            SourceId::Dalys => "dalys",
            SourceId::TreatmentGap => "treatment_gap",
            SourceId::Forecast => "forecast",
        }
    }

    /// Key columns that must be present; rows missing any of them are dropped.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            SourceId::TreatmentGap => &[ENTITY],
            _ => &[ENTITY, YEAR],
        }
    }
}

/// Where each source lives on disk.
#[derive(Debug, Clone)]
pub struct DataSources {
    paths: HashMap<SourceId, PathBuf>,
}

impl DataSources {
    /// Every source under `dir` with its default file name.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let paths = SourceId::ALL
            .iter()
            .map(|&s| (s, dir.join(s.default_file_name())))
            .collect();
        Self { paths }
    }

    pub fn with_path(mut self, source: SourceId, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(source, path.into());
        self
    }

    pub fn path(&self, source: SourceId) -> PathBuf {
        self.paths
            .get(&source)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(source.default_file_name()))
    }
}

/// The three historical tables used by the overview.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub prevalence: Arc<Table>,
    pub dalys: Arc<Table>,
    pub treatment_gap: Arc<Table>,
}

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load the historical tables, reading each source once through `cache`.
    pub fn load(cache: &DatasetCache) -> Result<Datasets, LoadError> {
        Ok(Datasets {
            prevalence: cache.get(SourceId::Prevalence)?,
            dalys: cache.get(SourceId::Dalys)?,
            treatment_gap: cache.get(SourceId::TreatmentGap)?,
        })
    }

    /// Load the pre-computed 2020-2040 forecast table.
    pub fn load_forecast(cache: &DatasetCache) -> Result<Arc<Table>, LoadError> {
        cache.get(SourceId::Forecast)
    }

    /// Read one CSV file into a normalised table.
    pub fn load_csv(path: &Path, source: SourceId) -> Result<Table, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        let table = Self::from_dataframe(&df, source)?;
        info!(
            source = source.table_name(),
            path = %path.display(),
            rows = table.row_count(),
            columns = table.columns().len(),
            "loaded source"
        );
        Ok(table)
    }

    /// Convert a Polars frame into a typed table for `source`.
    pub fn from_dataframe(df: &DataFrame, source: SourceId) -> Result<Table, LoadError> {
        let source_name = source.table_name();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for required in source.required_columns() {
            if !names.iter().any(|n| n == required) {
                return Err(LoadError::MissingColumn {
                    source_name: source_name.to_string(),
                    column: required.to_string(),
                });
            }
        }

        let mut defs = Vec::new();
        let mut values: Vec<Vec<Value>> = Vec::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == DROPPED_COLUMN {
                continue;
            }
            let kind = Self::column_kind(&name, column.dtype()).ok_or_else(|| {
                LoadError::UnsupportedType {
                    source_name: source_name.to_string(),
                    column: name.clone(),
                    dtype: column.dtype().to_string(),
                }
            })?;
            values.push(Self::column_values(column, kind)?);
            defs.push(ColumnDef::new(name, kind));
        }

        let key_indices: Vec<usize> = source
            .required_columns()
            .iter()
            .filter_map(|k| defs.iter().position(|d| d.name == *k))
            .collect();

        let mut rows = vec![Vec::with_capacity(defs.len()); df.height()];
        for column in values {
            for (row, value) in rows.iter_mut().zip(column) {
                row.push(value);
            }
        }

        let before = rows.len();
        rows.retain(|r| key_indices.iter().all(|&i| !r[i].is_missing()));
        if rows.len() < before {
            warn!(
                source = source_name,
                dropped = before - rows.len(),
                "dropped rows with missing key values"
            );
        }

        Ok(Table::new(source_name, defs, rows)?)
    }

    /// Map a Polars dtype onto a column kind. `Year` is always integral.
    fn column_kind(name: &str, dtype: &DataType) -> Option<ColumnKind> {
        let numeric = matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        );

        match dtype {
            DataType::String if name != YEAR => Some(ColumnKind::Text),
            _ if name == ENTITY => None,
            _ if name == YEAR && numeric => Some(ColumnKind::Integer),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => Some(ColumnKind::Integer),
            // An all-empty column is inferred as Null.
            DataType::Float32 | DataType::Float64 | DataType::UInt64 | DataType::Null => {
                Some(ColumnKind::Float)
            }
            _ => None,
        }
    }

    fn column_values(column: &Column, kind: ColumnKind) -> Result<Vec<Value>, LoadError> {
        let values = match kind {
            ColumnKind::Text => {
                let ca = column.str()?;
                ca.into_iter()
                    .map(|v| v.map(|s| Value::Text(s.trim().to_string())).unwrap_or(Value::Missing))
                    .collect()
            }
            ColumnKind::Integer => {
                let as_i64 = column.cast(&DataType::Int64)?;
                let ca = as_i64.i64()?;
                ca.into_iter()
                    .map(|v| v.map(Value::Int).unwrap_or(Value::Missing))
                    .collect()
            }
            ColumnKind::Float => {
                let as_f64 = column.cast(&DataType::Float64)?;
                let ca = as_f64.f64()?;
                ca.into_iter().map(Value::from).collect()
            }
        };
        Ok(values)
    }
}

/// Process-wide table cache.
///
/// Each source is read at most once successfully for the lifetime of the
/// cache; later calls hand out the same `Arc<Table>`. Failed loads are not
/// remembered, so the error reaches every view that depends on the source.
pub struct DatasetCache {
    sources: DataSources,
    tables: Mutex<HashMap<SourceId, Arc<Table>>>,
    loads: AtomicUsize,
}

impl DatasetCache {
    pub fn new(sources: DataSources) -> Self {
        Self {
            sources,
            tables: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// Get the table for `source`, reading it on first use.
    pub fn get(&self, source: SourceId) -> Result<Arc<Table>, LoadError> {
        // The lock is held across the read so concurrent callers never load twice.
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = tables.get(&source) {
            debug!(source = source.table_name(), "cache hit");
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(DataLoader::load_csv(&self.sources.path(source), source)?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        tables.insert(source, Arc::clone(&table));
        Ok(table)
    }

    /// Number of source files actually read so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, source: SourceId, contents: &str) {
        fs::write(dir.path().join(source.default_file_name()), contents).unwrap();
    }

    #[test]
    fn drops_code_column_and_types_columns() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            SourceId::Prevalence,
            "Entity,Code,Year,Depression\nBrazil,BRA,2019,4.2\nIndia,IND,2019,\n",
        );

        let path = dir.path().join(SourceId::Prevalence.default_file_name());
        let table = DataLoader::load_csv(&path, SourceId::Prevalence).unwrap();

        assert_eq!(table.column_names(), vec!["Entity", "Year", "Depression"]);
        assert_eq!(table.column_def("Year").unwrap().kind, ColumnKind::Integer);
        assert_eq!(table.column_def("Depression").unwrap().kind, ColumnKind::Float);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, "Depression").unwrap(), Some(&Value::Float(4.2)));
        assert_eq!(table.value(1, "Depression").unwrap(), Some(&Value::Missing));
    }

    #[test]
    fn missing_year_column_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, SourceId::Dalys, "Entity,DALYs\nBrazil,1.0\n");
        let path = dir.path().join(SourceId::Dalys.default_file_name());

        let err = DataLoader::load_csv(&path, SourceId::Dalys).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingColumn { ref column, .. } if column == "Year"
        ));
    }

    #[test]
    fn treatment_gap_only_requires_entity() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            SourceId::TreatmentGap,
            "Entity,Code,Potentially adequate treatment\nBrazil,BRA,12.5\nChad,TCD,\n",
        );
        let path = dir.path().join(SourceId::TreatmentGap.default_file_name());

        let table = DataLoader::load_csv(&path, SourceId::TreatmentGap).unwrap();
        assert_eq!(
            table.column_names(),
            vec!["Entity", "Potentially adequate treatment"]
        );
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn default_paths_use_dataset_file_names() {
        let sources = DataSources::in_dir("data");
        assert_eq!(
            sources.path(SourceId::Prevalence),
            PathBuf::from("data/1-saude_mental.csv")
        );
        assert_eq!(sources.path(SourceId::Dalys), PathBuf::from("data/2-dalys.csv"));
        assert_eq!(
            sources.path(SourceId::TreatmentGap),
            PathBuf::from("data/5-gap_tratamento.csv")
        );
        assert_eq!(
            sources.path(SourceId::Forecast),
            PathBuf::from("data/previsoes_prevalencia_por_pais_2020_2040.csv")
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");
        let err = DataLoader::load_csv(&path, SourceId::Forecast).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn cache_reads_each_source_once() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            SourceId::Forecast,
            "Entity,Year,Pred_Prevalence_Depression\nBrazil,2020,4.5\n",
        );
        let cache = DatasetCache::new(DataSources::in_dir(dir.path()));

        let first = DataLoader::load_forecast(&cache).unwrap();
        let second = DataLoader::load_forecast(&cache).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(DataSources::in_dir(dir.path()));

        assert!(cache.get(SourceId::Dalys).is_err());
        write(&dir, SourceId::Dalys, "Entity,Year,DALYs\nBrazil,2019,1.0\n");
        assert_eq!(cache.get(SourceId::Dalys).unwrap().row_count(), 1);
        assert_eq!(cache.load_count(), 1);
    }
}
