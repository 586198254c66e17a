//! Configuration Module
//! Dashboard defaults, optionally overridden by a JSON file and the command line.

use crate::data::{DataSources, FilterError, FilterSpec, MissingTreatment, SourceId, YearRange};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Filter(#[from] FilterError),
}

/// Explicit per-source paths; unset entries use the default file name in `data_dir`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceFiles {
    pub prevalence: Option<PathBuf>,
    pub dalys: Option<PathBuf>,
    pub treatment_gap: Option<PathBuf>,
    pub forecast: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub files: SourceFiles,
    pub out_dir: PathBuf,
    pub countries: Vec<String>,
    pub years: (i64, i64),
    /// Selectable range of the historical view.
    pub historical_years: (i64, i64),
    pub disorders: Vec<String>,
    pub map_year: i64,
    pub top_n: usize,
    pub forecast_country: String,
    pub forecast_disorders: (String, String),
    pub missing_treatment: MissingTreatment,
    pub image_size: (u32, u32),
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            files: SourceFiles::default(),
            out_dir: PathBuf::from("out"),
            countries: vec![
                "Brazil".to_string(),
                "India".to_string(),
                "United States".to_string(),
            ],
            years: (1995, 2019),
            historical_years: (1990, 2019),
            disorders: vec!["Depression".to_string(), "Anxiety".to_string()],
            map_year: 2019,
            top_n: 10,
            forecast_country: "Brazil".to_string(),
            forecast_disorders: ("Depression".to_string(), "Anxiety".to_string()),
            missing_treatment: MissingTreatment::default(),
            image_size: (1000, 600),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn sources(&self) -> DataSources {
        let mut sources = DataSources::in_dir(&self.data_dir);
        let explicit = [
            (SourceId::Prevalence, &self.files.prevalence),
            (SourceId::Dalys, &self.files.dalys),
            (SourceId::TreatmentGap, &self.files.treatment_gap),
            (SourceId::Forecast, &self.files.forecast),
        ];
        for (source, path) in explicit {
            if let Some(path) = path {
                sources = sources.with_path(source, path.clone());
            }
        }
        sources
    }

    pub fn historical_bounds(&self) -> Result<YearRange, FilterError> {
        YearRange::new(self.historical_years.0, self.historical_years.1)
    }

    /// The configured selection, with the year range clamped to the historical bounds.
    pub fn filter_spec(&self) -> Result<FilterSpec, ConfigError> {
        let years = YearRange::new(self.years.0, self.years.1)?.clamp_to(self.historical_bounds()?);
        Ok(FilterSpec::new(
            self.countries.iter().cloned(),
            years,
            self.disorders.iter().cloned(),
        ))
    }
}
