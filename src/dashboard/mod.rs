//! Dashboard module - the overview and forecast views
//!
//! Each view runs the load → filter → aggregate → reshape → present pipeline
//! on its own. A source that fails to load only turns the views depending on
//! it into `ViewOutcome::Failed`; configuration mistakes (bad encodings,
//! rename conflicts) are returned as errors.

mod forecast;
mod overview;

pub use forecast::ForecastSelection;

use crate::catalog::DisorderCatalog;
use crate::charts::{EncodingError, ViewOutcome};
use crate::config::DashboardConfig;
use crate::data::{
    DataLoader, DatasetCache, FilterEngine, FilterError, LoadError, SourceId, TableError,
};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl ViewError {
    /// Errors caused by the view definitions rather than by the data.
    fn is_configuration(&self) -> bool {
        matches!(
            self,
            ViewError::Encoding(_) | ViewError::Table(TableError::NameConflict(_))
        )
    }
}

/// One rendered (or warned) panel of the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub id: String,
    pub title: String,
    pub outcome: ViewOutcome,
}

/// Session-scoped view builder over the process-wide cache.
pub struct Dashboard<'a> {
    cache: &'a DatasetCache,
    config: &'a DashboardConfig,
    historical: DisorderCatalog,
    forecast: DisorderCatalog,
}

impl<'a> Dashboard<'a> {
    pub fn new(cache: &'a DatasetCache, config: &'a DashboardConfig) -> Self {
        Self {
            cache,
            config,
            historical: DisorderCatalog::historical(),
            forecast: DisorderCatalog::forecast(),
        }
    }

    /// Countries with data in the prevalence, DALY and forecast tables.
    pub fn selectable_countries(&self) -> Result<Vec<String>, ViewError> {
        let datasets = DataLoader::load(self.cache)?;
        let forecast = DataLoader::load_forecast(self.cache)?;
        Ok(FilterEngine::intersect_countries(&[
            datasets.prevalence.as_ref(),
            datasets.dalys.as_ref(),
            forecast.as_ref(),
        ])?)
    }

    /// Countries available in the forecast table, sorted.
    pub fn forecast_countries(&self) -> Result<Vec<String>, ViewError> {
        let forecast = self.cache.get(SourceId::Forecast)?;
        Ok(FilterEngine::countries(&forecast)?.into_iter().collect())
    }

    pub fn historical_catalog(&self) -> &DisorderCatalog {
        &self.historical
    }

    pub fn forecast_catalog(&self) -> &DisorderCatalog {
        &self.forecast
    }

    /// Turn a view result into a `View`, downgrading data errors to `Failed`.
    fn settle(
        id: impl Into<String>,
        title: impl Into<String>,
        result: Result<ViewOutcome, ViewError>,
    ) -> Result<View, ViewError> {
        let id = id.into();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                warn!(view = %id, error = %e, "view failed");
                ViewOutcome::Failed(e.to_string())
            }
        };
        Ok(View {
            id,
            title: title.into(),
            outcome,
        })
    }
}

/// Lowercase, dash-separated identifier for file names.
fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_file_safe() {
        assert_eq!(slug("Eating disorders"), "eating-disorders");
        assert_eq!(slug("Bipolar disorder (2020)"), "bipolar-disorder-2020");
    }

    #[test]
    fn load_errors_become_failed_views() {
        let err = ViewError::Load(LoadError::NotFound("x.csv".into()));
        let view = Dashboard::settle("v", "V", Err(err)).unwrap();
        assert!(matches!(view.outcome, ViewOutcome::Failed(ref m) if m.contains("x.csv")));

        let err = ViewError::Table(TableError::NameConflict("Year".into()));
        assert!(Dashboard::settle("v", "V", Err(err)).is_err());
    }
}
