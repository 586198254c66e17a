//! Forecast comparison: two predicted-prevalence series for one country, 2020-2040.

use super::{Dashboard, View, ViewError};
use crate::charts::{ChartKind, EncodingSpec, PresentationAdapter, ViewOutcome, ViewWarning};
use crate::data::{DataProcessor, FilterEngine, SourceId, YEAR};
use tracing::info;

const PREDICTED: &str = "Predicted prevalence";
const DISORDER: &str = "Disorder";

/// Country plus the two forecast disorders to compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastSelection {
    pub country: String,
    pub first: String,
    pub second: String,
}

impl ForecastSelection {
    pub fn new(
        country: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            first: first.into(),
            second: second.into(),
        }
    }
}

impl Dashboard<'_> {
    /// Configured forecast country if the table has it, else the first one alphabetically.
    pub fn default_forecast_country(&self) -> Result<Option<String>, ViewError> {
        let countries = self.forecast_countries()?;
        if countries.contains(&self.config.forecast_country) {
            return Ok(Some(self.config.forecast_country.clone()));
        }
        Ok(countries.into_iter().next())
    }

    /// Comparison chart and data preview for `selection`.
    pub fn forecast_comparison(&self, selection: &ForecastSelection) -> Result<Vec<View>, ViewError> {
        let title = format!(
            "Predicted prevalence: {} vs {} in {} (2020-2040)",
            selection.first, selection.second, selection.country
        );

        if selection.first == selection.second {
            return Ok(vec![View {
                id: "forecast-comparison".to_string(),
                title,
                outcome: ViewOutcome::Warning(ViewWarning::DuplicateDisorders),
            }]);
        }

        let (chart, preview) = match self.forecast_tables(selection, &title) {
            Ok((chart, preview)) => (Ok(chart), Ok(preview)),
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                let message = e.to_string();
                (Err(e), Ok(ViewOutcome::Failed(message)))
            }
        };

        let views = vec![
            Self::settle("forecast-comparison", title, chart)?,
            Self::settle("forecast-data", "Forecast data", preview)?,
        ];
        info!(country = %selection.country, "forecast comparison built");
        Ok(views)
    }

    fn forecast_tables(
        &self,
        selection: &ForecastSelection,
        title: &str,
    ) -> Result<(ViewOutcome, ViewOutcome), ViewError> {
        let (Some(first), Some(second)) = (
            self.forecast.column_for(&selection.first),
            self.forecast.column_for(&selection.second),
        ) else {
            let warning = ViewOutcome::Warning(ViewWarning::EmptySelection);
            return Ok((warning.clone(), warning));
        };

        let forecast = self.cache.get(SourceId::Forecast)?;
        let country = FilterEngine::filter_entity(&forecast, &selection.country)?;
        let (first_label, second_label) = (selection.first.as_str(), selection.second.as_str());
        let wide = DataProcessor::rename_columns(
            &country.select(&[YEAR, first, second])?,
            &[(first, first_label), (second, second_label)],
        )?;
        let long = DataProcessor::melt(
            &wide,
            &[YEAR],
            &[(first_label, first_label), (second_label, second_label)],
            DISORDER,
            PREDICTED,
        )?;

        let chart = PresentationAdapter::present(
            &long,
            ChartKind::Line,
            EncodingSpec::new(YEAR, PREDICTED, title)
                .color(DISORDER)
                .markers(),
        )?;
        let preview = if wide.is_empty() {
            ViewOutcome::Warning(ViewWarning::EmptyResult)
        } else {
            ViewOutcome::Preview(wide)
        };
        Ok((chart, preview))
    }
}
