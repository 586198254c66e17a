//! Overview views: historical prevalence, maps, global trend, DALYs and treatment gap.

use super::{slug, Dashboard, View, ViewError};
use crate::catalog::{DALY_DEPRESSION_COLUMN, TREATMENT_COLUMN, TREATMENT_GAP_COLUMN};
use crate::charts::{ChartKind, EncodingSpec, PresentationAdapter, ViewOutcome, ViewWarning};
use crate::data::{
    Aggregator, DataProcessor, FilterEngine, FilterSpec, SortDirection, SourceId, Table,
    YearRange, ENTITY, YEAR,
};
use tracing::{info, warn};

const PREVALENCE: &str = "Prevalence (%)";
const DISORDER: &str = "Disorder";
const COUNTRY: &str = "Country";

/// Trend charts are drawn for the first two selected disorders, maps for the first three.
const MAX_TREND_CHARTS: usize = 2;
const MAX_MAPS: usize = 3;

/// Used by the global trend when nothing is selected.
const DEFAULT_TREND_DISORDERS: [&str; 2] = ["Depression", "Anxiety"];

impl Dashboard<'_> {
    /// Every overview view for `spec`, in display order.
    pub fn overview(&self, spec: &FilterSpec) -> Result<Vec<View>, ViewError> {
        let mut views = self.prevalence_trends(spec)?;
        views.extend(self.prevalence_maps(spec)?);
        views.push(Self::settle(
            "global-trend",
            "Global prevalence trend",
            self.global_trend(spec),
        )?);
        views.push(Self::settle(
            "prevalence-vs-dalys",
            "Prevalence vs. DALYs - Depression",
            self.prevalence_vs_dalys(spec),
        )?);
        views.push(Self::settle(
            "treatment-gap",
            format!("Top {} countries by mean treatment gap", self.config.top_n),
            self.treatment_gap_ranking(),
        )?);
        info!(views = views.len(), "overview built");
        Ok(views)
    }

    /// Known historical disorders of the selection, in selection order.
    fn selected_disorders(&self, spec: &FilterSpec) -> Vec<(String, &'static str)> {
        spec.disorders
            .iter()
            .filter_map(|label| match self.historical.column_for(label) {
                Some(column) => Some((label.clone(), column)),
                None => {
                    warn!(disorder = %label, "unknown disorder ignored");
                    None
                }
            })
            .collect()
    }

    /// One line chart per selected disorder (at most two), a series per country.
    pub fn prevalence_trends(&self, spec: &FilterSpec) -> Result<Vec<View>, ViewError> {
        let disorders = self.selected_disorders(spec);
        if disorders.is_empty() || spec.countries.is_empty() {
            return Ok(vec![View {
                id: "prevalence-trend".to_string(),
                title: "Prevalence of the selected disorders".to_string(),
                outcome: ViewOutcome::Warning(ViewWarning::EmptySelection),
            }]);
        }

        disorders
            .iter()
            .take(MAX_TREND_CHARTS)
            .map(|(label, column)| {
                let title = format!("{} - prevalence over the years", label);
                let result = self.prevalence_trend(spec, column, &title);
                Self::settle(format!("trend-{}", slug(label)), title, result)
            })
            .collect()
    }

    fn prevalence_trend(
        &self,
        spec: &FilterSpec,
        column: &str,
        title: &str,
    ) -> Result<ViewOutcome, ViewError> {
        let prevalence = self.cache.get(SourceId::Prevalence)?;
        let filtered =
            FilterEngine::filter_by_country_and_year(&prevalence, &spec.countries, spec.years)?;
        let trend = DataProcessor::rename_columns(
            &filtered.select(&[ENTITY, YEAR, column])?,
            &[(column, PREVALENCE)],
        )?;

        Ok(PresentationAdapter::present(
            &trend,
            ChartKind::Line,
            EncodingSpec::new(YEAR, PREVALENCE, title).color(ENTITY),
        )?)
    }

    /// Choropleth of the map year for the first three selected disorders.
    pub fn prevalence_maps(&self, spec: &FilterSpec) -> Result<Vec<View>, ViewError> {
        let disorders = self.selected_disorders(spec);
        if disorders.is_empty() || spec.countries.is_empty() {
            return Ok(vec![View {
                id: "prevalence-map".to_string(),
                title: format!("Prevalence in {}", self.config.map_year),
                outcome: ViewOutcome::Warning(ViewWarning::EmptySelection),
            }]);
        }

        disorders
            .iter()
            .take(MAX_MAPS)
            .map(|(label, column)| {
                let title = format!("{} - prevalence in {} (%)", label, self.config.map_year);
                let result = self.prevalence_map(spec, column, &title);
                Self::settle(format!("map-{}", slug(label)), title, result)
            })
            .collect()
    }

    fn prevalence_map(
        &self,
        spec: &FilterSpec,
        column: &str,
        title: &str,
    ) -> Result<ViewOutcome, ViewError> {
        let prevalence = self.cache.get(SourceId::Prevalence)?;
        let year = FilterEngine::filter_by_country_and_year(
            &prevalence,
            &spec.countries,
            YearRange::single(self.config.map_year),
        )?;
        let map = DataProcessor::rename_columns(
            &year.select(&[ENTITY, column])?,
            &[(ENTITY, COUNTRY), (column, PREVALENCE)],
        )?;

        Ok(PresentationAdapter::present(
            &map,
            ChartKind::Choropleth,
            EncodingSpec::new(COUNTRY, PREVALENCE, title).hover(COUNTRY),
        )?)
    }

    /// Mean prevalence over all countries per year, one series per disorder.
    fn global_trend(&self, spec: &FilterSpec) -> Result<ViewOutcome, ViewError> {
        let mut disorders = self.selected_disorders(spec);
        if disorders.is_empty() {
            disorders = DEFAULT_TREND_DISORDERS
                .iter()
                .filter_map(|l| self.historical.column_for(l).map(|c| (l.to_string(), c)))
                .collect();
        }

        let prevalence = self.cache.get(SourceId::Prevalence)?;
        let columns: Vec<&str> = disorders.iter().map(|(_, c)| *c).collect();
        let yearly = Aggregator::group_mean(&prevalence, YEAR, &columns)?;

        let pairs: Vec<(&str, &str)> = disorders.iter().map(|(l, c)| (*c, l.as_str())).collect();
        let labelled = DataProcessor::rename_columns(&yearly, &pairs)?;
        let label_pairs: Vec<(&str, &str)> =
            disorders.iter().map(|(l, _)| (l.as_str(), l.as_str())).collect();
        let long = DataProcessor::melt(&labelled, &[YEAR], &label_pairs, DISORDER, PREVALENCE)?;

        Ok(PresentationAdapter::present(
            &long,
            ChartKind::Line,
            EncodingSpec::new(YEAR, PREVALENCE, "Global trend in mental disorder prevalence")
                .color(DISORDER),
        )?)
    }

    /// Depression prevalence against its DALY rate for the selected countries and years.
    fn prevalence_vs_dalys(&self, spec: &FilterSpec) -> Result<ViewOutcome, ViewError> {
        if spec.countries.is_empty() {
            return Ok(ViewOutcome::Warning(ViewWarning::EmptySelection));
        }
        let Some(prevalence_column) = self.historical.column_for("Depression") else {
            return Ok(ViewOutcome::Warning(ViewWarning::EmptySelection));
        };

        let prevalence = self.cache.get(SourceId::Prevalence)?;
        let dalys = self.cache.get(SourceId::Dalys)?;
        let joined = Aggregator::join(&prevalence, &dalys, &[ENTITY, YEAR])?;
        let filtered =
            FilterEngine::filter_by_country_and_year(&joined, &spec.countries, spec.years)?;

        let x = joined_column(&filtered, prevalence.name(), prevalence_column);
        let y = joined_column(&filtered, dalys.name(), DALY_DEPRESSION_COLUMN);
        // Absent source columns are a data problem, not an encoding mistake.
        filtered.column_index(&x)?;
        filtered.column_index(&y)?;

        Ok(PresentationAdapter::present(
            &filtered,
            ChartKind::Scatter,
            EncodingSpec::new(x, y, "Prevalence vs. DALYs - Depression")
                .color(ENTITY)
                .axis_labels(PREVALENCE, "DALYs per 100k"),
        )?)
    }

    /// Countries with the largest mean treatment gap.
    fn treatment_gap_ranking(&self) -> Result<ViewOutcome, ViewError> {
        let treatment = self.cache.get(SourceId::TreatmentGap)?;
        let with_gap = DataProcessor::treatment_gap(
            &treatment,
            TREATMENT_COLUMN,
            TREATMENT_GAP_COLUMN,
            self.config.missing_treatment,
        )?;
        let top = Aggregator::top_n(
            &with_gap,
            ENTITY,
            TREATMENT_GAP_COLUMN,
            self.config.top_n,
            SortDirection::Descending,
        )?;

        Ok(PresentationAdapter::present(
            &top,
            ChartKind::Bar,
            EncodingSpec::new(
                ENTITY,
                TREATMENT_GAP_COLUMN,
                format!("Top {} countries by mean treatment gap", self.config.top_n),
            ),
        )?)
    }
}

/// Name of `column` after a join, which qualifies it when both sides had it.
fn joined_column(joined: &Table, source: &str, column: &str) -> String {
    let qualified = format!("{}.{}", source, column);
    if joined.has_column(&qualified) {
        qualified
    } else {
        column.to_string()
    }
}
