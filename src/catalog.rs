//! Disorder Catalogs
//! Fixed display-label → column mappings for the historical and forecast tables.
//!
//! The catalogs do not share a key set (the bipolar entry is labelled
//! differently), so a label valid for one is not necessarily valid for the other.

/// DALY rate column used by the prevalence-vs-burden scatter.
pub const DALY_DEPRESSION_COLUMN: &str =
    "DALYs (rate) - Sex: Both - Age: Age-standardized - Cause: Depressive disorders";

/// Share of people with a disorder receiving potentially adequate treatment.
pub const TREATMENT_COLUMN: &str = "Potentially adequate treatment, conditional";

/// Derived column holding `100 - treatment`.
pub const TREATMENT_GAP_COLUMN: &str = "Treatment gap (%)";

/// Ordered, read-only mapping from a disorder label to its source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisorderCatalog {
    entries: &'static [(&'static str, &'static str)],
}

const HISTORICAL: &[(&str, &str)] = &[
    (
        "Depression",
        "Depressive disorders (share of population) - Sex: Both - Age: Age-standardized",
    ),
    (
        "Anxiety",
        "Anxiety disorders (share of population) - Sex: Both - Age: Age-standardized",
    ),
    (
        "Schizophrenia",
        "Schizophrenia disorders (share of population) - Sex: Both - Age: Age-standardized",
    ),
    (
        "Bipolar",
        "Bipolar disorders (share of population) - Sex: Both - Age: Age-standardized",
    ),
    (
        "Eating disorders",
        "Eating disorders (share of population) - Sex: Both - Age: Age-standardized",
    ),
];

const FORECAST: &[(&str, &str)] = &[
    ("Depression", "Pred_Prevalence_Depression"),
    ("Anxiety", "Pred_Prevalence_Anxiety"),
    ("Schizophrenia", "Pred_Prevalence_Schizophrenia"),
    ("Bipolar disorder", "Pred_Prevalence_Bipolar"),
    ("Eating disorders", "Pred_Prevalence_Eating"),
];

impl DisorderCatalog {
    /// Age-standardised prevalence columns of the 1990-2019 table.
    pub fn historical() -> Self {
        Self {
            entries: HISTORICAL,
        }
    }

    /// Predicted prevalence columns of the 2020-2040 table.
    pub fn forecast() -> Self {
        Self { entries: FORECAST }
    }

    pub fn column_for(&self, label: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| *c)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.column_for(label).is_some()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(l, _)| *l).collect()
    }

    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_resolve_their_own_labels() {
        let hist = DisorderCatalog::historical();
        assert_eq!(
            hist.column_for("Anxiety"),
            Some("Anxiety disorders (share of population) - Sex: Both - Age: Age-standardized")
        );
        assert_eq!(
            DisorderCatalog::forecast().column_for("Anxiety"),
            Some("Pred_Prevalence_Anxiety")
        );
    }

    #[test]
    fn bipolar_labels_are_not_shared() {
        let hist = DisorderCatalog::historical();
        let fc = DisorderCatalog::forecast();
        assert!(hist.contains("Bipolar") && !fc.contains("Bipolar"));
        assert!(fc.contains("Bipolar disorder") && !hist.contains("Bipolar disorder"));
        assert_eq!(hist.labels().len(), 5);
        assert_eq!(fc.labels()[0], "Depression");
    }
}
