//! Mindscope - Mental-health prevalence dashboard
//!
//! Builds every dashboard view for a selection and writes the charts to disk.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mindscope::charts::{StaticChartRenderer, ViewOutcome};
use mindscope::config::DashboardConfig;
use mindscope::dashboard::{Dashboard, ForecastSelection, View};
use mindscope::data::DatasetCache;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mindscope", about = "Global mental-health dashboard renderer")]
struct Cli {
    /// JSON config file; command-line values take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the source CSV files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where chart images and payloads are written.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Comma-separated country names.
    #[arg(long, value_delimiter = ',')]
    countries: Option<Vec<String>>,

    /// Inclusive year range, e.g. 1995..2019.
    #[arg(long)]
    years: Option<String>,

    /// Comma-separated disorder labels; an empty value selects none.
    #[arg(long, value_delimiter = ',')]
    disorders: Option<Vec<String>>,

    #[arg(long)]
    forecast_country: Option<String>,

    /// Two comma-separated forecast disorder labels.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    forecast_disorders: Option<Vec<String>>,

    /// Print the selectable countries and exit.
    #[arg(long)]
    list_countries: bool,
}

fn parse_years(text: &str) -> Result<(i64, i64)> {
    let (lo, hi) = text
        .split_once("..")
        .with_context(|| format!("expected LO..HI, got '{}'", text))?;
    let lo = lo.trim().parse().with_context(|| format!("bad start year '{}'", lo))?;
    let hi = hi.trim().parse().with_context(|| format!("bad end year '{}'", hi))?;
    Ok((lo, hi))
}

fn apply_overrides(cli: Cli, mut config: DashboardConfig) -> Result<DashboardConfig> {
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.out_dir {
        config.out_dir = dir;
    }
    if let Some(countries) = cli.countries {
        config.countries = countries
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }
    if let Some(years) = cli.years {
        config.years = parse_years(&years)?;
    }
    if let Some(disorders) = cli.disorders {
        config.disorders = disorders
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
    }
    if let Some(country) = cli.forecast_country {
        config.forecast_country = country;
    }
    if let Some(pair) = cli.forecast_disorders {
        let [first, second] = <[String; 2]>::try_from(pair)
            .map_err(|p| anyhow::anyhow!("--forecast-disorders needs two labels, got {}", p.len()))?;
        config.forecast_disorders = (first, second);
    }
    Ok(config)
}

fn report(view: &View) {
    match &view.outcome {
        ViewOutcome::Chart(_) => {}
        ViewOutcome::Preview(table) => println!("== {} ==\n{}", view.title, table),
        ViewOutcome::Warning(w) => {
            warn!(view = %view.id, "{}", w.message());
            println!("[{}] {}", view.title, w.message());
        }
        ViewOutcome::Failed(message) => {
            error!(view = %view.id, %message, "view unavailable");
            println!("[{}] unavailable: {}", view.title, message);
        }
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    let list_only = cli.list_countries;
    let base = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    let config = apply_overrides(cli, base)?;
    let mut spec = config.filter_spec()?;

    let cache = DatasetCache::new(config.sources());
    let dashboard = Dashboard::new(&cache, &config);

    match dashboard.selectable_countries() {
        Ok(countries) => {
            if list_only {
                for c in &countries {
                    println!("{}", c);
                }
                return Ok(());
            }
            spec.countries.retain(|c| {
                let known = countries.binary_search(c).is_ok();
                if !known {
                    warn!(country = %c, "country not available in every dataset; ignored");
                }
                known
            });
        }
        Err(e) if list_only => bail!("cannot list countries: {}", e),
        Err(e) => warn!(error = %e, "country intersection unavailable; selection not validated"),
    }
    for label in &spec.disorders {
        if !dashboard.historical_catalog().contains(label) {
            warn!(disorder = %label, "unknown disorder; known: {:?}", dashboard.historical_catalog().labels());
        }
    }

    let mut views = dashboard.overview(&spec)?;

    let country = match dashboard.default_forecast_country() {
        Ok(Some(c)) => c,
        Ok(None) => config.forecast_country.clone(),
        Err(e) => {
            warn!(error = %e, "forecast countries unavailable");
            config.forecast_country.clone()
        }
    };
    let (first, second) = &config.forecast_disorders;
    views.extend(dashboard.forecast_comparison(&ForecastSelection::new(country, first, second))?);

    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("creating {}", config.out_dir.display()))?;

    let payloads: Vec<_> = views
        .iter()
        .filter_map(|v| match &v.outcome {
            ViewOutcome::Chart(p) => Some((v.id.clone(), p.clone())),
            _ => None,
        })
        .collect();
    for view in &views {
        report(view);
    }

    let mut failures = 0;
    for (name, result) in StaticChartRenderer::render_all(&payloads, &config.out_dir, config.image_size) {
        match result {
            Ok(rendered) => println!(
                "{}: {}{}",
                name,
                rendered.json.display(),
                rendered
                    .png
                    .map(|p| format!(", {}", p.display()))
                    .unwrap_or_default()
            ),
            Err(e) => {
                failures += 1;
                error!(view = %name, error = %e, "render failed");
            }
        }
    }

    info!(
        views = views.len(),
        charts = payloads.len(),
        failures,
        out_dir = %config.out_dir.display(),
        "dashboard written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_ranges() {
        assert_eq!(parse_years("1995..2019").unwrap(), (1995, 2019));
        assert_eq!(parse_years(" 2000 .. 2005 ").unwrap(), (2000, 2005));
        assert!(parse_years("1995-2019").is_err());
        assert!(parse_years("abc..2019").is_err());
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "mindscope",
            "--countries",
            "Brazil, Chad",
            "--years",
            "2000..2010",
            "--disorders",
            "",
            "--forecast-disorders",
            "Anxiety,Schizophrenia",
        ]);
        let cfg = apply_overrides(cli, DashboardConfig::default()).unwrap();
        assert_eq!(cfg.countries, vec!["Brazil", "Chad"]);
        assert_eq!(cfg.years, (2000, 2010));
        assert!(cfg.disorders.is_empty());
        assert_eq!(
            cfg.forecast_disorders,
            ("Anxiety".to_string(), "Schizophrenia".to_string())
        );
    }

    #[test]
    fn forecast_pair_must_have_two_labels() {
        let cli = Cli::parse_from(["mindscope", "--forecast-disorders", "Anxiety"]);
        assert!(apply_overrides(cli, DashboardConfig::default()).is_err());
    }
}
