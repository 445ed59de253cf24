mod render;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use geofinance::analysis::adhoc::{PairWith, TestRequest};
use geofinance::analysis::align::AnnualAggregation;
use geofinance::analysis::compare::ComparisonOptions;
use geofinance::analysis::stats::TestKind;
use geofinance::config::Config;
use geofinance::data::filter::Selection;
use geofinance::data::loader;
use geofinance::session::Session;

#[derive(Parser)]
#[command(author, version, about = "Market history vs. macroeconomic indicators", long_about = None)]
struct Cli {
    /// Directory holding the data files (GEOFINANCE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Market history file, relative to the data directory
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Macro indicator file, relative to the data directory
    #[arg(long, global = true)]
    macro_file: Option<PathBuf>,

    /// Print results as pretty JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Country and year filters shared by the indicator commands.
#[derive(clap::Args)]
struct Filters {
    /// ISO3 code; repeat for several countries (default: all)
    #[arg(long = "country")]
    countries: Vec<String>,

    /// First year, inclusive
    #[arg(long)]
    from: Option<i32>,

    /// Last year, inclusive
    #[arg(long)]
    to: Option<i32>,
}

impl Filters {
    fn selection(&self) -> Selection {
        Selection::all()
            .with_countries(&self.countries)
            .with_years(self.from, self.to)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Countries and years covered by each dataset
    Coverage,
    /// Annual market performance against a macro indicator
    Compare {
        /// Indicator code or name (default: GDP growth, GEOFINANCE_INDICATOR)
        #[arg(long)]
        indicator: Option<String>,

        /// How daily prices become one value per year (GEOFINANCE_AGGREGATION)
        #[arg(long, value_enum)]
        aggregation: Option<AnnualAggregation>,

        #[command(flatten)]
        filters: Filters,
    },
    /// Per-country summary of one indicator and a comparison between countries
    Explore {
        #[arg(long)]
        indicator: String,

        #[command(flatten)]
        filters: Filters,
    },
    /// Linear trend of one indicator per country
    Trend {
        #[arg(long)]
        indicator: String,

        #[command(flatten)]
        filters: Filters,
    },
    /// Correlation matrix between the indicators of one country
    Correlations {
        #[arg(long)]
        country: String,

        /// Number of strongest pairs to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Latest asset metrics, or metrics inside a date window
    Metrics {
        /// Window start (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Window end (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// ISO3 code; repeat for several countries
        #[arg(long = "country")]
        countries: Vec<String>,
    },
    /// Run a single statistical test
    Test {
        #[arg(long = "test", value_enum)]
        kind: TestKind,

        /// Indicator code or name
        #[arg(long)]
        indicator: String,

        /// Pair with a second indicator instead of the market history
        #[arg(long)]
        indicator_b: Option<String>,

        #[arg(long, value_enum)]
        aggregation: Option<AnnualAggregation>,

        #[command(flatten)]
        filters: Filters,
    },
    /// Columns, types and row count of a data file
    Inspect { file: PathBuf },
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(file) = cli.history {
        config.history_file = file;
    }
    if let Some(file) = cli.macro_file {
        config.macro_file = file;
    }
    let json = cli.json;
    let session = Session::new(config);

    match cli.command {
        Commands::Coverage => {
            let coverage = session.coverage()?;
            print(json, &coverage, render::coverage)
        }
        Commands::Compare {
            indicator,
            aggregation,
            filters,
        } => {
            let options = ComparisonOptions {
                indicator: indicator.unwrap_or_else(|| session.config().indicator.clone()),
                aggregation: aggregation.unwrap_or(session.config().aggregation),
                selection: filters.selection(),
            };
            let comparison = session
                .compare(&options)
                .with_context(|| format!("comparing against {}", options.indicator))?;
            print(json, &comparison, render::comparison)
        }
        Commands::Explore { indicator, filters } => {
            let exploration = session.explore(&indicator, &filters.selection())?;
            print(json, &exploration, render::exploration)
        }
        Commands::Trend { indicator, filters } => {
            let report = session.trends(&indicator, &filters.selection())?;
            print(json, &report, render::trends)
        }
        Commands::Correlations { country, top } => {
            let matrix = session.correlations(&country)?;
            print(json, &matrix, |m| render::correlations(m, top))
        }
        Commands::Metrics {
            from,
            to,
            countries,
        } => {
            if from.is_none() && to.is_none() {
                let mut rows = session.snapshot()?;
                let selection = Selection::all().with_countries(&countries);
                if !selection.countries.is_empty() {
                    rows.retain(|r| selection.countries.contains(&r.country));
                }
                print(json, &rows, |r| render::snapshot(r))
            } else {
                let selection = Selection::all()
                    .with_countries(&countries)
                    .with_dates(from.unwrap_or(NaiveDate::MIN), to.unwrap_or(NaiveDate::MAX));
                let rows = session.period_metrics(&selection)?;
                print(json, &rows, |r| render::period(r))
            }
        }
        Commands::Test {
            kind,
            indicator,
            indicator_b,
            aggregation,
            filters,
        } => {
            let pair_with = match indicator_b {
                Some(other) => PairWith::Indicator(other),
                None => PairWith::Market(aggregation.unwrap_or(session.config().aggregation)),
            };
            let request = TestRequest {
                kind,
                indicator,
                pair_with,
                selection: filters.selection(),
            };
            let report = session
                .test(&request)
                .with_context(|| format!("running {kind} on {}", request.indicator))?;
            print(json, &report, render::test_report)
        }
        Commands::Inspect { file } => {
            let info = loader::inspect(&file)?;
            print(json, &info, render::table_info)
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
