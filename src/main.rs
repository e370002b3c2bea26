use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod charts_png;
mod cli_output;
mod config;
mod export;
mod filter;
mod loader;
mod normalizer;
mod record;
mod report;
mod session;
mod tui;
mod view;

use charts_png::ChartRenderer;
use cli_output::{OutputMode, OutputWriter};
use config::Config;
use filter::Dropdown;
use session::{Action, Dashboard};
use view::ChartEvent;

#[derive(Parser)]
#[command(name = "failboard")]
#[command(about = "Explore test-failure tickets: normalize errors, filter, drill down and export", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: <config dir>/failboard/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Filters shared by the non-interactive commands
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// First day of the date range (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last day of the date range (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Only this model
    #[arg(long)]
    model: Option<String>,

    /// Only this result
    #[arg(long)]
    result: Option<String>,

    /// Only this stage
    #[arg(long)]
    stage: Option<String>,

    /// Same as clicking a day on the trend chart
    #[arg(long)]
    date: Option<String>,

    /// Same as clicking a test-item bar
    #[arg(long)]
    test_item: Option<String>,

    /// Same as clicking a top-errors bar (canonical error label)
    #[arg(long)]
    error: Option<String>,

    /// Hierarchy node to drill into, components joined by '␞'
    #[arg(long)]
    path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dashboard for a ticket CSV
    Report {
        /// Ticket CSV file
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output format (auto, human, plain, json)
        #[arg(short, long, default_value = "auto")]
        format: String,
    },

    /// Export the filtered rows as CSV
    Export {
        /// Ticket CSV file
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output file (default: export_file_name from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render PNG charts of the filtered rows
    Charts {
        /// Ticket CSV file
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output directory
        #[arg(short, long, default_value = "failboard-charts")]
        output: PathBuf,

        /// Open the output directory when done
        #[arg(long)]
        open: bool,
    },

    /// Interactive linked dashboard
    Tui {
        /// Ticket CSV file
        input: PathBuf,
    },

    /// Print the canonical label for an error message
    Normalize {
        /// Raw error message
        message: String,

        /// Used when the message is empty
        #[arg(long)]
        fallback: Option<String>,

        /// Output format (auto, human, plain, json)
        #[arg(short, long, default_value = "auto")]
        format: String,
    },

    /// List the error normalization rules
    Rules {
        /// Output format (auto, human, plain, json)
        #[arg(short, long, default_value = "auto")]
        format: String,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct NormalizedMessage<'a> {
    message: &'a str,
    canonical: String,
    rule: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Tui { .. }, false) => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    debug!("Using config {:?}", config);

    match cli.command {
        Commands::Report {
            input,
            filters,
            format,
        } => {
            let out = OutputWriter::new(format.parse::<OutputMode>()?);
            let dashboard = open_dashboard(&input, &config, &filters)?;
            report::print_report(&out, &dashboard.refresh())
        }

        Commands::Export {
            input,
            filters,
            output,
        } => {
            let dashboard = open_dashboard(&input, &config, &filters)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&config.export_file_name));
            let filtered = dashboard.filtered();
            let written = export::export_to_file(
                &output,
                &dashboard.dataset().headers,
                &filtered,
                config.delimiter_byte(),
            )?;
            let out = OutputWriter::new(OutputMode::auto());
            out.success(&format!(
                "Exported {} of {} records to {}",
                written,
                dashboard.dataset().len(),
                output.display()
            ));
            Ok(())
        }

        Commands::Charts {
            input,
            filters,
            output,
            open,
        } => {
            let dashboard = open_dashboard(&input, &config, &filters)?;
            let view = dashboard.refresh();
            info!("Rendering charts for {} records", view.filtered_records);

            let out = OutputWriter::new(OutputMode::auto());
            let mut renderer = ChartRenderer::new(output.clone(), &config);
            if out.mode() != OutputMode::Human {
                renderer = renderer.without_progress();
            }
            let generated = renderer.render_all(&view.charts)?;
            out.section("Charts");
            for path in &generated {
                out.success(&path.display().to_string());
            }
            if open {
                open::that(&output)
                    .with_context(|| format!("Failed to open {}", output.display()))?;
            }
            Ok(())
        }

        Commands::Tui { input } => {
            let dataset = loader::load_file(&input)?;
            let dashboard = Dashboard::new(dataset, config.view_limits());
            tui::run_tui(dashboard, &config)
        }

        Commands::Normalize {
            message,
            fallback,
            format,
        } => {
            let out = OutputWriter::new(format.parse::<OutputMode>()?);
            let (canonical, rule) = normalizer::classify(Some(&message), fallback.as_deref());
            let rule = rule.map(|r| r.matcher.describe());
            if out.mode() == OutputMode::Json {
                out.emit_json(&NormalizedMessage {
                    message: &message,
                    canonical,
                    rule,
                })
            } else {
                println!("{}", canonical);
                if let Some(rule) = rule {
                    debug!("Matched rule {}", rule);
                }
                Ok(())
            }
        }

        Commands::Rules { format } => {
            let out = OutputWriter::new(format.parse::<OutputMode>()?);
            if out.mode() == OutputMode::Json {
                out.emit_json(&normalizer::rules())
            } else {
                out.block(&report::rules_table(normalizer::rules()).to_string());
                Ok(())
            }
        }

        Commands::Config { action } => {
            let out = OutputWriter::new(OutputMode::auto());
            match action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Path => {
                    println!("{}", config_path.display());
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        out.warning(&format!(
                            "{} already exists (use --force to overwrite)",
                            config_path.display()
                        ));
                    } else {
                        Config::default().save(&config_path)?;
                        out.success(&format!("Wrote {}", config_path.display()));
                    }
                }
            }
            Ok(())
        }
    }
}

/// Load `input` and apply the command-line filters
fn open_dashboard(input: &Path, config: &Config, filters: &FilterArgs) -> Result<Dashboard> {
    let dataset = loader::load_file(input)?;
    if dataset.unparsed_times > 0 {
        info!(
            "{} records have no usable fail_time and are left out of the trend",
            dataset.unparsed_times
        );
    }
    let mut dashboard = Dashboard::new(dataset, config.view_limits());
    for action in filters.actions()? {
        dashboard.dispatch(action);
    }
    Ok(dashboard)
}

impl FilterArgs {
    /// The dashboard actions these flags stand for, in application order
    fn actions(&self) -> Result<Vec<Action>> {
        let mut actions = Vec::new();

        if let Some(start) = &self.start {
            actions.push(Action::SetRangeStart(parse_day(start)?));
        }
        if let Some(end) = &self.end {
            actions.push(Action::SetRangeEnd(parse_day(end)?));
        }

        for (dropdown, value) in [
            (Dropdown::Model, &self.model),
            (Dropdown::Result, &self.result),
            (Dropdown::Stage, &self.stage),
        ] {
            if let Some(value) = value {
                actions.push(Action::SetDropdown(dropdown, Some(value.clone())));
            }
        }

        // The hierarchy path goes first so flat selections can refine it
        if let Some(id) = &self.path {
            actions.push(Action::Click(ChartEvent::SunburstNode { id: id.clone() }));
        }
        if let Some(date) = &self.date {
            parse_day(date)?;
            actions.push(Action::Click(ChartEvent::TimelinePoint { x: date.clone() }));
        }
        if let Some(item) = &self.test_item {
            actions.push(Action::Click(ChartEvent::TestItemBar { x: item.clone() }));
        }
        if let Some(error) = &self.error {
            actions.push(Action::Click(ChartEvent::ErrorBar { y: error.clone() }));
        }

        Ok(actions)
    }
}

fn parse_day(value: &str) -> Result<chrono::NaiveDate> {
    record::parse_date_key(value)
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}
