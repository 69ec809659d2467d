use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kruize_e2e_core::client::http::HttpTransport;
use kruize_e2e_core::payload::experiment::Experiment;
use kruize_e2e_core::payload::results::ResultRecord;
use kruize_e2e_core::payload::{
    TemplateValue, TemplateVars, UPDATE_RESULTS_NAMESPACE_TEMPLATE, UPDATE_RESULTS_TEMPLATE,
};
use kruize_e2e_core::schema::{catalog, error_message};
use kruize_e2e_core::workflow::scenarios;
use kruize_e2e_core::{
    ClusterType, HarnessConfig, KruizeClient, Renderer, Report, Runner, Selection, Suite, Tag,
};

#[derive(Parser)]
#[command(name = "kruize-e2e", version, about = "End-to-end scenarios for the Kruize REST API")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run scenarios against a live service.
    Run {
        #[arg(long, value_enum, default_value_t = SuiteArg::All)]
        suite: SuiteArg,
        /// Only scenarios carrying one of these tags.
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<Tag>,
        /// Only scenarios whose name contains this.
        #[arg(long)]
        filter: Option<String>,
        /// Service base URL (overrides config file and KRUIZE_URL).
        #[arg(long)]
        url: Option<String>,
        #[arg(long, value_parser = parse_cluster_type)]
        cluster_type: Option<ClusterType>,
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        reco_wait_secs: Option<u64>,
        /// Where rendered payloads are written.
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },
    /// List scenarios.
    List {
        #[arg(long, value_enum, default_value_t = SuiteArg::All)]
        suite: SuiteArg,
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<Tag>,
    },
    /// Render an embedded payload template.
    Render {
        /// Template name, with or without `.json`.
        template: String,
        /// Placeholder value, `name=value`. Values are JSON when they parse
        /// as JSON, `omit` drops the key, anything else is a string.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Start from the default result record (results templates only).
        #[arg(long)]
        defaults: bool,
        /// Write here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a JSON document against a catalog schema.
    Validate {
        /// Catalog schema name, e.g. `list-recommendations`.
        schema: String,
        file: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SuiteArg {
    Remote,
    Local,
    All,
}

impl SuiteArg {
    fn suite(self) -> Option<Suite> {
        match self {
            SuiteArg::Remote => Some(Suite::Remote),
            SuiteArg::Local => Some(Suite::Local),
            SuiteArg::All => None,
        }
    }
}

fn parse_tag(raw: &str) -> Result<Tag, String> {
    raw.parse().map_err(|e: kruize_e2e_core::HarnessError| e.to_string())
}

fn parse_cluster_type(raw: &str) -> Result<ClusterType, String> {
    raw.parse().map_err(|e: kruize_e2e_core::HarnessError| e.to_string())
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            suite,
            tags,
            filter,
            url,
            cluster_type,
            config,
            reco_wait_secs,
            scratch_dir,
        } => {
            let mut config = match config {
                Some(path) => HarnessConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => HarnessConfig::default(),
            }
            .apply_env()
            .context("reading KRUIZE_* environment")?;
            if let Some(url) = url {
                config.base_url = url;
            }
            if let Some(cluster_type) = cluster_type {
                config.cluster_type = cluster_type;
            }
            if let Some(secs) = reco_wait_secs {
                config.recommendation_wait_secs = secs;
            }
            if let Some(dir) = scratch_dir {
                config.scratch_dir = dir;
            }
            let selection = Selection {
                suite: suite.suite(),
                tags,
                filter,
            };
            run(config, &selection)
        }
        Command::List { suite, tags } => {
            let selection = Selection {
                suite: suite.suite(),
                tags,
                filter: None,
            };
            let all = scenarios::all();
            for scenario in selection.apply(&all) {
                let tags: Vec<String> = scenario.tags.iter().map(ToString::to_string).collect();
                println!("{}\t{}\t{}", scenario.name, scenario.suite, tags.join(","));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Render {
            template,
            vars,
            defaults,
            out,
        } => {
            render(&template, &vars, defaults, out)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { schema, file } => validate(&schema, &file),
    }
}

fn run(config: HarnessConfig, selection: &Selection) -> Result<ExitCode> {
    let started = chrono::Local::now();
    info!(url = %config.base_url, cluster_type = %config.cluster_type, "starting run");
    let transport = HttpTransport::from_config(&config).context("building HTTP transport")?;
    let runner = Runner::new(KruizeClient::new(transport), config)?;

    let all = scenarios::all();
    let selected = selection.apply(&all);
    if selected.is_empty() {
        bail!("no scenario matches the selection");
    }
    let report = runner.run_all(selected);
    print_summary(&report, started);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(report: &Report, started: chrono::DateTime<chrono::Local>) {
    for failure in report.failures() {
        let reason = failure.error.as_ref().map(ToString::to_string).unwrap_or_default();
        println!("FAILED {}: {reason}", failure.name);
    }
    println!(
        "{} passed, {} failed in {:.1}s (started {}, finished {})",
        report.passed(),
        report.failed(),
        report.elapsed().as_secs_f64(),
        started.format("%Y-%m-%d %H:%M:%S"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    );
}

fn template_file(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    }
}

fn render(
    template: &str,
    overrides: &[(String, String)],
    defaults: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let template = template_file(template);
    let mut vars = if !defaults {
        TemplateVars::new()
    } else if template == UPDATE_RESULTS_TEMPLATE {
        ResultRecord::for_experiment(&Experiment::remote_container()).template_vars()?
    } else if template == UPDATE_RESULTS_NAMESPACE_TEMPLATE {
        ResultRecord::for_experiment(&Experiment::remote_namespace()).template_vars()?
    } else {
        bail!(
            "--defaults only applies to {UPDATE_RESULTS_TEMPLATE} and \
             {UPDATE_RESULTS_NAMESPACE_TEMPLATE}"
        );
    };
    for (name, raw) in overrides {
        vars.set(name.as_str(), TemplateValue::parse_literal(raw));
    }

    let renderer = Renderer::new()?;
    let payload = renderer
        .render(&template, &vars)
        .with_context(|| format!("rendering {template}"))?;
    let text = serde_json::to_string_pretty(&payload)?;
    match out {
        Some(path) => {
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "payload written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn validate(schema_name: &str, file: &Path) -> Result<ExitCode> {
    let schema = catalog::by_name(schema_name)?;
    let raw =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not JSON", file.display()))?;
    let violations = schema.validate(&document);
    if violations.is_empty() {
        println!("{}: valid {schema_name}", file.display());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}: {} violation(s)\n{}",
            file.display(),
            violations.len(),
            error_message(&violations)
        );
        Ok(ExitCode::FAILURE)
    }
}
