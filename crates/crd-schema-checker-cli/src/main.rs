use std::path::PathBuf;

use clap::Parser;
use crd_schema_checker::{
    ComparatorRegistry,
    crd::{self, crd_name, load_crds, pair_crds},
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    cli::{Cli, Command, CompareArguments, OutputFormat, ValidateArguments},
    config::Config,
    logging::LogSettings,
    report::CrdReport,
};

mod cli;
mod config;
mod logging;
mod report;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitLogging { source: logging::Error },

    #[snafu(display("failed to determine the working directory"))]
    WorkingDirectory { source: std::io::Error },

    #[snafu(display("failed to load configuration"))]
    LoadConfig { source: config::Error },

    #[snafu(display("failed to load CRDs from {path}", path = path.display()))]
    LoadCrds { source: crd::Error, path: PathBuf },

    #[snafu(display("failed to render report"))]
    RenderReport { source: report::Error },

    #[snafu(display("found {count} problem(s) in {crds} CRD(s)"))]
    ProblemsFound { count: usize, crds: usize },
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let log_settings = LogSettings::builder().with_format(cli.log_format).build();
    logging::init(&log_settings).context(InitLoggingSnafu)?;

    let working_dir = std::env::current_dir().context(WorkingDirectorySnafu)?;
    let config = Config::resolve(cli.config.as_deref(), &working_dir).context(LoadConfigSnafu)?;
    let registry = config.registry().context(LoadConfigSnafu)?;

    let reports = match &cli.command {
        Command::Compare(arguments) => compare(&registry, arguments)?,
        Command::Validate(arguments) => validate(&registry, arguments)?,
        Command::List => {
            let output = report::render_comparators(&registry, cli.output_format)
                .context(RenderReportSnafu)?;
            print!("{output}");
            return Ok(());
        }
    };

    finish(&reports, cli.output_format)
}

fn compare(
    registry: &ComparatorRegistry,
    arguments: &CompareArguments,
) -> Result<Vec<CrdReport>, Error> {
    let existing = load_all(&arguments.existing)?;
    let new = load_all(&arguments.new)?;
    tracing::info!(existing = existing.len(), new = new.len(), "comparing CRDs");

    let reports = pair_crds(&existing, &new)
        .into_iter()
        .map(|(existing, new)| CrdReport {
            crd: crd_name(new).to_owned(),
            results: registry.compare(existing, new),
        })
        .collect();

    Ok(reports)
}

fn validate(
    registry: &ComparatorRegistry,
    arguments: &ValidateArguments,
) -> Result<Vec<CrdReport>, Error> {
    let crds = load_all(&arguments.files)?;
    tracing::info!(crds = crds.len(), "validating CRDs");

    // Without an existing revision the comparators only report what the
    // validators find.
    let reports = crds
        .iter()
        .map(|crd| CrdReport {
            crd: crd_name(crd).to_owned(),
            results: registry.compare(None, crd),
        })
        .collect();

    Ok(reports)
}

fn load_all(paths: &[PathBuf]) -> Result<Vec<CustomResourceDefinition>, Error> {
    let mut crds = Vec::new();

    for path in paths {
        crds.extend(load_crds(path).context(LoadCrdsSnafu { path })?);
    }

    Ok(crds)
}

fn finish(reports: &[CrdReport], format: OutputFormat) -> Result<(), Error> {
    let output = report::render(reports, format).context(RenderReportSnafu)?;
    print!("{output}");

    let count: usize = reports.iter().map(CrdReport::error_count).sum();
    let crds = reports.iter().filter(|report| report.error_count() > 0).count();
    ensure!(count == 0, ProblemsFoundSnafu { count, crds });

    Ok(())
}
