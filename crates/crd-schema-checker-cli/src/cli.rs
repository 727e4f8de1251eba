use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

pub const CONFIG_ENV_VAR: &str = "CRD_SCHEMA_CHECKER_CONFIG";

/// Checks CustomResourceDefinitions for changes which break existing clients
/// or stored objects.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Configuration file to disable comparators and override cost budgets.
    ///
    /// Defaults to `.crd-schema-checker.yaml` in the working directory, if it
    /// exists.
    #[arg(long, global = true, value_name = "FILE", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Format of the report written to stdout.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Format of the log written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare the existing revisions of CRDs with new ones.
    Compare(CompareArguments),

    /// Run the checks which apply to a single revision against new CRDs.
    Validate(ValidateArguments),

    /// List all comparators.
    List,
}

#[derive(Debug, Args)]
pub struct CompareArguments {
    /// YAML files holding the currently deployed CRDs.
    #[arg(long, value_name = "FILE", required = true, num_args = 1..)]
    pub existing: Vec<PathBuf>,

    /// YAML files holding the proposed CRDs.
    #[arg(long, value_name = "FILE", required = true, num_args = 1..)]
    pub new: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArguments {
    /// YAML files holding the CRDs to validate.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use rstest::rstest;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compare() {
        let cli = Cli::try_parse_from([
            "crd-schema-checker",
            "compare",
            "--existing",
            "a.yaml",
            "b.yaml",
            "--new",
            "c.yaml",
            "--output-format",
            "json",
        ])
        .expect("arguments must parse");

        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.log_format, LogFormat::Plain);

        let Command::Compare(arguments) = cli.command else {
            panic!("expected the compare command");
        };
        assert_eq!(
            arguments.existing,
            vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]
        );
        assert_eq!(arguments.new, vec![PathBuf::from("c.yaml")]);
    }

    #[test]
    fn compare_requires_both_sides() {
        let error = Cli::try_parse_from(["crd-schema-checker", "compare", "--new", "c.yaml"])
            .expect_err("--existing is missing");

        assert_eq!(error.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[rstest]
    #[case(OutputFormat::Text, "text")]
    #[case(OutputFormat::Json, "json")]
    fn output_format_round_trips(#[case] format: OutputFormat, #[case] value: &str) {
        assert_eq!(format.to_string(), value);

        let cli = Cli::try_parse_from(["crd-schema-checker", "list", "--output-format", value])
            .expect("arguments must parse");
        assert_eq!(cli.output_format, format);
    }
}
