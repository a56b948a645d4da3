mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "castr", version, about = "Multi-party recording session server")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "CASTR_LOG_LEVEL"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "castr",
            "serve",
            "--recording-dir",
            "/tmp/rec",
            "--port-start",
            "40000",
            "--port-len",
            "10",
            "--login-timeout",
            "5s",
        ])
        .expect("serve args should parse");

        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port_start, Some(40000));
                assert_eq!(args.port_len, Some(10));
                assert_eq!(args.login_timeout.as_deref(), Some("5s"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inspect_needs_a_file() {
        let err = Cli::try_parse_from(["castr", "inspect"]).expect_err("missing file should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_inspect_with_several_files() {
        let cli = Cli::try_parse_from([
            "castr",
            "--format",
            "json",
            "inspect",
            "1.ogg.header1",
            "1.ogg.header2",
            "1.ogg.data",
        ])
        .expect("inspect args should parse");
        match cli.command {
            Command::Inspect(args) => assert_eq!(args.files.len(), 3),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
