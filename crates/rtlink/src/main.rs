mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use rtlink_transport::DEFAULT_DEVICE_PATH;

use crate::cmd::{Command, LinkArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rtlink", version, about = "Coprocessor link CLI")]
struct Cli {
    /// Coprocessor character device.
    #[arg(
        long,
        value_name = "PATH",
        default_value = DEFAULT_DEVICE_PATH,
        env = "RTLINK_DEVICE",
        global = true
    )]
    device: PathBuf,

    /// JSON link configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let link = LinkArgs {
        device: cli.device,
        config: cli.config,
    };
    let result = cmd::run(cli.command, &link, format);

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
    use rtlink_frame::CommandSelector;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "rtlink",
            "--device",
            "/tmp/tty-test",
            "send",
            "set-param",
            "--param-id",
            "2",
            "--value",
            "50",
        ])
        .expect("send args should parse");

        assert_eq!(cli.device, PathBuf::from("/tmp/tty-test"));
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.selector, CommandSelector::SetParam);
                assert_eq!(args.param_id, 2);
                assert_eq!(args.value, 50.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_accepts_numeric_selector() {
        let cli = Cli::try_parse_from(["rtlink", "send", "8"]).expect("numeric selector");
        assert!(matches!(
            cli.command,
            Command::Send(ref args) if args.selector == CommandSelector::RequestArray
        ));
    }

    #[test]
    fn rejects_unknown_selector() {
        let err = Cli::try_parse_from(["rtlink", "send", "launch"])
            .expect_err("unknown selector should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_monitor_subcommand() {
        let cli = Cli::try_parse_from([
            "rtlink", "monitor", "--count", "3", "--signal", "err", "--start",
        ])
        .expect("monitor args should parse");
        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.count, Some(3));
                assert!(args.start);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
