use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cdu_grid::CellOrder;

use crate::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "cdu-bridge",
    about = "Drive CDU character displays from simulator telemetry",
    author,
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        env = "CDU_LOG_LEVEL",
        default_value_t = LogLevel::Info,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "CDU_LOG_FILE",
        help = "Write logs to the specified file instead of stderr"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render an annunciator page from named telemetry values
    Annunciator(AnnunciatorArgs),
    /// Mirror raw cockpit display memory onto the displays
    Mirror(MirrorArgs),
}

#[derive(Args, Debug)]
pub struct AnnunciatorArgs {
    #[arg(
        long,
        value_name = "PATH",
        env = "CDU_VALUES_FILE",
        help = "JSON file of named telemetry values, polled continuously"
    )]
    pub values: PathBuf,

    #[arg(
        long,
        value_name = "PATH",
        env = "CDU_LAYOUT",
        help = "Panel layout (TOML); defaults to the built-in EC135 MISC page"
    )]
    pub layout: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Captain display WebSocket URL")]
    pub captain_url: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "Also drive the first officer display at this URL"
    )]
    pub first_officer_url: Option<String>,

    #[arg(long, value_name = "MS", help = "Render tick in milliseconds")]
    pub tick_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct MirrorArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Raw display memory dump for the captain display"
    )]
    pub captain_buffer: Option<PathBuf>,

    #[arg(
        long = "fo-buffer",
        value_name = "PATH",
        help = "Raw display memory dump for the first officer display"
    )]
    pub first_officer_buffer: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Captain display WebSocket URL")]
    pub captain_url: Option<String>,

    #[arg(long = "fo-url", value_name = "URL", help = "First officer display WebSocket URL")]
    pub first_officer_url: Option<String>,

    #[arg(long, value_name = "N", help = "Connection attempts before giving up on a display")]
    pub max_retries: Option<u32>,

    #[arg(
        long,
        value_enum,
        default_value_t = CellOrderArg::RowMajor,
        help = "Record order of the source display memory"
    )]
    pub cell_order: CellOrderArg,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum CellOrderArg {
    #[default]
    RowMajor,
    ColumnMajor,
}

impl From<CellOrderArg> for CellOrder {
    fn from(arg: CellOrderArg) -> Self {
        match arg {
            CellOrderArg::RowMajor => CellOrder::RowMajor,
            CellOrderArg::ColumnMajor => CellOrder::ColumnMajor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mirror_subcommand() {
        let cli = Cli::try_parse_from([
            "cdu-bridge",
            "--log-level",
            "debug",
            "mirror",
            "--captain-buffer",
            "/tmp/cpt.bin",
            "--max-retries",
            "5",
            "--cell-order",
            "column-major",
        ])
        .expect("parse");
        assert_eq!(cli.logging.level, LogLevel::Debug);
        let Command::Mirror(args) = cli.command else {
            panic!("expected mirror");
        };
        assert_eq!(args.max_retries, Some(5));
        assert_eq!(CellOrder::from(args.cell_order), CellOrder::ColumnMajor);
        assert!(args.first_officer_buffer.is_none());
    }

    #[test]
    fn annunciator_requires_a_values_file() {
        assert!(Cli::try_parse_from(["cdu-bridge", "annunciator"]).is_err());
        let cli = Cli::try_parse_from([
            "cdu-bridge",
            "annunciator",
            "--values",
            "values.json",
            "--tick-ms",
            "250",
        ])
        .expect("parse");
        let Command::Annunciator(args) = cli.command else {
            panic!("expected annunciator");
        };
        assert_eq!(args.tick_ms, Some(250));
        assert!(args.layout.is_none());
    }
}
