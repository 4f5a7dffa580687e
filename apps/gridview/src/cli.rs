use clap::{Args, Parser, Subcommand};
use grid_sync::CellStatus;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

use crate::logging::{self, LogConfig};

#[derive(Parser, Debug)]
#[command(
    name = "gridview",
    about = "Live viewport client for the distributed grid service",
    author,
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    #[arg(
        long,
        global = true,
        env = "GRIDVIEW_SERVER",
        default_value = "http://127.0.0.1:8080",
        help = "Base URL of the grid service"
    )]
    pub server: String,

    #[arg(
        long,
        global = true,
        env = "GRIDVIEW_RESOURCE",
        default_value = "grid-cell",
        help = "Resource path segment the endpoints live under"
    )]
    pub resource: String,

    #[arg(
        long,
        global = true,
        env = "GRIDVIEW_INTERVAL",
        value_name = "MS",
        default_value_t = 100,
        help = "Full refresh cadence in milliseconds"
    )]
    pub interval: u64,

    #[arg(
        long,
        global = true,
        env = "GRIDVIEW_ROUTES",
        value_name = "HOST:PORT",
        value_delimiter = ',',
        help = "Peer regions for timing queries, overriding GET /routes"
    )]
    pub routes: Vec<String>,

    #[arg(
        long = "min-cell-px",
        global = true,
        env = "GRIDVIEW_MIN_CELL_PX",
        default_value_t = 20
    )]
    pub min_cell_px: u32,

    #[arg(long = "gap-px", global = true, env = "GRIDVIEW_GAP_PX", default_value_t = 1)]
    pub gap_px: u32,

    #[arg(
        long = "max-cells-per-region",
        global = true,
        env = "GRIDVIEW_MAX_CELLS_PER_REGION",
        default_value_t = grid_sync::region::DEFAULT_MAX_CELLS_PER_REGION
    )]
    pub max_cells_per_region: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        global = true,
        env = "GRIDVIEW_LOG_LEVEL",
        default_value = "warn",
        help = "Verbosity of gridview and grid_sync (off, error, warn, info, debug, trace)"
    )]
    pub level: LevelFilter,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "GRIDVIEW_LOG_FILE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = logging::DEFAULT_LOG_FILE,
        help = "Write logs to a file instead of stderr (gridview.log when no path is given)"
    )]
    pub file: Option<PathBuf>,

    #[arg(
        long = "log-wire",
        global = true,
        env = "GRIDVIEW_LOG_WIRE",
        help = "Also log HTTP requests and stream connections"
    )]
    pub wire: bool,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
            wire: self.wire,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow a viewport live (default when no subcommand given)
    Watch(WatchArgs),
    /// Fill an inclusive rectangle with one status
    Fill(FillArgs),
    /// Print the cross-region latency timeline for one cell
    Timing(TimingArgs),
    /// Print the region label reported by the service
    Region,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[arg(long, default_value_t = 1200, help = "Render area width in pixels")]
    pub width: u32,

    #[arg(long, default_value_t = 800, help = "Render area height in pixels")]
    pub height: u32,

    #[arg(long = "origin-x", allow_negative_numbers = true, help = "Initial origin column")]
    pub origin_x: Option<i64>,

    #[arg(long = "origin-y", allow_negative_numbers = true, help = "Initial origin row")]
    pub origin_y: Option<i64>,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            origin_x: None,
            origin_y: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FillArgs {
    #[arg(allow_negative_numbers = true)]
    pub x1: i64,
    #[arg(allow_negative_numbers = true)]
    pub y1: i64,
    #[arg(allow_negative_numbers = true)]
    pub x2: i64,
    #[arg(allow_negative_numbers = true)]
    pub y2: i64,
    /// Status name or key (red, r, inactive, d, ...)
    pub status: CellStatus,
}

#[derive(Args, Debug, Clone)]
pub struct TimingArgs {
    /// Cell id, `{row}x{col}`
    #[arg(allow_hyphen_values = true)]
    pub id: String,
}
