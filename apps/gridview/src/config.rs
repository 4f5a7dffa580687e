use std::time::Duration;

use grid_sync::region::DEFAULT_MAX_CELLS_PER_REGION;
use url::Url;

use crate::cli::ConnectionArgs;
use crate::error::ClientResult;

/// Layout and fetch tuning for a [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub min_cell_px: u32,
    pub gap_px: u32,
    pub max_cells_per_region: u64,
    /// Peer routes for timing queries; empty means ask the service.
    pub route_override: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_cell_px: 20,
            gap_px: 1,
            max_cells_per_region: DEFAULT_MAX_CELLS_PER_REGION,
            route_override: Vec::new(),
        }
    }
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub resource: String,
    pub refresh_interval: Duration,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_args(args: &ConnectionArgs) -> ClientResult<Self> {
        let base_url = Url::parse(args.server.trim())?;
        Ok(Self {
            base_url,
            resource: args.resource.trim_matches('/').to_string(),
            refresh_interval: Duration::from_millis(args.interval.max(1)),
            session: SessionConfig {
                min_cell_px: args.min_cell_px,
                gap_px: args.gap_px,
                max_cells_per_region: args.max_cells_per_region.max(1),
                route_override: normalize_routes(&args.routes),
            },
        })
    }

    /// Base URL without a trailing slash, ready for path joining.
    pub fn server_url(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

/// Trims entries and drops empty ones, so `--routes ""` means no override.
pub fn normalize_routes(routes: &[String]) -> Vec<String> {
    routes
        .iter()
        .map(|route| route.trim())
        .filter(|route| !route.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::ClientError;
    use clap::Parser;

    fn args(extra: &[&str]) -> ConnectionArgs {
        let mut argv = vec!["gridview"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().connection
    }

    #[test]
    fn resolves_defaults() {
        let config = Config::from_args(&args(&[])).unwrap();
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
        assert_eq!(config.resource, "grid-cell");
        assert_eq!(config.refresh_interval, Duration::from_millis(100));
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn blank_routes_mean_no_override() {
        let config = Config::from_args(&args(&["--routes", " a:1 ,,b:2"])).unwrap();
        assert_eq!(config.session.route_override, vec!["a:1", "b:2"]);
    }

    #[test]
    fn rejects_unparsable_server() {
        let err = Config::from_args(&args(&["--server", "not a url"])).unwrap_err();
        assert!(matches!(err, ClientError::Url(_)));
    }
}
