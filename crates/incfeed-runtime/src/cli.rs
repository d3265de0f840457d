//! CLI definition using clap derive.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use incfeed_core::config::NotifierConfig;
use incfeed_core::types::{Identity, Role};

#[derive(Parser)]
#[command(name = "incfeed", about = "Incidence update notifier", version)]
pub struct Cli {
    /// State database path (default: $XDG_STATE_HOME/incfeed/state.db)
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// Notifier config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run notifier tabs against the update feed
    Watch(WatchOpts),
    /// Show persisted cursor, primed marker and lease for an operator
    Status(StatusOpts),
    /// Forget everything persisted for an operator
    Logout(IdentityOpts),
}

#[derive(Args, Clone)]
pub struct IdentityOpts {
    /// Operator username
    #[arg(long, short = 'u', env = "INCFEED_USER")]
    pub user: String,

    /// Operator role (USUARIO, ADMIN, PRACTICANTE, ...)
    #[arg(long, short = 'r', env = "INCFEED_ROLE", default_value = "USUARIO")]
    pub role: String,
}

impl IdentityOpts {
    pub fn identity(&self) -> anyhow::Result<Identity> {
        Identity::new(&self.user, Role::parse(&self.role)).context("invalid operator")
    }
}

#[derive(Args, Clone)]
pub struct StatusOpts {
    #[command(flatten)]
    pub identity: IdentityOpts,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct WatchOpts {
    #[command(flatten)]
    pub identity: IdentityOpts,

    /// Number of tabs to run in this process
    #[arg(long, default_value = "1")]
    pub tabs: usize,

    /// Start this many of the tabs hidden; a hidden leader skips polls
    #[arg(long, default_value = "0")]
    pub hidden_tabs: usize,

    /// Base URL of the incidence API
    #[arg(long, env = "INCFEED_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Bearer token for the incidence API
    #[arg(long, env = "INCFEED_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP request timeout in milliseconds
    #[arg(long, default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Poll interval in milliseconds (overrides config)
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Lease heartbeat interval in milliseconds (overrides config)
    #[arg(long)]
    pub heartbeat_interval_ms: Option<u64>,

    /// Lease time-to-live in milliseconds (overrides config)
    #[arg(long)]
    pub lease_ttl_ms: Option<u64>,

    /// Open each notification as soon as it is shown
    #[arg(long)]
    pub auto_open: bool,
}

impl WatchOpts {
    /// Apply CLI overrides on top of `base` and validate the result.
    pub fn notifier_config(&self, base: NotifierConfig) -> anyhow::Result<NotifierConfig> {
        let mut config = base;
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = self.lease_ttl_ms {
            config.lease_ttl_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }

    /// Initial visibility of each tab to spawn. At least one tab stays
    /// visible so someone can poll.
    pub fn tab_visibility(&self) -> anyhow::Result<Vec<bool>> {
        let tabs = self.tabs.max(1);
        if self.hidden_tabs >= tabs {
            anyhow::bail!(
                "--hidden-tabs {} leaves no visible tab out of {tabs}",
                self.hidden_tabs
            );
        }
        Ok((0..tabs).map(|index| index >= self.hidden_tabs).collect())
    }
}

/// Config file if given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<NotifierConfig> {
    match path {
        Some(path) => Ok(NotifierConfig::load(path)?),
        None => Ok(NotifierConfig::default()),
    }
}

/// Default store path using $USER for per-user isolation.
pub fn default_store_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(dir).join("incfeed").join("state.db");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/incfeed-{user}")).join("state.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn watch_overrides_apply_on_top_of_file_config() {
        let cli = parse(&[
            "incfeed",
            "watch",
            "--user",
            "ana",
            "--role",
            "ADMIN",
            "--poll-interval-ms",
            "500",
        ]);
        let Command::Watch(opts) = cli.command else {
            panic!("expected watch");
        };
        let base = NotifierConfig::from_toml_str("lease_ttl_ms = 9000").expect("toml");
        let config = opts.notifier_config(base).expect("valid");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.lease_ttl_ms, 9_000);
        assert_eq!(opts.identity.identity().expect("identity").role(), &Role::Admin);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = parse(&[
            "incfeed",
            "watch",
            "--user",
            "ana",
            "--lease-ttl-ms",
            "1000",
        ]);
        let Command::Watch(opts) = cli.command else {
            panic!("expected watch");
        };
        assert!(opts.notifier_config(NotifierConfig::default()).is_err());
    }

    #[test]
    fn hidden_tabs_start_first_and_leave_one_visible() {
        let cli = parse(&[
            "incfeed",
            "watch",
            "--user",
            "ana",
            "--tabs",
            "3",
            "--hidden-tabs",
            "2",
        ]);
        let Command::Watch(opts) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(opts.tab_visibility().expect("layout"), vec![false, false, true]);

        let all_hidden = WatchOpts {
            hidden_tabs: 3,
            ..opts.clone()
        };
        assert!(all_hidden.tab_visibility().is_err());

        let default = parse(&["incfeed", "watch", "--user", "ana"]);
        let Command::Watch(opts) = default.command else {
            panic!("expected watch");
        };
        assert_eq!(opts.tab_visibility().expect("layout"), vec![true]);
    }

    #[test]
    fn global_store_path_after_subcommand() {
        let cli = parse(&["incfeed", "status", "-u", "ana", "--store-path", "/tmp/x.db"]);
        assert_eq!(cli.store_path.as_deref(), Some(Path::new("/tmp/x.db")));
        let Command::Status(opts) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(opts.identity.role, "USUARIO");
        assert!(!opts.json);
    }
}
