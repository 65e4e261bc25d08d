//! Argument parsing and role dispatch surface.

use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

/// Process exit codes: success, configuration error, runtime error, refused.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIGURATION: i32 = 1;
pub const EXIT_RUNTIME: i32 = 2;
pub const EXIT_REFUSED: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "workqueue", author, version, about = "Redis-backed distributed work queue", long_about = None)]
pub struct Cli {
    /// Which part of the pipeline this process runs.
    #[arg(long, value_enum)]
    pub role: Role,

    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub admin: AdminArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Producer,
    Worker,
    All,
    Admin,
}

#[derive(Args, Debug, Default)]
pub struct AdminArgs {
    /// Which admin operation to perform; required when `--role=admin`.
    #[arg(long = "admin-cmd", value_enum)]
    pub admin_cmd: Option<AdminCmd>,
    /// Priority band for `peek` (e.g. `high`).
    #[arg(long)]
    pub queue: Option<String>,
    /// Number of items for `peek`.
    #[arg(long, default_value_t = 10)]
    pub n: isize,
    /// Explicit confirmation for destructive operations.
    #[arg(long)]
    pub yes: bool,
    /// Additional confirmation required for `purge-all`.
    #[arg(long)]
    pub dev: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum AdminCmd {
    Stats,
    Peek,
    PurgeDlq,
    PurgeAll,
    StatsKeys,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn parses_producer_role() {
        let cli = parse(&["workqueue", "--role", "producer", "--config", "cfg.yaml"]);
        assert_eq!(cli.role, Role::Producer);
        assert_eq!(cli.config, PathBuf::from("cfg.yaml"));
    }

    #[test]
    fn parses_worker_role() {
        let cli = parse(&["workqueue", "--role", "worker"]);
        assert_eq!(cli.role, Role::Worker);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn parses_all_role() {
        let cli = parse(&["workqueue", "--role", "all"]);
        assert_eq!(cli.role, Role::All);
    }

    #[test]
    fn parses_admin_stats() {
        let cli = parse(&["workqueue", "--role", "admin", "--admin-cmd", "stats"]);
        assert_eq!(cli.role, Role::Admin);
        assert_eq!(cli.admin.admin_cmd, Some(AdminCmd::Stats));
    }

    #[test]
    fn parses_admin_peek_with_queue_and_n() {
        let cli = parse(&[
            "workqueue", "--role", "admin", "--admin-cmd", "peek", "--queue", "high", "--n", "5",
        ]);
        assert_eq!(cli.admin.admin_cmd, Some(AdminCmd::Peek));
        assert_eq!(cli.admin.queue.as_deref(), Some("high"));
        assert_eq!(cli.admin.n, 5);
    }

    #[test]
    fn parses_admin_purge_dlq_with_confirmation() {
        let cli = parse(&["workqueue", "--role", "admin", "--admin-cmd", "purge-dlq", "--yes"]);
        assert_eq!(cli.admin.admin_cmd, Some(AdminCmd::PurgeDlq));
        assert!(cli.admin.yes);
    }

    #[test]
    fn parses_admin_purge_all_with_dev_and_confirmation() {
        let cli = parse(&[
            "workqueue",
            "--role",
            "admin",
            "--admin-cmd",
            "purge-all",
            "--dev",
            "--yes",
        ]);
        assert_eq!(cli.admin.admin_cmd, Some(AdminCmd::PurgeAll));
        assert!(cli.admin.dev);
        assert!(cli.admin.yes);
    }

    #[test]
    fn missing_role_is_a_parse_error() {
        let result = Cli::try_parse_from(["workqueue"]);
        assert!(result.is_err());
    }

    #[test]
    fn exit_codes_match_documented_values() {
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_CONFIGURATION, 1);
        assert_eq!(EXIT_RUNTIME, 2);
        assert_eq!(EXIT_REFUSED, 3);
    }
}
