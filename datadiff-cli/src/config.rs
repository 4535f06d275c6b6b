use std::path::Path;
use datadiff_config::shared::{DiffConfig, InitialInterval, SourceConfig};
use datadiff_config::{Environment, load_config, load_config_from};

use crate::error::{CliError, CliResult};
use crate::{Args, SourceArgs};

/// Builds the run configuration from the command line.
///
/// When both drivers are given on the command line, the sources are built from the flags
/// alone. Otherwise the configuration is loaded from files and the environment, and the
/// remaining flags override the loaded values. The result is validated.
pub fn load_diff_config(args: &Args) -> CliResult<DiffConfig> {
    let primary = SourceArgs::from(&args.primary);
    let secondary = SourceArgs::from(&args.secondary);

    let mut config = match (&primary.driver, &secondary.driver) {
        (Some(_), Some(_)) => DiffConfig {
            reconcile: Default::default(),
            fetch: Default::default(),
            primary: source_from_args(&primary)?,
            secondary: source_from_args(&secondary)?,
        },
        _ => load_file_config(args.config_dir.as_deref())?,
    };

    apply_overrides(&mut config, args)?;
    config.validate().map_err(CliError::config)?;

    Ok(config)
}

fn load_file_config(directory: Option<&Path>) -> CliResult<DiffConfig> {
    match directory {
        Some(directory) => {
            let environment = Environment::load()?;
            load_config_from(directory, environment).map_err(CliError::config)
        }
        None => load_config::<DiffConfig>().map_err(CliError::config),
    }
}

fn source_from_args(args: &SourceArgs) -> CliResult<SourceConfig> {
    let driver = args.driver.as_deref().unwrap_or_default();

    let options = match &args.conf_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => args.conf.clone(),
    };

    SourceConfig::from_parts(driver, &args.conn, &options).map_err(CliError::config)
}

fn apply_overrides(config: &mut DiffConfig, args: &Args) -> CliResult<()> {
    if let Some(interval) = args.interval {
        config.reconcile.initial_interval =
            InitialInterval::try_from(interval).map_err(CliError::config)?;
    }
    if let Some(concurrency) = args.concurrency {
        config.reconcile.max_concurrency = concurrency;
    }
    if args.report_unresolved {
        config.reconcile.report_unresolved = true;
    }
    if let Some(timeout_ms) = args.fetch_timeout_ms {
        config.fetch.timeout_ms = timeout_ms;
    }
    if let Some(attempts) = args.retry_attempts {
        config.fetch.retry.max_attempts = attempts;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn sources_are_built_from_flags() {
        let args = Args::parse_from([
            "datadiff",
            "--mdriver",
            "memory",
            "--mconf",
            r#"{"ids": [1, 2, 3]}"#,
            "--secondary-driver",
            "elasticsearch7",
            "--secondary-conn",
            "http://localhost:9200",
            "--secondary-conf",
            r#"{"index": "orders", "field": "id"}"#,
            "--interval",
            "100",
            "--concurrency",
            "4",
        ]);

        let config = load_diff_config(&args).unwrap();

        assert!(matches!(config.primary, SourceConfig::Memory { ref ids } if ids == &[1, 2, 3]));
        assert_eq!(config.secondary.driver(), "elasticsearch7");
        assert_eq!(config.reconcile.initial_interval, InitialInterval::Hundred);
        assert_eq!(config.reconcile.max_concurrency, 4);
        assert!(!config.reconcile.report_unresolved);
    }

    #[test]
    fn unsupported_interval_is_rejected() {
        let args = Args::parse_from([
            "datadiff",
            "--primary-driver",
            "memory",
            "--secondary-driver",
            "memory",
            "--interval",
            "500",
        ]);

        let err = load_diff_config(&args).unwrap_err();
        assert_eq!(err.category(), "configuration error");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn zero_concurrency_fails_validation() {
        let args = Args::parse_from([
            "datadiff",
            "--primary-driver",
            "memory",
            "--secondary-driver",
            "memory",
            "--concurrency",
            "0",
        ]);

        assert!(load_diff_config(&args).is_err());
    }
}
