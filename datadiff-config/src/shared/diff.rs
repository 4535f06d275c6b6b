use std::fmt;
use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{FetchConfig, SourceConfig, ValidationError};

/// Starting bin width of a reconciliation.
///
/// Restricted to powers of ten so that dividing by ten at every level lands exactly on
/// an interval of 1, bounding the recursion to at most four histogram levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum InitialInterval {
    Ten,
    Hundred,
    #[default]
    Thousand,
    TenThousand,
}

impl InitialInterval {
    /// Every supported starting interval, smallest first.
    pub const ALL: [InitialInterval; 4] = [
        InitialInterval::Ten,
        InitialInterval::Hundred,
        InitialInterval::Thousand,
        InitialInterval::TenThousand,
    ];

    /// Returns the bin width.
    pub const fn get(self) -> i64 {
        match self {
            InitialInterval::Ten => 10,
            InitialInterval::Hundred => 100,
            InitialInterval::Thousand => 1_000,
            InitialInterval::TenThousand => 10_000,
        }
    }

    /// Returns the number of histogram levels scanned before the leaf level.
    pub const fn levels(self) -> u32 {
        match self {
            InitialInterval::Ten => 1,
            InitialInterval::Hundred => 2,
            InitialInterval::Thousand => 3,
            InitialInterval::TenThousand => 4,
        }
    }
}

impl TryFrom<i64> for InitialInterval {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(InitialInterval::Ten),
            100 => Ok(InitialInterval::Hundred),
            1_000 => Ok(InitialInterval::Thousand),
            10_000 => Ok(InitialInterval::TenThousand),
            other => Err(ValidationError::UnsupportedInterval(other)),
        }
    }
}

impl From<InitialInterval> for i64 {
    fn from(value: InitialInterval) -> Self {
        value.get()
    }
}

impl fmt::Display for InitialInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Settings consumed by the reconciler itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Bin width of the first, full-range histogram scan.
    #[serde(default)]
    pub initial_interval: InitialInterval,
    /// Maximum number of sibling ranges scanned concurrently.
    ///
    /// A value of 1 scans one range (and all its sub-ranges) at a time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Whether unresolved bins are reported at every histogram level, on top of the
    /// identifier-level mismatches.
    #[serde(default)]
    pub report_unresolved: bool,
}

impl ReconcileConfig {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrency == 0 {
            return Err(ValidationError::invalid_field(
                "reconcile.max_concurrency",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            initial_interval: InitialInterval::default(),
            max_concurrency: default_max_concurrency(),
            report_unresolved: false,
        }
    }
}

fn default_max_concurrency() -> usize {
    ReconcileConfig::DEFAULT_MAX_CONCURRENCY
}

/// Root configuration of a datadiff run.
///
/// This intentionally does not implement [`Serialize`] since source descriptors may
/// carry credentials.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiffConfig {
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// The reference source.
    pub primary: SourceConfig,
    /// The source checked against the primary.
    pub secondary: SourceConfig,
}

impl DiffConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.reconcile.validate()?;
        self.fetch.validate()?;
        self.primary.validate("primary")?;
        self.secondary.validate("secondary")?;

        Ok(())
    }
}

impl Config for DiffConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "primary.conditions",
        "secondary.conditions",
        "primary.ids",
        "secondary.ids",
    ];
}
