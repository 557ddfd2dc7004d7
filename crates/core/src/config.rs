//! Configuration layering and logger setup.
//!
//! Settings resolve in three layers, later ones winning:
//!
//! 1. the [`Precision`] preset,
//! 2. a TOML file (`--config` / `NDM_CONFIG`),
//! 3. command-line flags and their environment variables.
//!
//! The same [`ConfigArgs`] struct is parsed from both the file and the command line; every
//! field is optional so an absent value falls through to the layer below.
//!
//! ```toml
//! algorithm = "ndm"
//! precision = "compact"
//! entropy-threshold = 70
//! refresh-interval = 8
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::congestion_control::{CongestionControlAlgorithm, CongestionControlConfig};
use crate::errors::ConfigError;
use crate::ndm::{EntropyMethod, NdmConfig, Precision};

/// Engine selection and NDM overrides.
#[derive(clap::Args, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigArgs {
    /// TOML file with the same keys as the flags below.
    #[arg(long = "config", env = "NDM_CONFIG")]
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Congestion control algorithm.
    ///
    /// - `ndm` (default): entropy-aware decision engine
    /// - `reno`: loss halving with standard linear growth
    #[arg(long, value_enum, env = "NDM_ALGORITHM")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<CongestionControlAlgorithm>,

    /// Numeric precision profile the NDM defaults are taken from.
    #[arg(long, value_enum, env = "NDM_PRECISION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<Precision>,

    /// RTT samples kept for the entropy estimate (8-16).
    #[arg(long)]
    #[serde(rename = "history-capacity", skip_serializing_if = "Option::is_none")]
    pub history_capacity: Option<u8>,

    /// Acknowledgments between entropy refreshes.
    #[arg(long)]
    #[serde(rename = "refresh-interval", skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u16>,

    /// Entropy below this value counts as congestion.
    #[arg(long)]
    #[serde(rename = "entropy-threshold", skip_serializing_if = "Option::is_none")]
    pub entropy_threshold: Option<u16>,

    /// How log2 is evaluated by the entropy estimator.
    #[arg(long, value_enum)]
    #[serde(rename = "entropy-method", skip_serializing_if = "Option::is_none")]
    pub entropy_method: Option<EntropyMethod>,

    /// RTT quantization step in microseconds.
    #[arg(long)]
    #[serde(rename = "rtt-quantum-us", skip_serializing_if = "Option::is_none")]
    pub rtt_quantum_us: Option<u32>,

    /// ssthresh divisor for losses at high entropy.
    #[arg(long)]
    #[serde(rename = "gentle-reduction-divisor", skip_serializing_if = "Option::is_none")]
    pub gentle_reduction_divisor: Option<u32>,

    /// Consecutive predictor skips allowed on the fast path (0 disables it).
    #[arg(long)]
    #[serde(rename = "max-consecutive-skips", skip_serializing_if = "Option::is_none")]
    pub max_consecutive_skips: Option<u8>,
}

impl ConfigArgs {
    /// Read a TOML file into a `ConfigArgs`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Fill every unset field from `other`.
    pub fn merge(self, other: ConfigArgs) -> Self {
        Self {
            config_path: self.config_path.or(other.config_path),
            algorithm: self.algorithm.or(other.algorithm),
            precision: self.precision.or(other.precision),
            history_capacity: self.history_capacity.or(other.history_capacity),
            refresh_interval: self.refresh_interval.or(other.refresh_interval),
            entropy_threshold: self.entropy_threshold.or(other.entropy_threshold),
            entropy_method: self.entropy_method.or(other.entropy_method),
            rtt_quantum_us: self.rtt_quantum_us.or(other.rtt_quantum_us),
            gentle_reduction_divisor: self
                .gentle_reduction_divisor
                .or(other.gentle_reduction_divisor),
            max_consecutive_skips: self.max_consecutive_skips.or(other.max_consecutive_skips),
        }
    }

    /// Resolve all layers into a validated configuration.
    pub fn build(self) -> Result<CongestionControlConfig, ConfigError> {
        let args = match &self.config_path {
            Some(path) => {
                let file = Self::from_file(path)?;
                tracing::debug!(path = %path.display(), "Loaded config file");
                self.merge(file)
            }
            None => self,
        };

        let mut ndm: NdmConfig = args.precision.unwrap_or_default().preset();
        if let Some(v) = args.history_capacity {
            ndm.history_capacity = v;
        }
        if let Some(v) = args.refresh_interval {
            ndm.refresh_interval = v;
        }
        if let Some(v) = args.entropy_threshold {
            ndm.entropy_threshold = v;
        }
        if let Some(v) = args.entropy_method {
            ndm.entropy_method = v;
        }
        if let Some(v) = args.rtt_quantum_us {
            ndm.rtt_quantum_us = v;
        }
        if let Some(v) = args.gentle_reduction_divisor {
            ndm.gentle_reduction_divisor = v;
        }
        if let Some(v) = args.max_consecutive_skips {
            ndm.skip.max_consecutive = v;
        }

        let config = CongestionControlConfig {
            algorithm: args.algorithm.unwrap_or_default(),
            ndm,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber once; later calls are no-ops.
///
/// `NDM_LOG_FORMAT=json` switches to JSON output, `RUST_LOG` overrides `level`.
pub fn set_logger(level: Option<tracing::level_filters::LevelFilter>) {
    #[cfg(feature = "trace")]
    {
        use std::sync::atomic::{AtomicBool, Ordering};

        static LOGGER_SET: AtomicBool = AtomicBool::new(false);
        if LOGGER_SET
            .compare_exchange(false, true, Ordering::Release, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Err(err) = init_tracer(level) {
            eprintln!("failed tracing initialization: {err}");
        }
    }
    #[cfg(not(feature = "trace"))]
    let _ = level;
}

#[cfg(feature = "trace")]
fn init_tracer(
    level: Option<tracing::level_filters::LevelFilter>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let default_filter = if cfg!(any(test, debug_assertions)) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter_layer = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.unwrap_or(default_filter).into())
        .from_env_lossy();

    let use_json = std::env::var("NDM_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    // Records go to stdout; logs stay on stderr
    let fmt_layer = if use_json {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_level(true)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_level(true)
            .pretty()
            .with_file(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .try_init()
}
