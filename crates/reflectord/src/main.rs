// # reflectord - Reflection Daemon
//
// Thin integration layer around reflector-core:
// 1. Read configuration from environment variables
// 2. Initialize the runtime and tracing
// 3. Register the transport clients
// 4. Run one reflection and print the answer
//
// All racing, timeout, and consensus logic lives in reflector-core;
// this binary only wires and reports.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `REFLECTOR_ORACLES`: comma-separated oracle URLs (http/https/stun);
//   unset means the built-in oracle table
// - `REFLECTOR_FAMILY`: address family to discover (v4, v6; default v4)
// - `REFLECTOR_MODE`: race mode (first, consensus; default first)
// - `REFLECTOR_TIMEOUT_SECS`: per-query deadline in seconds (optional)
// - `REFLECTOR_WILDCARD_BASE`: also print `<ip>.<base>` as a wildcard
//   subdomain (optional)
// - `REFLECTOR_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export REFLECTOR_FAMILY=v4
// export REFLECTOR_MODE=consensus
// export REFLECTOR_TIMEOUT_SECS=5
//
// reflectord
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

use reflector_core::registry::builtin_oracles;
use reflector_core::{
    IpFamily, OracleConfig, OracleRegistry, OracleSet, ReflectEvent, ReflectMode,
    ReflectionRequest, Reflector, ReflectorConfig, consensus, wildcard::wildcard_subdomain,
};
use reflector_http::HttpOracleClient;
use reflector_stun::StunOracleClient;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean run
/// - 1: Configuration error
/// - 2: Runtime error (no oracle produced an address, I/O failure)
#[derive(Debug, Clone, Copy)]
enum ReflectExitCode {
    /// Address discovered and printed
    CleanRun = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (race exhausted, runtime failure)
    RuntimeError = 2,
}

impl From<ReflectExitCode> for ExitCode {
    fn from(code: ReflectExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    oracle_urls: Option<Vec<String>>,
    family: String,
    mode: String,
    timeout_secs: Option<u64>,
    wildcard_base: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self {
            oracle_urls: env::var("REFLECTOR_ORACLES").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            family: env::var("REFLECTOR_FAMILY").unwrap_or_else(|_| "v4".to_string()),
            mode: env::var("REFLECTOR_MODE").unwrap_or_else(|_| "first".to_string()),
            timeout_secs: env::var("REFLECTOR_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            wildcard_base: env::var("REFLECTOR_WILDCARD_BASE").ok(),
            log_level: env::var("REFLECTOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.family.to_lowercase().as_str() {
            "v4" | "v6" => {}
            other => anyhow::bail!(
                "REFLECTOR_FAMILY '{}' is not valid. Valid families: v4, v6",
                other
            ),
        }

        match self.mode.to_lowercase().as_str() {
            "first" | "consensus" => {}
            other => anyhow::bail!(
                "REFLECTOR_MODE '{}' is not valid. Valid modes: first, consensus",
                other
            ),
        }

        if let Some(timeout) = self.timeout_secs
            && !(1..=300).contains(&timeout)
        {
            anyhow::bail!(
                "REFLECTOR_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                timeout
            );
        }

        if let Some(urls) = &self.oracle_urls {
            if urls.is_empty() {
                anyhow::bail!(
                    "REFLECTOR_ORACLES must contain at least one URL. \
                    Set it via: export REFLECTOR_ORACLES=https://api.ipify.org,stun://stun.l.google.com:19302"
                );
            }
            for url in urls {
                if !url.starts_with("https://")
                    && !url.starts_with("http://")
                    && !url.starts_with("stun://")
                {
                    anyhow::bail!(
                        "REFLECTOR_ORACLES entry '{}' must use the https, http, or stun scheme",
                        url
                    );
                }
                if url.starts_with("http://") {
                    eprintln!(
                        "WARNING: oracle {} uses plaintext HTTP. \
                        Anyone on the path can forge its answer; prefer HTTPS.",
                        url
                    );
                }
            }
        }

        if let Some(base) = &self.wildcard_base
            && base.trim_matches('.').is_empty()
        {
            anyhow::bail!("REFLECTOR_WILDCARD_BASE cannot be empty");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "REFLECTOR_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }

        Ok(())
    }

    fn family(&self) -> IpFamily {
        match self.family.to_lowercase().as_str() {
            "v6" => IpFamily::V6,
            _ => IpFamily::V4,
        }
    }

    fn mode(&self) -> ReflectMode {
        match self.mode.to_lowercase().as_str() {
            "consensus" => ReflectMode::Consensus,
            _ => ReflectMode::First,
        }
    }

    /// Build the oracle set: configured URLs run through the core
    /// config layer, or the built-in table when nothing is configured
    fn oracle_set(&self) -> Result<OracleSet> {
        let Some(urls) = &self.oracle_urls else {
            return Ok(builtin_oracles());
        };

        let core_config = ReflectorConfig {
            oracles: urls
                .iter()
                .enumerate()
                .map(|(index, url)| OracleConfig::new(format!("oracle-{index}"), url))
                .collect(),
            family: self.family(),
            per_query_timeout_secs: self.timeout_secs,
            mode: self.mode(),
        };
        core_config.validate()?;
        Ok(core_config.oracle_set()?)
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = Config::from_env();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ReflectExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReflectExitCode::ConfigError.into();
    }

    info!("Starting reflectord");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReflectExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_reflection(config).await {
            Ok(()) => ReflectExitCode::CleanRun,
            Err(e) => {
                error!("Reflection failed: {}", e);
                ReflectExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run one reflection and print the discovered address
async fn run_reflection(config: Config) -> Result<()> {
    let oracles = config.oracle_set()?;
    info!(
        "Querying {} oracle(s) for the external {} address",
        oracles.len(),
        config.family()
    );

    // Register transport clients
    let registry = Arc::new(OracleRegistry::new());
    registry.register_client(Arc::new(HttpOracleClient::new()));
    registry.register_client(Arc::new(StunOracleClient::new()));

    let (reflector, mut events) = Reflector::new(registry);

    // Surface engine events in the logs
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ReflectEvent::QueryFailed { oracle, error } => {
                    debug!("oracle {} failed: {}", oracle, error);
                }
                other => debug!("engine event: {:?}", other),
            }
        }
    });

    // Cancel in-flight queries on Ctrl-C
    let cancellation = CancellationToken::new();
    let signal_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling in-flight queries");
            signal_token.cancel();
        }
    });

    let mut request =
        ReflectionRequest::new(config.family()).with_cancellation(cancellation);
    if let Some(secs) = config.timeout_secs {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let address = match config.mode() {
        ReflectMode::First => reflector.reflect(&oracles, &request).await?,
        ReflectMode::Consensus => {
            let results = reflector.reflect_all(&oracles, &request).await?;
            for (oracle, address) in &results {
                info!("oracle {} reported {}", oracle, address);
            }
            consensus(&results)
                .ok_or(reflector_core::Error::NoConsensus)?
        }
    };

    println!("{address}");
    if let Some(base) = &config.wildcard_base {
        println!("{}", wildcard_subdomain(address, base));
    }

    Ok(())
}
