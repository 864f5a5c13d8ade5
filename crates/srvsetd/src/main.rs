// # srvsetd - SRV record set runner
//
// Thin integration layer: all reconciliation logic lives in srvset-core.
//
// srvsetd is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering transports and state stores
// 4. Running one engine operation and printing the resulting state as JSON
//
// ## Configuration
//
// ### Server
// - `SRVSET_SERVER`: Authoritative server host or IP (required)
// - `SRVSET_PORT`: Server port (default 53)
// - `SRVSET_TRANSPORT`: udp or tcp (default udp)
// - `SRVSET_TIMEOUT_SECS`: Per-attempt timeout (default 10)
// - `SRVSET_RETRIES`: UDP resends after a timeout (default 3)
//
// ### Operation
// - `SRVSET_ACTION`: apply, read, delete, import or lookup (default apply)
// - `SRVSET_SERVICE`, `SRVSET_PROTO`, `SRVSET_ZONE`: the record set
// - `SRVSET_TTL`: TTL for inserted records (default 3600)
// - `SRVSET_RECORDS`: Comma-separated rdata, e.g. `10 10 3306 db1.example.org.`
// - `SRVSET_ID`: Owner FQDN for read/delete/import
//
// ### State Store
// - `SRVSET_STATE_STORE_TYPE`: memory or file (default memory)
// - `SRVSET_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Logging
// - `SRVSET_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export SRVSET_SERVER=192.0.2.53
// export SRVSET_SERVICE=mysql SRVSET_PROTO=tcp SRVSET_ZONE=example.org.
// export SRVSET_RECORDS="10 10 3306 mysql1.example.org.,20 10 3306 mysql2.example.org."
// srvsetd
// ```

use anyhow::{Context, Result};
use srvset_core::config::{RecordSetConfig, RecordSpec, ResolverConfig, StateStoreConfig, TransportProtocol};
use srvset_core::record::codec;
use srvset_core::{Registry, SetName, SrvSetConfig, SrvSetEngine};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum SrvSetExitCode {
    /// Operation succeeded
    Success = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (DNS, state store, interrupted)
    RuntimeError = 2,
}

impl From<SrvSetExitCode> for ExitCode {
    fn from(code: SrvSetExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Operation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply,
    Read,
    Delete,
    Import,
    Lookup,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "apply" => Ok(Action::Apply),
            "read" => Ok(Action::Read),
            "delete" => Ok(Action::Delete),
            "import" => Ok(Action::Import),
            "lookup" => Ok(Action::Lookup),
            other => anyhow::bail!(
                "SRVSET_ACTION '{}' is not supported. Valid actions: apply, read, delete, import, lookup",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    server: String,
    port: Option<u16>,
    transport: TransportProtocol,
    timeout_secs: Option<u64>,
    retries: Option<usize>,
    action: Action,
    service: Option<String>,
    proto: Option<String>,
    zone: Option<String>,
    ttl: Option<u32>,
    records: Vec<String>,
    id: Option<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    log_level: String,
}

/// Parse an optional numeric variable, rejecting garbage instead of defaulting
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("{name} has invalid value '{value}'"))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            server: lookup("SRVSET_SERVER").context(
                "SRVSET_SERVER is required. Set it via: export SRVSET_SERVER=192.0.2.53",
            )?,
            port: parse_var(&lookup, "SRVSET_PORT")?,
            transport: lookup("SRVSET_TRANSPORT")
                .map(|t| t.parse::<TransportProtocol>())
                .transpose()?
                .unwrap_or_default(),
            timeout_secs: parse_var(&lookup, "SRVSET_TIMEOUT_SECS")?,
            retries: parse_var(&lookup, "SRVSET_RETRIES")?,
            action: lookup("SRVSET_ACTION")
                .map(|a| a.parse())
                .transpose()?
                .unwrap_or(Action::Apply),
            service: lookup("SRVSET_SERVICE"),
            proto: lookup("SRVSET_PROTO"),
            zone: lookup("SRVSET_ZONE"),
            ttl: parse_var(&lookup, "SRVSET_TTL")?,
            records: lookup("SRVSET_RECORDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            id: lookup("SRVSET_ID"),
            state_store_type: lookup("SRVSET_STATE_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            state_store_path: lookup("SRVSET_STATE_STORE_PATH"),
            log_level: lookup("SRVSET_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration and build the core configuration
    fn plan(&self) -> Result<Plan> {
        let log_level = match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => anyhow::bail!(
                "SRVSET_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        };

        let mut resolver = ResolverConfig::new(&self.server).with_transport(self.transport);
        if let Some(port) = self.port {
            resolver = resolver.with_port(port);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            resolver.timeout_secs = timeout_secs;
        }
        if let Some(retries) = self.retries {
            resolver.retries = retries;
        }
        resolver.validate()?;

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            "file" => StateStoreConfig::File {
                path: self.state_store_path.clone().context(
                    "SRVSET_STATE_STORE_PATH is required when SRVSET_STATE_STORE_TYPE=file",
                )?,
            },
            other => anyhow::bail!(
                "SRVSET_STATE_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let mut config = SrvSetConfig::new(resolver);
        config.state_store = state_store;

        let target = match self.action {
            Action::Apply => {
                config.sets.push(self.record_set()?);
                Target::Sets
            }
            Action::Read | Action::Delete | Action::Import => Target::Owner(self.owner()?),
            Action::Lookup => Target::Service {
                service: self.required(&self.service, "SRVSET_SERVICE")?,
                proto: self.required(&self.proto, "SRVSET_PROTO")?,
                domain: self.required(&self.zone, "SRVSET_ZONE")?,
            },
        };

        config.validate()?;

        Ok(Plan {
            action: self.action,
            config,
            target,
            log_level,
        })
    }

    fn required(&self, value: &Option<String>, name: &str) -> Result<String> {
        value
            .clone()
            .with_context(|| format!("{name} is required for SRVSET_ACTION={:?}", self.action))
    }

    fn set_name(&self) -> Result<SetName> {
        Ok(SetName::new(
            self.required(&self.service, "SRVSET_SERVICE")?,
            self.required(&self.proto, "SRVSET_PROTO")?,
            self.required(&self.zone, "SRVSET_ZONE")?,
        )?)
    }

    /// Owner FQDN from `SRVSET_ID`, or from service/proto/zone
    fn owner(&self) -> Result<String> {
        match &self.id {
            Some(id) => Ok(SetName::from_owner(id)?.owner_name()),
            None => Ok(self.set_name()?.owner_name()),
        }
    }

    /// Declared record set, each entry parsed as SRV rdata
    fn record_set(&self) -> Result<RecordSetConfig> {
        let name = self.set_name()?;
        if self.records.is_empty() {
            anyhow::bail!(
                "SRVSET_RECORDS must contain at least one record. \
                Set it via: export SRVSET_RECORDS=\"10 10 3306 db1.example.org.\""
            );
        }

        let mut set = RecordSetConfig::new(&name.service, &name.proto, &name.zone);
        if let Some(ttl) = self.ttl {
            set = set.with_ttl(ttl);
        }

        let owner = name.owner_name();
        for rdata in &self.records {
            let record = codec::parse(&owner, set.ttl, rdata)?;
            set.records.push(RecordSpec::from(&record));
        }
        Ok(set)
    }
}

/// What the operation applies to
#[derive(Debug)]
enum Target {
    Sets,
    Owner(String),
    Service {
        service: String,
        proto: String,
        domain: String,
    },
}

/// Validated invocation
#[derive(Debug)]
struct Plan {
    action: Action,
    config: SrvSetConfig,
    target: Target,
    log_level: Level,
}

fn main() -> ExitCode {
    let plan = match Config::from_env().and_then(|config| config.plan()) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SrvSetExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(plan.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SrvSetExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SrvSetExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        tokio::select! {
            result = run(plan) => match result {
                Ok(()) => SrvSetExitCode::Success,
                Err(e) => {
                    error!("{:#}", e);
                    SrvSetExitCode::RuntimeError
                }
            },
            _ = tokio::signal::ctrl_c() => {
                error!("Interrupted");
                SrvSetExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run one operation and print its result
async fn run(plan: Plan) -> Result<()> {
    let registry = Registry::new();
    srvset_core::state::register_builtin(&registry)?;

    #[cfg(feature = "dns-transport")]
    srvset_transport_dns::register(&registry)?;

    info!(
        "Using {} transport to {}",
        plan.config.resolver.transport.as_str(),
        plan.config.resolver.address()
    );

    let exchange = registry.create_exchange(&plan.config.resolver)?;
    let state_store = registry.create_state_store(&plan.config.state_store).await?;
    let (engine, mut events) = SrvSetEngine::new(exchange, state_store, plan.config)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "engine event");
        }
    });

    let output = match (plan.action, plan.target) {
        (Action::Apply, _) => {
            let summary = engine.apply_all().await?;
            if let Some(failure) = summary.failures.first() {
                anyhow::bail!(
                    "{} set(s) failed; {} after {} attempt(s): {}",
                    summary.failures.len(),
                    failure.id,
                    failure.attempts,
                    failure.error
                );
            }
            serde_json::to_value(&summary.states)?
        }
        (Action::Read, Target::Owner(id)) => serde_json::to_value(engine.read(&id).await?)?,
        (Action::Delete, Target::Owner(id)) => {
            engine.delete(&id).await?;
            serde_json::json!({ "id": id, "deleted": true })
        }
        (Action::Import, Target::Owner(id)) => serde_json::to_value(engine.import(&id).await?)?,
        (Action::Lookup, Target::Service { service, proto, domain }) => {
            let result = engine.reconciler().lookup(&service, &proto, &domain).await?;
            serde_json::json!({ "name": result.name, "records": result.records })
        }
        (action, target) => anyhow::bail!("{:?} cannot be applied to {:?}", action, target),
    };

    engine.flush().await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
