// # hostbucket - Property hostname bucket tool
//
// Thin integration layer over hostbucket-core:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers
// 4. Planning or applying the desired hostnames with HostnameEngine
//
// Batching, polling and state logic live in hostbucket-core.
//
// ## Configuration
//
// ### Property
// - `HOSTBUCKET_PROPERTY_ID`: Property id (`prp_` prefix optional)
// - `HOSTBUCKET_CONTRACT_ID`: Contract id (`ctr_` prefix optional)
// - `HOSTBUCKET_GROUP_ID`: Group id (`grp_` prefix optional)
// - `HOSTBUCKET_NETWORK`: `staging` (default) or `production`
// - `HOSTBUCKET_NOTE`: Note attached to each activation
// - `HOSTBUCKET_NOTIFY_EMAILS`: Comma-separated notification addresses
//
// ### Desired hostnames
// - `HOSTBUCKET_HOSTNAMES_FILE`: JSON object keyed by cname-from:
//
// ```json
// {
//   "www.example.com": {
//     "cert_provisioning_type": "CPS_MANAGED",
//     "edge_hostname_id": "ehn_1234"
//   }
// }
// ```
//
// ### EdgeGrid credentials
// - `HOSTBUCKET_EDGEGRID_HOST`
// - `HOSTBUCKET_EDGEGRID_CLIENT_TOKEN`
// - `HOSTBUCKET_EDGEGRID_CLIENT_SECRET`
// - `HOSTBUCKET_EDGEGRID_ACCESS_TOKEN`
// - `HOSTBUCKET_ACCOUNT_SWITCH_KEY` (optional)
//
// ### State Store
// - `HOSTBUCKET_STATE_PATH`: JSON state file; in-memory store when unset
//
// ### Engine
// - `HOSTBUCKET_POLL_INTERVAL_SECS`: Delay between activation status checks
// - `HOSTBUCKET_ACTIVATION_TIMEOUT_SECS`: Limit per activation
//
// ### Run
// - `HOSTBUCKET_MODE`: `plan` (default), `apply` or `show`
// - `HOSTBUCKET_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export HOSTBUCKET_PROPERTY_ID=prp_123
// export HOSTBUCKET_CONTRACT_ID=ctr_C-1
// export HOSTBUCKET_GROUP_ID=grp_42
// export HOSTBUCKET_HOSTNAMES_FILE=hostnames.json
// export HOSTBUCKET_EDGEGRID_HOST=akab-xxxx.luna.akamaiapis.net
// export HOSTBUCKET_EDGEGRID_CLIENT_TOKEN=...
// export HOSTBUCKET_EDGEGRID_CLIENT_SECRET=...
// export HOSTBUCKET_EDGEGRID_ACCESS_TOKEN=...
// export HOSTBUCKET_MODE=apply
//
// hostbucket
// ```

use anyhow::{Context, Result};
use hostbucket_core::config::{
    ApplyConfig, HostbucketConfig, PropertyConfig, ProviderConfig, StateStoreConfig,
};
use hostbucket_core::{EngineEvent, HostnameEngine, HostnameMap, Network, Plan, ProviderRegistry};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Success
/// - 1: Configuration or input error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostbucketExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<HostbucketExitCode> for ExitCode {
    fn from(code: HostbucketExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Print the batches that would be sent
    Plan,
    /// Send the batches and wait for each activation
    Apply,
    /// Print the state recorded by the last apply
    Show,
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Ok(Mode::Plan),
            "apply" => Ok(Mode::Apply),
            "show" => Ok(Mode::Show),
            other => anyhow::bail!(
                "HOSTBUCKET_MODE '{}' is not valid. Valid modes: plan, apply, show",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    property_id: String,
    contract_id: String,
    group_id: String,
    network: Network,
    note: Option<String>,
    notify_emails: Vec<String>,
    hostnames_file: Option<String>,
    edgegrid_host: String,
    edgegrid_client_token: String,
    edgegrid_client_secret: String,
    edgegrid_access_token: String,
    account_switch_key: Option<String>,
    state_path: Option<String>,
    poll_interval_secs: Option<u64>,
    activation_timeout_secs: Option<u64>,
    mode: Mode,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} is required. Set it via: export {key}=..."))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| -> Result<Option<u64>> {
            optional(key)
                .map(|v| {
                    v.trim()
                        .parse()
                        .with_context(|| format!("{key} must be a whole number of seconds. Got: {v}"))
                })
                .transpose()
        };

        Ok(Self {
            property_id: required("HOSTBUCKET_PROPERTY_ID")?,
            contract_id: required("HOSTBUCKET_CONTRACT_ID")?,
            group_id: required("HOSTBUCKET_GROUP_ID")?,
            network: optional("HOSTBUCKET_NETWORK")
                .map(|n| n.parse::<Network>())
                .transpose()?
                .unwrap_or(Network::Staging),
            note: optional("HOSTBUCKET_NOTE"),
            notify_emails: optional("HOSTBUCKET_NOTIFY_EMAILS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            hostnames_file: optional("HOSTBUCKET_HOSTNAMES_FILE"),
            edgegrid_host: required("HOSTBUCKET_EDGEGRID_HOST")?,
            edgegrid_client_token: required("HOSTBUCKET_EDGEGRID_CLIENT_TOKEN")?,
            edgegrid_client_secret: required("HOSTBUCKET_EDGEGRID_CLIENT_SECRET")?,
            edgegrid_access_token: required("HOSTBUCKET_EDGEGRID_ACCESS_TOKEN")?,
            account_switch_key: optional("HOSTBUCKET_ACCOUNT_SWITCH_KEY"),
            state_path: optional("HOSTBUCKET_STATE_PATH"),
            poll_interval_secs: number("HOSTBUCKET_POLL_INTERVAL_SECS")?,
            activation_timeout_secs: number("HOSTBUCKET_ACTIVATION_TIMEOUT_SECS")?,
            mode: optional("HOSTBUCKET_MODE")
                .map(|m| m.parse::<Mode>())
                .transpose()?
                .unwrap_or(Mode::Plan),
            log_level: optional("HOSTBUCKET_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.mode != Mode::Show && self.hostnames_file.is_none() {
            anyhow::bail!(
                "HOSTBUCKET_HOSTNAMES_FILE is required for plan and apply. \
                Set it via: export HOSTBUCKET_HOSTNAMES_FILE=hostnames.json"
            );
        }

        if let Some(ref path) = self.state_path
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "HOSTBUCKET_STATE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HOSTBUCKET_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.core_config().validate()?;
        Ok(())
    }

    /// Configuration handed to hostbucket-core
    fn core_config(&self) -> HostbucketConfig {
        let mut property = PropertyConfig::new(
            self.property_id.clone(),
            self.contract_id.clone(),
            self.group_id.clone(),
        )
        .with_network(self.network)
        .with_notify_emails(self.notify_emails.clone());
        if let Some(ref note) = self.note {
            property = property.with_note(note.clone());
        }

        let mut apply = ApplyConfig::default();
        if let Some(secs) = self.poll_interval_secs {
            apply.poll_interval_secs = secs;
        }
        if let Some(secs) = self.activation_timeout_secs {
            apply.activation_timeout_secs = secs;
        }

        HostbucketConfig {
            property,
            provider: ProviderConfig::Akamai {
                host: self.edgegrid_host.clone(),
                client_token: self.edgegrid_client_token.clone(),
                client_secret: self.edgegrid_client_secret.clone(),
                access_token: self.edgegrid_access_token.clone(),
                account_switch_key: self.account_switch_key.clone(),
                base_url: None,
            },
            state_store: match self.state_path {
                Some(ref path) => StateStoreConfig::File { path: path.clone() },
                None => StateStoreConfig::Memory,
            },
            apply,
        }
    }
}

/// Read the desired hostnames from a JSON file
///
/// Read and parse failures are input errors and surface as
/// `Error::Config`.
fn load_hostnames(path: &Path) -> Result<HostnameMap> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        hostbucket_core::Error::config(format!(
            "Failed to read hostnames file {}: {}",
            path.display(),
            e
        ))
    })?;
    let hostnames: HashMap<String, hostbucket_core::HostnameRecord> = serde_json::from_str(&content)
        .map_err(|e| {
            hostbucket_core::Error::config(format!(
                "Failed to parse hostnames file {}: {}",
                path.display(),
                e
            ))
        })?;
    Ok(hostnames)
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return HostbucketExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e:#}");
        return HostbucketExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return HostbucketExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostbucketExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(config).await {
            Ok(()) => HostbucketExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Input problems exit like configuration errors; everything else is a
/// runtime failure
fn exit_code_for(e: &anyhow::Error) -> HostbucketExitCode {
    match e.downcast_ref::<hostbucket_core::Error>() {
        Some(hostbucket_core::Error::Config(_) | hostbucket_core::Error::InvalidHostname { .. }) => {
            HostbucketExitCode::ConfigError
        }
        _ => HostbucketExitCode::RuntimeError,
    }
}

async fn run(config: Config) -> Result<()> {
    let core_config = config.core_config();

    let registry = ProviderRegistry::new();

    #[cfg(feature = "akamai")]
    {
        debug!("Registering Akamai provider");
        hostbucket_provider_akamai::register(&registry);
    }

    let api = registry.create_provider(&core_config.provider)?;
    let state_store = hostbucket_core::state::open(&core_config.state_store).await?;
    let (engine, event_rx) = HostnameEngine::new(api, state_store, core_config)?;
    let events = tokio::spawn(log_events(event_rx));

    info!("Managing hostnames of {} on {}", engine.property(), config.network);

    let result = match config.mode {
        Mode::Show => show(&engine).await,
        Mode::Plan | Mode::Apply => {
            let path = config
                .hostnames_file
                .as_deref()
                .ok_or_else(|| hostbucket_core::Error::config("HOSTBUCKET_HOSTNAMES_FILE is required"))?;
            let desired = load_hostnames(Path::new(path))?;
            info!("Loaded {} desired hostname(s) from {}", desired.len(), path);

            if config.mode == Mode::Plan {
                engine.plan(&desired).await.map(|plan| print_plan(&plan)).map_err(Into::into)
            } else {
                apply(&engine, &desired).await
            }
        }
    };

    // Closing the engine closes the event channel.
    drop(engine);
    if let Err(e) = events.await {
        warn!("Event logger stopped abnormally: {}", e);
    }

    result
}

async fn apply(engine: &HostnameEngine, desired: &HostnameMap) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                warn!("Received {}, cancelling apply", signal);
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!("Failed to listen for shutdown signals: {}", e),
        }
    });

    let result = engine.apply_with_shutdown(desired, Some(shutdown_rx)).await;
    signals.abort();

    let outcome = result?;
    if outcome.activations.is_empty() {
        println!("No changes. {} hostname(s) attached.", outcome.hostnames.len());
    } else {
        println!(
            "Applied {} batch(es): {} add(s), {} remove(s). {} hostname(s) attached.",
            outcome.activations.len(),
            outcome.plan.add_count(),
            outcome.plan.remove_count(),
            outcome.hostnames.len()
        );
        for activation in &outcome.activations {
            println!("  {} {}", activation.activation_id, activation.status);
        }
    }
    Ok(())
}

async fn show(engine: &HostnameEngine) -> Result<()> {
    match engine.last_applied().await? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => println!("No apply recorded for {}", engine.property().property_id),
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("No changes. {} hostname(s) attached.", plan.current.len());
        return;
    }

    println!(
        "{} batch(es): {} add(s), {} remove(s)",
        plan.batches.len(),
        plan.add_count(),
        plan.remove_count()
    );
    for (i, batch) in plan.batches.iter().enumerate() {
        println!("Batch {}:", i + 1);
        for entry in &batch.add {
            println!(
                "  + {} -> {} ({})",
                entry.cname_from, entry.edge_hostname_id, entry.cert_provisioning_type
            );
        }
        for cname_from in &batch.remove {
            println!("  - {}", cname_from);
        }
    }
}

async fn log_events(mut event_rx: tokio::sync::mpsc::Receiver<EngineEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            EngineEvent::ActivationPolled { activation_id, status } => {
                info!("Activation {} is {}", activation_id, status)
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("CTRL-C")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("HOSTBUCKET_PROPERTY_ID", "123"),
            ("HOSTBUCKET_CONTRACT_ID", "C-1"),
            ("HOSTBUCKET_GROUP_ID", "42"),
            ("HOSTBUCKET_HOSTNAMES_FILE", "hostnames.json"),
            ("HOSTBUCKET_EDGEGRID_HOST", "akab-host.luna.akamaiapis.net"),
            ("HOSTBUCKET_EDGEGRID_CLIENT_TOKEN", "akab-client"),
            ("HOSTBUCKET_EDGEGRID_CLIENT_SECRET", "secret"),
            ("HOSTBUCKET_EDGEGRID_ACCESS_TOKEN", "akab-access"),
        ])
    }

    fn config_from(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&base_env()).unwrap();

        assert_eq!(config.mode, Mode::Plan);
        assert_eq!(config.network, Network::Staging);
        assert!(config.validate().is_ok());

        let core = config.core_config();
        assert_eq!(core.property.property_ref().property_id, "prp_123");
        assert!(matches!(core.state_store, StateStoreConfig::Memory));
        assert_eq!(core.apply.batch_limit, hostbucket_core::HOSTNAME_LIMIT);
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("HOSTBUCKET_NETWORK", "production");
        env.insert("HOSTBUCKET_MODE", "APPLY");
        env.insert("HOSTBUCKET_NOTIFY_EMAILS", "a@example.com, b@example.com,");
        env.insert("HOSTBUCKET_POLL_INTERVAL_SECS", "30");
        env.insert("HOSTBUCKET_ACTIVATION_TIMEOUT_SECS", "900");

        let config = config_from(&env).unwrap();
        assert_eq!(config.mode, Mode::Apply);
        assert_eq!(config.network, Network::Production);
        assert_eq!(config.notify_emails, vec!["a@example.com", "b@example.com"]);

        let core = config.core_config();
        assert_eq!(core.apply.poll_interval_secs, 30);
        assert_eq!(core.apply.activation_timeout_secs, 900);
    }

    #[test]
    fn test_missing_credentials() {
        let mut env = base_env();
        env.remove("HOSTBUCKET_EDGEGRID_CLIENT_SECRET");

        let err = config_from(&env).err().unwrap();
        assert!(err.to_string().contains("HOSTBUCKET_EDGEGRID_CLIENT_SECRET"));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("HOSTBUCKET_MODE", "destroy"),
            ("HOSTBUCKET_NETWORK", "prod"),
            ("HOSTBUCKET_POLL_INTERVAL_SECS", "soon"),
        ] {
            let mut env = base_env();
            env.insert(key, value);
            assert!(config_from(&env).is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn test_validation() {
        let mut env = base_env();
        env.remove("HOSTBUCKET_HOSTNAMES_FILE");
        assert!(config_from(&env).unwrap().validate().is_err());

        env.insert("HOSTBUCKET_MODE", "show");
        assert!(config_from(&env).unwrap().validate().is_ok());

        let mut env = base_env();
        env.insert("HOSTBUCKET_EDGEGRID_HOST", "https://akab-host.luna.akamaiapis.net");
        assert!(config_from(&env).unwrap().validate().is_err());

        let mut env = base_env();
        env.insert("HOSTBUCKET_ACTIVATION_TIMEOUT_SECS", "10");
        assert!(config_from(&env).unwrap().validate().is_err());

        let mut env = base_env();
        env.insert("HOSTBUCKET_LOG_LEVEL", "loud");
        assert!(config_from(&env).unwrap().validate().is_err());
    }

    #[test]
    fn test_load_hostnames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostnames.json");
        std::fs::write(
            &path,
            r#"{
                "www.example.com": {"cert_provisioning_type": "CPS_MANAGED", "edge_hostname_id": "ehn_1"},
                "api.example.com": {"cert_provisioning_type": "DEFAULT", "edge_hostname_id": "2"}
            }"#,
        )
        .unwrap();

        let hostnames = load_hostnames(&path).unwrap();
        assert_eq!(hostnames.len(), 2);
        assert_eq!(
            hostnames["www.example.com"].cert_provisioning_type,
            hostbucket_core::CertProvisioningType::CpsManaged
        );

        std::fs::write(&path, "[]").unwrap();
        assert!(load_hostnames(&path).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let config_err = anyhow::Error::new(hostbucket_core::Error::invalid_hostname("x", "bad"));
        assert_eq!(exit_code_for(&config_err), HostbucketExitCode::ConfigError);

        let runtime_err = anyhow::Error::new(hostbucket_core::Error::cancelled("signal"));
        assert_eq!(exit_code_for(&runtime_err), HostbucketExitCode::RuntimeError);
    }

    #[test]
    fn test_unreadable_hostnames_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_hostnames(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(exit_code_for(&missing), HostbucketExitCode::ConfigError);

        let malformed = dir.path().join("hostnames.json");
        std::fs::write(
            &malformed,
            r#"{"www.example.com": {"cert_provisioning_type": "BOGUS", "edge_hostname_id": "ehn_1"}}"#,
        )
        .unwrap();
        let err = load_hostnames(&malformed).unwrap_err();
        assert_eq!(exit_code_for(&err), HostbucketExitCode::ConfigError);
        assert!(err.to_string().contains("Failed to parse hostnames file"));
    }
}
