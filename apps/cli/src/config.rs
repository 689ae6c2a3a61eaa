use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "marketplace.toml";
pub const DEFAULT_MODULE_ADDRESS: &str =
    "0x28a4ba85d2158b999307af0ff676a986f1897b4a9c287b5ab3bbbea8636bb31e";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Local,
}

impl Network {
    pub fn default_node_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.aptoslabs.com/v1",
            Self::Testnet => "https://fullnode.testnet.aptoslabs.com/v1",
            Self::Devnet => "https://fullnode.devnet.aptoslabs.com/v1",
            Self::Local => "http://127.0.0.1:8080/v1",
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "local" | "localnet" => Ok(Self::Local),
            other => Err(anyhow!("unknown network '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub network: Network,
    /// Overrides the network's default fullnode.
    pub node_url: Option<String>,
    pub wallet_url: String,
    pub module_address: String,
    pub jobs_module: String,
    pub payments_module: String,
    pub account: Option<String>,
    pub finality_timeout: Duration,
    pub poll_interval: Duration,
    pub view_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            node_url: None,
            wallet_url: "http://127.0.0.1:8090".into(),
            module_address: DEFAULT_MODULE_ADDRESS.into(),
            jobs_module: client_core::intent::DEFAULT_JOBS_MODULE.into(),
            payments_module: client_core::intent::DEFAULT_PAYMENTS_MODULE.into(),
            account: None,
            finality_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            view_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    pub fn node_url(&self) -> &str {
        self.node_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_node_url())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    network: Option<Network>,
    node_url: Option<String>,
    wallet_url: Option<String>,
    module_address: Option<String>,
    jobs_module: Option<String>,
    payments_module: Option<String>,
    account: Option<String>,
    finality_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    view_timeout_secs: Option<u64>,
}

/// Defaults, then the config file, then environment variables. An explicit
/// path must exist; the default `marketplace.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.network {
        settings.network = v;
    }
    if let Some(v) = file_cfg.node_url {
        settings.node_url = Some(v);
    }
    if let Some(v) = file_cfg.wallet_url {
        settings.wallet_url = v;
    }
    if let Some(v) = file_cfg.module_address {
        settings.module_address = v;
    }
    if let Some(v) = file_cfg.jobs_module {
        settings.jobs_module = v;
    }
    if let Some(v) = file_cfg.payments_module {
        settings.payments_module = v;
    }
    if let Some(v) = file_cfg.account {
        settings.account = Some(v);
    }
    if let Some(v) = file_cfg.finality_timeout_secs {
        settings.finality_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        settings.poll_interval = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.view_timeout_secs {
        settings.view_timeout = Duration::from_secs(v);
    }
    Ok(())
}

/// First set variable among `keys` wins; later names are fallbacks.
fn first_set(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| lookup(*key))
}

fn parse_u64(key: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number, got '{raw}'"))
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = first_set(&lookup, &["APP__NETWORK", "MARKETPLACE_NETWORK"]) {
        settings.network = v.parse()?;
    }
    if let Some(v) = first_set(&lookup, &["APP__NODE_URL", "MARKETPLACE_NODE_URL"]) {
        settings.node_url = Some(v);
    }
    if let Some(v) = first_set(&lookup, &["APP__WALLET_URL", "MARKETPLACE_WALLET_URL"]) {
        settings.wallet_url = v;
    }
    if let Some(v) = first_set(&lookup, &["APP__MODULE_ADDRESS", "MARKETPLACE_MODULE_ADDRESS"]) {
        settings.module_address = v;
    }
    if let Some(v) = first_set(&lookup, &["APP__JOBS_MODULE", "MARKETPLACE_JOBS_MODULE"]) {
        settings.jobs_module = v;
    }
    if let Some(v) = first_set(&lookup, &["APP__PAYMENTS_MODULE", "MARKETPLACE_PAYMENTS_MODULE"]) {
        settings.payments_module = v;
    }
    if let Some(v) = first_set(&lookup, &["APP__ACCOUNT", "MARKETPLACE_ACCOUNT"]) {
        settings.account = Some(v);
    }
    if let Some(v) = lookup("APP__FINALITY_TIMEOUT_SECS") {
        settings.finality_timeout =
            Duration::from_secs(parse_u64("APP__FINALITY_TIMEOUT_SECS", &v)?);
    }
    if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
        settings.poll_interval = Duration::from_millis(parse_u64("APP__POLL_INTERVAL_MS", &v)?);
    }
    if let Some(v) = lookup("APP__VIEW_TIMEOUT_SECS") {
        settings.view_timeout = Duration::from_secs(parse_u64("APP__VIEW_TIMEOUT_SECS", &v)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_target_testnet() {
        let settings = Settings::default();
        assert_eq!(settings.network, Network::Testnet);
        assert_eq!(
            settings.node_url(),
            "https://fullnode.testnet.aptoslabs.com/v1"
        );
        assert_eq!(settings.jobs_module, "FreelanceMarketplace");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
                network = "devnet"
                wallet_url = "http://127.0.0.1:9000"
                finality_timeout_secs = 5
            "#,
        )
        .expect("valid file");

        assert_eq!(settings.network, Network::Devnet);
        assert_eq!(settings.node_url(), "https://fullnode.devnet.aptoslabs.com/v1");
        assert_eq!(settings.wallet_url, "http://127.0.0.1:9000");
        assert_eq!(settings.finality_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "bind_addr = \"0.0.0.0\"").is_err());
    }

    #[test]
    fn app_prefixed_env_wins_over_marketplace_prefix() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env(&[
                ("MARKETPLACE_NODE_URL", "http://node-a/v1"),
                ("APP__NODE_URL", "http://node-b/v1"),
                ("MARKETPLACE_ACCOUNT", "0xa11ce"),
                ("APP__POLL_INTERVAL_MS", "250"),
            ]),
        )
        .expect("valid env");

        assert_eq!(settings.node_url(), "http://node-b/v1");
        assert_eq!(settings.account.as_deref(), Some("0xa11ce"));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn malformed_env_numbers_are_errors() {
        let mut settings = Settings::default();
        let err = apply_env(&mut settings, env(&[("APP__VIEW_TIMEOUT_SECS", "soon")]))
            .expect_err("not a number");
        assert!(err.to_string().contains("APP__VIEW_TIMEOUT_SECS"));
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let path = std::env::temp_dir().join("marketplace-missing-config.toml");
        assert!(load_settings(Some(&path)).is_err());
    }
}
