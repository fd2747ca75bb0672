use crate::{
    indexer_client::PollPolicy,
    wager::WagerConfig,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DEPLOYMENTS_ROOT,
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use dice_abi::TypeSchema;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    info,
    warn,
};

pub const DEFAULT_TESTNET_API_URL: &str = "https://api.testnet.klever.finance";
pub const DEFAULT_MAINNET_API_URL: &str = "https://api.mainnet.klever.finance";
pub const DEFAULT_LOCAL_API_URL: &str = "http://localhost:9090";
pub const DEFAULT_TESTNET_EXPLORER_URL: &str = "https://testnet.kleverscan.org";
pub const DEFAULT_MAINNET_EXPLORER_URL: &str = "https://kleverscan.org";
pub const DEFAULT_LOCAL_EXPLORER_URL: &str = "http://localhost:3000";
pub const DEFAULT_SIGNER_URL: &str = "http://localhost:8787";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NetworkTarget {
    Local,
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkTarget {
    pub fn default_api_url(self) -> &'static str {
        match self {
            NetworkTarget::Local => DEFAULT_LOCAL_API_URL,
            NetworkTarget::Testnet => DEFAULT_TESTNET_API_URL,
            NetworkTarget::Mainnet => DEFAULT_MAINNET_API_URL,
        }
    }

    pub fn default_explorer_url(self) -> &'static str {
        match self {
            NetworkTarget::Local => DEFAULT_LOCAL_EXPLORER_URL,
            NetworkTarget::Testnet => DEFAULT_TESTNET_EXPLORER_URL,
            NetworkTarget::Mainnet => DEFAULT_MAINNET_EXPLORER_URL,
        }
    }

    pub fn deployment_env(self) -> DeploymentEnv {
        match self {
            NetworkTarget::Local => DeploymentEnv::Local,
            NetworkTarget::Testnet => DeploymentEnv::Testnet,
            NetworkTarget::Mainnet => DeploymentEnv::Mainnet,
        }
    }
}

/// Everything the client needs once command-line flags are resolved.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub api_url: String,
    pub explorer_url: String,
    pub contract_address: String,
    pub data_dir: PathBuf,
    pub poll: PollPolicy,
}

impl AppConfig {
    pub fn wager_config(&self) -> WagerConfig {
        WagerConfig {
            contract_address: self.contract_address.clone(),
            explorer_url: self.explorer_url.clone(),
            poll: self.poll,
        }
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".dice-client"))
}

pub fn resolve_data_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_data_dir(),
    }
}

pub fn deployment_store(data_dir: &Path, network: NetworkTarget) -> Result<DeploymentStore> {
    let root = data_dir.join(DEPLOYMENTS_ROOT);
    deployments::ensure_structure(&root).map_err(|e| eyre!(e))?;
    DeploymentStore::at(&root, network.deployment_env()).map_err(|e| eyre!(e))
}

/// The bundled ABI unless an override document is given.
pub fn load_schema(path: Option<&Path>) -> Result<TypeSchema> {
    match path {
        Some(path) => {
            let document = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read ABI document {:?}", path))?;
            TypeSchema::from_json(&document)
                .wrap_err_with(|| format!("Invalid ABI document {:?}", path))
        }
        None => TypeSchema::bundled().wrap_err("Bundled ABI document is invalid"),
    }
}

/// Picks the contract to bet against. An explicit address wins over the
/// recorded deployment.
pub fn resolve_contract(
    explicit: Option<&str>,
    record: Option<&DeploymentRecord>,
    network: NetworkTarget,
    schema: &TypeSchema,
) -> Result<String> {
    if let Some(address) = explicit.map(str::trim).filter(|a| !a.is_empty()) {
        return Ok(address.to_string());
    }
    let record = record.ok_or_else(|| {
        eyre!(
            "No dice contract recorded for {}; pass --contract or run `record-deployment`",
            network.deployment_env()
        )
    })?;
    warn_on_schema_drift(record, schema);
    info!(contract = %record.contract_address, "using recorded deployment");
    Ok(record.contract_address.clone())
}

/// Returns false when the record was made against a different ABI document.
pub fn warn_on_schema_drift(record: &DeploymentRecord, schema: &TypeSchema) -> bool {
    if record.is_compatible_with_hash(schema.fingerprint()) {
        return true;
    }
    warn!(
        contract = %record.contract_address,
        recorded = %record.abi_hash,
        loaded = %schema.fingerprint(),
        "ABI document differs from the one recorded for this deployment; results may not decode"
    );
    false
}
