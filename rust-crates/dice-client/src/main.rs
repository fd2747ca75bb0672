use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::record_deployment;
use dice_abi::BetDirection;
use dice_client::{
    FileStore,
    HttpWallet,
    IndexerClient,
    PollPolicy,
    ResultCache,
    WagerClient,
    config::{
        self,
        AppConfig,
        DEFAULT_SIGNER_URL,
        NetworkTarget,
    },
    indexer_client::DEFAULT_MAX_ATTEMPTS,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};
use url::Url;

const LOG_FILE_PREFIX: &str = "dice-client.log";

#[derive(Parser, Debug)]
#[command(
    name = "dice-client",
    about = "Place dice wagers on a Klever contract and read back the result",
    version,
    group(
        ArgGroup::new("network")
            .args(["local", "testnet", "mainnet"])
    )
)]
struct Args {
    /// Use a local Klever node
    #[arg(long)]
    local: bool,

    /// Use Klever testnet (default)
    #[arg(long)]
    testnet: bool,

    /// Use Klever mainnet
    #[arg(long)]
    mainnet: bool,

    /// Override the indexer API URL
    #[arg(long)]
    api_url: Option<Url>,

    /// Override the block explorer URL used for transaction links
    #[arg(long)]
    explorer_url: Option<Url>,

    /// Contract address (defaults to the recorded deployment)
    #[arg(long)]
    contract: Option<String>,

    /// ABI document to use instead of the bundled one
    #[arg(long)]
    abi: Option<PathBuf>,

    /// Where cached results and deployment records live (defaults to ~/.dice-client)
    #[arg(long)]
    data_dir: Option<String>,

    /// Write daily rolling log files here instead of logging to stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Indexer lookups per transaction before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Milliseconds between indexer lookups
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place a wager and wait for its result
    Bet {
        /// Account placing the wager
        #[arg(long)]
        account: String,

        /// `under` or `over`
        #[arg(long)]
        direction: BetDirection,

        /// Number the roll is compared against
        #[arg(long, default_value_t = 50)]
        prediction: u32,

        /// Stake in KLV
        #[arg(long)]
        stake: f64,

        /// Wallet bridge that builds, signs and broadcasts transactions
        #[arg(long, default_value = DEFAULT_SIGNER_URL)]
        signer_url: Url,
    },
    /// Show the last settled wager cached for an account
    Last {
        #[arg(long)]
        account: String,
    },
    /// Record the dice contract address for the selected network
    RecordDeployment {
        #[arg(long)]
        contract: String,
    },
}

impl Args {
    fn network(&self) -> NetworkTarget {
        if self.local {
            NetworkTarget::Local
        } else if self.mainnet {
            NetworkTarget::Mainnet
        } else {
            NetworkTarget::Testnet
        }
    }
}

fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(dir) = log_dir else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return Ok(None);
    };
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create log directory {:?}", dir))?;
    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(Some(guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref())?;

    let network = args.network();
    let data_dir = config::resolve_data_dir(args.data_dir.as_deref())?;
    let schema = config::load_schema(args.abi.as_deref())?;
    let store = config::deployment_store(&data_dir, network)?;
    let record = store.load().map_err(|e| eyre!(e))?;

    let api_url = args
        .api_url
        .as_ref()
        .map(|url| url.as_str().to_string())
        .or_else(|| record.as_ref().map(|r| r.api_url.clone()))
        .unwrap_or_else(|| network.default_api_url().to_string());
    let explorer_url = args
        .explorer_url
        .as_ref()
        .map(|url| url.as_str().to_string())
        .or_else(|| record.as_ref().and_then(|r| r.explorer_url.clone()))
        .unwrap_or_else(|| network.default_explorer_url().to_string());
    let poll = PollPolicy {
        max_attempts: args.max_attempts,
        interval: Duration::from_millis(args.interval_ms),
    };

    match args.command {
        Command::RecordDeployment { contract } => {
            let record = record_deployment(
                &store,
                contract.trim(),
                schema.fingerprint(),
                &api_url,
                Some(&explorer_url),
            )
            .map_err(|e| eyre!(e))?;
            println!(
                "Recorded {} for {} at {}",
                record.contract_address,
                network.deployment_env(),
                store.path().display()
            );
        }
        Command::Last { account } => {
            let cache = ResultCache::new(FileStore::in_dir(&data_dir));
            match cache.load(account.trim()) {
                Some(result) => println!("{result}"),
                None => println!("No wager recorded for {}", account.trim()),
            }
        }
        Command::Bet {
            account,
            direction,
            prediction,
            stake,
            signer_url,
        } => {
            let contract_address = config::resolve_contract(
                args.contract.as_deref(),
                record.as_ref(),
                network,
                &schema,
            )?;
            let app = AppConfig {
                network,
                api_url,
                explorer_url,
                contract_address,
                data_dir,
                poll,
            };
            let clamped = direction.clamp_prediction(prediction);
            if clamped != prediction {
                tracing::warn!(
                    requested = prediction,
                    used = clamped,
                    "prediction out of range for {direction}"
                );
            }

            let client = WagerClient::new(
                HttpWallet::new(signer_url.as_str())?,
                IndexerClient::new(&app.api_url)?,
                ResultCache::new(FileStore::in_dir(&app.data_dir)),
                Arc::new(schema),
                app.wager_config(),
            );
            match client.submit_wager(&account, direction, clamped, stake).await {
                Ok(result) => println!("{result}"),
                Err(e) => {
                    if e.outcome_may_be_committed() {
                        eprintln!(
                            "The wager was broadcast but its result is unknown; check the explorer before betting again."
                        );
                    }
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
