use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{Address, B256, U256};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use smart_session_encoder::{
    abi::{self, DEFAULT_ABI_BASE_URL, DEFAULT_ABI_NETWORK},
    build_session,
    calldata::encode_function_call,
    history::DEFAULT_EXPLORER,
    is_module_installed, permission_id,
    registry::parse_selector,
    AbiDataClient, AbiState, ActionRegistry, BundlerRpcClient, Call, DispatcherConfig, LocalSigner,
    OwnerSigner, PermissionController, PermissionState, SessionKeySigner, TransactionHistory, UserOperationDispatcher,
    ValidatorConfig,
};
use smart_session_types::{
    addresses::{SAFE_7579_ADAPTER, SEPOLIA_CHAIN_ID},
    Action, Session,
};

/// Build smart sessions for a Safe7579 account, install or update them, and send
/// session-key transactions through an ERC-4337 bundler.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the functions of a contract that a session action may target.
    Abi {
        target: Address,
        #[command(flatten)]
        abi: AbiArgs,
    },
    /// Build a session from actions and write it to a JSON file.
    Session {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value = "session.json")]
        out: PathBuf,
    },
    /// Report whether SmartSessions is installed on the account.
    Status {
        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Trust attesters and install SmartSessions with the session enabled.
    Install {
        #[command(flatten)]
        chain: ChainArgs,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Replace the enabled session with a new action list.
    Update {
        #[command(flatten)]
        chain: ChainArgs,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Send a transaction signed by the session key.
    Send {
        #[command(flatten)]
        chain: ChainArgs,
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        abi: AbiArgs,
        #[arg(long)]
        target: Address,
        /// Function name, signature, 4-byte selector or `native-transfer`.
        #[arg(long, default_value = abi::NATIVE_TRANSFER)]
        function: String,
        /// Function arguments in declaration order.
        #[arg(long = "arg", num_args = 1)]
        args: Vec<String>,
        /// Wei attached to the call.
        #[arg(long, default_value = "0")]
        value: U256,
    },
}

#[derive(Args, Debug)]
struct ChainArgs {
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    #[arg(long, env = "BUNDLER_URL")]
    bundler_url: String,

    #[arg(long, env = "CHAIN_ID", default_value_t = SEPOLIA_CHAIN_ID)]
    chain_id: u64,

    /// Smart account (Safe with the 7579 adapter) the operations are sent from.
    #[arg(long, env = "ACCOUNT_ADDRESS")]
    account: Address,

    /// Owner key (hex string, 0x...) signing install and update bundles.
    #[arg(long, env = "OWNER_PRIVATE_KEY")]
    owner_private_key: Option<String>,

    /// Verifying contract of the owner's `SafeOp` signatures.
    #[arg(long, env = "SAFE4337_MODULE", default_value_t = SAFE_7579_ADAPTER)]
    safe4337_module: Address,

    #[arg(long, env = "RECEIPT_TIMEOUT_SECS", default_value_t = 120)]
    receipt_timeout_secs: u64,

    /// Ask the paymaster to sponsor gas.
    #[arg(long, env = "SPONSOR", default_value_t = true, action = clap::ArgAction::Set)]
    sponsor: bool,

    #[arg(long, env = "EXPLORER_URL", default_value = DEFAULT_EXPLORER)]
    explorer_url: String,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// `ADDRESS:SELECTOR`, repeatable; the selector may also be a signature or `native-transfer`.
    #[arg(long = "action", value_parser = parse_action_arg, conflicts_with = "session_file")]
    actions: Vec<(Address, String)>,

    /// Previously written session JSON.
    #[arg(long = "session")]
    session_file: Option<PathBuf>,

    /// Session key (hex string, 0x...); its address becomes the session's only owner.
    #[arg(long, env = "SESSION_PRIVATE_KEY")]
    session_private_key: Option<String>,

    #[arg(long)]
    salt: Option<B256>,
}

#[derive(Args, Debug)]
struct AbiArgs {
    #[arg(long, env = "ABI_BASE_URL", default_value = DEFAULT_ABI_BASE_URL)]
    abi_base_url: String,

    #[arg(long, env = "ABI_NETWORK", default_value = DEFAULT_ABI_NETWORK)]
    abi_network: String,
}

/// On-disk form written by `session` and read back by `--session`.
#[derive(Serialize, Deserialize, Debug)]
struct SessionFile {
    generated_at: String,
    permission_id: B256,
    session: Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Abi { target, abi } => run_abi(target, &abi).await,
        Command::Session { session, out } => run_session(&session, &out),
        Command::Status { chain } => run_status(&chain).await,
        Command::Install { chain, session } => run_install(&chain, &session).await,
        Command::Update { chain, session } => run_update(&chain, &session).await,
        Command::Send { chain, session, abi, target, function, args, value } => {
            run_send(&chain, &session, &abi, target, &function, &args, value).await
        }
    }
}

fn parse_action_arg(raw: &str) -> Result<(Address, String)> {
    let re = Regex::new(r"^(0x[a-fA-F0-9]{40}):(.+)$")?;
    let caps = re
        .captures(raw.trim())
        .ok_or_else(|| anyhow!("expected ADDRESS:SELECTOR, got `{raw}`"))?;
    let target: Address = caps[1].parse().with_context(|| format!("invalid action target in `{raw}`"))?;
    Ok((target, caps[2].to_string()))
}

async fn run_abi(target: Address, args: &AbiArgs) -> Result<()> {
    let source = abi_client(args);
    let state = ActionRegistry::default().resolve_selectors(&source, target).await;
    if let AbiState::Unavailable { reason, .. } = &state {
        println!("{reason}");
    }
    for function in state.options() {
        println!("{}  {}  ({})", function.selector(), function.signature(), function.state_mutability);
    }
    Ok(())
}

fn run_session(args: &SessionArgs, out: &Path) -> Result<()> {
    let session = load_session(args)?;
    let id = permission_id(&session);
    write_session_file(out, &session)?;
    println!("Wrote session {id} with {} action(s) to {}", session.actions.len(), out.display());
    Ok(())
}

async fn run_status(chain: &ChainArgs) -> Result<()> {
    let dispatcher = dispatcher(chain)?;
    let installed = is_module_installed(&dispatcher).await;
    println!("SmartSessions installed on {}: {installed}", chain.account);
    Ok(())
}

async fn run_install(chain: &ChainArgs, args: &SessionArgs) -> Result<()> {
    let session = load_session(args)?;
    let dispatcher = dispatcher(chain)?;
    let owner = owner_signer(chain)?;

    let mut controller = PermissionController::new(&dispatcher, &owner);
    if is_module_installed(&dispatcher).await {
        controller = controller.with_state(PermissionState::Installed { permission_id: permission_id(&session) });
    }

    let mut history = TransactionHistory::new(chain.explorer_url.clone());
    let tx_hash = controller.install(&session).await.context("install failed")?;
    history.record(tx_hash, true);
    print_history(&history);
    Ok(())
}

async fn run_update(chain: &ChainArgs, args: &SessionArgs) -> Result<()> {
    let session = load_session(args)?;
    let dispatcher = dispatcher(chain)?;
    let owner = owner_signer(chain)?;

    let mut controller = PermissionController::new(&dispatcher, &owner);
    if is_module_installed(&dispatcher).await {
        controller = controller.with_state(PermissionState::Installed { permission_id: permission_id(&session) });
    }

    let mut history = TransactionHistory::new(chain.explorer_url.clone());
    let tx_hash = controller.update(&session).await.context("update failed")?;
    history.record(tx_hash, true);
    print_history(&history);
    Ok(())
}

async fn run_send(
    chain: &ChainArgs,
    args: &SessionArgs,
    abi_args: &AbiArgs,
    target: Address,
    function: &str,
    call_args: &[String],
    value: U256,
) -> Result<()> {
    let session = load_session(args)?;
    let key = session_key(args)?;
    let id = permission_id(&session);

    let selector = parse_selector(function).ok();
    let allowed = session
        .actions
        .iter()
        .any(|a| a.target == target && selector.map_or(true, |s| s == a.selector));
    if !allowed {
        warn!(%target, function, "no session action matches this call; the account will likely reject it");
    }

    let data = if function == abi::NATIVE_TRANSFER {
        Default::default()
    } else {
        let state = ActionRegistry::default().resolve_selectors(&abi_client(abi_args), target).await;
        let entry = state
            .find_by_name(function)
            .or_else(|| selector.and_then(|s| state.find(s)))
            .ok_or_else(|| anyhow!("`{function}` is not a callable function of {target}"))?;
        encode_function_call(entry, call_args).with_context(|| format!("failed encoding `{}`", entry.signature()))?
    };

    let dispatcher = dispatcher(chain)?;
    let signer = SessionKeySigner::new(key, id).with_threshold(1);
    info!(session_key = %signer.address(), permission_id = %id, "sending with session key");

    let mut history = TransactionHistory::new(chain.explorer_url.clone());
    let tx_hash = dispatcher
        .dispatch(&[Call::new(target, data).with_value(value)], &signer)
        .await
        .context("session transaction failed")?;
    history.record(tx_hash, true);
    print_history(&history);
    Ok(())
}

fn abi_client(args: &AbiArgs) -> AbiDataClient {
    AbiDataClient::new(args.abi_base_url.clone(), args.abi_network.clone())
}

fn dispatcher(chain: &ChainArgs) -> Result<UserOperationDispatcher<BundlerRpcClient>> {
    let client = BundlerRpcClient::new(&chain.rpc_url, &chain.bundler_url)
        .context("failed creating bundler client")?
        .with_chain_id(chain.chain_id);
    let config = DispatcherConfig {
        receipt_timeout: Duration::from_secs(chain.receipt_timeout_secs),
        sponsor: chain.sponsor,
        ..Default::default()
    };
    Ok(UserOperationDispatcher::new(client, chain.account).with_config(config))
}

fn owner_signer(chain: &ChainArgs) -> Result<OwnerSigner> {
    let key = chain
        .owner_private_key
        .as_deref()
        .ok_or_else(|| anyhow!("missing owner key: provide --owner-private-key (or set OWNER_PRIVATE_KEY)"))?;
    let key = LocalSigner::from_hex(key).context("invalid owner key")?;
    Ok(OwnerSigner::new(key, chain.safe4337_module))
}

fn session_key(args: &SessionArgs) -> Result<LocalSigner> {
    let key = args
        .session_private_key
        .as_deref()
        .ok_or_else(|| anyhow!("missing session key: provide --session-private-key (or set SESSION_PRIVATE_KEY)"))?;
    LocalSigner::from_hex(key).context("invalid session key")
}

/// Session from `--session`, or built from `--action` rows for the session key.
fn load_session(args: &SessionArgs) -> Result<Session> {
    if let Some(path) = &args.session_file {
        let raw = fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
        let file: SessionFile =
            serde_json::from_str(&raw).with_context(|| format!("failed parsing JSON in {}", path.display()))?;
        if permission_id(&file.session) != file.permission_id {
            warn!(path = %path.display(), "stored permission id does not match the session, using the recomputed one");
        }
        return Ok(file.session);
    }

    let registry = ActionRegistry::default();
    let mut actions: Vec<Action> = Vec::new();
    for (target, selector) in &args.actions {
        let selector = parse_selector(selector).with_context(|| format!("invalid selector for {target}"))?;
        actions = registry.add_call(&actions, *target, selector);
    }

    let key = session_key(args)?;
    let mut config = ValidatorConfig::ownable(key.address());
    if let Some(salt) = args.salt {
        config = config.with_salt(salt);
    }
    if actions.is_empty() {
        warn!("building a session without actions");
    }
    Ok(build_session(&actions, &config))
}

fn write_session_file(path: &Path, session: &Session) -> Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    let file = SessionFile { generated_at: now, permission_id: permission_id(session), session: session.clone() };
    let value = serde_json::to_value(&file).context("failed serialising session")?;
    write_json_atomic(path, &value)
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised = serde_json::to_string_pretty(value).context("failed serialising session JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn print_history(history: &TransactionHistory) {
    for record in history.records() {
        let status = if record.success { "ok" } else { "failed" };
        println!("[{status}] {}  {}", record.hash, record.link);
    }
}
