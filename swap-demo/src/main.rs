// Local walkthrough of one relayer-executed swap between two parties

use anyhow::{bail, Context};
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::get_contract_address;
use relay_swap_protocol::{
    authorization::AuthorizationSigner,
    clock::{Clock, SystemClock},
    config::SystemConfig,
    data_structures::{SwapLeg, SwapRequest},
    ledger::InMemoryNonceLedger,
    onchain::{AssetBridge, ItemBridge, TokenBridge},
    swap::{CoordinatorHandle, SwapCoordinator},
};
use std::sync::Arc;

// Default local dev accounts: deployer, user A, user B, relayer
const DEV_KEYS: [&str; 4] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
];

#[derive(Parser)]
#[command(name = "swap-demo")]
#[command(about = "Swap 1500 YAYA for NFT #1 through a relayer", long_about = None)]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Amount of YAYA user A gives, in whole tokens
    #[arg(short, long, default_value = "1500")]
    amount: String,

    /// Enable debug logging regardless of the configured level
    #[arg(short, long)]
    verbose: bool,
}

fn wallet(key: &str) -> anyhow::Result<LocalWallet> {
    key.parse::<LocalWallet>().context("invalid dev key")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SystemConfig::from_file(path).with_context(|| format!("loading {}", path))?,
        None => SystemConfig::default(),
    };
    config.validate()?;

    let log_level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let deployer = wallet(DEV_KEYS[0])?;
    let user_a = AuthorizationSigner::new(wallet(DEV_KEYS[1])?);
    let user_b = AuthorizationSigner::new(wallet(DEV_KEYS[2])?);
    let relayer = wallet(DEV_KEYS[3])?;
    log::info!("Deployer: {:?}", deployer.address());
    log::info!("UserA: {:?}", user_a.address());
    log::info!("UserB: {:?}", user_b.address());
    log::info!("Relayer: {:?}", relayer.address());

    // Bridges land where the deployer's next contracts would
    let tokens = Arc::new(TokenBridge::new(get_contract_address(deployer.address(), 1u64), "YAYA", 18));
    let items = Arc::new(ItemBridge::new(get_contract_address(deployer.address(), 2u64), "MyTokenNFT"));
    log::info!("TokenYAYA at {:?}", tokens.address());
    log::info!("MyTokenNFT at {:?}", items.address());

    let clock = Arc::new(SystemClock);
    let coordinator = SwapCoordinator::new(
        &config,
        InMemoryNonceLedger::new(),
        tokens.clone() as Arc<dyn AssetBridge>,
        items.clone() as Arc<dyn AssetBridge>,
        clock.clone(),
    )?;
    let coordinator_address = coordinator.address();
    let domain = coordinator.domain().clone();
    let handle = CoordinatorHandle::new(coordinator);
    log::info!("SwapCoordinator at {:?}", coordinator_address);

    let amount = tokens.parse_amount(&cli.amount).context("invalid amount")?;
    tokens.mint(user_a.address(), amount).await?;
    log::info!("Minted {} YAYA to userA", cli.amount);
    let item_id = items.mint(user_b.address()).await?;
    log::info!("Minted NFT #{} to userB", item_id);

    tokens.approve(user_a.address(), coordinator_address, amount).await;
    items.approve(user_b.address(), coordinator_address, item_id).await?;
    log::info!("Both parties approved the coordinator");

    let deadline = clock.now() + config.default_authorization_ttl.as_secs();
    let nonce_a = handle.nonce_of(user_a.address()).await;
    let auth_a = user_a.authorize_amount(&domain, user_b.address(), amount, nonce_a, deadline)?;
    log::info!("UserA signature created: {}", auth_a.signature);
    let nonce_b = handle.nonce_of(user_b.address()).await;
    let auth_b = user_b.authorize_item(&domain, user_a.address(), item_id, nonce_b, deadline)?;
    log::info!("UserB signature created: {}", auth_b.signature);

    let request = SwapRequest {
        swap_id: U256::one(),
        fungible: SwapLeg::from_authorization(tokens.address(), auth_a),
        item: SwapLeg::from_authorization(items.address(), auth_b),
    };

    log::info!("Relayer {:?} submits swap {}", relayer.address(), request.swap_id);
    let record = match handle.perform_swap(request).await {
        Ok(record) => record,
        Err(err) => bail!("swap failed: {}", err),
    };
    log::info!("Swap {} executed at {}", record.swap_id, record.timestamp);

    report(&tokens, &items, &[("UserA", user_a.address()), ("UserB", user_b.address())], item_id).await?;
    Ok(())
}

async fn report(
    tokens: &TokenBridge,
    items: &ItemBridge,
    parties: &[(&str, Address)],
    item_id: U256,
) -> anyhow::Result<()> {
    for (name, address) in parties {
        let balance = tokens.format_amount(tokens.balance_of(*address).await)?;
        println!("{} YAYA balance: {}", name, balance);
    }
    let owner = items.owner_of(item_id).await?;
    let owner_name = parties
        .iter()
        .find(|(_, address)| *address == owner)
        .map(|(name, _)| *name)
        .unwrap_or("unknown");
    println!("NFT #{} owner: {} ({:?})", item_id, owner_name, owner);
    Ok(())
}
