// Shared scenario setup for unit and integration tests

use crate::{
    authorization::AuthorizationSigner,
    clock::ManualClock,
    config::SystemConfig,
    data_structures::{AssetDescriptor, LegKind, Party, SwapId, SwapLeg, SwapRequest},
    ledger::{InMemoryNonceLedger, NonceStore},
    onchain::{AssetBridge, BridgeError, ItemBridge, ReservationId, TokenBridge},
    swap::SwapCoordinator,
};
use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{Address, H160, U256};
use std::sync::Arc;

/// Instant the fixture signs at ("T").
pub const START_TIME: u64 = 1_700_000_000;

// Well-known local dev keys, in the order a local node hands them out
pub const DEPLOYER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const USER_A_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const USER_B_KEY: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub const TOKEN_BRIDGE_ADDRESS: Address = H160([0x70; 20]);
pub const ITEM_BRIDGE_ADDRESS: Address = H160([0x71; 20]);

pub fn signer_from_key(key: &str) -> AuthorizationSigner {
    let wallet: LocalWallet = key.parse().expect("valid test key");
    AuthorizationSigner::new(wallet)
}

/// A ready-to-swap world: A holds 1500 tokens approved to the coordinator,
/// B holds item #1 approved to the coordinator, clock at T + 10.
pub struct SwapFixture {
    pub config: SystemConfig,
    pub clock: ManualClock,
    pub tokens: Arc<TokenBridge>,
    pub items: Arc<ItemBridge>,
    pub coordinator: SwapCoordinator<InMemoryNonceLedger>,
    pub user_a: AuthorizationSigner,
    pub user_b: AuthorizationSigner,
    pub amount: U256,
    pub item_id: U256,
}

impl SwapFixture {
    pub async fn new() -> Self {
        Self::with_config(SystemConfig::default()).await
    }

    pub async fn with_config(config: SystemConfig) -> Self {
        let clock = ManualClock::new(START_TIME);
        let tokens = Arc::new(TokenBridge::new(TOKEN_BRIDGE_ADDRESS, "YAYA", 18));
        let items = Arc::new(ItemBridge::new(ITEM_BRIDGE_ADDRESS, "MyTokenNFT"));
        let user_a = signer_from_key(USER_A_KEY);
        let user_b = signer_from_key(USER_B_KEY);

        let coordinator = SwapCoordinator::new(
            &config,
            InMemoryNonceLedger::new(),
            tokens.clone() as Arc<dyn AssetBridge>,
            items.clone() as Arc<dyn AssetBridge>,
            Arc::new(clock.clone()),
        )
        .expect("default config is valid");
        let operator = coordinator.address();

        let amount = tokens.parse_amount("1500").expect("valid amount");
        tokens.mint(user_a.address(), amount).await.expect("mint tokens");
        tokens.approve(user_a.address(), operator, amount).await;

        let item_id = items.mint(user_b.address()).await.expect("mint item");
        items.approve(user_b.address(), operator, item_id).await.expect("approve item");

        let fixture = SwapFixture { config, clock, tokens, items, coordinator, user_a, user_b, amount, item_id };
        fixture.clock.set(START_TIME + 10);
        fixture
    }

    pub fn deadline(&self) -> u64 {
        START_TIME + self.config.default_authorization_ttl.as_secs()
    }

    /// Both legs signed at the parties' current nonces.
    pub fn signed_request(&self, swap_id: SwapId) -> SwapRequest {
        let nonce_a = self.coordinator.nonce_of(&self.user_a.address());
        let nonce_b = self.coordinator.nonce_of(&self.user_b.address());
        self.signed_request_with_nonces(swap_id, nonce_a, nonce_b)
    }

    pub fn signed_request_with_nonces(&self, swap_id: SwapId, nonce_a: U256, nonce_b: U256) -> SwapRequest {
        let domain = self.coordinator.domain();
        let deadline = self.deadline();
        let leg_a = self
            .user_a
            .authorize_amount(domain, self.user_b.address(), self.amount, nonce_a, deadline)
            .expect("sign fungible leg");
        let leg_b = self
            .user_b
            .authorize_item(domain, self.user_a.address(), self.item_id, nonce_b, deadline)
            .expect("sign item leg");
        SwapRequest {
            swap_id,
            fungible: SwapLeg::from_authorization(TOKEN_BRIDGE_ADDRESS, leg_a),
            item: SwapLeg::from_authorization(ITEM_BRIDGE_ADDRESS, leg_b),
        }
    }

    pub async fn balance_of(&self, party: Party) -> U256 {
        self.tokens.balance_of(party).await
    }
}

/// Wraps a bridge and refuses every commit, leaving the reservation pending.
pub struct RefusingCommitBridge<B> {
    pub inner: Arc<B>,
}

#[async_trait]
impl<B: AssetBridge> AssetBridge for RefusingCommitBridge<B> {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn kind(&self) -> LegKind {
        self.inner.kind()
    }

    async fn reserve(
        &self,
        operator: Address,
        from: Party,
        to: Party,
        asset: &AssetDescriptor,
    ) -> Result<ReservationId, BridgeError> {
        self.inner.reserve(operator, from, to, asset).await
    }

    async fn commit(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        Err(BridgeError::UnknownReservation(reservation))
    }

    async fn release(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        self.inner.release(reservation).await
    }

    async fn revert(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        self.inner.revert(reservation).await
    }

    async fn settle(&self, reservation: ReservationId) {
        self.inner.settle(reservation).await
    }
}

impl SwapFixture {
    /// Another coordinator over the fixture's bridges and clock, with its own
    /// nonce store and, optionally, a replacement item bridge.
    pub fn coordinator_with<S: NonceStore>(
        &self,
        ledger: S,
        item_bridge: Option<Arc<dyn AssetBridge>>,
    ) -> SwapCoordinator<S> {
        let items = item_bridge.unwrap_or_else(|| self.items.clone() as Arc<dyn AssetBridge>);
        SwapCoordinator::new(
            &self.config,
            ledger,
            self.tokens.clone() as Arc<dyn AssetBridge>,
            items,
            Arc::new(self.clock.clone()),
        )
        .expect("fixture config is valid")
    }
}
