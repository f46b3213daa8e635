// Swap coordinator: validates two signed legs and executes them as one unit

use crate::authorization::codec::signing_digest;
use crate::authorization::verifier;
use crate::clock::Clock;
use crate::config::{ConfigError, SystemConfig};
use crate::data_structures::{AssetDescriptor, Domain, LegKind, Party, SwapId, SwapLeg, SwapRequest};
use crate::ledger::{InMemoryNonceLedger, LedgerError, NonceStore};
use crate::onchain::{AssetBridge, ReservationId};
use crate::swap::types::{SwapError, SwapEvent, SwapRecord, SwapStatus};
use ethers::types::{Address, U256};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

// Tracks one perform_swap call through Received -> Validated -> Executed | Rejected
struct SwapAttempt {
    swap_id: SwapId,
    status: SwapStatus,
}

impl SwapAttempt {
    fn new(swap_id: SwapId) -> Self {
        log::debug!("[Coordinator] Swap {}: {:?}", swap_id, SwapStatus::Received);
        SwapAttempt { swap_id, status: SwapStatus::Received }
    }

    fn transition(&mut self, next: SwapStatus) {
        debug_assert!(self.status.can_transition_to(&next), "invalid swap transition");
        log::debug!("[Coordinator] Swap {}: {:?} -> {:?}", self.swap_id, self.status, next);
        self.status = next;
    }
}

pub struct SwapCoordinator<S: NonceStore = InMemoryNonceLedger> {
    domain: Domain,
    ledger: S,
    token_bridge: Arc<dyn AssetBridge>,
    item_bridge: Arc<dyn AssetBridge>,
    clock: Arc<dyn Clock>,
    // Recent events, oldest first, bounded by config.event_history_capacity
    history: VecDeque<SwapEvent>,
    history_capacity: usize,
    event_tx: Option<mpsc::UnboundedSender<SwapEvent>>,
}

impl<S: NonceStore> SwapCoordinator<S> {
    pub fn new(
        config: &SystemConfig,
        ledger: S,
        token_bridge: Arc<dyn AssetBridge>,
        item_bridge: Arc<dyn AssetBridge>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if token_bridge.kind() != LegKind::Fungible {
            return Err(ConfigError::Invalid(format!(
                "token bridge {:?} moves {} assets",
                token_bridge.address(),
                token_bridge.kind()
            )));
        }
        if item_bridge.kind() != LegKind::Item {
            return Err(ConfigError::Invalid(format!(
                "item bridge {:?} moves {} assets",
                item_bridge.address(),
                item_bridge.kind()
            )));
        }
        let domain = config.domain();
        log::info!(
            "[Coordinator] Initialized at {:?} (domain {} v{}, chain {}), token bridge {:?}, item bridge {:?}",
            domain.verifying_contract,
            domain.name,
            domain.version,
            domain.chain_id,
            token_bridge.address(),
            item_bridge.address()
        );
        Ok(SwapCoordinator {
            domain,
            ledger,
            token_bridge,
            item_bridge,
            clock,
            history: VecDeque::new(),
            history_capacity: config.event_history_capacity,
            event_tx: None,
        })
    }

    /// Address signatures must be bound to.
    pub fn address(&self) -> Address {
        self.domain.verifying_contract
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Nonce a party must sign its next authorization with.
    pub fn nonce_of(&self, party: &Party) -> U256 {
        self.ledger.current(party)
    }

    pub fn ledger(&self) -> &S {
        &self.ledger
    }

    pub fn history(&self) -> impl Iterator<Item = &SwapEvent> {
        self.history.iter()
    }

    /// Whether an executed swap with this id is still in the retained history.
    pub fn was_executed(&self, swap_id: SwapId) -> bool {
        self.history
            .iter()
            .any(|event| matches!(event, SwapEvent::Executed(record) if record.swap_id == swap_id))
    }

    /// Returns a stream of every event published from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SwapEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Validates both legs of `request` and, only if both pass, moves both
    /// assets. Either everything happens or nothing does.
    ///
    /// Anyone may submit: the two embedded signatures are the only authority.
    pub async fn perform_swap(&mut self, request: &SwapRequest) -> Result<SwapRecord, SwapError> {
        let mut attempt = SwapAttempt::new(request.swap_id);
        log::info!(
            "[Coordinator] Received swap {}: {:?} gives {} for {:?}'s {}",
            request.swap_id,
            request.fungible.party,
            request.fungible.asset,
            request.item.party,
            request.item.asset
        );

        match self.execute(request, &mut attempt).await {
            Ok(record) => {
                attempt.transition(SwapStatus::Executed);
                // Swap ids carry no authority; reuse within the retained history is only flagged
                if self.was_executed(record.swap_id) {
                    log::warn!("[Coordinator] Swap id {} was already used by an earlier swap", record.swap_id);
                }
                log::info!("[Coordinator] Swap {} executed", record.swap_id);
                self.publish(SwapEvent::Executed(record.clone()));
                Ok(record)
            }
            Err(err) => {
                log::warn!("[Coordinator] Swap {} rejected: {}", request.swap_id, err);
                let timestamp = self.clock.now();
                self.publish(SwapEvent::Rejected {
                    swap_id: request.swap_id,
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                    timestamp,
                });
                attempt.transition(SwapStatus::Rejected(err.clone()));
                Err(err)
            }
        }
    }

    async fn execute(&mut self, request: &SwapRequest, attempt: &mut SwapAttempt) -> Result<SwapRecord, SwapError> {
        // 1. Validate both legs before touching any state
        self.check_structure(request)?;
        self.validate_leg(LegKind::Fungible, &request.fungible)?;
        self.validate_leg(LegKind::Item, &request.item)?;
        attempt.transition(SwapStatus::Validated);

        let fungible = &request.fungible;
        let item = &request.item;
        let nonce_a = fungible.authorization.nonce;
        let nonce_b = item.authorization.nonce;

        // 2. Point of no return: burn both nonces
        self.ledger
            .consume(&fungible.party, nonce_a)
            .map_err(|e| nonce_error(LegKind::Fungible, e))?;
        if let Err(e) = self.ledger.consume(&item.party, nonce_b) {
            self.rewind_nonces(&[(fungible.party, nonce_a)]);
            return Err(nonce_error(LegKind::Item, e));
        }
        let consumed = [(fungible.party, nonce_a), (item.party, nonce_b)];

        // 3. Reserve on both bridges; any failure undoes the whole attempt
        let operator = self.address();
        let token_bridge = Arc::clone(&self.token_bridge);
        let item_bridge = Arc::clone(&self.item_bridge);

        let token_reservation = match token_bridge
            .reserve(operator, fungible.party, fungible.counterparty, &fungible.asset)
            .await
        {
            Ok(id) => id,
            Err(source) => {
                self.rewind_nonces(&consumed);
                return Err(SwapError::BridgeTransferFailed { leg: LegKind::Fungible, source });
            }
        };
        let item_reservation = match item_bridge.reserve(operator, item.party, item.counterparty, &item.asset).await {
            Ok(id) => id,
            Err(source) => {
                release_quietly(token_bridge.as_ref(), token_reservation).await;
                self.rewind_nonces(&consumed);
                return Err(SwapError::BridgeTransferFailed { leg: LegKind::Item, source });
            }
        };

        // 4. Commit both, then settle. A failed second commit reverts the first.
        if let Err(source) = token_bridge.commit(token_reservation).await {
            release_quietly(token_bridge.as_ref(), token_reservation).await;
            release_quietly(item_bridge.as_ref(), item_reservation).await;
            self.rewind_nonces(&consumed);
            return Err(SwapError::BridgeTransferFailed { leg: LegKind::Fungible, source });
        }
        if let Err(source) = item_bridge.commit(item_reservation).await {
            log::warn!(
                "[Coordinator] Swap {}: item commit failed after token commit, reverting: {}",
                request.swap_id,
                source
            );
            if let Err(e) = token_bridge.revert(token_reservation).await {
                log::error!(
                    "[Coordinator] Swap {}: failed to revert token transfer {}: {}",
                    request.swap_id,
                    token_reservation,
                    e
                );
            }
            release_quietly(item_bridge.as_ref(), item_reservation).await;
            self.rewind_nonces(&consumed);
            return Err(SwapError::BridgeTransferFailed { leg: LegKind::Item, source });
        }
        token_bridge.settle(token_reservation).await;
        item_bridge.settle(item_reservation).await;

        Ok(SwapRecord {
            swap_id: request.swap_id,
            party_a: fungible.party,
            party_b: item.party,
            amount: fungible.asset.value(),
            item_id: item.asset.value(),
            timestamp: self.clock.now(),
        })
    }

    // Request-level consistency, independent of signatures
    fn check_structure(&self, request: &SwapRequest) -> Result<(), SwapError> {
        let fungible = &request.fungible;
        let item = &request.item;

        if !matches!(fungible.asset, AssetDescriptor::Amount(_)) {
            return Err(SwapError::MalformedRequest("leg A must carry a fungible amount".into()));
        }
        if !matches!(item.asset, AssetDescriptor::Item(_)) {
            return Err(SwapError::MalformedRequest("leg B must carry an item id".into()));
        }
        if fungible.bridge != self.token_bridge.address() {
            return Err(SwapError::MalformedRequest(format!(
                "unknown token bridge {:?}",
                fungible.bridge
            )));
        }
        if item.bridge != self.item_bridge.address() {
            return Err(SwapError::MalformedRequest(format!("unknown item bridge {:?}", item.bridge)));
        }
        for (kind, leg) in [(LegKind::Fungible, fungible), (LegKind::Item, item)] {
            let auth = &leg.authorization;
            if auth.party != leg.party
                || auth.counterparty != leg.counterparty
                || auth.asset != leg.asset
            {
                return Err(SwapError::MalformedRequest(format!(
                    "{} leg fields do not match its authorization",
                    kind
                )));
            }
            if leg.party.is_zero() || leg.counterparty.is_zero() {
                return Err(SwapError::MalformedRequest(format!("{} leg names the zero address", kind)));
            }
        }
        if fungible.party == item.party {
            return Err(SwapError::MalformedRequest("both legs are signed by the same party".into()));
        }
        if fungible.counterparty != item.party || item.counterparty != fungible.party {
            return Err(SwapError::MalformedRequest("legs are not reciprocal".into()));
        }
        Ok(())
    }

    // Signature, then deadline, then nonce. Read-only.
    fn validate_leg(&self, kind: LegKind, leg: &SwapLeg) -> Result<(), SwapError> {
        let auth = &leg.authorization;
        let digest = signing_digest(&self.domain, kind, &auth.message())
            .map_err(|e| SwapError::MalformedRequest(e.to_string()))?;
        if !verifier::verify(digest, &auth.signature, auth.party) {
            return Err(SwapError::InvalidSignature { leg: kind, party: auth.party });
        }

        let now = self.clock.now();
        if now > auth.deadline {
            return Err(SwapError::ExpiredAuthorization { leg: kind, deadline: auth.deadline, now });
        }

        let expected = self.ledger.current(&auth.party);
        if auth.nonce != expected {
            return Err(SwapError::StaleOrFutureNonce {
                leg: kind,
                party: auth.party,
                expected,
                presented: auth.nonce,
            });
        }
        log::debug!(
            "[Coordinator] {} leg of {:?} validated (nonce {}, digest 0x{})",
            kind,
            auth.party,
            auth.nonce,
            hex::encode(digest)
        );
        Ok(())
    }

    fn rewind_nonces(&mut self, consumed: &[(Party, U256)]) {
        for (party, nonce) in consumed.iter().rev() {
            if let Err(e) = self.ledger.rewind(party, *nonce) {
                log::error!("[Coordinator] Failed to roll back nonce of {:?}: {}", party, e);
            }
        }
    }

    fn publish(&mut self, event: SwapEvent) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
        if let Some(tx) = &self.event_tx {
            if tx.send(event).is_err() {
                log::debug!("[Coordinator] Event subscriber dropped");
                self.event_tx = None;
            }
        }
    }
}

fn nonce_error(leg: LegKind, err: LedgerError) -> SwapError {
    match err {
        LedgerError::NonceMismatch { party, expected, presented } => {
            SwapError::StaleOrFutureNonce { leg, party, expected, presented }
        }
        other => SwapError::MalformedRequest(other.to_string()),
    }
}

async fn release_quietly(bridge: &dyn AssetBridge, reservation: ReservationId) {
    if let Err(e) = bridge.release(reservation).await {
        log::error!("[Coordinator] Failed to release reservation {} on {:?}: {}", reservation, bridge.address(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::onchain::{BridgeError, ItemBridge, TokenBridge};
    use crate::test_utils::{RefusingCommitBridge, SwapFixture, START_TIME};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum LedgerCall {
        Consume(Party, U256),
        Rewind(Party, U256),
    }

    // Nonce store that records every mutation it is asked to make
    #[derive(Default)]
    struct RecordingStore {
        inner: InMemoryNonceLedger,
        calls: Arc<Mutex<Vec<LedgerCall>>>,
    }

    impl NonceStore for RecordingStore {
        fn current(&self, party: &Party) -> U256 {
            self.inner.current(party)
        }

        fn consume(&mut self, party: &Party, presented: U256) -> Result<(), LedgerError> {
            self.calls.lock().unwrap().push(LedgerCall::Consume(*party, presented));
            self.inner.consume(party, presented)
        }

        fn rewind(&mut self, party: &Party, to: U256) -> Result<(), LedgerError> {
            self.calls.lock().unwrap().push(LedgerCall::Rewind(*party, to));
            self.inner.rewind(party, to)
        }
    }

    #[tokio::test]
    async fn valid_swap_executes_and_advances_both_nonces() {
        let mut fx = SwapFixture::new().await;
        let request = fx.signed_request(U256::one());

        let record = fx.coordinator.perform_swap(&request).await.unwrap();
        assert_eq!(record.party_a, fx.user_a.address());
        assert_eq!(record.party_b, fx.user_b.address());
        assert_eq!(record.amount, fx.amount);
        assert_eq!(record.item_id, fx.item_id);
        assert_eq!(record.timestamp, START_TIME + 10);

        assert_eq!(fx.coordinator.nonce_of(&fx.user_a.address()), U256::one());
        assert_eq!(fx.coordinator.nonce_of(&fx.user_b.address()), U256::one());
        assert_eq!(fx.tokens.balance_of(fx.user_a.address()).await, U256::zero());
        assert_eq!(fx.tokens.balance_of(fx.user_b.address()).await, fx.amount);
        assert_eq!(fx.items.owner_of(fx.item_id).await.unwrap(), fx.user_a.address());
    }

    #[tokio::test]
    async fn replayed_pair_fails_on_nonce() {
        let mut fx = SwapFixture::new().await;
        let request = fx.signed_request(U256::one());
        fx.coordinator.perform_swap(&request).await.unwrap();

        let err = fx.coordinator.perform_swap(&request).await.unwrap_err();
        assert!(matches!(err, SwapError::StaleOrFutureNonce { leg: LegKind::Fungible, .. }));
        assert_eq!(fx.coordinator.nonce_of(&fx.user_a.address()), U256::one());
    }

    #[tokio::test]
    async fn structural_errors_are_malformed_requests() {
        let mut fx = SwapFixture::new().await;

        let mut wrong_bridge = fx.signed_request(U256::one());
        wrong_bridge.fungible.bridge = Address::repeat_byte(0x99);
        let err = fx.coordinator.perform_swap(&wrong_bridge).await.unwrap_err();
        assert!(matches!(err, SwapError::MalformedRequest(_)));

        let mut mismatched = fx.signed_request(U256::one());
        mismatched.fungible.asset = AssetDescriptor::Amount(U256::from(1u64));
        let err = fx.coordinator.perform_swap(&mismatched).await.unwrap_err();
        assert!(matches!(err, SwapError::MalformedRequest(_)));

        let mut swapped = fx.signed_request(U256::one());
        std::mem::swap(&mut swapped.fungible, &mut swapped.item);
        let err = fx.coordinator.perform_swap(&swapped).await.unwrap_err();
        assert!(matches!(err, SwapError::MalformedRequest(_)));

        // Nothing consumed
        assert_eq!(fx.coordinator.nonce_of(&fx.user_a.address()), U256::zero());
        assert_eq!(fx.coordinator.nonce_of(&fx.user_b.address()), U256::zero());
    }

    #[tokio::test]
    async fn future_nonce_is_rejected() {
        let mut fx = SwapFixture::new().await;
        let request = fx.signed_request_with_nonces(U256::one(), U256::one(), U256::zero());
        let err = fx.coordinator.perform_swap(&request).await.unwrap_err();
        assert_eq!(
            err,
            SwapError::StaleOrFutureNonce {
                leg: LegKind::Fungible,
                party: fx.user_a.address(),
                expected: U256::zero(),
                presented: U256::one(),
            }
        );
    }

    #[tokio::test]
    async fn bridge_failure_rolls_back_nonces_and_reservations() {
        let mut fx = SwapFixture::new().await;
        // B withdraws the item approval before the relayer submits
        fx.items.approve(fx.user_b.address(), Address::repeat_byte(0x01), fx.item_id).await.unwrap();

        let request = fx.signed_request(U256::one());
        let err = fx.coordinator.perform_swap(&request).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::BridgeTransferFailed { leg: LegKind::Item, source: BridgeError::NotApproved { .. } }
        ));

        assert_eq!(fx.coordinator.nonce_of(&fx.user_a.address()), U256::zero());
        assert_eq!(fx.coordinator.nonce_of(&fx.user_b.address()), U256::zero());
        assert_eq!(fx.tokens.balance_of(fx.user_a.address()).await, fx.amount);
        assert_eq!(fx.tokens.allowance(fx.user_a.address(), fx.coordinator.address()).await, fx.amount);
        assert_eq!(fx.tokens.pending_reservations().await, 0);
        assert_eq!(fx.items.owner_of(fx.item_id).await.unwrap(), fx.user_b.address());
    }

    #[tokio::test]
    async fn events_are_published_and_bounded() {
        let mut fx = SwapFixture::new().await;
        let mut rx = fx.coordinator.subscribe();

        let request = fx.signed_request(U256::from(7u64));
        fx.coordinator.perform_swap(&request).await.unwrap();
        fx.coordinator.perform_swap(&request).await.unwrap_err();

        match rx.recv().await.unwrap() {
            SwapEvent::Executed(record) => assert_eq!(record.swap_id, U256::from(7u64)),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            SwapEvent::Rejected { kind, .. } => assert_eq!(kind, "StaleOrFutureNonce"),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(fx.coordinator.history().count(), 2);
    }

    #[tokio::test]
    async fn constructor_rejects_swapped_bridges() {
        let config = SystemConfig::default();
        let tokens: Arc<dyn AssetBridge> = Arc::new(TokenBridge::new(Address::repeat_byte(0x70), "YAYA", 18));
        let items: Arc<dyn AssetBridge> = Arc::new(ItemBridge::new(Address::repeat_byte(0x71), "NFT"));
        let result = SwapCoordinator::new(
            &config,
            InMemoryNonceLedger::new(),
            items,
            tokens,
            Arc::new(ManualClock::new(START_TIME)),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn bad_signature_never_reaches_the_store() {
        let fx = SwapFixture::new().await;
        let store = RecordingStore::default();
        let calls = store.calls.clone();
        let mut coordinator = fx.coordinator_with(store, None);

        let mut request = fx.signed_request(U256::one());
        let mut sig = request.item.authorization.signature.to_vec();
        sig[5] ^= 0x01;
        request.item.authorization.signature = sig.into();

        let err = coordinator.perform_swap(&request).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidSignature { leg: LegKind::Item, .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_sees_consume_then_rewind_on_bridge_failure() {
        let fx = SwapFixture::new().await;
        let (a, b) = (fx.user_a.address(), fx.user_b.address());
        fx.items.approve(b, Address::repeat_byte(0x01), fx.item_id).await.unwrap();
        let store = RecordingStore::default();
        let calls = store.calls.clone();
        let mut coordinator = fx.coordinator_with(store, None);

        let request = fx.signed_request(U256::one());
        coordinator.perform_swap(&request).await.unwrap_err();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LedgerCall::Consume(a, U256::zero()),
                LedgerCall::Consume(b, U256::zero()),
                LedgerCall::Rewind(b, U256::zero()),
                LedgerCall::Rewind(a, U256::zero()),
            ]
        );
        assert_eq!(coordinator.nonce_of(&a), U256::zero());
        assert_eq!(coordinator.nonce_of(&b), U256::zero());
    }

    #[tokio::test]
    async fn store_only_consumes_on_success() {
        let fx = SwapFixture::new().await;
        let store = RecordingStore::default();
        let calls = store.calls.clone();
        let mut coordinator = fx.coordinator_with(store, None);

        coordinator.perform_swap(&fx.signed_request(U256::one())).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LedgerCall::Consume(fx.user_a.address(), U256::zero()),
                LedgerCall::Consume(fx.user_b.address(), U256::zero()),
            ]
        );
        assert_eq!(coordinator.ledger().inner.current(&fx.user_a.address()), U256::one());
    }

    #[tokio::test]
    async fn failed_item_commit_reverts_token_leg() {
        let fx = SwapFixture::new().await;
        let (a, b) = (fx.user_a.address(), fx.user_b.address());
        let refusing = Arc::new(RefusingCommitBridge { inner: fx.items.clone() });
        let mut coordinator = fx.coordinator_with(InMemoryNonceLedger::new(), Some(refusing as Arc<dyn AssetBridge>));

        let request = fx.signed_request(U256::one());
        let err = coordinator.perform_swap(&request).await.unwrap_err();
        assert!(matches!(err, SwapError::BridgeTransferFailed { leg: LegKind::Item, .. }));

        assert_eq!(fx.tokens.balance_of(a).await, fx.amount);
        assert_eq!(fx.tokens.balance_of(b).await, U256::zero());
        assert_eq!(fx.tokens.allowance(a, coordinator.address()).await, fx.amount);
        assert_eq!(fx.items.owner_of(fx.item_id).await.unwrap(), b);
        assert_eq!(coordinator.nonce_of(&a), U256::zero());
        assert_eq!(coordinator.nonce_of(&b), U256::zero());
        assert_eq!(fx.tokens.pending_reservations().await, 0);
        assert_eq!(fx.tokens.unsettled_transfers().await, 0);
        assert_eq!(fx.items.pending_reservations().await, 0);
    }

    #[tokio::test]
    async fn successful_swap_settles_both_bridges() {
        let mut fx = SwapFixture::new().await;
        let request = fx.signed_request(U256::one());
        fx.coordinator.perform_swap(&request).await.unwrap();
        assert_eq!(fx.tokens.unsettled_transfers().await, 0);
        assert_eq!(fx.items.unsettled_transfers().await, 0);
    }

    #[tokio::test]
    async fn swap_id_reuse_is_tracked_within_history_only() {
        let config = SystemConfig { event_history_capacity: 1, ..SystemConfig::default() };
        let mut fx = SwapFixture::with_config(config).await;
        let request = fx.signed_request(U256::one());

        fx.coordinator.perform_swap(&request).await.unwrap();
        assert!(fx.coordinator.was_executed(U256::one()));

        // The replay's rejection pushes the executed event out of the history
        fx.coordinator.perform_swap(&request).await.unwrap_err();
        assert!(!fx.coordinator.was_executed(U256::one()));
        assert_eq!(fx.coordinator.history().count(), 1);
    }
}
