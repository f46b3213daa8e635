// Off-channel side of the protocol: a party turning its intent into a signed
// Authorization. The coordinator never calls into this module.

use crate::authorization::codec::{signing_digest, CodecError};
use crate::data_structures::{AssetDescriptor, Authorization, Domain, Party, TransferMessage};
use ethers::signers::{LocalWallet, Signer, WalletError};
use ethers::types::{Bytes, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("wallet failed to sign: {0}")]
    Wallet(#[from] WalletError),
}

#[derive(Debug, Clone)]
pub struct AuthorizationSigner {
    wallet: LocalWallet,
}

impl AuthorizationSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        AuthorizationSigner { wallet }
    }

    pub fn random() -> Self {
        AuthorizationSigner::new(LocalWallet::new(&mut rand::thread_rng()))
    }

    pub fn address(&self) -> Party {
        self.wallet.address()
    }

    /// Signs a transfer of `asset` from this party to `counterparty`.
    /// `nonce` must be the party's current nonce on the target coordinator.
    pub fn authorize(
        &self,
        domain: &Domain,
        counterparty: Party,
        asset: AssetDescriptor,
        nonce: U256,
        deadline: u64,
    ) -> Result<Authorization, SignerError> {
        let message = TransferMessage {
            from: self.address(),
            to: counterparty,
            asset,
            nonce,
            deadline,
        };
        let digest = signing_digest(domain, asset.kind(), &message)?;
        let signature = self.wallet.sign_hash(digest)?;

        Ok(Authorization {
            party: message.from,
            counterparty,
            asset,
            nonce,
            deadline,
            signature: Bytes::from(signature.to_vec()),
        })
    }

    pub fn authorize_amount(
        &self,
        domain: &Domain,
        counterparty: Party,
        amount: U256,
        nonce: U256,
        deadline: u64,
    ) -> Result<Authorization, SignerError> {
        self.authorize(domain, counterparty, AssetDescriptor::Amount(amount), nonce, deadline)
    }

    pub fn authorize_item(
        &self,
        domain: &Domain,
        counterparty: Party,
        item_id: U256,
        nonce: U256,
        deadline: u64,
    ) -> Result<Authorization, SignerError> {
        self.authorize(domain, counterparty, AssetDescriptor::Item(item_id), nonce, deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::verifier::verify;
    use crate::data_structures::LegKind;
    use ethers::types::Address;

    #[test]
    fn signed_authorization_verifies_against_its_digest() {
        let domain = Domain::new("SwapCoordinator", "1", 31337, Address::repeat_byte(0xcc));
        let signer = AuthorizationSigner::random();
        let counterparty = Address::repeat_byte(0x42);

        let auth = signer
            .authorize_amount(&domain, counterparty, U256::from(1500u64), U256::zero(), 1_000)
            .unwrap();
        assert_eq!(auth.party, signer.address());
        assert_eq!(auth.counterparty, counterparty);
        assert_eq!(auth.signature.len(), 65);

        let digest = signing_digest(&domain, LegKind::Fungible, &auth.message()).unwrap();
        assert!(verify(digest, &auth.signature, signer.address()));
    }

    #[test]
    fn wallet_from_known_key() {
        // Second account of the default local dev mnemonic
        let wallet: LocalWallet = crate::test_utils::USER_A_KEY.parse().unwrap();
        let signer = AuthorizationSigner::new(wallet);
        assert_eq!(
            format!("{:?}", signer.address()),
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }
}
