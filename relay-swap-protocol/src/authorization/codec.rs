//! EIP-712 encoding of swap authorizations.
//!
//! A party signs `keccak256(0x19 0x01 || domainSeparator || structHash)`. The
//! fungible and item legs use distinct struct types, so their type hashes (and
//! therefore their digests) can never collide even when every field value is
//! identical.

use crate::data_structures::{Domain, LegKind, TransferMessage};
use ethers::abi::{encode, Token};
use ethers::types::transaction::eip712::EIP712Domain;
use ethers::types::{H256, U256};
use ethers::utils::keccak256;
use thiserror::Error;

pub const TRANSFER_TOKENS_TYPE: &str =
    "TransferTokens(address from,address to,uint256 amount,uint256 nonce,uint256 deadline)";
pub const TRANSFER_NFT_TYPE: &str =
    "TransferNFT(address from,address to,uint256 tokenId,uint256 nonce,uint256 deadline)";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{found} asset cannot be encoded with the {expected} schema")]
    SchemaMismatch { expected: LegKind, found: LegKind },
}

impl Domain {
    fn as_eip712(&self) -> EIP712Domain {
        EIP712Domain {
            name: Some(self.name.clone()),
            version: Some(self.version.clone()),
            chain_id: Some(U256::from(self.chain_id)),
            verifying_contract: Some(self.verifying_contract),
            salt: None,
        }
    }

    pub fn separator(&self) -> [u8; 32] {
        self.as_eip712().separator()
    }
}

pub fn type_hash(kind: LegKind) -> [u8; 32] {
    match kind {
        LegKind::Fungible => keccak256(TRANSFER_TOKENS_TYPE),
        LegKind::Item => keccak256(TRANSFER_NFT_TYPE),
    }
}

/// hashStruct of a transfer message under the schema for `kind`.
pub fn struct_hash(kind: LegKind, message: &TransferMessage) -> Result<[u8; 32], CodecError> {
    let found = message.asset.kind();
    if found != kind {
        return Err(CodecError::SchemaMismatch { expected: kind, found });
    }
    let encoded = encode(&[
        Token::FixedBytes(type_hash(kind).to_vec()),
        Token::Address(message.from),
        Token::Address(message.to),
        Token::Uint(message.asset.value()),
        Token::Uint(message.nonce),
        Token::Uint(U256::from(message.deadline)),
    ]);
    Ok(keccak256(encoded))
}

/// The digest a party signs to authorize `message` under `domain`.
pub fn signing_digest(domain: &Domain, kind: LegKind, message: &TransferMessage) -> Result<H256, CodecError> {
    let struct_hash = struct_hash(kind, message)?;
    let mut preimage = Vec::with_capacity(2 + 32 + 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(&domain.separator());
    preimage.extend_from_slice(&struct_hash);
    Ok(H256::from(keccak256(preimage)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::AssetDescriptor;
    use ethers::types::transaction::eip712::{Eip712, TypedData};
    use ethers::types::Address;

    fn domain() -> Domain {
        Domain::new("SwapCoordinator", "1", 31337, Address::repeat_byte(0xcc))
    }

    fn token_message() -> TransferMessage {
        TransferMessage {
            from: Address::repeat_byte(0xaa),
            to: Address::repeat_byte(0xbb),
            asset: AssetDescriptor::Amount(U256::from(1500u64) * U256::exp10(18)),
            nonce: U256::zero(),
            deadline: 1_700_003_600,
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let a = signing_digest(&domain(), LegKind::Fungible, &token_message()).unwrap();
        let b = signing_digest(&domain(), LegKind::Fungible, &token_message()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn schemas_have_disjoint_type_hashes() {
        assert_ne!(type_hash(LegKind::Fungible), type_hash(LegKind::Item));

        // Same numeric payload under both schemas must not collide
        let mut item_message = token_message();
        item_message.asset = AssetDescriptor::Item(token_message().asset.value());
        let token_digest = signing_digest(&domain(), LegKind::Fungible, &token_message()).unwrap();
        let item_digest = signing_digest(&domain(), LegKind::Item, &item_message).unwrap();
        assert_ne!(token_digest, item_digest);
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let err = struct_hash(LegKind::Item, &token_message()).unwrap_err();
        assert_eq!(err, CodecError::SchemaMismatch { expected: LegKind::Item, found: LegKind::Fungible });
    }

    #[test]
    fn every_domain_field_changes_the_digest() {
        let base = signing_digest(&domain(), LegKind::Fungible, &token_message()).unwrap();

        let mut other = domain();
        other.name = "OtherCoordinator".into();
        assert_ne!(base, signing_digest(&other, LegKind::Fungible, &token_message()).unwrap());

        let mut other = domain();
        other.version = "2".into();
        assert_ne!(base, signing_digest(&other, LegKind::Fungible, &token_message()).unwrap());

        let mut other = domain();
        other.chain_id = 1;
        assert_ne!(base, signing_digest(&other, LegKind::Fungible, &token_message()).unwrap());

        let mut other = domain();
        other.verifying_contract = Address::repeat_byte(0xdd);
        assert_ne!(base, signing_digest(&other, LegKind::Fungible, &token_message()).unwrap());
    }

    #[test]
    fn matches_generic_typed_data_encoder() {
        let json = serde_json::json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "TransferNFT": [
                    { "name": "from", "type": "address" },
                    { "name": "to", "type": "address" },
                    { "name": "tokenId", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" },
                    { "name": "deadline", "type": "uint256" }
                ]
            },
            "primaryType": "TransferNFT",
            "domain": {
                "name": "SwapCoordinator",
                "version": "1",
                "chainId": 31337,
                "verifyingContract": "0xcccccccccccccccccccccccccccccccccccccccc"
            },
            "message": {
                "from": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                "to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "tokenId": 1,
                "nonce": 4,
                "deadline": 1700003600
            }
        });
        let typed: TypedData = serde_json::from_value(json).unwrap();
        let expected = typed.encode_eip712().unwrap();

        let message = TransferMessage {
            from: Address::repeat_byte(0xbb),
            to: Address::repeat_byte(0xaa),
            asset: AssetDescriptor::Item(U256::one()),
            nonce: U256::from(4u64),
            deadline: 1_700_003_600,
        };
        let digest = signing_digest(&domain(), LegKind::Item, &message).unwrap();
        assert_eq!(digest, H256::from(expected));
    }
}
