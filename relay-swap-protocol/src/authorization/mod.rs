// Authorization codec, signature verification and off-channel signing

pub mod codec;
pub mod signer;
pub mod verifier;

pub use codec::{signing_digest, CodecError};
pub use signer::{AuthorizationSigner, SignerError};
pub use verifier::{recover_signer, verify, VerifyError};
