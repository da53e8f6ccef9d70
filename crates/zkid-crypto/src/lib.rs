//! # zkid-crypto: Token Cryptography
//!
//! Symmetric primitives behind the secure token protocol:
//!
//! - **Key schedule** ([`keys`]): one master secret, HKDF-SHA256 expanded into
//!   independent MAC and cipher keys. Key material is zeroized on drop and
//!   never printed by `Debug`.
//! - **Payload MAC** ([`mac`]): HMAC-SHA256 over
//!   [`CanonicalBytes`](zkid_core::CanonicalBytes), compared in constant time.
//! - **Sealing** ([`cipher`]): ChaCha20-Poly1305 with a random 96-bit nonce
//!   prefixed to the ciphertext.
//! - **Checksum** ([`checksum`]): short SHA-256 prefix of the sealed bytes, a
//!   cheap pre-filter only.

pub mod checksum;
pub mod cipher;
pub mod error;
pub mod keys;
pub mod mac;

pub use checksum::{checksum_matches, short_checksum, CHECKSUM_HEX_LEN};
pub use cipher::{TokenCipher, NONCE_SIZE};
pub use error::CryptoError;
pub use keys::{MasterSecret, TokenKeys, MIN_MASTER_SECRET_LEN};
pub use mac::{MacTag, PayloadMac};
