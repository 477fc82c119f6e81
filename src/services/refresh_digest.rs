// Refresh-token digesting: the raw token is never persisted, only a SHA-256
// hex digest, compared in constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub fn hash_refresh_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

pub fn refresh_token_hash_equal(token: &str, stored_hash: &str) -> bool {
    let computed = hash_refresh_token(token);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
