// OTP primitives: a uniformly random 6-digit code, its SHA-256 digest, and a
// constant-time comparator.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

pub fn hash_otp(otp: &str) -> String {
    let digest = Sha256::digest(otp.as_bytes());
    hex::encode(digest)
}

pub fn otp_equal(presented: &str, stored_hash: &str) -> bool {
    let computed = hash_otp(presented);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
