// Asymmetric key loading for the token signer. A config value is either an
// inline PEM block (starts with "-----BEGIN") or a filesystem path to one.

use anyhow::{bail, Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use std::fs;

pub struct KeyMaterial {
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    pub algorithm: Algorithm,
}

fn resolve_pem(value: &str) -> Result<Vec<u8>> {
    if value.trim_start().starts_with("-----BEGIN") {
        Ok(value.as_bytes().to_vec())
    } else {
        fs::read(value).with_context(|| format!("reading key material from {value}"))
    }
}

/// Tries RSA first, falls back to EC (P-256). The algorithm is derived from
/// whichever key type parses successfully, not configured independently.
pub fn load_key_material(private_key_cfg: &str, public_key_cfg: &str) -> Result<KeyMaterial> {
    let private_pem = resolve_pem(private_key_cfg)?;
    let public_pem = resolve_pem(public_key_cfg)?;

    if let (Ok(encoding_key), Ok(decoding_key)) = (
        EncodingKey::from_rsa_pem(&private_pem),
        DecodingKey::from_rsa_pem(&public_pem),
    ) {
        return Ok(KeyMaterial {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
        });
    }

    if let (Ok(encoding_key), Ok(decoding_key)) = (
        EncodingKey::from_ec_pem(&private_pem),
        DecodingKey::from_ec_pem(&public_pem),
    ) {
        return Ok(KeyMaterial {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::ES256,
        });
    }

    bail!("jwt key material is neither a valid RSA nor a valid EC (P-256) PEM key pair")
}
