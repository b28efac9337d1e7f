use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

use crate::error::{ChainError, Result};

/// Generate a new secp256k1 secret key, hex encoded.
pub fn generate_private_key() -> String {
    let secp = Secp256k1::new();
    let (sk, _pk) = secp.generate_keypair(&mut OsRng);
    hex::encode(sk.secret_bytes())
}

fn parse_secret_key(private_key_hex: &str) -> Result<SecretKey> {
    let bytes = hex::decode(private_key_hex.trim())
        .map_err(|_| ChainError::InvalidKey("private key is not hex".into()))?;
    SecretKey::from_slice(&bytes)
        .map_err(|_| ChainError::InvalidKey("private key is not a valid scalar".into()))
}

/// Address (hex of the uncompressed public key, 130 chars, "04" prefix)
/// belonging to a hex private key.
pub fn address_from_private_key(private_key_hex: &str) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let sk = parse_secret_key(private_key_hex)?;
    let pk = PublicKey::from_secret_key(&secp, &sk);
    Ok(hex::encode(pk.serialize_uncompressed()))
}

fn digest_message(digest_hex: &str) -> std::result::Result<Message, &'static str> {
    let digest = hex::decode(digest_hex).map_err(|_| "digest is not hex")?;
    Message::from_digest_slice(&digest).map_err(|_| "digest must be 32 bytes")
}

/// Sign a hex-encoded 32-byte digest (a transaction id); returns hex DER.
pub fn sign_digest(private_key_hex: &str, digest_hex: &str) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let sk = parse_secret_key(private_key_hex)?;
    let msg = digest_message(digest_hex)
        .map_err(|e| ChainError::MalformedTransaction(e.to_string()))?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(sig.serialize_der().to_vec()))
}

/// Verify a hex DER signature against an address (hex uncompressed pubkey)
/// and a hex-encoded 32-byte digest.
pub fn verify_signature(
    address_hex: &str,
    sig_hex: &str,
    digest_hex: &str,
) -> std::result::Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(address_hex).map_err(|_| "invalid address hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "address is not a curve point")?;

    let msg = digest_message(digest_hex)?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
