//! Content digest service
//!
//! Reduces a probe's canonical encoding to a compact digest string.
//!
//! Primary path: SHA-256. On wasm32 this goes through `SubtleCrypto` (the
//! browser's WebCrypto, asynchronous — the one awaited suspension point of
//! the hashing step); on native targets it uses `sha2` directly so the pure
//! pipeline stays testable off-browser. Both emit 64 lowercase hex chars.
//!
//! Fallback path: a deterministic rolling multiplicative hash, used only
//! when the cryptographic primitive is unreachable or throws. Weaker
//! collision resistance, but still a pure function of the input — which is
//! the only contract callers may rely on. Digests from the two paths are
//! never comparable to each other.

/// Reserved digest for a probe whose capability is absent.
///
/// Both digest paths emit lowercase hex, so this value can never collide
/// with a real digest.
pub const UNSUPPORTED_DIGEST: &str = "unsupported";

/// Compute the digest of a canonical encoding.
///
/// Pure: identical input always yields an identical digest on a given path.
pub async fn digest_bytes(data: &[u8]) -> String {
    #[cfg(target_arch = "wasm32")]
    {
        match subtle_digest(data).await {
            Ok(hex) => hex,
            Err(err) => {
                log::warn!("⚠️ SubtleCrypto unavailable, using fallback digest: {}", err);
                fallback_digest(data)
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(data))
    }
}

/// Deterministic rolling hash: `h = h * 31 + byte` over wrapping `i32`,
/// emitted as the absolute value in hex.
pub fn fallback_digest(data: &[u8]) -> String {
    let mut h: i32 = 0;
    for &byte in data {
        h = h.wrapping_mul(31).wrapping_add(byte as i32);
    }
    format!("{:x}", h.unsigned_abs())
}

/// SHA-256 via the browser's SubtleCrypto, hex-encoded.
#[cfg(target_arch = "wasm32")]
async fn subtle_digest(data: &[u8]) -> crate::error::Result<String> {
    use crate::error::ScanError;
    use wasm_bindgen_futures::JsFuture;

    let window = web_sys::window()
        .ok_or_else(|| ScanError::DigestFailure("no window object".into()))?;
    let crypto = window
        .crypto()
        .map_err(|_| ScanError::DigestFailure("crypto not available".into()))?;
    let subtle = crypto.subtle();

    // SubtleCrypto wants a mutable view over the input
    let mut buf = data.to_vec();
    let promise = subtle
        .digest_with_str_and_u8_array("SHA-256", &mut buf)
        .map_err(|e| ScanError::DigestFailure(format!("{:?}", e)))?;
    let result = JsFuture::from(promise)
        .await
        .map_err(|e| ScanError::DigestFailure(format!("{:?}", e)))?;

    let bytes = js_sys::Uint8Array::new(&result).to_vec();
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_deterministic() {
        let a = fallback_digest(b"hello fingerprint");
        let b = fallback_digest(b"hello fingerprint");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_input_sensitive() {
        assert_ne!(fallback_digest(b"abc"), fallback_digest(b"abd"));
    }

    #[test]
    fn test_fallback_is_hex() {
        let d = fallback_digest(b"Arial,Verdana,Georgia");
        assert!(!d.is_empty());
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fallback_empty_input() {
        // An empty encoding is still a valid input with a stable digest
        assert_eq!(fallback_digest(b""), "0");
    }

    #[test]
    fn test_sentinel_never_collides() {
        // The sentinel contains non-hex characters, so no real digest from
        // either path can ever equal it.
        assert!(UNSUPPORTED_DIGEST.chars().any(|c| !c.is_ascii_hexdigit()));
        for input in [&b""[..], b"x", b"unsupported"] {
            assert_ne!(fallback_digest(input), UNSUPPORTED_DIGEST);
        }
    }

    #[test]
    fn test_primary_digest_shape() {
        let d = futures::executor::block_on(digest_bytes(b"canvas-pixels"));
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_primary_digest_pure() {
        let a = futures::executor::block_on(digest_bytes(b"same input"));
        let b = futures::executor::block_on(digest_bytes(b"same input"));
        assert_eq!(a, b);
    }
}
