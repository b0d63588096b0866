use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use crate::error::DecryptError;

/// Decrypt a URL-resolution response with the title page's private key.
///
/// The key arrives as base64-encoded DER, the ciphertext as the base64 body
/// of the resolution endpoint's response. The scheme is RSA PKCS#1 v1.5, the
/// padding historically paired with keys embedded this way.
pub fn decrypt_chapter_payload(
    ciphertext_b64: &str,
    private_key_b64: &str,
) -> Result<String, DecryptError> {
    let key_der = BASE64.decode(private_key_b64.trim())?;
    let key = import_private_key(&key_der)?;
    let ciphertext = BASE64.decode(ciphertext_b64.trim())?;
    let plaintext = key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;
    Ok(String::from_utf8(plaintext)?)
}

/// The site serves PKCS#8 wrapped keys; fall back to a bare PKCS#1 body in
/// case the wrapper is ever absent.
fn import_private_key(der: &[u8]) -> Result<RsaPrivateKey, DecryptError> {
    match RsaPrivateKey::from_pkcs8_der(der) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => {
            RsaPrivateKey::from_pkcs1_der(der).map_err(|_| DecryptError::Key(pkcs8_err))
        }
    }
}
