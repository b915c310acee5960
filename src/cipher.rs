use crate::error::Error;

/// A symmetric payload-level encryptor/decryptor.
///
/// This is an external collaborator: the core never picks a cipher suite or
/// manages key material itself, it only calls `encrypt`/`decrypt` around the
/// text payload when [`crate::config::WebSocketConfig::cipher`] is set. A
/// decrypt failure is treated the same way as a URI-decode failure (§4.6):
/// it is logged and the original bytes are delivered unchanged, since a
/// consumer that enabled encryption almost always wants to see the raw frame
/// rather than have the message silently vanish.
pub trait PayloadCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, Error>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, Error>;
}
