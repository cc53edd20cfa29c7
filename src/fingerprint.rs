// Audio file identity
//
// A file is identified by a keyed hash of its display name and its owner, so the
// same owner uploading the same filename twice always produces the same key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes deterministic fingerprints for uploaded files
#[derive(Clone)]
pub struct Fingerprinter {
    secret: String,
}

impl Fingerprinter {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex-encoded HMAC-SHA256 of the file name and owner, keyed with the secret.
    ///
    /// Each component is length-prefixed, so no (name, owner) pair can produce
    /// the input of another. Audio content does not participate: different
    /// recordings with the same name collide, identical recordings under
    /// different names do not.
    pub fn fingerprint(&self, file_name: &str, owner_id: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        for part in [file_name, owner_id] {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part.as_bytes());
        }
        format!("{:x}", mac.finalize().into_bytes())
    }
}
