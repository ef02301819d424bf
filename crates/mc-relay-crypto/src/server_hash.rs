//! Session server hash.
//!
//! ```text
//! hash = SHA1(server_id_latin1 + shared_secret + public_key_der)
//! ```
//!
//! rendered as a signed two's-complement hex number without leading zeros.

use sha1::{Digest, Sha1};

/// Compute the hash both peers submit to the session service.
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key_der: &[u8]) -> String {
    let mut hasher = Sha1::new();
    // Server ids are ASCII hex; ISO-8859-1 and UTF-8 agree on that range.
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key_der);
    signed_hex(hasher.finalize().into())
}

fn signed_hex(mut digest: [u8; 20]) -> String {
    let negative = digest[0] & 0x80 != 0;
    if negative {
        let mut carry = true;
        for byte in digest.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (sum, overflow) = byte.overflowing_add(1);
                *byte = sum;
                carry = overflow;
            }
        }
    }

    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let trimmed = hex.trim_start_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(name: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(name.as_bytes());
        signed_hex(hasher.finalize().into())
    }

    #[test]
    fn positive_digest() {
        assert_eq!(digest_of("Notch"), "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48");
    }

    #[test]
    fn negative_digest() {
        assert_eq!(digest_of("jeb_"), "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1");
    }

    #[test]
    fn leading_zero_trimmed() {
        assert_eq!(digest_of("simon"), "88e16a1019277b15d58faf0541e11910eb756f6");
    }

    #[test]
    fn server_hash_concatenates_inputs() {
        assert_eq!(server_hash("Notch", b"", b""), digest_of("Notch"));
        assert_eq!(server_hash("No", b"tc", b"h"), digest_of("Notch"));
    }
}
