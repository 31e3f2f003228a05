use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use hyper::header::HeaderValue;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-shopify-hmac-sha256";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature does not match")]
    Mismatch,
}

/// Checks the base64 HMAC-SHA256 of a request body against the signature header.
///
/// The digest covers the body bytes exactly as received on the wire.
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Header value a client holding the same secret would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, body: &[u8], header: Option<&HeaderValue>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;
        let claimed = STANDARD
            .decode(header.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;

        let mut mac = self.mac();
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&claimed)
            .map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] =
        br#"{"action":"get_metafield","productGid":"gid://shopify/Product/8123456789"}"#;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::new("hush");
        let signature = verifier.sign(BODY);
        assert_eq!(verifier.verify(BODY, Some(&header(&signature))), Ok(()));
    }

    #[test]
    fn test_known_digest() {
        // echo -n 'hello' | openssl dgst -sha256 -hmac 'key' -binary | base64
        let verifier = SignatureVerifier::new("key");
        assert_eq!(
            verifier.sign(b"hello"),
            "kwezuRXvtRcf8U2MtV+8x5jGwO8UVtZt7RpqpyOli3s="
        );
    }

    #[test]
    fn test_any_byte_mutation_fails() {
        let verifier = SignatureVerifier::new("hush");
        let signature = header(&verifier.sign(BODY));

        for i in 0..BODY.len() {
            let mut mutated = BODY.to_vec();
            mutated[i] ^= 0x01;
            assert_eq!(
                verifier.verify(&mutated, Some(&signature)),
                Err(SignatureError::Mismatch),
                "mutation at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn test_missing_and_malformed_header() {
        let verifier = SignatureVerifier::new("hush");
        assert_eq!(verifier.verify(BODY, None), Err(SignatureError::Missing));
        assert_eq!(
            verifier.verify(BODY, Some(&header("not base64!"))),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let signature = header(&SignatureVerifier::new("one").sign(BODY));
        assert_eq!(
            SignatureVerifier::new("two").verify(BODY, Some(&signature)),
            Err(SignatureError::Mismatch)
        );
    }
}
