//! STS session token issuance and verification (§4.5): a compact HS256 JWT,
//! tolerant of signing-key rotation via a grace-period key store.
//!
//! A general-purpose JWT crate collapses decode and verification into one
//! call; this token format requires surfacing a distinct, ordered rejection
//! reason per failure mode, so the compact form is parsed and checked by
//! hand using `hmac`/`sha2`/`base64`.

use crate::errors::{Error, ErrorCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "1.1";
const TOKEN_TYPE: &str = "sts-session";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

impl Default for Header {
    fn default() -> Self {
        Self { alg: "HS256", typ: "JWT" }
    }
}

/// The decoded STS session token payload, returned on successful
/// verification and consumed on issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub uuid: String,
    pub role_arn: String,
    pub session_name: String,
    #[serde(rename = "tokenType")]
    pub token_type: String,
    #[serde(rename = "tokenVersion")]
    pub token_version: String,
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
}

/// One HMAC signing key in the rotation key store.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub key: Vec<u8>,
    pub key_id: String,
    pub is_primary: bool,
    pub added_at: i64,
}

/// Request to issue a new session token.
pub struct IssueRequest {
    pub uuid: String,
    pub role_arn: String,
    pub session_name: String,
    pub expires: i64,
}

/// Optional verification constraints (§4.5 step 4).
#[derive(Debug, Default, Clone)]
pub struct VerifyOptions {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// The signing-key rotation store plus issuer/audience defaults used to
/// stamp newly issued tokens.
pub struct TokenStore {
    keys: HashMap<String, SigningKey>,
    issuer: String,
    audience: String,
    max_token_bytes: usize,
}

impl TokenStore {
    #[must_use]
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, max_token_bytes: usize) -> Self {
        Self {
            keys: HashMap::new(),
            issuer: issuer.into(),
            audience: audience.into(),
            max_token_bytes,
        }
    }

    /// Inserts or replaces a key in the rotation store.
    pub fn add_key(&mut self, key: SigningKey) {
        self.keys.insert(key.key_id.clone(), key);
    }

    /// Evicts a key past its grace period. The grace-period clock itself is
    /// an external collaborator's concern (§4.5); this just removes the
    /// entry once told to.
    pub fn evict_key(&mut self, key_id: &str) {
        self.keys.remove(key_id);
    }

    fn primary(&self) -> Result<&SigningKey, Error> {
        self.keys
            .values()
            .find(|k| k.is_primary)
            .ok_or_else(|| Error::Token(ErrorCode::TokenNoPrimaryKey.message().to_string()))
    }

    /// Issues a new session token, signed with the current primary key.
    pub fn generate(&self, request: IssueRequest, now: i64) -> Result<String, Error> {
        if request.expires <= now {
            return Err(Error::Token(ErrorCode::TokenExpiryNotInFuture.message().to_string()));
        }
        let primary = self.primary()?;
        let claims = SessionClaims {
            uuid: request.uuid,
            role_arn: request.role_arn,
            session_name: request.session_name,
            token_type: TOKEN_TYPE.to_string(),
            token_version: TOKEN_VERSION.to_string(),
            key_id: primary.key_id.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: request.expires,
            nbf: now,
        };
        encode(&claims, &primary.key)
    }

    /// Verifies a compact token per the eight ordered steps of §4.5,
    /// returning the decoded claims on success.
    pub fn verify(&self, token: &str, options: &VerifyOptions, now: i64) -> Result<SessionClaims, Error> {
        if token.len() > self.max_token_bytes {
            return Err(Error::Token(ErrorCode::TokenMalformed.message().to_string()));
        }
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(Error::Token(ErrorCode::TokenMalformed.message().to_string()));
        };

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::Token(ErrorCode::TokenInvalidEncoding.message().to_string()))?;
        let claims: SessionClaims = serde_json::from_slice(&payload_bytes)?;

        if claims.token_version != TOKEN_VERSION {
            return Err(Error::Token(ErrorCode::TokenUnsupportedVersion.message().to_string()));
        }
        if claims.token_type != TOKEN_TYPE {
            return Err(Error::Token(ErrorCode::TokenInvalidType.message().to_string()));
        }
        if let Some(issuer) = &options.issuer {
            if &claims.iss != issuer {
                return Err(Error::Token(ErrorCode::TokenInvalidIssuer.message().to_string()));
            }
        }
        if let Some(audience) = &options.audience {
            if &claims.aud != audience {
                return Err(Error::Token(ErrorCode::TokenInvalidAudience.message().to_string()));
            }
        }

        let key = self
            .keys
            .get(&claims.key_id)
            .ok_or_else(|| Error::Token(ErrorCode::TokenUnknownKey.message().to_string()))?;

        let signing_input = format!("{header_b64}.{payload_b64}");
        let expected = sign(&signing_input, &key.key);
        let expected_b64 = URL_SAFE_NO_PAD.encode(expected);
        if expected_b64.as_bytes().ct_eq(signature_b64.as_bytes()).unwrap_u8() != 1 {
            return Err(Error::Token(ErrorCode::TokenBadSignature.message().to_string()));
        }

        if now > claims.exp {
            return Err(Error::Token(ErrorCode::TokenExpired.message().to_string()));
        }
        if now < claims.nbf {
            return Err(Error::Token(ErrorCode::TokenNotYetValid.message().to_string()));
        }

        Ok(claims)
    }
}

fn sign(signing_input: &str, key: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(signing_input.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn encode(claims: &SessionClaims, key: &[u8]) -> Result<String, Error> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Header::default())?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature_b64 = URL_SAFE_NO_PAD.encode(sign(&signing_input, key));
    Ok(format!("{signing_input}.{signature_b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_key() -> SigningKey {
        SigningKey {
            key: b"primary-secret-key-material".to_vec(),
            key_id: "k1".to_string(),
            is_primary: true,
            added_at: 0,
        }
    }

    fn store() -> TokenStore {
        let mut store = TokenStore::new("adr", "sts", 8192);
        store.add_key(primary_key());
        store
    }

    fn issue(store: &TokenStore, now: i64) -> String {
        store
            .generate(
                IssueRequest {
                    uuid: "user-uuid".to_string(),
                    role_arn: "arn:aws:iam::1:role/x".to_string(),
                    session_name: "session-1".to_string(),
                    expires: now + 3600,
                },
                now,
            )
            .unwrap()
    }

    #[test]
    fn round_trips_a_freshly_issued_token() {
        let store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        let claims = store.verify(&token, &VerifyOptions::default(), now + 1).unwrap();
        assert_eq!(claims.uuid, "user-uuid");
        assert_eq!(claims.token_type, "sts-session");
        assert_eq!(claims.token_version, "1.1");
    }

    #[test]
    fn rejects_oversized_token() {
        let store = store();
        let huge = "a".repeat(9000);
        let err = store.verify(&huge, &VerifyOptions::default(), 0).unwrap_err();
        assert_eq!(err.to_string(), "Session token too large");
    }

    #[test]
    fn rejects_malformed_segments() {
        let store = store();
        let err = store.verify("one.two", &VerifyOptions::default(), 0).unwrap_err();
        assert_eq!(err.to_string(), crate::errors::ErrorCode::TokenMalformed.message());
    }

    #[test]
    fn rejects_bad_key_id() {
        let store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        let mut other = TokenStore::new("adr", "sts", 8192);
        other.add_key(SigningKey {
            key: b"different-key".to_vec(),
            key_id: "k2".to_string(),
            is_primary: true,
            added_at: 0,
        });
        let err = other.verify(&token, &VerifyOptions::default(), now + 1).unwrap_err();
        assert_eq!(err.to_string(), "Unknown signing key");
    }

    #[test]
    fn accepts_rotated_key_within_grace_period() {
        let mut store = TokenStore::new("adr", "sts", 8192);
        let old_key = SigningKey {
            key: b"old-key-material".to_vec(),
            key_id: "k1".to_string(),
            is_primary: true,
            added_at: 0,
        };
        store.add_key(old_key.clone());
        let now = 1_700_000_000;
        let token = issue(&store, now);

        // rotate: add new primary, demote the old key but keep it around
        store.add_key(SigningKey {
            key: b"new-key-material".to_vec(),
            key_id: "k2".to_string(),
            is_primary: true,
            added_at: now,
        });
        store.add_key(SigningKey { is_primary: false, ..old_key });

        let claims = store.verify(&token, &VerifyOptions::default(), now + 10).unwrap();
        assert_eq!(claims.key_id, "k1");
    }

    #[test]
    fn rejects_after_key_evicted_past_grace_period() {
        let mut store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        store.evict_key("k1");
        let err = store.verify(&token, &VerifyOptions::default(), now + 1).unwrap_err();
        assert_eq!(err.to_string(), "Unknown signing key");
    }

    #[test]
    fn rejects_tampered_signature() {
        let store = store();
        let now = 1_700_000_000;
        let mut token = issue(&store, now);
        token.push('x');
        let err = store.verify(&token, &VerifyOptions::default(), now + 1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid signature");
    }

    #[test]
    fn rejects_expired_token() {
        let store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        let err = store.verify(&token, &VerifyOptions::default(), now + 4000).unwrap_err();
        assert_eq!(err.to_string(), "Token expired");
    }

    #[test]
    fn rejects_not_yet_valid_issuer_mismatch() {
        let store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        let opts = VerifyOptions {
            issuer: Some("someone-else".to_string()),
            audience: None,
        };
        let err = store.verify(&token, &opts, now + 1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid issuer");
    }

    #[test]
    fn rejects_audience_mismatch() {
        let store = store();
        let now = 1_700_000_000;
        let token = issue(&store, now);
        let opts = VerifyOptions {
            issuer: None,
            audience: Some("someone-else".to_string()),
        };
        let err = store.verify(&token, &opts, now + 1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid audience");
    }

    #[test]
    fn rejects_expiry_not_in_future_on_issuance() {
        let store = store();
        let now = 1_700_000_000;
        let err = store
            .generate(
                IssueRequest {
                    uuid: "u".to_string(),
                    role_arn: "arn".to_string(),
                    session_name: "s".to_string(),
                    expires: now - 1,
                },
                now,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Expiry must be in the future");
    }
}
