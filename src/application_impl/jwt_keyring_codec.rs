use crate::application_port::{AuthError, DecodeError, TokenCodec};
use crate::domain_model::{Claims, SignedToken, SubjectClaims, SubjectId};
use crate::domain_port::Clock;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm,
    OctetKeyPairParameters, OctetKeyPairType, PublicKeyUse,
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const RESERVED_CLAIMS: [&str; 8] = ["sub", "exp", "iat", "nbf", "jti", "iss", "aud", "exi"];

#[derive(Clone)]
pub enum KeyMaterial {
    /// HS256 shared secret. Never published.
    Secret(Vec<u8>),
    /// EdDSA key: the raw 32-byte public key and, when this process signs
    /// with it, the PKCS#8 document holding the private half.
    Ed25519 {
        public: Vec<u8>,
        private: Option<Vec<u8>>,
    },
}

#[derive(Clone)]
pub struct SigningKey {
    pub id: String,
    pub material: KeyMaterial,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.material {
            KeyMaterial::Secret(_) => "HS256",
            KeyMaterial::Ed25519 { .. } => "EdDSA",
        };
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}

impl SigningKey {
    pub fn secret(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        SigningKey {
            id: id.into(),
            material: KeyMaterial::Secret(secret.into()),
        }
    }

    pub fn ed25519(id: impl Into<String>, public: Vec<u8>, private: Option<Vec<u8>>) -> Self {
        SigningKey {
            id: id.into(),
            material: KeyMaterial::Ed25519 { public, private },
        }
    }

    /// A fresh Ed25519 key pair.
    pub fn generate_ed25519(id: impl Into<String>) -> Result<Self, AuthError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|e| AuthError::InternalError(format!("key generation failed: {}", e)))?;
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|e| AuthError::InternalError(format!("generated key rejected: {}", e)))?;
        Ok(Self::ed25519(
            id,
            pair.public_key().as_ref().to_vec(),
            Some(pkcs8.as_ref().to_vec()),
        ))
    }

    fn algorithm(&self) -> Algorithm {
        match self.material {
            KeyMaterial::Secret(_) => Algorithm::HS256,
            KeyMaterial::Ed25519 { .. } => Algorithm::EdDSA,
        }
    }

    fn encoding_key(&self) -> Result<EncodingKey, AuthError> {
        match &self.material {
            KeyMaterial::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
            KeyMaterial::Ed25519 { public, private } => {
                let private = private.as_deref().ok_or_else(|| {
                    AuthError::InternalError(format!("key {:?} has no private half", self.id))
                })?;
                let pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(private).map_err(|e| {
                    AuthError::InternalError(format!("key {:?}: bad private key: {}", self.id, e))
                })?;
                if pair.public_key().as_ref() != public.as_slice() {
                    return Err(AuthError::InternalError(format!(
                        "key {:?}: public key does not match the private key",
                        self.id
                    )));
                }
                Ok(EncodingKey::from_ed_der(private))
            }
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match &self.material {
            KeyMaterial::Secret(secret) => Ok(DecodingKey::from_secret(secret)),
            KeyMaterial::Ed25519 { public, .. } => {
                DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(public)).map_err(|e| {
                    AuthError::InternalError(format!("key {:?}: bad public key: {}", self.id, e))
                })
            }
        }
    }

    /// Public JWK for asymmetric keys; shared secrets have none.
    fn public_jwk(&self) -> Option<Jwk> {
        let KeyMaterial::Ed25519 { public, .. } = &self.material else {
            return None;
        };
        Some(Jwk {
            common: CommonParameters {
                public_key_use: Some(PublicKeyUse::Signature),
                key_algorithm: Some(KeyAlgorithm::EdDSA),
                key_id: Some(self.id.clone()),
                ..Default::default()
            },
            algorithm: AlgorithmParameters::OctetKeyPair(OctetKeyPairParameters {
                key_type: OctetKeyPairType::OctetKeyPair,
                curve: EllipticCurve::Ed25519,
                x: URL_SAFE_NO_PAD.encode(public),
            }),
        })
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub access_ttl: Duration,
    /// Clock skew tolerated when checking `exp`.
    pub leeway: Duration,
    /// Adds an `exi` claim carrying the access token lifetime in seconds.
    pub expires_in_claim: bool,
    pub keys: Vec<SigningKey>,
    /// Key id used for signing. Every other key in `keys` only verifies.
    pub active_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    exp: i64,
    iat: i64,
    jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exi: Option<i64>,
    #[serde(flatten)]
    custom: Map<String, Value>,
}

fn timestamp(secs: i64, claim: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| DecodeError::Invalid(format!("{} out of range", claim)))
}

fn into_claims(wire: AccessClaims, key_id: String) -> Result<Claims, DecodeError> {
    Ok(Claims {
        subject: SubjectId(wire.sub),
        key_id,
        issued_at: timestamp(wire.iat, "iat")?,
        expires_at: timestamp(wire.exp, "exp")?,
        jti: wire.jti,
        issuer: wire.iss,
        audience: wire.aud,
        custom: wire.custom,
    })
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> DecodeError {
    match err.kind() {
        ErrorKind::InvalidToken => DecodeError::Malformed,
        ErrorKind::ExpiredSignature => DecodeError::Expired,
        ErrorKind::InvalidSignature => DecodeError::InvalidSignature,
        _ => DecodeError::Invalid(err.to_string()),
    }
}

struct VerifyingKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

/// Codec over a ring of keys addressed by `kid`. Dropping a key from the
/// ring turns every token it signed into a refresh-required token.
pub struct JwtKeyringCodec {
    cfg: JwtConfig,
    signing_algorithm: Algorithm,
    encoding_key: EncodingKey,
    verifying_keys: HashMap<String, VerifyingKey>,
    public_keys: JwkSet,
    clock: Arc<dyn Clock>,
}

impl JwtKeyringCodec {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let active = cfg
            .keys
            .iter()
            .find(|k| k.id == cfg.active_key)
            .ok_or_else(|| {
                AuthError::InternalError(format!(
                    "active signing key {:?} is not in the key ring",
                    cfg.active_key
                ))
            })?;
        let signing_algorithm = active.algorithm();
        let encoding_key = active.encoding_key()?;

        let mut verifying_keys = HashMap::new();
        for k in &cfg.keys {
            let entry = VerifyingKey {
                algorithm: k.algorithm(),
                key: k.decoding_key()?,
            };
            verifying_keys.insert(k.id.clone(), entry);
        }
        let public_keys = JwkSet {
            keys: cfg.keys.iter().filter_map(SigningKey::public_jwk).collect(),
        };

        Ok(JwtKeyringCodec {
            cfg,
            signing_algorithm,
            encoding_key,
            verifying_keys,
            public_keys,
            clock,
        })
    }

    /// Public halves of the asymmetric keys in the ring, so token consumers
    /// can follow `kid` rotation.
    pub fn public_keys(&self) -> &JwkSet {
        &self.public_keys
    }

    // `exp` is checked against the injected clock in `decode`.
    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut v = Validation::new(algorithm);
        v.validate_exp = false;
        match &self.cfg.audience {
            Some(aud) => v.set_audience(&[aud]),
            None => v.validate_aud = false,
        }
        if let Some(iss) = &self.cfg.issuer {
            v.set_issuer(&[iss]);
        }
        v
    }

    fn is_expired(&self, exp: i64) -> bool {
        let leeway = i64::try_from(self.cfg.leeway.as_secs()).unwrap_or(i64::MAX);
        exp.saturating_add(leeway) < self.clock.now().timestamp()
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtKeyringCodec {
    async fn decode(&self, raw: &str) -> Result<Claims, DecodeError> {
        if raw.split('.').count() != 3 {
            return Err(DecodeError::Malformed);
        }

        let header = decode_header(raw).map_err(map_decode_error)?;
        let key_id = header.kid.ok_or(DecodeError::UnknownKeyId(None))?;
        let entry = self
            .verifying_keys
            .get(&key_id)
            .ok_or_else(|| DecodeError::UnknownKeyId(Some(key_id.clone())))?;

        let data = decode::<AccessClaims>(raw, &entry.key, &self.validation(entry.algorithm))
            .map_err(map_decode_error)?;
        if self.is_expired(data.claims.exp) {
            return Err(DecodeError::Expired);
        }
        into_claims(data.claims, key_id)
    }

    async fn create(&self, claims: &SubjectClaims) -> Result<SignedToken, AuthError> {
        let ttl = TimeDelta::from_std(self.cfg.access_ttl)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let iat_dt = self.clock.now();
        let exp_dt = iat_dt + ttl;

        let mut custom = claims.custom.clone();
        custom.retain(|k, _| !RESERVED_CLAIMS.contains(&k.as_str()));

        let wire = AccessClaims {
            sub: claims.subject.0.clone(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            exi: self.cfg.expires_in_claim.then(|| ttl.num_seconds()),
            custom,
        };

        let mut header = Header::new(self.signing_algorithm);
        header.kid = Some(self.cfg.active_key.clone());
        let token = encode(&header, &wire, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let claims = into_claims(wire, self.cfg.active_key.clone())
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(SignedToken { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_local::ManualClock;

    fn config(keys: &[(&str, &str)], active: &str) -> JwtConfig {
        JwtConfig {
            issuer: Some("https://auth.test".to_string()),
            audience: Some("api".to_string()),
            access_ttl: Duration::from_secs(2 * 60 * 60),
            leeway: Duration::from_secs(60),
            expires_in_claim: true,
            keys: keys
                .iter()
                .map(|(id, secret)| SigningKey::secret(*id, secret.as_bytes()))
                .collect(),
            active_key: active.to_string(),
        }
    }

    fn codec(keys: &[(&str, &str)], active: &str) -> JwtKeyringCodec {
        JwtKeyringCodec::new(config(keys, active), Arc::new(ManualClock::starting_now())).unwrap()
    }

    #[tokio::test]
    async fn created_tokens_decode_to_the_same_claims() {
        let codec = codec(&[("k1", "secret-one")], "k1");
        let subject = SubjectClaims::new("42".into()).with("username", "alice");

        let signed = codec.create(&subject).await.unwrap();
        let decoded = codec.decode(&signed.token).await.unwrap();

        assert_eq!(decoded, signed.claims);
        assert_eq!(decoded.subject, SubjectId::from("42"));
        assert_eq!(decoded.key_id, "k1");
        assert_eq!(decoded.custom("username"), Some(&Value::from("alice")));
        assert_eq!(decoded.custom("exi"), None);
    }

    #[tokio::test]
    async fn reserved_names_in_custom_claims_are_dropped() {
        let codec = codec(&[("k1", "secret-one")], "k1");
        let subject = SubjectClaims::new("42".into()).with("sub", "43");

        let signed = codec.create(&subject).await.unwrap();
        let decoded = codec.decode(&signed.token).await.unwrap();

        assert_eq!(decoded.subject, SubjectId::from("42"));
    }

    #[tokio::test]
    async fn wrong_segment_count_is_malformed() {
        let codec = codec(&[("k1", "secret-one")], "k1");
        assert_eq!(codec.decode("user_token").await, Err(DecodeError::Malformed));
        assert_eq!(codec.decode("a.b").await, Err(DecodeError::Malformed));
        assert_eq!(codec.decode("a.b.c.d").await, Err(DecodeError::Malformed));
    }

    #[tokio::test]
    async fn retired_key_is_reported_as_unknown_kid() {
        let old = codec(&[("k1", "secret-one")], "k1");
        let rotated = codec(&[("k2", "secret-two")], "k2");
        let signed = old.create(&SubjectClaims::new("42".into())).await.unwrap();

        let err = rotated.decode(&signed.token).await.unwrap_err();
        assert_eq!(err, DecodeError::UnknownKeyId(Some("k1".to_string())));
        assert!(err.requires_refresh());
    }

    #[tokio::test]
    async fn tokens_signed_by_a_verify_only_key_are_accepted() {
        let old = codec(&[("k1", "secret-one")], "k1");
        let ring = codec(&[("k1", "secret-one"), ("k2", "secret-two")], "k2");
        let signed = old.create(&SubjectClaims::new("42".into())).await.unwrap();

        let decoded = ring.decode(&signed.token).await.unwrap();
        assert_eq!(decoded.key_id, "k1");
    }

    #[tokio::test]
    async fn forged_secret_fails_signature_check() {
        let honest = codec(&[("k1", "secret-one")], "k1");
        let forger = codec(&[("k1", "not-the-secret")], "k1");
        let signed = forger.create(&SubjectClaims::new("42".into())).await.unwrap();

        let err = honest.decode(&signed.token).await.unwrap_err();
        assert_eq!(err, DecodeError::InvalidSignature);
        assert!(!err.requires_refresh());
    }

    #[tokio::test]
    async fn tokens_past_expiry_and_leeway_are_expired() {
        let clock = Arc::new(ManualClock::starting_now());
        clock.advance(TimeDelta::hours(-3));
        let issuing = JwtKeyringCodec::new(config(&[("k1", "secret-one")], "k1"), clock).unwrap();
        let verifying = codec(&[("k1", "secret-one")], "k1");
        let signed = issuing.create(&SubjectClaims::new("42".into())).await.unwrap();

        assert_eq!(verifying.decode(&signed.token).await, Err(DecodeError::Expired));
    }

    #[tokio::test]
    async fn foreign_issuer_is_rejected() {
        let mut cfg = config(&[("k1", "secret-one")], "k1");
        cfg.issuer = Some("https://elsewhere.test".to_string());
        let foreign = JwtKeyringCodec::new(cfg, Arc::new(ManualClock::starting_now())).unwrap();
        let local = codec(&[("k1", "secret-one")], "k1");
        let signed = foreign.create(&SubjectClaims::new("42".into())).await.unwrap();

        assert!(matches!(
            local.decode(&signed.token).await,
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn active_key_must_be_in_the_ring() {
        let cfg = config(&[("k1", "secret-one")], "k9");
        assert!(JwtKeyringCodec::new(cfg, Arc::new(ManualClock::starting_now())).is_err());
    }

    fn ed25519_config(keys: Vec<SigningKey>, active: &str) -> JwtConfig {
        JwtConfig {
            keys,
            ..config(&[], active)
        }
    }

    #[tokio::test]
    async fn published_key_verifies_eddsa_tokens() {
        let key = SigningKey::generate_ed25519("ed-1").unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let codec = JwtKeyringCodec::new(ed25519_config(vec![key], "ed-1"), clock).unwrap();
        let signed = codec.create(&SubjectClaims::new("42".into())).await.unwrap();

        assert_eq!(decode_header(&signed.token).unwrap().alg, Algorithm::EdDSA);
        assert_eq!(codec.decode(&signed.token).await.unwrap().key_id, "ed-1");

        let jwk = codec.public_keys().find("ed-1").unwrap();
        let published = DecodingKey::from_jwk(jwk).unwrap();
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&["api"]);
        validation.set_issuer(&["https://auth.test"]);
        let data = decode::<Value>(&signed.token, &published, &validation).unwrap();
        assert_eq!(data.claims["sub"], "42");
    }

    #[test]
    fn only_asymmetric_keys_are_published() {
        let ed = SigningKey::generate_ed25519("ed-1").unwrap();
        let keys = vec![SigningKey::secret("k1", "secret-one"), ed];
        let codec = JwtKeyringCodec::new(
            ed25519_config(keys, "k1"),
            Arc::new(ManualClock::starting_now()),
        )
        .unwrap();

        let published = serde_json::to_value(codec.public_keys()).unwrap();
        let keys = published["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kid"], "ed-1");
        assert_eq!(keys[0]["kty"], "OKP");
        assert_eq!(keys[0]["crv"], "Ed25519");
        assert_eq!(keys[0]["alg"], "EdDSA");
        assert!(keys[0].get("d").is_none());
    }

    #[tokio::test]
    async fn verify_only_key_still_decodes_after_rotation() {
        let old = SigningKey::generate_ed25519("ed-1").unwrap();
        let KeyMaterial::Ed25519 { public, .. } = old.material.clone() else {
            unreachable!()
        };
        let new = SigningKey::generate_ed25519("ed-2").unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let before =
            JwtKeyringCodec::new(ed25519_config(vec![old], "ed-1"), clock.clone()).unwrap();
        let retired = SigningKey::ed25519("ed-1", public, None);
        let after =
            JwtKeyringCodec::new(ed25519_config(vec![retired, new], "ed-2"), clock).unwrap();

        let signed = before.create(&SubjectClaims::new("42".into())).await.unwrap();
        assert_eq!(after.decode(&signed.token).await.unwrap().key_id, "ed-1");
        assert_eq!(after.public_keys().keys.len(), 2);
    }

    #[test]
    fn signing_needs_a_matching_private_key() {
        let a = SigningKey::generate_ed25519("ed-1").unwrap();
        let KeyMaterial::Ed25519 { public, private } = a.material.clone() else {
            unreachable!()
        };
        let clock = || Arc::new(ManualClock::starting_now());

        let public_only = SigningKey::ed25519("ed-1", public, None);
        assert!(JwtKeyringCodec::new(ed25519_config(vec![public_only], "ed-1"), clock()).is_err());

        let b = SigningKey::generate_ed25519("ed-1").unwrap();
        let KeyMaterial::Ed25519 { public: other, .. } = b.material else {
            unreachable!()
        };
        let mismatched = SigningKey::ed25519("ed-1", other, private);
        assert!(JwtKeyringCodec::new(ed25519_config(vec![mismatched], "ed-1"), clock()).is_err());
    }

    #[tokio::test]
    async fn expiry_follows_the_injected_clock() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec =
            JwtKeyringCodec::new(config(&[("k1", "secret-one")], "k1"), clock.clone()).unwrap();
        let signed = codec.create(&SubjectClaims::new("42".into())).await.unwrap();

        clock.advance(TimeDelta::hours(2) + TimeDelta::seconds(60));
        assert!(codec.decode(&signed.token).await.is_ok());

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(codec.decode(&signed.token).await, Err(DecodeError::Expired));
    }
}
