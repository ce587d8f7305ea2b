//! Inbound webhook authentication.
//!
//! The telephony platform signs every delivery with a header of the form
//! `scheme;version;timestamp;signature`, where `signature` is an HMAC-SHA256
//! digest of the timestamp and the raw body. The exact canonicalization is not
//! contractually documented, so verification walks [`CanonicalForm::ORDERED`]
//! and accepts the first exact match. Every key registered for the event's
//! bucket is tried before a delivery is rejected, which keeps deliveries valid
//! while a subscription is being rotated.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::domain::webhook::{WebhookConfig, WebhookKind};
use crate::errors::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const TELEPHONY_SIGNATURE_HEADER: &str = "openphone-signature";
pub const CRM_SIGNATURE_HEADER: &str = "x-crm-signature";
const SUPPORTED_SCHEME: &str = "hmac";

/// Candidate encodings of the signed material, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanonicalForm {
    /// `timestamp.body`, key base64-decoded before use.
    DotSeparatedDecodedKey,
    /// `timestamp.body`, key bytes used verbatim.
    DotSeparatedRawKey,
    /// `timestamp` immediately followed by `body`, key base64-decoded.
    ConcatenatedDecodedKey,
    /// `timestamp` immediately followed by `body`, key bytes verbatim.
    ConcatenatedRawKey,
}

impl CanonicalForm {
    pub const ORDERED: [Self; 4] = [
        Self::DotSeparatedDecodedKey,
        Self::DotSeparatedRawKey,
        Self::ConcatenatedDecodedKey,
        Self::ConcatenatedRawKey,
    ];

    fn separator(self) -> &'static [u8] {
        match self {
            Self::DotSeparatedDecodedKey | Self::DotSeparatedRawKey => b".",
            Self::ConcatenatedDecodedKey | Self::ConcatenatedRawKey => b"",
        }
    }

    /// Key material for this form; `None` when the form needs a base64 key and
    /// the stored key does not decode.
    fn key_bytes(self, key: &str) -> Option<Vec<u8>> {
        match self {
            Self::DotSeparatedDecodedKey | Self::ConcatenatedDecodedKey => {
                STANDARD.decode(key.trim()).ok()
            }
            Self::DotSeparatedRawKey | Self::ConcatenatedRawKey => Some(key.as_bytes().to_vec()),
        }
    }

    fn mac(self, key: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
        let key_bytes = self.key_bytes(key)?;
        let mut mac = HmacSha256::new_from_slice(&key_bytes).ok()?;
        mac.update(timestamp.as_bytes());
        mac.update(self.separator());
        mac.update(body);
        Some(mac)
    }

    /// Base64 signature a sender using this form would produce.
    pub fn sign(self, key: &str, timestamp: &str, body: &[u8]) -> Option<String> {
        let mac = self.mac(key, timestamp, body)?;
        Some(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub scheme: String,
    pub version: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignatureHeader {
    /// Parses the header. The scheme is checked before anything else so that
    /// foreign or garbage headers are turned away without further work.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::MissingHeader);
        }

        let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
        let scheme = parts[0];
        if scheme != SUPPORTED_SCHEME {
            return Err(AuthError::UnsupportedScheme(scheme.to_string()));
        }
        if parts.len() != 4 {
            return Err(AuthError::MalformedHeader(format!(
                "expected 4 `;`-separated fields, found {}",
                parts.len()
            )));
        }
        if parts[2].is_empty() || parts[3].is_empty() {
            return Err(AuthError::MalformedHeader(
                "timestamp and signature must not be empty".to_string(),
            ));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            version: parts[1].to_string(),
            timestamp: parts[2].to_string(),
            signature: parts[3].to_string(),
        })
    }

    /// Decoded digests the signature field may stand for. Hex digests are
    /// also valid base64, so both decodings are kept.
    fn digest_candidates(&self) -> Result<Vec<Vec<u8>>, AuthError> {
        let mut candidates = Vec::with_capacity(2);
        if let Ok(bytes) = STANDARD.decode(&self.signature) {
            candidates.push(bytes);
        }
        if let Ok(bytes) = hex::decode(&self.signature) {
            candidates.push(bytes);
        }
        if candidates.is_empty() {
            return Err(AuthError::MalformedHeader(
                "signature is neither base64 nor hex".to_string(),
            ));
        }
        Ok(candidates)
    }
}

/// Which key and canonical form matched a verified delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub kind: WebhookKind,
    pub form: CanonicalForm,
    pub key_index: usize,
}

#[derive(Clone, Debug, Default)]
pub struct SignatureVerifier {
    keys: HashMap<WebhookKind, Vec<SecretString>>,
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the signing key of every stored telephony descriptor.
    pub fn from_config(config: &WebhookConfig) -> Self {
        let mut verifier = Self::new();
        for descriptor in &config.telephony {
            verifier.register_key(descriptor.kind, descriptor.key.clone());
        }
        verifier
    }

    pub fn register_key(&mut self, kind: WebhookKind, key: SecretString) {
        self.keys.entry(kind).or_default().push(key);
    }

    pub fn verify(
        &self,
        header: Option<&str>,
        raw_body: &[u8],
        event_type: &str,
    ) -> Result<VerifiedSignature, AuthError> {
        let header = SignatureHeader::parse(header.ok_or(AuthError::MissingHeader)?)?;
        let kind = WebhookKind::for_telephony_event(event_type)
            .ok_or_else(|| AuthError::UnknownEventBucket(event_type.to_string()))?;
        let keys = self
            .keys
            .get(&kind)
            .filter(|keys| !keys.is_empty())
            .ok_or(AuthError::NoKeyForBucket(kind))?;
        let digests = header.digest_candidates()?;

        for (key_index, key) in keys.iter().enumerate() {
            for form in CanonicalForm::ORDERED {
                let Some(mac) = form.mac(key.expose_secret(), &header.timestamp, raw_body) else {
                    continue;
                };
                let matched = digests.iter().any(|digest| mac.clone().verify_slice(digest).is_ok());
                if matched {
                    return Ok(VerifiedSignature { kind, form, key_index });
                }
            }
        }

        Err(AuthError::SignatureMismatch)
    }
}

/// Verifier for CRM deliveries: lowercase hex HMAC-SHA256 of the raw body.
///
/// CRM providers that do not sign deliveries have no stored secret; their
/// deliveries are accepted as-is.
#[derive(Clone, Debug, Default)]
pub struct CrmSignatureVerifier {
    secrets: Vec<SecretString>,
}

impl CrmSignatureVerifier {
    pub fn with_secrets(secrets: Vec<SecretString>) -> Self {
        Self { secrets }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::with_secrets(config.crm.iter().map(|descriptor| descriptor.key.clone()).collect())
    }

    pub fn requires_signature(&self) -> bool {
        !self.secrets.is_empty()
    }

    pub fn verify(&self, header: Option<&str>, raw_body: &[u8]) -> Result<(), AuthError> {
        if self.secrets.is_empty() {
            return Ok(());
        }

        let raw = header.map(str::trim).filter(|value| !value.is_empty());
        let raw = raw.ok_or(AuthError::MissingHeader)?;
        let hex_digest = raw.strip_prefix("sha256=").unwrap_or(raw);
        let digest = hex::decode(hex_digest)
            .map_err(|_| AuthError::MalformedHeader("signature is not hex".to_string()))?;

        for secret in &self.secrets {
            let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
                continue;
            };
            mac.update(raw_body);
            if mac.verify_slice(&digest).is_ok() {
                return Ok(());
            }
        }

        Err(AuthError::SignatureMismatch)
    }
}
