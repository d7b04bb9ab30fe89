//! Policy and REST request signing.

use crate::error::{SignerError, SignerResult};
use crate::key::SecretKey;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use stow_core::config::{SigningConfig, SizeBoundCheck, SizeBounds};
use stow_core::policy::PolicyDocument;

/// Which signature scheme a request asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningScheme {
    /// Legacy scheme: HMAC-SHA1 over the payload, base64 output.
    V2,
    /// Scoped scheme: HMAC-SHA256 with a derived key chain, hex output.
    V4,
}

/// A signed policy: the canonical base64 form plus its signature.
#[derive(Clone, Debug)]
pub struct PolicySignature {
    /// Base64-encoded policy document, as the storage provider expects it.
    pub policy: String,
    /// Signature over the base64 policy, encoded per the scheme.
    pub signature: String,
}

/// Signs upload policies and canonical REST strings after validating that
/// they target the configured bucket.
///
/// Signing is pure: no I/O happens here, only parsing and HMAC computation.
pub struct UploadSigner {
    secret: SecretKey,
    expected_bucket: String,
    size_bounds: Option<SizeBounds>,
    size_bound_check: SizeBoundCheck,
}

impl UploadSigner {
    /// Create a signer from a loaded secret and the signing configuration.
    pub fn new(secret: SecretKey, config: &SigningConfig) -> Self {
        Self {
            secret,
            expected_bucket: config.expected_bucket.clone(),
            size_bounds: config.size_bounds,
            size_bound_check: config.size_bound_check,
        }
    }

    /// Get the bucket this signer is willing to sign for.
    pub fn expected_bucket(&self) -> &str {
        &self.expected_bucket
    }

    /// Validate and sign a policy document.
    ///
    /// The policy JSON is canonicalized (serialized without insignificant
    /// whitespace), base64-encoded, and signed. Validation rejects a policy
    /// whose bucket condition is absent or differs from the configured
    /// bucket, and one whose declared size bounds fail the configured check.
    pub fn sign_policy(&self, policy: &Value, scheme: SigningScheme) -> SignerResult<PolicySignature> {
        let doc = PolicyDocument::parse(policy);
        self.validate_bucket(&doc)?;
        self.validate_size_bounds(&doc)?;

        let policy_json = serde_json::to_string(policy)
            .map_err(|e| SignerError::MalformedRequest(format!("unserializable policy: {e}")))?;
        let policy_b64 = base64::engine::general_purpose::STANDARD.encode(policy_json.as_bytes());

        let signature = match scheme {
            SigningScheme::V2 => {
                let digest = hmac_sha1(self.secret.as_bytes(), policy_b64.as_bytes());
                base64::engine::general_purpose::STANDARD.encode(digest)
            }
            SigningScheme::V4 => {
                let credential = doc.credential.as_deref().ok_or_else(|| {
                    SignerError::MalformedScope(
                        "policy has no x-amz-credential condition".to_string(),
                    )
                })?;
                let (date, region) = parse_credential_scope(credential)?;
                hex::encode(self.sign_v4(date, region, policy_b64.as_bytes()))
            }
        };

        Ok(PolicySignature {
            policy: policy_b64,
            signature,
        })
    }

    /// Validate and sign a canonical REST request string.
    ///
    /// Used for chunked uploads against an object-store REST API, where the
    /// client signs each part PUT and the multipart initiate/complete/abort
    /// calls. The legacy scheme signs the raw string; the v4 scheme parses
    /// the scope line out of the string-to-sign, substitutes the SHA-256 hash
    /// of the trailing canonical request, and signs with the derived key.
    pub fn sign_rest(&self, headers: &str, scheme: SigningScheme) -> SignerResult<String> {
        match scheme {
            SigningScheme::V2 => {
                self.require_bucket_reference(headers)?;
                let digest = hmac_sha1(self.secret.as_bytes(), headers.as_bytes());
                Ok(base64::engine::general_purpose::STANDARD.encode(digest))
            }
            SigningScheme::V4 => {
                let mut segments = headers.splitn(4, '\n');
                let algorithm = segments.next().unwrap_or_default();
                let amz_date = segments.next().unwrap_or_default();
                let scope = segments.next().unwrap_or_default();
                let canonical_request = segments.next().ok_or_else(|| {
                    SignerError::MalformedRequest(
                        "string-to-sign has no canonical request section".to_string(),
                    )
                })?;
                if algorithm.is_empty() || amz_date.is_empty() || canonical_request.is_empty() {
                    return Err(SignerError::MalformedRequest(
                        "string-to-sign is missing sections".to_string(),
                    ));
                }

                let (date, region) = parse_credential_scope(scope)?;
                self.require_bucket_reference(canonical_request)?;

                let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
                let string_to_sign = format!("{algorithm}\n{amz_date}\n{scope}\n{hashed}");
                Ok(hex::encode(self.sign_v4(date, region, string_to_sign.as_bytes())))
            }
        }
    }

    fn validate_bucket(&self, doc: &PolicyDocument) -> SignerResult<()> {
        // A policy with no bucket condition is always rejected. Bucket
        // validation is the sole defense against a tampered client signing
        // requests for arbitrary destinations.
        let declared = doc.bucket.as_deref().ok_or(SignerError::MissingBucket)?;
        if declared != self.expected_bucket {
            return Err(SignerError::BucketMismatch {
                expected: self.expected_bucket.clone(),
                declared: declared.to_string(),
            });
        }
        Ok(())
    }

    fn validate_size_bounds(&self, doc: &PolicyDocument) -> SignerResult<()> {
        let Some(bounds) = self.size_bounds else {
            return Ok(());
        };
        let Some((min_declared, max_declared)) = &doc.content_length_range else {
            return Err(SignerError::MissingSizeBounds);
        };

        let ok = match self.size_bound_check {
            SizeBoundCheck::Exact => {
                *min_declared == bounds.min.to_string()
                    && *max_declared == bounds.max.to_string()
            }
            SizeBoundCheck::Range => {
                match (min_declared.parse::<u64>(), max_declared.parse::<u64>()) {
                    (Ok(min), Ok(max)) => min <= max && min >= bounds.min && max <= bounds.max,
                    _ => false,
                }
            }
        };

        if ok {
            Ok(())
        } else {
            Err(SignerError::SizeBoundMismatch)
        }
    }

    fn require_bucket_reference(&self, s: &str) -> SignerResult<()> {
        // The canonical string must contain "/<bucket>/<key>" with a
        // non-empty key.
        let needle = format!("/{}/", self.expected_bucket);
        let referenced = s
            .find(&needle)
            .is_some_and(|pos| pos + needle.len() < s.len());
        if referenced {
            Ok(())
        } else {
            Err(SignerError::BucketNotReferenced {
                expected: self.expected_bucket.clone(),
            })
        }
    }

    /// Derive the scoped signing key and sign `message` with it.
    ///
    /// Key chain: HMAC("AWS4" + secret, date) -> region -> "s3" -> "aws4_request".
    fn sign_v4(&self, date: &str, region: &str, message: &[u8]) -> Vec<u8> {
        let mut seed = b"AWS4".to_vec();
        seed.extend_from_slice(self.secret.as_bytes());

        let mut key = hmac_sha256(&seed, date.as_bytes());
        key = hmac_sha256(&key, region.as_bytes());
        key = hmac_sha256(&key, b"s3");
        key = hmac_sha256(&key, b"aws4_request");
        hmac_sha256(&key, message)
    }
}

/// Parse a credential scope of the form `.../date/region/s3/aws4_request`,
/// returning the date and region segments.
fn parse_credential_scope(credential: &str) -> SignerResult<(&str, &str)> {
    let parts: Vec<&str> = credential.split('/').collect();
    let malformed = || SignerError::MalformedScope(credential.to_string());

    if parts.len() < 4 {
        return Err(malformed());
    }
    let &[date, region, service, terminator] = &parts[parts.len() - 4..] else {
        return Err(malformed());
    };

    if service != "s3" || terminator != "aws4_request" {
        return Err(malformed());
    }
    if date.is_empty() || region.is_empty() || !date.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }

    Ok((date, region))
}

fn hmac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}
