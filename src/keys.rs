//! Loading, role-checking and unlocking OpenPGP keys
//!
//! Key files hold one armored transferable key. Only the first key in a file
//! is used. Which (sub)key signs and which one receives the session key is
//! decided from the key flags in the binding and self signatures.

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::passphrase;
use pgp::composed::{Deserializable, SignedKeyDetails, SignedPublicKey, SignedSecretKey};
use pgp::packet::{
    KeyFlags, PublicKey, PublicSubkey, SecretKey, SecretSubkey, Signature, SubpacketData,
};
use pgp::types::{KeyDetails, Password};
use std::fs;
use std::io;
use std::path::Path;

/// Read and parse the private key stored at `path`.
pub fn load_secret_key(path: &Path) -> Result<SignedSecretKey> {
    let text = read_key_file(path)?;
    let key = parse_secret_key(&text).map_err(|e| {
        e.with_context(format!("failed to load private key from {}", path.display()))
    })?;
    log::info!("loaded private key from {}", path.display());
    log::debug!("private key id {:?}, user {}", key.key_id(), primary_user(&key.details));
    Ok(key)
}

/// Read and parse the public key stored at `path`.
pub fn load_public_key(path: &Path) -> Result<SignedPublicKey> {
    let text = read_key_file(path)?;
    let key = parse_public_key(&text).map_err(|e| {
        e.with_context(format!("failed to load public key from {}", path.display()))
    })?;
    log::info!("loaded public key from {}", path.display());
    log::debug!("public key id {:?}, user {}", key.key_id(), primary_user(&key.details));
    Ok(key)
}

/// Parse armored text that must contain a private key.
pub fn parse_secret_key(text: &str) -> Result<SignedSecretKey> {
    match SignedSecretKey::from_string(text) {
        Ok((key, _headers)) => {
            if key.details.users.is_empty() {
                log::warn!("private key has no user IDs");
            }
            Ok(key)
        }
        Err(err) => {
            if SignedPublicKey::from_string(text).is_ok() {
                return Err(SealError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::KeyRole,
                    "expected a private key but found a public key",
                ));
            }
            Err(SealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyParse,
                "not a valid OpenPGP private key",
                err,
            ))
        }
    }
}

/// Parse armored text that must contain a public key.
///
/// A private key block is refused even though it embeds the public half.
pub fn parse_public_key(text: &str) -> Result<SignedPublicKey> {
    if SignedSecretKey::from_string(text).is_ok() {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyRole,
            "expected a public key but found a private key",
        ));
    }
    let (key, _headers) = SignedPublicKey::from_string(text).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::KeyParse,
            "not a valid OpenPGP public key",
            e,
        )
    })?;
    if key.details.users.is_empty() {
        log::warn!("public key has no user IDs");
    }
    Ok(key)
}

/// A private key whose passphrase has been checked.
pub struct UnlockedKey<'a> {
    key: &'a SignedSecretKey,
    password: Password,
}

impl<'a> UnlockedKey<'a> {
    pub fn key(&self) -> &'a SignedSecretKey {
        self.key
    }

    pub fn password(&self) -> &Password {
        &self.password
    }
}

/// Check that `passphrase` unlocks `key`.
///
/// Keys stored without protection unlock with any passphrase.
pub fn unlock<'a>(key: &'a SignedSecretKey, passphrase: &[u8]) -> Result<UnlockedKey<'a>> {
    let password = passphrase::to_password(passphrase)?;
    key.primary_key
        .unlock(&password, |_, _| Ok(()))
        .and_then(|inner| inner)
        .map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Unlock,
                "failed to unlock private key (wrong passphrase?)",
                e,
            )
        })?;
    log::info!("unlocked private key {:?}", key.key_id());
    Ok(UnlockedKey { key, password })
}

/// The secret (sub)key that will produce the signature.
#[derive(Debug, Clone, Copy)]
pub enum SigningKeyRef<'a> {
    Primary(&'a SecretKey),
    Subkey(&'a SecretSubkey),
}

/// The public (sub)key the session key is encrypted to.
#[derive(Debug, Clone, Copy)]
pub enum EncryptionKeyRef<'a> {
    Primary(&'a PublicKey),
    Subkey(&'a PublicSubkey),
}

/// Pick the signing key: a subkey flagged for signing, else the primary key.
///
/// The primary key is also used when the key carries no key flags at all.
pub fn signing_key(key: &SignedSecretKey) -> Result<SigningKeyRef<'_>> {
    if let Some(subkey) = key
        .secret_subkeys
        .iter()
        .find(|sub| key_flags(&sub.signatures).any(KeyFlags::sign))
    {
        log::debug!("signing with subkey {:?}", subkey.key.key_id());
        return Ok(SigningKeyRef::Subkey(&subkey.key));
    }

    let flagged = key_flags(primary_signatures(&key.details)).next().is_some()
        || key
            .secret_subkeys
            .iter()
            .any(|sub| key_flags(&sub.signatures).next().is_some());
    if !flagged || key_flags(primary_signatures(&key.details)).any(KeyFlags::sign) {
        log::debug!("signing with primary key {:?}", key.primary_key.key_id());
        return Ok(SigningKeyRef::Primary(&key.primary_key));
    }

    Err(SealError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyCapability,
        "private key has no signing-capable key",
    ))
}

/// Pick the encryption key: a subkey flagged for encryption, else the primary key.
///
/// Without any key flags the first subkey is used, or the primary key when
/// there are no subkeys.
pub fn encryption_key(key: &SignedPublicKey) -> Result<EncryptionKeyRef<'_>> {
    if let Some(subkey) = key
        .public_subkeys
        .iter()
        .find(|sub| key_flags(&sub.signatures).any(can_encrypt))
    {
        log::debug!("encrypting to subkey {:?}", subkey.key.key_id());
        return Ok(EncryptionKeyRef::Subkey(&subkey.key));
    }

    if key_flags(primary_signatures(&key.details)).any(can_encrypt) {
        log::debug!("encrypting to primary key {:?}", key.primary_key.key_id());
        return Ok(EncryptionKeyRef::Primary(&key.primary_key));
    }

    let flagged = key_flags(primary_signatures(&key.details)).next().is_some()
        || key
            .public_subkeys
            .iter()
            .any(|sub| key_flags(&sub.signatures).next().is_some());
    if !flagged {
        return Ok(match key.public_subkeys.first() {
            Some(subkey) => EncryptionKeyRef::Subkey(&subkey.key),
            None => EncryptionKeyRef::Primary(&key.primary_key),
        });
    }

    Err(SealError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyCapability,
        "public key has no encryption-capable key",
    ))
}

fn can_encrypt(flags: &KeyFlags) -> bool {
    flags.encrypt_comms() || flags.encrypt_storage()
}

/// Direct-key signatures followed by the user ID self-signatures.
fn primary_signatures(details: &SignedKeyDetails) -> impl Iterator<Item = &Signature> {
    details
        .direct_signatures
        .iter()
        .chain(details.users.iter().flat_map(|user| user.signatures.iter()))
}

/// Key flags carried in the hashed area of each signature.
fn key_flags<'a>(
    sigs: impl IntoIterator<Item = &'a Signature>,
) -> impl Iterator<Item = &'a KeyFlags> {
    sigs.into_iter().filter_map(|sig| {
        sig.config().and_then(|config| {
            config
                .hashed_subpackets
                .iter()
                .find_map(|subpkt| match &subpkt.data {
                    SubpacketData::KeyFlags(flags) => Some(flags),
                    _ => None,
                })
        })
    })
}

fn primary_user(details: &SignedKeyDetails) -> String {
    details
        .users
        .first()
        .map(|user| String::from_utf8_lossy(user.id.id()).into_owned())
        .unwrap_or_else(|| "<none>".to_string())
}

fn read_key_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::KeyParse,
            format!("key file {} is not valid UTF-8", path.display()),
            e,
        )
    })
}

fn read_error(path: &Path, err: io::Error) -> SealError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SealError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read key from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{ALICE_PASSPHRASE, testdata_path};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_protected_secret_key() {
        let key = load_secret_key(&testdata_path("alice.sec.asc")).unwrap();
        assert_eq!(primary_user(&key.details), "Alice Sender <alice@example.com>");
    }

    #[test]
    fn test_load_public_key() {
        let key = load_public_key(&testdata_path("bob.pub.asc")).unwrap();
        assert_eq!(key.public_subkeys.len(), 1);
    }

    #[test]
    fn test_public_key_where_private_required() {
        let err = load_secret_key(&testdata_path("alice.pub.asc")).expect_err("expected role error");
        assert_eq!(err.kind, Some(ErrorKind::KeyRole));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_private_key_where_public_required() {
        let err = load_public_key(&testdata_path("bob.sec.asc")).expect_err("expected role error");
        assert_eq!(err.kind, Some(ErrorKind::KeyRole));
    }

    #[test]
    fn test_garbage_key_file() {
        let err = load_secret_key(&testdata_path("garbage.asc")).expect_err("expected parse error");
        assert_eq!(err.kind, Some(ErrorKind::KeyParse));

        let err = load_public_key(&testdata_path("garbage.asc")).expect_err("expected parse error");
        assert_eq!(err.kind, Some(ErrorKind::KeyParse));
    }

    #[test]
    fn test_missing_key_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.asc");

        let err = load_secret_key(&missing).expect_err("expected io error");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_non_utf8_key_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("binary.asc");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x99]).unwrap();

        let err = load_public_key(&path).expect_err("expected parse error");
        assert_eq!(err.kind, Some(ErrorKind::KeyParse));
    }

    #[test]
    fn test_unlock_with_correct_passphrase() {
        let key = load_secret_key(&testdata_path("alice.sec.asc")).unwrap();
        assert!(unlock(&key, ALICE_PASSPHRASE.as_bytes()).is_ok());
    }

    #[test]
    fn test_unlock_with_wrong_passphrase() {
        let key = load_secret_key(&testdata_path("alice.sec.asc")).unwrap();
        let err = unlock(&key, b"not the passphrase").err().expect("expected unlock error");
        assert_eq!(err.kind, Some(ErrorKind::Unlock));
    }

    #[test]
    fn test_unprotected_key_unlocks_with_empty_passphrase() {
        let key = load_secret_key(&testdata_path("bob.sec.asc")).unwrap();
        assert!(unlock(&key, b"").is_ok());
    }

    #[test]
    fn test_signing_key_is_sign_capable_primary() {
        // The fixture primaries are flagged sign+certify, subkeys encrypt-only.
        let key = load_secret_key(&testdata_path("alice.sec.asc")).unwrap();
        assert!(matches!(signing_key(&key).unwrap(), SigningKeyRef::Primary(_)));
    }

    #[test]
    fn test_encryption_key_is_subkey() {
        let key = load_public_key(&testdata_path("bob.pub.asc")).unwrap();
        assert!(matches!(encryption_key(&key).unwrap(), EncryptionKeyRef::Subkey(_)));
    }

    #[test]
    fn test_signing_subkey_preferred_over_certify_only_primary() {
        let key = load_secret_key(&testdata_path("carol.sec.asc")).unwrap();
        match signing_key(&key).unwrap() {
            SigningKeyRef::Subkey(subkey) => {
                assert_eq!(subkey.key_id(), key.secret_subkeys[0].key.key_id());
            }
            SigningKeyRef::Primary(_) => panic!("expected the signing subkey"),
        }
    }

    #[test]
    fn test_key_without_signing_capability() {
        // Certify-only primary with a single encryption subkey.
        let key = load_secret_key(&testdata_path("erin.sec.asc")).unwrap();
        let err = signing_key(&key).expect_err("expected capability error");
        assert_eq!(err.kind, Some(ErrorKind::KeyCapability));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_key_without_encryption_capability() {
        // Sign+certify primary, no subkeys.
        let key = load_public_key(&testdata_path("dave.pub.asc")).unwrap();
        let err = encryption_key(&key).expect_err("expected capability error");
        assert_eq!(err.kind, Some(ErrorKind::KeyCapability));
    }

    #[test]
    fn test_encryption_capable_primary() {
        let key = load_public_key(&testdata_path("frank.pub.asc")).unwrap();
        assert!(key.public_subkeys.is_empty());
        assert!(matches!(encryption_key(&key).unwrap(), EncryptionKeyRef::Primary(_)));
    }
}
