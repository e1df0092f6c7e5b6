//! End-to-end sign-and-encrypt from key files
//!
//! Runs the steps in a fixed order: load the private key, obtain the
//! passphrase, unlock, load the public key, seal, encode. The first failing
//! step ends the run; nothing is retried.

use crate::error::Result;
use crate::keys;
use crate::passphrase::PassphraseReader;
use crate::seal;
use std::path::Path;

/// Sign `data` with the private key at `private_key_path` and encrypt it to
/// the public key at `public_key_path`.
///
/// Returns the sealed message in transport encoding (base64 of the armored
/// text).
pub fn sign_and_encrypt_files(
    data: &[u8],
    private_key_path: &Path,
    public_key_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<String> {
    let secret_key = keys::load_secret_key(private_key_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let signer = keys::unlock(&secret_key, &passphrase)
        .map_err(|e| e.with_context(format!("cannot use {}", private_key_path.display())))?;

    let public_key = keys::load_public_key(public_key_path)?;

    let sealed = seal::sign_and_encrypt(data, &signer, &public_key)
        .map_err(|e| e.with_context("sign-and-encrypt failed"))?;
    Ok(sealed.to_transport())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::passphrase::ConstantPassphraseReader;
    use crate::testdata::{ALICE_PASSPHRASE, testdata_path};
    use crate::transport;
    use tempfile::TempDir;

    fn alice_reader() -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(ALICE_PASSPHRASE.as_bytes().to_vec())
    }

    #[test]
    fn test_files_roundtrip() {
        let mut reader = alice_reader();
        let encoded = sign_and_encrypt_files(
            b"Hello, pgp-seal!",
            &testdata_path("alice.sec.asc"),
            &testdata_path("bob.pub.asc"),
            &mut reader,
        )
        .unwrap();

        let armored = transport::decode(&encoded).unwrap();
        let bob = keys::load_secret_key(&testdata_path("bob.sec.asc")).unwrap();
        let recipient = keys::unlock(&bob, b"").unwrap();
        let alice = keys::load_public_key(&testdata_path("alice.pub.asc")).unwrap();
        let data = seal::decrypt_and_verify(&armored, &recipient, &alice).unwrap();
        assert_eq!(data, b"Hello, pgp-seal!");
    }

    #[test]
    fn test_wrong_passphrase() {
        let mut reader = ConstantPassphraseReader::new(b"wrong".to_vec());
        let err = sign_and_encrypt_files(
            b"data",
            &testdata_path("alice.sec.asc"),
            &testdata_path("bob.pub.asc"),
            &mut reader,
        )
        .expect_err("expected unlock failure");
        assert_eq!(err.kind, Some(ErrorKind::Unlock));
    }

    #[test]
    fn test_missing_public_key() {
        let temp_dir = TempDir::new().unwrap();
        let mut reader = alice_reader();
        let err = sign_and_encrypt_files(
            b"data",
            &testdata_path("alice.sec.asc"),
            &temp_dir.path().join("nonexistent.asc"),
            &mut reader,
        )
        .expect_err("expected io failure");
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_swapped_key_paths() {
        let mut reader = alice_reader();
        let err = sign_and_encrypt_files(
            b"data",
            &testdata_path("bob.pub.asc"),
            &testdata_path("alice.sec.asc"),
            &mut reader,
        )
        .expect_err("expected role failure");
        assert_eq!(err.kind, Some(ErrorKind::KeyRole));
    }

    #[test]
    fn test_private_key_checked_before_passphrase_is_read() {
        struct PanickingReader;

        impl PassphraseReader for PanickingReader {
            fn read_passphrase(&mut self) -> Result<zeroize::Zeroizing<Vec<u8>>> {
                panic!("passphrase must not be read for an unusable key");
            }
        }

        let err = sign_and_encrypt_files(
            b"data",
            &testdata_path("garbage.asc"),
            &testdata_path("bob.pub.asc"),
            &mut PanickingReader,
        )
        .expect_err("expected parse failure");
        assert_eq!(err.kind, Some(ErrorKind::KeyParse));
    }
}
