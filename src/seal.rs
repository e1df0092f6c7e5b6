//! Sign-then-encrypt using rPGP
//!
//! The plaintext becomes a literal data packet, is signed with the sender's
//! signing key (one-pass signature, SHA-256) and the signed packet stream is
//! encrypted to the recipient key:
//! - session key wrapped with the recipient's encryption (sub)key (PKESK)
//! - payload in a SEIPD v1 packet using AES-256
//!
//! The result is ASCII armored (`-----BEGIN PGP MESSAGE-----`).

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::keys::{self, EncryptionKeyRef, SigningKeyRef, UnlockedKey};
use crate::transport;
use pgp::composed::{Message, MessageBuilder, SignedPublicKey};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{Packet, PacketParser};
use pgp::types::Password;
use rand::thread_rng;
use std::io::{self, BufRead};

/// Hash used for the message signature
const SIGNATURE_HASH: HashAlgorithm = HashAlgorithm::Sha256;

/// Cipher used for the encrypted payload
const PAYLOAD_CIPHER: SymmetricKeyAlgorithm = SymmetricKeyAlgorithm::AES256;

/// An armored, signed and encrypted OpenPGP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    armored: String,
}

impl SealedMessage {
    /// The armored message text.
    pub fn armored(&self) -> &str {
        &self.armored
    }

    /// Base64 of the armored text, see [`transport::encode`].
    pub fn to_transport(&self) -> String {
        transport::encode(&self.armored)
    }
}

/// Sign `data` with `signer` and encrypt the signed message to `recipient`.
pub fn sign_and_encrypt(
    data: &[u8],
    signer: &UnlockedKey<'_>,
    recipient: &SignedPublicKey,
) -> Result<SealedMessage> {
    let signing_key = keys::signing_key(signer.key())?;
    let encryption_key = keys::encryption_key(recipient)?;

    let mut rng = thread_rng();
    let mut builder =
        MessageBuilder::from_bytes("", data.to_vec()).seipd_v1(&mut rng, PAYLOAD_CIPHER);

    match signing_key {
        SigningKeyRef::Primary(key) => {
            builder.sign(key, Password::from(signer.password().read().as_slice()), SIGNATURE_HASH)
        }
        SigningKeyRef::Subkey(key) => {
            builder.sign(key, Password::from(signer.password().read().as_slice()), SIGNATURE_HASH)
        }
    };

    match encryption_key {
        EncryptionKeyRef::Primary(key) => builder.encrypt_to_key(&mut rng, key),
        EncryptionKeyRef::Subkey(key) => builder.encrypt_to_key(&mut rng, key),
    }
    .map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Encrypt,
            "failed to encrypt to recipient key",
            e,
        )
    })?;

    // Signing happens while the packet stream is written out.
    let armored = builder
        .to_armored_string(&mut rng, Default::default())
        .map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Sign,
                "failed to sign and serialize message",
                e,
            )
        })?;

    log::info!(
        "sealed {} bytes of data into {} bytes of armored text",
        data.len(),
        armored.len()
    );
    Ok(SealedMessage { armored })
}

/// Decrypt an armored message with `recipient` and check it was signed by `signer`.
///
/// The signature may come from the signer's primary key or any of its subkeys.
pub fn decrypt_and_verify(
    armored: &str,
    recipient: &UnlockedKey<'_>,
    signer: &SignedPublicKey,
) -> Result<Vec<u8>> {
    let (message, _headers) = Message::from_armor(armored.as_bytes()).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Decrypt,
            "not an armored OpenPGP message",
            e,
        )
    })?;
    let mut message = message
        .decrypt(recipient.password(), recipient.key())
        .map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Decrypt,
                "failed to decrypt message",
                e,
            )
        })?;

    // The one-pass signature reader cannot finish on an empty literal body,
    // so that case is verified from the trailing signature packet directly.
    if literal_is_empty(&mut message)? {
        verify_empty_literal(message, signer)?;
        log::info!("decrypted and verified an empty message");
        return Ok(Vec::new());
    }

    let data = message.as_data_vec().map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Decrypt,
            "failed to read decrypted data",
            e,
        )
    })?;

    let verified = message.verify(&signer.primary_key).is_ok()
        || signer
            .public_subkeys
            .iter()
            .any(|subkey| message.verify(&subkey.key).is_ok());
    if !verified {
        return Err(not_signed_by_signer());
    }

    log::info!("decrypted and verified {} bytes", data.len());
    Ok(data)
}

/// Peek at the literal data inside a one-pass signed message without
/// advancing the signature reader.
fn literal_is_empty(message: &mut Message<'_>) -> Result<bool> {
    let Message::SignedOnePass { reader, .. } = message else {
        return Ok(false);
    };
    let buffered = reader.get_mut().fill_buf().map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Decrypt,
            "failed to read decrypted data",
            e,
        )
    })?;
    Ok(buffered.is_empty())
}

fn verify_empty_literal(message: Message<'_>, signer: &SignedPublicKey) -> Result<()> {
    // Past the literal packet, the decrypted stream continues with the signature.
    let mut packets = PacketParser::new(message.into_inner().into_inner());
    let signature = match packets.next() {
        Some(Ok(Packet::Signature(signature))) => signature,
        _ => {
            return Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::Verify,
                "message carries no signature",
            ));
        }
    };

    // Reading to the end checks the modification detection code.
    io::copy(&mut packets.into_inner(), &mut io::sink()).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Decrypt,
            "failed to read decrypted data",
            e,
        )
    })?;

    let verified = signature.verify(&signer.primary_key, io::empty()).is_ok()
        || signer
            .public_subkeys
            .iter()
            .any(|subkey| signature.verify(&subkey.key, io::empty()).is_ok());
    if !verified {
        return Err(not_signed_by_signer());
    }
    Ok(())
}

fn not_signed_by_signer() -> SealError {
    SealError::with_kind(
        ErrorCategory::User,
        ErrorKind::Verify,
        "message is not signed by the expected key",
    )
}
