//! Passphrase sources for unlocking the signing key

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use pgp::types::Password;
use std::env;
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Where the passphrase for the private key comes from
pub trait PassphraseReader {
    /// The raw passphrase bytes, wiped on drop. UTF-8 is checked later by
    /// [`to_password`].
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// The passphrase given as the fourth command-line argument
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.passphrase.clone())
    }
}

/// Passphrase piped in on standard input (`--passphrase-stdin`)
///
/// Everything up to end of input is used; a trailing newline is not stripped.
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read passphrase from stdin",
                e,
            )
        })?;
        Ok(data)
    }
}

/// Passphrase taken from a named environment variable (`--passphrase-env`)
pub struct EnvPassphraseReader {
    var: String,
}

impl EnvPassphraseReader {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl PassphraseReader for EnvPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match env::var_os(&self.var) {
            Some(value) => Ok(Zeroizing::new(value.into_encoded_bytes())),
            None => Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                format!("environment variable {} is not set", self.var),
            )),
        }
    }
}

/// Interactive prompt on the controlling terminal (`--passphrase-prompt`)
pub struct TerminalPassphraseReader;

impl PassphraseReader for TerminalPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "--passphrase-prompt needs stdin to be a terminal",
            ));
        }

        // The prompt goes to stderr so stdout only ever carries the sealed message.
        let mut stderr = io::stderr();
        stderr
            .write_all(b"Passphrase (pgp-seal): ")
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                SealError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to write passphrase prompt",
                    e,
                )
            })?;

        let passphrase = Zeroizing::new(rpassword::read_password().map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                "failed to read passphrase from terminal",
                e,
            )
        })?);

        Ok(Zeroizing::new(passphrase.as_bytes().to_vec()))
    }
}

/// Converts raw passphrase bytes into the password type the OpenPGP library expects.
///
/// OpenPGP passphrases are UTF-8 strings, so other byte sequences are refused.
pub fn to_password(passphrase: &[u8]) -> Result<Password> {
    let text = std::str::from_utf8(passphrase).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "passphrase is not valid UTF-8",
            e,
        )
    })?;
    Ok(Password::from(text))
}
