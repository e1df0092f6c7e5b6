use std::error::Error as StdError;

use thiserror::Error;

/// Exit status for argument errors. Also used for failures without a kind.
pub const EXIT_USAGE: i32 = 1;
/// Exit status when a key file or standard input cannot be read.
pub const EXIT_IO: i32 = 2;
/// Exit status for unusable key material.
pub const EXIT_KEY: i32 = 3;
/// Exit status when the passphrase is missing or does not unlock the key.
pub const EXIT_PASSPHRASE: i32 = 4;
/// Exit status for failures inside the OpenPGP operations themselves.
pub const EXIT_CRYPTO: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error - merely that it cannot be confidently
    /// determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Interaction with the filesystem, stdin, or other I/O failed.
    Io,
    /// Key file content is not UTF-8 or not a parseable OpenPGP key.
    KeyParse,
    /// A public key was given where a private key is required, or the reverse.
    KeyRole,
    /// The key has no (sub)key usable for the requested operation.
    KeyCapability,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// The passphrase did not unlock the private key.
    Unlock,
    /// Producing the signature or writing the signed message failed.
    Sign,
    /// Encrypting to the recipient key failed.
    Encrypt,
    /// A sealed message could not be decrypted.
    Decrypt,
    /// A decrypted message carried no signature valid for the expected signer.
    Verify,
    /// The transport text is not base64 of an armored OpenPGP message.
    ArmoringInvalid,
    /// Base64 decoding of the transport text failed.
    ArmoringDecode,
}

impl ErrorKind {
    /// Process exit status the command-line tool reports for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Io => EXIT_IO,
            ErrorKind::KeyParse | ErrorKind::KeyRole | ErrorKind::KeyCapability => EXIT_KEY,
            ErrorKind::PassphraseUnavailable | ErrorKind::Unlock => EXIT_PASSPHRASE,
            ErrorKind::Sign
            | ErrorKind::Encrypt
            | ErrorKind::Decrypt
            | ErrorKind::Verify
            | ErrorKind::ArmoringInvalid
            | ErrorKind::ArmoringDecode => EXIT_CRYPTO,
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl SealError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Exit status for this error; errors without a kind map to [`EXIT_USAGE`].
    pub fn exit_code(&self) -> i32 {
        self.kind.map_or(EXIT_USAGE, ErrorKind::exit_code)
    }

    /// The message followed by every source message, joined with ": ".
    pub fn chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = StdError::source(self);
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SealError>;
