//! pgp-seal - Sign and encrypt a payload with OpenPGP keys

#![forbid(unsafe_code)]

pub mod error;
pub mod keys;
pub mod passphrase;
pub mod pipeline;
pub mod seal;
pub mod transport;

#[cfg(test)]
mod testdata;
