//! Fixture keys shared by the unit tests.
//!
//! Both keys were generated with GnuPG: an Ed25519 sign+certify primary with
//! a Curve25519 encryption subkey. Alice's secret key is passphrase
//! protected, Bob's is not.

use std::path::PathBuf;

pub const ALICE_PASSPHRASE: &str = "correct horse battery staple";

pub fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}
