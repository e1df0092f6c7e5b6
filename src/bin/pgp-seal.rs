//! pgp-seal CLI - Sign and encrypt data with OpenPGP keys
//!
//! Signs the data argument with a passphrase-protected private key, encrypts
//! the signed message to a public key and prints the armored result as a
//! single base64 line.

use clap::error::ErrorKind as ClapErrorKind;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process;

use pgp_seal::error::EXIT_USAGE;
use pgp_seal::passphrase::{
    ConstantPassphraseReader, EnvPassphraseReader, PassphraseReader, ReaderPassphraseReader,
    TerminalPassphraseReader,
};
use pgp_seal::pipeline;

#[derive(Parser)]
#[command(name = "pgp-seal")]
#[command(version)]
#[command(
    about = "Sign data with a private key, encrypt it to a public key, print it as base64.",
    long_about = None
)]
struct Cli {
    /// Data to sign and encrypt
    #[arg(value_name = "DATA", allow_hyphen_values = true)]
    data: String,

    /// Path to the armored private key used for signing
    #[arg(value_name = "PRIVATE_KEY")]
    private_key: PathBuf,

    /// Path to the armored public key to encrypt to
    #[arg(value_name = "PUBLIC_KEY")]
    public_key: PathBuf,

    /// Passphrase unlocking the private key (visible in process listings;
    /// prefer one of the --passphrase-* options)
    #[arg(
        value_name = "PASSPHRASE",
        allow_hyphen_values = true,
        required_unless_present_any = ["passphrase_stdin", "passphrase_env", "passphrase_prompt"]
    )]
    passphrase: Option<String>,

    /// Read passphrase from stdin instead of from the command line
    #[arg(long, conflicts_with_all = ["passphrase", "passphrase_env", "passphrase_prompt"])]
    passphrase_stdin: bool,

    /// Read passphrase from the named environment variable
    #[arg(long, value_name = "VAR", conflicts_with_all = ["passphrase", "passphrase_prompt"])]
    passphrase_env: Option<String>,

    /// Prompt for the passphrase on the terminal
    #[arg(long, conflicts_with = "passphrase")]
    passphrase_prompt: bool,

    /// Log progress to stderr (-v for info, -vv for debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            // Usage errors always exit 1, never clap's default of 2.
            let _ = err.print();
            process::exit(EXIT_USAGE);
        }
    };

    init_logging(cli.verbose);

    let mut reader = get_passphrase_reader(
        cli.passphrase,
        cli.passphrase_stdin,
        cli.passphrase_env,
    );
    let result = pipeline::sign_and_encrypt_files(
        cli.data.as_bytes(),
        &cli.private_key,
        &cli.public_key,
        &mut *reader,
    );

    match result {
        Ok(encoded) => println!("{}", encoded),
        Err(e) => {
            eprintln!("Error: {}", e.chain());
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn get_passphrase_reader(
    passphrase: Option<String>,
    use_stdin: bool,
    env_var: Option<String>,
) -> Box<dyn PassphraseReader> {
    if let Some(passphrase) = passphrase {
        Box::new(ConstantPassphraseReader::new(passphrase.into_bytes()))
    } else if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if let Some(var) = env_var {
        Box::new(EnvPassphraseReader::new(var))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
