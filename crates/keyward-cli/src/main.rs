use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "keyward", version, about = "Keyward key and token tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// RSA key pair management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Bearer token tools
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a PKCS#1 RSA key pair.
    Generate {
        /// Directory to write private.pem / public.pem into (prints to stdout otherwise)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Modulus size in bits (at least 2048)
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Sign a token for a principal.
    Mint {
        /// Private key: a file path or an inline PEM block
        #[arg(long = "private-key", env = "KEYWARD_PRIVATE_KEY")]
        private_key: String,

        #[arg(long = "user-id")]
        user_id: i64,

        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// Role name (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Group name (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Lifetime, e.g. "72h", "30m"
        #[arg(long, default_value = "72h")]
        expires: String,

        /// Write the token to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print a token's claims WITHOUT checking its signature.
    Inspect {
        /// The token, or a path to a file containing it
        token: String,
    },

    /// Verify a token's signature and expiry against a public key.
    Verify {
        /// The token, or a path to a file containing it
        token: String,

        /// Public key: a file path or an inline PEM block (PKCS#1 or PKIX)
        #[arg(long = "public-key", env = "KEYWARD_PUBLIC_KEY")]
        public_key: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output, bits } => commands::keys::generate(output, bits)?,
        },
        Command::Token { cmd } => match cmd {
            TokenCommand::Mint {
                private_key,
                user_id,
                username,
                email,
                roles,
                groups,
                expires,
                output,
            } => commands::token::mint(
                &private_key,
                commands::token::MintRequest {
                    user_id,
                    username,
                    email,
                    roles,
                    groups,
                    expires,
                },
                output,
            )?,
            TokenCommand::Inspect { token } => commands::token::inspect(&token)?,
            TokenCommand::Verify { token, public_key } => {
                commands::token::verify(&token, &public_key)?
            }
        },
    }

    Ok(())
}
