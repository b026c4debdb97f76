//! hecrypt - homomorphic file encryption and key management

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use hecrypt::{Bfv, CryptoContext, Decryptor, Encryptor, KeyPair, Scheme, SecurityLevel};

#[derive(Parser)]
#[command(name = "hecrypt", version)]
#[command(about = "Homomorphic file encryption and key management", long_about = None)]
struct Cli {
    /// Parameter preset; keys only work under the preset they were generated with
    #[arg(long, value_enum, default_value_t = Security::Medium, global = true)]
    security: Security,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Security {
    Low,
    Medium,
    High,
}

impl From<Security> for SecurityLevel {
    fn from(security: Security) -> Self {
        match security {
            Security::Low => Self::Low,
            Security::Medium => Self::Medium,
            Security::High => Self::High,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a public/private key pair
    GenerateKeys {
        /// Where to write the public key
        #[arg(long, visible_alias = "public-key")]
        public: PathBuf,

        /// Where to write the private key
        #[arg(long, visible_alias = "private-key")]
        private: PathBuf,
    },

    /// Encrypt a file with a public key
    Encrypt {
        /// File to encrypt
        #[arg(long)]
        input: PathBuf,

        /// Where to write the encrypted file
        #[arg(long)]
        output: PathBuf,

        /// Public key file
        #[arg(long)]
        public_key: PathBuf,
    },

    /// Decrypt a file with a private key
    Decrypt {
        /// File to decrypt
        #[arg(long)]
        input: PathBuf,

        /// Where to write the decrypted file
        #[arg(long)]
        output: PathBuf,

        /// Private key file
        #[arg(long)]
        private_key: PathBuf,
    },
}

fn run(cli: Cli) -> hecrypt::Result<String> {
    let ctx: CryptoContext<Bfv> = CryptoContext::try_new(cli.security.into())?;
    info!("using the {} backend", Bfv::NAME);

    match cli.command {
        Commands::GenerateKeys { public, private } => {
            let mut keys = KeyPair::new(&ctx);
            keys.generate()?;
            keys.save(&public, &private)?;
            Ok(format!(
                "Successfully generated keys:\n  Public key: {}\n  Private key: {}",
                public.display(),
                private.display()
            ))
        }

        Commands::Encrypt {
            input,
            output,
            public_key,
        } => {
            let mut keys = KeyPair::new(&ctx);
            keys.load_public_key(&public_key)?;
            info!("encrypting {}", input.display());
            Encryptor::new(&ctx).encrypt_file(&input, &output, &keys)?;
            Ok(format!(
                "Successfully encrypted {} to {}",
                input.display(),
                output.display()
            ))
        }

        Commands::Decrypt {
            input,
            output,
            private_key,
        } => {
            let mut keys = KeyPair::new(&ctx);
            keys.load_secret_key(&private_key)?;
            info!("decrypting {}", input.display());
            Decryptor::new(&ctx).decrypt_file(&input, &output, &keys)?;
            Ok(format!(
                "Successfully decrypted {} to {}",
                input.display(),
                output.display()
            ))
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(cli) {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
