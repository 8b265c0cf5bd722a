//! VEIL CLI
//!
//! Small front end over `veil-siv` for encrypting and decrypting files
//! with AES-256-GCM-SIV. Encrypted output is `nonce || ciphertext || tag`,
//! so a file decrypts with nothing but the key.

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::RngCore;
use tracing::debug;
use veil_siv::{AesGcmSiv, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use zeroize::Zeroizing;

/// VEIL - nonce-misuse-resistant authenticated encryption
#[derive(Parser)]
#[command(name = "veil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Force the portable software engine
    #[arg(long)]
    portable: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    Encrypt {
        /// Input file, or "-" for stdin
        input: String,

        /// Output file, or "-" for stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// 32-byte key, hex-encoded
        #[arg(short, long)]
        key: String,

        /// 12-byte nonce, hex-encoded; generated randomly when omitted
        #[arg(short, long)]
        nonce: Option<String>,

        /// Associated data to authenticate, hex-encoded
        #[arg(short, long, default_value = "")]
        aad: String,
    },

    /// Decrypt and authenticate a file produced by `encrypt`
    Decrypt {
        /// Input file, or "-" for stdin
        input: String,

        /// Output file, or "-" for stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// 32-byte key, hex-encoded
        #[arg(short, long)]
        key: String,

        /// Associated data to authenticate, hex-encoded
        #[arg(short, long, default_value = "")]
        aad: String,
    },

    /// Generate a random 32-byte key
    Keygen,

    /// Run a self-contained encrypt/decrypt demonstration
    Demo,

    /// Show which engine this machine runs
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            key,
            nonce,
            aad,
        } => encrypt(&input, &output, &key, nonce.as_deref(), &aad, cli.portable),
        Commands::Decrypt {
            input,
            output,
            key,
            aad,
        } => decrypt(&input, &output, &key, &aad, cli.portable),
        Commands::Keygen => keygen(),
        Commands::Demo => demo(cli.portable),
        Commands::Info => info(),
    }
}

fn new_instance(key_hex: &str, portable: bool) -> Result<AesGcmSiv> {
    let key = Zeroizing::new(hex::decode(key_hex).context("key is not valid hex")?);
    if key.len() != KEY_SIZE {
        bail!("key must be {KEY_SIZE} bytes, got {}", key.len());
    }

    let siv = if portable {
        AesGcmSiv::new_portable(&key)?
    } else {
        AesGcmSiv::new(&key)?
    };

    debug!(
        accelerated = siv.is_accelerated(),
        "created cipher instance"
    );
    Ok(siv)
}

fn encrypt(
    input: &str,
    output: &str,
    key_hex: &str,
    nonce_hex: Option<&str>,
    aad_hex: &str,
    portable: bool,
) -> Result<()> {
    let siv = new_instance(key_hex, portable)?;
    let aad = hex::decode(aad_hex).context("aad is not valid hex")?;
    let plaintext = read_input(input)?;

    let nonce = match nonce_hex {
        Some(encoded) => {
            let nonce = hex::decode(encoded).context("nonce is not valid hex")?;
            if nonce.len() != NONCE_SIZE {
                bail!("nonce must be {NONCE_SIZE} bytes, got {}", nonce.len());
            }
            nonce
        }
        None => {
            let mut nonce = vec![0u8; NONCE_SIZE];
            rand::thread_rng().fill_bytes(&mut nonce);
            nonce
        }
    };

    let sealed = siv.seal(&nonce, &plaintext, &aad)?;
    debug!(
        plaintext_len = plaintext.len(),
        sealed_len = sealed.len(),
        "encrypted"
    );

    let mut out = nonce;
    out.extend_from_slice(&sealed);
    write_output(output, &out)
}

fn decrypt(input: &str, output: &str, key_hex: &str, aad_hex: &str, portable: bool) -> Result<()> {
    let siv = new_instance(key_hex, portable)?;
    let aad = hex::decode(aad_hex).context("aad is not valid hex")?;
    let data = read_input(input)?;

    if data.len() < NONCE_SIZE + TAG_SIZE {
        bail!(
            "input is too short to be a sealed message ({} bytes)",
            data.len()
        );
    }

    let (nonce, sealed) = data.split_at(NONCE_SIZE);
    let plaintext = siv
        .open(nonce, sealed, &aad)
        .context("decryption failed; the key is wrong or the data was tampered with")?;

    debug!(plaintext_len = plaintext.len(), "decrypted");
    write_output(output, &plaintext)
}

fn keygen() -> Result<()> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rand::thread_rng().fill_bytes(&mut *key);
    println!("{}", hex::encode(&*key));
    Ok(())
}

fn demo(portable: bool) -> Result<()> {
    let plaintext = "I'm cooking MC's like a pound of bacon";

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rand::thread_rng().fill_bytes(&mut *key);
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let siv = if portable {
        AesGcmSiv::new_portable(&*key)?
    } else {
        AesGcmSiv::new(&*key)?
    };

    println!(
        "engine:     {}",
        if siv.is_accelerated() {
            "accelerated"
        } else {
            "portable"
        }
    );
    println!("key:        {}", hex::encode(&*key));
    println!("nonce:      {}", hex::encode(nonce));
    println!("plaintext:  {plaintext}");

    let sealed = siv.seal(&nonce, plaintext.as_bytes(), b"")?;
    println!("sealed:     {}", hex::encode(&sealed));

    let opened = siv.open(&nonce, &sealed, b"")?;
    println!("opened:     {}", String::from_utf8_lossy(&opened));

    Ok(())
}

fn info() -> Result<()> {
    let accelerated = AesGcmSiv::new_accelerated(&[0u8; KEY_SIZE]).is_ok();
    println!(
        "hardware acceleration: {}",
        if accelerated {
            "available (AES-NI + PCLMULQDQ)"
        } else {
            "unavailable (portable engine will be used)"
        }
    );
    Ok(())
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("failed to read {path}"))
    }
}

fn write_output(path: &str, data: &[u8]) -> Result<()> {
    if path == "-" {
        io::stdout()
            .write_all(data)
            .context("failed to write stdout")
    } else {
        fs::write(path, data).with_context(|| format!("failed to write {path}"))
    }
}
