//! Provider keypair generator for the tollgate gateway.
//!
//! Generates a fresh secp256k1 provider identity and outputs:
//! - The provider address (for registering with asset publishers)
//! - The secret key, hex-encoded, saved to a file (for the gateway config)
//! - A ready-to-paste config snippet
//!
//! Usage:
//!   cargo run --bin tollgate-keygen [output-dir]

use rand::rngs::OsRng;
use secp256k1::Secp256k1;
use std::env;
use std::fs;
use std::path::Path;
use tollgate::chain::signature::ProviderAccount;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    println!("Provider keypair generator for tollgate\n");

    // Get output directory from args or use current directory
    let args: Vec<String> = env::args().collect();
    let output_dir = if args.len() > 1 {
        Path::new(&args[1]).to_path_buf()
    } else {
        env::current_dir()?
    };
    fs::create_dir_all(&output_dir)?;

    println!("Generating secp256k1 provider key...");

    let (secret, _public) = Secp256k1::new().generate_keypair(&mut OsRng);
    let account = ProviderAccount::from_secret(secret);
    let secret_hex = hex::encode(account.secret_bytes());

    println!("  Provider address: {}", account.address_hex());

    // Save secret key to file (KEEP THIS SECURE!)
    let sk_path = output_dir.join("provider-key.secret");
    fs::write(&sk_path, format!("0x{secret_hex}\n"))?;
    println!("\nSecret key saved to: {}", sk_path.display());
    println!("  WARNING: Keep this file secure! It is the gateway's signing identity.");

    // Ready-to-paste config snippet
    println!("\n--- Config snippet for tollgate.toml ---\n");
    println!("# Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("provider_key = \"0x{secret_hex}\"");
    println!("\n--- End of config snippet ---");

    println!(
        "\nDone! Register address {} with your asset publishers.",
        account.address_hex()
    );
    Ok(())
}
