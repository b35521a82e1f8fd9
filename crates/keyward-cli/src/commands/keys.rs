//! `keyward keys generate`

use anyhow::Context;
use keyward_core::{KeyConfig, KeyMaterial};
use keyward_token::KeyGenerator;
use std::fs;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_FILE: &str = "private.pem";
pub const PUBLIC_KEY_FILE: &str = "public.pem";

fn generate_material(bits: usize) -> anyhow::Result<KeyMaterial> {
    let cfg = KeyConfig {
        bits,
        ..KeyConfig::default()
    };
    let generator = KeyGenerator::from_config(&cfg)?;
    Ok(generator.generate()?)
}

fn write_pair(dir: &Path, material: &KeyMaterial) -> anyhow::Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);
    fs::write(&private_path, &material.private_key_pem)?;
    fs::write(&public_path, &material.public_key_pem)?;
    Ok((private_path, public_path))
}

/// Generate a PKCS#1 RSA key pair.
pub fn generate(output: Option<PathBuf>, bits: usize) -> anyhow::Result<()> {
    let material = generate_material(bits)?;

    if let Some(dir) = output {
        let (private_path, public_path) = write_pair(&dir, &material)?;
        println!("✔ Generated {bits}-bit RSA key pair:");
        println!("  Private key: {}", private_path.display());
        println!("  Public key:  {}", public_path.display());
        println!("  Expires:     {}", material.expires_at.to_rfc3339());
        println!();
        println!("⚠️  Keep your private key secure! Never commit it to version control.");
    } else {
        print!("{}", material.private_key_pem);
        print!("{}", material.public_key_pem);
    }

    Ok(())
}
