//! sedpass: WD Passport-class self-encrypting drive utility
//!
//! Commands:
//!   status         - show security status and encryption type
//!   unlock         - unlock with a passphrase (or a saved password block)
//!   change-passwd  - set, replace, or clear the device password
//!   erase          - secure erase: regenerate the internal media key
//!   mount          - rescan an unlocked device so the OS sees its partitions
//!   forget         - drop the saved password block from the keychain
//!
//! The device is auto-discovered when exactly one Passport-family enclosure
//! is attached; pass --device otherwise. Most commands need root for raw
//! SCSI access to the device node.

mod keystore;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use sedpass_core::{SedDevice, UnlockOutcome};
use sedpass_scsi::{DiscoveredDevice, SgChannel};

// ── CLI structure ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sedpass",
    version,
    about = "Control the vendor lock/unlock command set of WD Passport-class self-encrypting enclosures"
)]
struct Cli {
    /// Force a device path (e.g. /dev/sdb). Usually unnecessary.
    #[arg(long, short = 'd', global = true, env = "SEDPASS_DEVICE")]
    device: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show security status and encryption type
    Status,

    /// Unlock the device
    Unlock {
        /// Unlock with the password block saved in the platform keychain
        #[arg(long)]
        saved: bool,
        /// Save the derived password block to the platform keychain
        #[arg(long)]
        save: bool,
    },

    /// Change (or disable) the device password
    ///
    /// An empty new passphrase disables encryption; setting a passphrase on
    /// an unencrypted device enables it. The device has to be unlocked.
    #[command(name = "change-passwd")]
    ChangePasswd,

    /// Secure erase: regenerate the internal media key
    ///
    /// Every byte on the device becomes permanently inaccessible, including
    /// the partition table.
    Erase {
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Rescan an unlocked device so its partitions appear
    Mount,

    /// Remove the saved password block for this device from the keychain
    Forget,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let device = sedpass_scsi::find_one(cli.device.as_deref())
        .context("resolving the device to operate on")?;
    tracing::debug!(node = %device.node.display(), label = %device.label, "selected device");

    match cli.command {
        Commands::Status => cmd_status(&device),
        Commands::Unlock { saved, save } => cmd_unlock(&device, saved, save),
        Commands::ChangePasswd => cmd_change_passwd(&device),
        Commands::Erase { yes } => cmd_erase(&device, yes),
        Commands::Mount => cmd_mount(&device),
        Commands::Forget => keystore::delete_block(&device.label),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn open(device: &DiscoveredDevice) -> Result<SedDevice<SgChannel>> {
    let channel = SgChannel::open(&device.node)
        .with_context(|| format!("opening {}", device.node.display()))?;
    Ok(SedDevice::new(channel))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_status(device: &DiscoveredDevice) -> Result<()> {
    let status = open(device)?.encryption_status()?;
    println!("{}", device.label);
    println!("  security status: {}", status.security_status);
    println!("  encryption type: {}", status.cipher);
    Ok(())
}

fn cmd_unlock(device: &DiscoveredDevice, saved: bool, save: bool) -> Result<()> {
    let mut sed = open(device)?;

    let outcome = if saved {
        let block = keystore::load_block(&device.label)?
            .with_context(|| format!("no saved password block for '{}'", device.label))?;
        sed.unlock_with_block(&block)?
    } else {
        let passphrase = prompt_passphrase("Passphrase: ")?;
        if save {
            // Derive once so the exact transmitted block is what gets saved.
            let block = sed.derive_password(&passphrase)?;
            keystore::store_block(&device.label, &block)?;
            sed.unlock_with_block(&block)?
        } else {
            sed.unlock(&passphrase)?
        }
    };

    match outcome {
        UnlockOutcome::Unlocked => println!("Device unlocked."),
        UnlockOutcome::AlreadyUnlocked => println!("Device is already unlocked."),
    }
    Ok(())
}

fn cmd_change_passwd(device: &DiscoveredDevice) -> Result<()> {
    let old = prompt_passphrase("Old passphrase (empty if none): ")?;
    let new = prompt_passphrase("New passphrase (empty to disable encryption): ")?;
    let confirm = prompt_passphrase("Confirm new passphrase: ")?;
    if secrecy::ExposeSecret::expose_secret(&new) != secrecy::ExposeSecret::expose_secret(&confirm)
    {
        bail!("new passphrase confirmation does not match");
    }

    open(device)?.change_password(&old, &new)?;
    println!("Password changed.");
    Ok(())
}

fn cmd_erase(device: &DiscoveredDevice, yes: bool) -> Result<()> {
    if !yes {
        print!(
            "All data on {} will be permanently lost. Continue? [y/N] ",
            device.label
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    open(device)?.secure_erase(None)?;
    println!("Device erased. Create a new partition table before use (e.g. fdisk and mkfs).");
    Ok(())
}

fn cmd_mount(device: &DiscoveredDevice) -> Result<()> {
    open(device)?
        .ensure_mountable()
        .context("device needs to be unlocked before mounting")?;
    sedpass_scsi::rescan(device)?;
    println!("Rescan triggered; the device should (auto-)mount shortly.");
    Ok(())
}

// ── Prompts ───────────────────────────────────────────────────────────────────

fn prompt_passphrase(prompt: &str) -> Result<SecretString> {
    let passphrase = rpassword::prompt_password(prompt).context("reading passphrase")?;
    Ok(SecretString::from(passphrase))
}
