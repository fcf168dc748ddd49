//! PhantomVault CLI - administrative front-end for profile vaults.
//!
//! Locks folders into per-profile encrypted vaults and unlocks them again.
//! Every command that touches a profile's folders requires dual-layer
//! authentication: administrator privileges plus the profile master key.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use phantomvault_access::{
    AccessConfig, AccessControl, Elevator, PrivilegedOperation, RestartElevator,
};
use phantomvault_common::{ProfileId, SensitiveBytes};
use phantomvault_crypto::KeyDerivationConfig;
use phantomvault_vault::{UnlockMode, VaultManager, VaultSettings};

/// Environment variable read instead of prompting for the master key.
const MASTER_KEY_ENV: &str = "PHANTOMVAULT_MASTER_KEY";

#[derive(Parser)]
#[command(name = "phantomvault")]
#[command(about = "PhantomVault - Encrypted folder vaults")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file with `vault` and `access` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the vault root directory.
    #[arg(long)]
    vault_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the encryption engine self-test.
    SelfTest,

    /// Create a vault for a new profile.
    CreateProfile {
        /// Profile identifier.
        profile: String,
    },

    /// Delete a profile vault and all of its ciphertext.
    DeleteProfile {
        /// Profile identifier.
        profile: String,
    },

    /// Encrypt a folder into the profile vault and hide it.
    Lock {
        #[arg(short, long)]
        profile: String,

        /// Folder to lock.
        path: PathBuf,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long)]
        strength: Option<String>,
    },

    /// Restore a locked folder.
    Unlock {
        #[arg(short, long)]
        profile: String,

        /// Original folder location.
        path: PathBuf,

        /// Remove the folder from the vault instead of unlocking temporarily.
        #[arg(long)]
        permanent: bool,
    },

    /// Hide temporarily unlocked folders again.
    Relock {
        /// Profile to relock; every profile when omitted.
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List the folders locked in a profile vault.
    List {
        #[arg(short, long)]
        profile: String,
    },

    /// Show privilege level, profiles and vault usage.
    Status,

    /// Validate every vault and drop corrupted entries.
    Maintain {
        /// Only report corrupted entries.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Optional configuration file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    vault: VaultSettings,
    access: AccessConfig,
}

impl CliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Everything a command needs.
struct App {
    manager: Arc<VaultManager>,
    access: AccessControl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.vault_root {
        config.vault.vault_root = root;
    }

    if let Commands::Lock {
        strength: Some(strength),
        ..
    } = &cli.command
    {
        config.vault.kdf = kdf_preset(strength)?;
    }

    config.access.validate().context("Invalid access configuration")?;
    let manager = Arc::new(VaultManager::new(config.vault).context("Invalid vault settings")?);
    let access = AccessControl::for_process(config.access, manager.clone());
    let app = App { manager, access };

    match cli.command {
        Commands::SelfTest => cmd_self_test(&app).await,

        Commands::CreateProfile { profile } => cmd_create_profile(&app, &profile).await,

        Commands::DeleteProfile { profile } => cmd_delete_profile(&app, &profile).await,

        Commands::Lock { profile, path, .. } => cmd_lock(&app, &profile, &path).await,

        Commands::Unlock {
            profile,
            path,
            permanent,
        } => cmd_unlock(&app, &profile, &path, permanent).await,

        Commands::Relock { profile } => cmd_relock(&app, profile.as_deref()).await,

        Commands::List { profile } => cmd_list(&app, &profile).await,

        Commands::Status => cmd_status(&app).await,

        Commands::Maintain { dry_run } => cmd_maintain(&app, dry_run).await,
    }
}

fn kdf_preset(strength: &str) -> Result<KeyDerivationConfig> {
    match strength {
        "interactive" => Ok(KeyDerivationConfig::interactive()),
        "moderate" => Ok(KeyDerivationConfig::moderate()),
        "sensitive" => Ok(KeyDerivationConfig::sensitive()),
        _ => anyhow::bail!("Invalid strength. Use: interactive, moderate, or sensitive"),
    }
}

fn parse_profile(profile: &str) -> Result<ProfileId> {
    ProfileId::new(profile).context("Invalid profile identifier")
}

/// Read the master key from the environment or prompt for it.
fn read_master_key(prompt: &str) -> Result<SensitiveBytes> {
    if let Ok(key) = std::env::var(MASTER_KEY_ENV) {
        return Ok(SensitiveBytes::from(key));
    }
    let key = rpassword::prompt_password(prompt).context("Failed to read master key")?;
    Ok(SensitiveBytes::from(key))
}

/// Establish a dual-layer session for `profile` and confirm it covers
/// `operation`. Returns the master key for the vault call that follows.
async fn authorize(
    app: &App,
    profile: &ProfileId,
    operation: PrivilegedOperation,
) -> Result<SensitiveBytes> {
    let key = read_master_key("Master key: ")?;
    if key.is_empty() {
        anyhow::bail!("Master key cannot be empty");
    }

    app.access
        .request_dual_layer_authentication(profile, key.as_bytes(), operation)
        .await
        .context("Authentication failed")?;

    if !app.access.has_privilege_for_operation(operation).await {
        anyhow::bail!("Access denied for {}", operation);
    }
    Ok(key)
}

/// Drop the session when a vault call reports a bad key or corrupted state.
async fn end_session_on_failure<T>(
    app: &App,
    result: phantomvault_common::Result<T>,
) -> phantomvault_common::Result<T> {
    if let Err(e) = &result {
        if e.requires_reauthentication() {
            warn!(error = %e, "Clearing authentication session");
            app.access.clear_authentication_session().await;
        }
    }
    result
}

/// Commands spanning every profile cannot authenticate a single profile,
/// so they require administrator privileges alone.
fn require_admin(app: &App, operation: PrivilegedOperation) -> Result<()> {
    if app.access.current_privilege_level().is_admin() {
        return Ok(());
    }
    RestartElevator.request(&operation.to_string())?;
    Ok(())
}

async fn cmd_self_test(app: &App) -> Result<()> {
    app.manager
        .ensure_engine_ready()
        .await
        .context("Encryption engine self-test failed")?;
    println!("Encryption engine self-test passed.");
    Ok(())
}

async fn cmd_create_profile(app: &App, profile: &str) -> Result<()> {
    let profile = parse_profile(profile)?;
    require_admin(app, PrivilegedOperation::ProfileCreation)?;

    info!(profile = %profile, "Creating profile vault");
    let vault = app
        .manager
        .create_profile_vault(&profile)
        .await
        .context("Failed to create profile vault")?;

    println!("Profile vault created!");
    println!("  Profile: {}", profile);
    println!("  Location: {}", vault.root().display());
    println!("The master key is bound to the vault on the first lock.");
    Ok(())
}

async fn cmd_delete_profile(app: &App, profile: &str) -> Result<()> {
    let profile = parse_profile(profile)?;
    let key = authorize(app, &profile, PrivilegedOperation::ProfileCreation).await?;

    app.manager
        .delete_profile_vault(&profile, key.as_bytes())
        .await
        .context("Failed to delete profile vault")?;
    app.access.clear_authentication_session().await;

    println!("Profile vault deleted: {}", profile);
    Ok(())
}

async fn cmd_lock(app: &App, profile: &str, path: &Path) -> Result<()> {
    let profile = parse_profile(profile)?;
    let key = authorize(app, &profile, PrivilegedOperation::FolderHiding).await?;

    info!(profile = %profile, path = %path.display(), "Locking folder");
    let vault = app.manager.get_profile_vault(&profile).await?;
    let info = end_session_on_failure(app, vault.lock_folder(path, key.as_bytes()).await)
        .await
        .context("Failed to lock folder")?;

    println!("Folder locked: {}", info.original_path.display());
    println!("  Files: {}", info.file_count);
    println!("  Size: {} bytes", info.total_size);
    Ok(())
}

async fn cmd_unlock(app: &App, profile: &str, path: &Path, permanent: bool) -> Result<()> {
    let profile = parse_profile(profile)?;
    let key = authorize(app, &profile, PrivilegedOperation::VaultAccess).await?;

    let mode = if permanent {
        UnlockMode::Permanent
    } else {
        UnlockMode::Temporary
    };
    let vault = app.manager.get_profile_vault(&profile).await?;
    let info = end_session_on_failure(app, vault.unlock_folder(path, key.as_bytes(), mode).await)
        .await
        .context("Failed to unlock folder")?;

    match mode {
        UnlockMode::Temporary => println!(
            "Folder unlocked temporarily: {} (run `phantomvault relock` to hide it again)",
            info.original_path.display()
        ),
        UnlockMode::Permanent => println!(
            "Folder removed from vault: {}",
            info.original_path.display()
        ),
    }
    Ok(())
}

async fn cmd_relock(app: &App, profile: Option<&str>) -> Result<()> {
    let reports = match profile {
        Some(profile) => {
            let profile = parse_profile(profile)?;
            authorize(app, &profile, PrivilegedOperation::FolderHiding).await?;
            let vault = app.manager.get_profile_vault(&profile).await?;
            vec![(profile, vault.relock_temporary_folders().await?)]
        }
        None => {
            require_admin(app, PrivilegedOperation::FolderHiding)?;
            app.manager.relock_all_temporary_folders().await?
        }
    };

    if reports.is_empty() {
        println!("No temporarily unlocked folders.");
        return Ok(());
    }

    let mut incomplete = false;
    for (profile, report) in reports {
        for path in &report.relocked {
            println!("  [{}] relocked {}", profile, path.display());
        }
        for (path, reason) in &report.failed {
            warn!(profile = %profile, path = %path.display(), "Relock failed");
            println!("  [{}] FAILED {}: {}", profile, path.display(), reason);
        }
        incomplete |= !report.is_complete();
    }

    if incomplete {
        anyhow::bail!("Some folders could not be relocked");
    }
    Ok(())
}

async fn cmd_list(app: &App, profile: &str) -> Result<()> {
    let profile = parse_profile(profile)?;
    authorize(app, &profile, PrivilegedOperation::VaultAccess).await?;

    let vault = app.manager.get_profile_vault(&profile).await?;
    let locked = vault.locked_folders().await;
    if locked.is_empty() {
        println!("No locked folders.");
        return Ok(());
    }

    println!("Locked folders for {}:", profile);
    for path in locked {
        match vault.folder_info(&path).await {
            Ok(info) => {
                let state = if info.is_temporarily_unlocked {
                    "UNLOCKED"
                } else {
                    "LOCKED"
                };
                println!(
                    "  [{}] {} ({} files, {} bytes, since {})",
                    state,
                    path.display(),
                    info.file_count,
                    info.total_size,
                    info.lock_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Err(e) => println!("  [CORRUPT] {} ({})", path.display(), e),
        }
    }
    Ok(())
}

async fn cmd_status(app: &App) -> Result<()> {
    let usage = app.manager.usage_summary().await?;

    println!("PhantomVault Status:");
    println!("  Privilege: {}", app.access.current_privilege_level());
    println!("  Vault root: {}", app.manager.settings().vault_root.display());
    println!("  Profiles: {}", usage.profiles);
    println!("  Locked folders: {}", usage.locked_folders);
    println!("  Temporarily unlocked: {}", usage.exposed_folders);
    println!("  Total vault size: {} bytes", usage.total_bytes);
    Ok(())
}

async fn cmd_maintain(app: &App, dry_run: bool) -> Result<()> {
    require_admin(app, PrivilegedOperation::RecoveryOperations)?;

    if dry_run {
        let mut healthy = true;
        for (profile, report) in app.manager.validate_all_vaults().await? {
            println!("  {}: {} folders checked", profile, report.checked);
            for path in &report.corrupted {
                println!("    corrupted: {}", path.display());
            }
            healthy &= report.is_healthy();
        }
        if healthy {
            println!("All vaults healthy.");
        }
        return Ok(());
    }

    let report = app
        .manager
        .perform_vault_maintenance()
        .await
        .context("Vault maintenance failed")?;

    println!("Maintenance complete: {} profiles checked.", report.profiles);
    for (profile, path) in &report.removed {
        println!("  [{}] removed corrupted entry {}", profile, path.display());
    }
    Ok(())
}
