// Warden — CLI Command Handlers
//
// Each function handles one CLI subcommand. `Context` opens the SQLite
// store, the audit log and the keychain adapter from the loaded
// configuration; the encrypted store is only built for `vault` commands so
// its passphrase is resolved on demand.

use std::sync::Arc;

use serde_json::{json, Value};
use zeroize::Zeroizing;

use crate::audit::{mask_value, AuditEventType, AuditLog, AuditQuery, AuditResult};
use crate::cipher;
use crate::config::{PassphraseConfig, PassphraseMode, WardenConfig};
use crate::environment::{
    generate_security_report, get_security_requirements, validate, EnvSnapshot,
};
use crate::error::WardenError;
use crate::keychain::{CommandRunner, KeychainAdapter, SecurityCli};
use crate::kv::{KeyValueStore, SqliteStore};
use crate::vault::{PassphraseSource, SecureStore};

use super::{AuditCommand, Cli, Commands, EnvCommand, KeychainCommand, VaultCommand};

/// Shared handles for one CLI invocation.
struct Context {
    config: WardenConfig,
    kv: Arc<dyn KeyValueStore>,
    audit: Arc<AuditLog>,
}

impl Context {
    fn open(config: WardenConfig) -> Result<Self, WardenError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.db_path())?);
        let audit = Arc::new(AuditLog::new(kv.clone(), config.audit.clone()));
        Ok(Self { config, kv, audit })
    }

    fn keychain(&self) -> KeychainAdapter<SecurityCli> {
        let passphrase = &self.config.passphrase;
        KeychainAdapter::with_runner(
            SecurityCli::with_program(self.config.keychain.security_command.clone()),
            self.config.keychain.namespace.clone(),
        )
        .protect(passphrase.service.clone(), passphrase.account.clone())
        .with_audit(self.audit.clone())
    }

    async fn vault(&self) -> Result<SecureStore, WardenError> {
        let source = resolve_passphrase(&self.config.passphrase, &self.keychain()).await?;
        Ok(SecureStore::new(
            self.kv.clone(),
            self.audit.clone(),
            self.config.namespace.clone(),
            source,
        ))
    }
}

/// Master passphrase for the encrypted store. In keychain mode the
/// passphrase is created and saved on first use.
pub(crate) async fn resolve_passphrase<R: CommandRunner>(
    config: &PassphraseConfig,
    keychain: &KeychainAdapter<R>,
) -> Result<PassphraseSource, WardenError> {
    match config.mode {
        PassphraseMode::Ephemeral => Ok(PassphraseSource::Ephemeral),
        PassphraseMode::Keychain => match keychain.retrieve(&config.service, &config.account).await {
            Ok(passphrase) => Ok(PassphraseSource::Supplied(passphrase)),
            Err(e) if e.is_not_found() => {
                let passphrase =
                    Zeroizing::new(cipher::generate_secure_password(cipher::DEFAULT_RANDOM_BYTES));
                keychain
                    .store(&config.service, &config.account, &passphrase)
                    .await?;
                tracing::info!("Created master passphrase in keychain");
                Ok(PassphraseSource::Supplied(passphrase))
            }
            Err(e) => Err(e.into()),
        },
    }
}

/// Last four characters only, unless the caller asked to see the value.
fn display_secret(secret: &str, reveal: bool) -> String {
    if reveal {
        secret.to_string()
    } else {
        match mask_value(&Value::String(secret.to_string())) {
            Value::String(masked) => masked,
            other => other.to_string(),
        }
    }
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), WardenError> {
    let config = WardenConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Env {
            action: EnvCommand::Check { json },
        } => cmd_env_check(&Context::open(config)?, json).await,
        // Presentation only; no storage or audit needed.
        Commands::Env {
            action: EnvCommand::Requirements,
        } => cmd_env_requirements(&config),
        Commands::Env {
            action: EnvCommand::Report,
        } => cmd_env_report(&config),
        Commands::Keychain { action } => cmd_keychain(&Context::open(config)?, action).await,
        Commands::Vault { action } => cmd_vault(&Context::open(config)?, action).await,
        Commands::Audit { action } => cmd_audit(&Context::open(config)?, action).await,
    }
}

// ─── Env ─────────────────────────────────────────────────────────────────────

async fn cmd_env_check(ctx: &Context, json: bool) -> Result<(), WardenError> {
    let policy = &ctx.config.validator;
    let result = validate(&EnvSnapshot::capture(policy), policy);

    ctx.audit
        .log(
            AuditEventType::EnvironmentCheck,
            if result.is_valid { AuditResult::Success } else { AuditResult::Failed },
            json!({
                "environment": result.environment.to_string(),
                "errors": result.errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
                "warnings": result.warnings.len(),
            }),
        )
        .await;

    if json {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|e| WardenError::Other(e.to_string()))?;
        println!("{}", rendered);
    } else {
        if result.is_valid {
            println!("✓ Environment is valid ({})", result.environment);
        } else {
            println!("✗ Environment is not valid ({})", result.environment);
            for e in &result.errors {
                println!("  {}", e);
            }
        }
        for w in &result.warnings {
            println!("  warning: {}", w);
        }
    }

    if !result.is_valid {
        return Err(WardenError::Other(format!(
            "{} environment check(s) failed",
            result.errors.len()
        )));
    }
    Ok(())
}

fn cmd_env_requirements(config: &WardenConfig) -> Result<(), WardenError> {
    let snapshot = EnvSnapshot::capture(&config.validator);
    for r in get_security_requirements(&snapshot, &config.validator) {
        let mark = if r.satisfied { "✓" } else { "✗" };
        println!("{} {:<28} {:?}  {}", mark, r.name, r.severity, r.description);
    }
    Ok(())
}

fn cmd_env_report(config: &WardenConfig) -> Result<(), WardenError> {
    let snapshot = EnvSnapshot::capture(&config.validator);
    print!("{}", generate_security_report(&snapshot, &config.validator));
    Ok(())
}

// ─── Keychain ────────────────────────────────────────────────────────────────

async fn cmd_keychain(ctx: &Context, action: KeychainCommand) -> Result<(), WardenError> {
    let keychain = ctx.keychain();

    match action {
        KeychainCommand::Set {
            service,
            account,
            secret,
        } => {
            let secret = Zeroizing::new(secret);
            keychain.store(&service, &account, &secret).await?;
            println!("✓ Stored {}/{} in keychain", service, account);
        }
        KeychainCommand::Get {
            service,
            account,
            reveal,
        } => {
            let secret = keychain.retrieve(&service, &account).await?;
            println!("{}", display_secret(&secret, reveal));
        }
        KeychainCommand::Delete { service, account } => {
            keychain.delete(&service, &account).await?;
            println!("✓ Deleted {}/{} from keychain", service, account);
        }
        KeychainCommand::List => {
            let entries = keychain.list_credentials().await;
            if entries.is_empty() {
                println!("No keychain entries under '{}'.", ctx.config.keychain.namespace);
                return Ok(());
            }
            println!("Keychain entries ({}):\n", entries.len());
            for entry in &entries {
                println!("  {:32} │ {}", entry.service, entry.account);
            }
        }
        KeychainCommand::Clear { yes } => {
            if !yes {
                return Err(WardenError::Other(
                    "Refusing to clear keychain entries without --yes".to_string(),
                ));
            }
            let removed = keychain.clear_all_credentials().await?;
            println!("✓ Removed {} keychain entries", removed);
        }
    }
    Ok(())
}

// ─── Vault ───────────────────────────────────────────────────────────────────

async fn cmd_vault(ctx: &Context, action: VaultCommand) -> Result<(), WardenError> {
    let vault = ctx.vault().await?;

    match action {
        VaultCommand::Store {
            service,
            account,
            secret,
        } => {
            let secret = Zeroizing::new(secret);
            vault.store(&service, &account, &secret).await?;
            println!("✓ Credential stored");
            println!("  Service: {}", service);
            println!("  Account: {}", account);
            println!("  Type:    {}", vault.registry().infer_label(&service, &account));
            if vault.registry().validate_format(&service, &account, &secret) == Some(false) {
                println!("  warning: value does not match the expected format for this type");
            }
            if ctx.config.passphrase.mode == PassphraseMode::Ephemeral {
                println!("  note: ephemeral passphrase; this value is unreadable after exit");
            }
        }
        VaultCommand::Get {
            service,
            account,
            reveal,
        } => {
            let secret = vault.retrieve(&service, &account).await?;
            println!("{}", display_secret(&secret, reveal));
        }
        VaultCommand::Delete { service, account } => {
            vault.delete(&service, &account).await?;
            println!("✓ Credential {}/{} deleted", service, account);
        }
        VaultCommand::List => {
            let summaries = vault.list().await?;
            if summaries.is_empty() {
                println!("No credentials stored yet.");
                return Ok(());
            }
            println!("Stored credentials ({}):\n", summaries.len());
            for s in &summaries {
                println!(
                    "  {:20} │ {:24} │ {:30} │ {}",
                    s.service,
                    s.account,
                    s.type_label,
                    s.last_accessed.format("%Y-%m-%d %H:%M:%S UTC"),
                );
            }
        }
        VaultCommand::Clear { yes } => {
            if !yes {
                return Err(WardenError::Other(
                    "Refusing to clear the encrypted store without --yes".to_string(),
                ));
            }
            let removed = vault.clear_all().await?;
            println!("✓ Removed {} credentials", removed);
        }
        VaultCommand::Demo => {
            let secret = cipher::generate_secure_password(cipher::DEFAULT_RANDOM_BYTES);
            vault.store("warden-demo", "roundtrip", &secret).await?;
            let read_back = vault.retrieve("warden-demo", "roundtrip").await?;
            let matches = cipher::secure_compare(&secret, &read_back);
            vault.delete("warden-demo", "roundtrip").await?;

            ctx.audit
                .log(
                    AuditEventType::SessionStart,
                    if matches { AuditResult::Success } else { AuditResult::Failed },
                    json!({ "action": "vault_demo" }),
                )
                .await;

            if !matches {
                return Err(WardenError::Other("Round trip returned a different value".to_string()));
            }
            println!("✓ Encrypt, store, retrieve and delete round trip succeeded");
        }
    }
    Ok(())
}

// ─── Audit ───────────────────────────────────────────────────────────────────

async fn cmd_audit(ctx: &Context, action: AuditCommand) -> Result<(), WardenError> {
    let audit = &ctx.audit;

    match action {
        AuditCommand::Stats => {
            let stats = audit.stats().await?;
            println!("Audit entries: {}", stats.total);
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("  Range:  {} .. {}", oldest.format("%Y-%m-%d %H:%M"), newest.format("%Y-%m-%d %H:%M"));
            }
            for (result, count) in &stats.by_result {
                println!("  {:28} {}", result.to_string(), count);
            }
            println!();
            for (event_type, count) in &stats.by_event_type {
                println!("  {:28} {}", event_type.to_string(), count);
            }
        }
        AuditCommand::Show { limit, failed } => {
            let query = AuditQuery {
                result: failed.then_some(AuditResult::Failed),
                limit,
                ..Default::default()
            };
            let entries = audit.query(&query).await?;
            if entries.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }
            println!("{:-<80}", "");
            for entry in entries {
                println!("{}", entry);
            }
            println!("{:-<80}", "");
        }
        AuditCommand::Alerts { hours } => {
            let alerts = audit.recent_alerts(hours).await?;
            if alerts.is_empty() {
                println!("✓ No failed operations in the last {} hours", hours);
                return Ok(());
            }
            println!("Failed operations in the last {} hours ({}):", hours, alerts.len());
            for entry in alerts {
                println!("  {}", entry);
            }
        }
        AuditCommand::Suspicious => {
            let report = audit.detect_suspicious_activity().await?;
            if !report.has_issues {
                println!("✓ No suspicious activity in the last hour");
                return Ok(());
            }
            println!("Suspicious activity detected:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
            println!("Recommendations:");
            for rec in &report.recommendations {
                println!("  - {}", rec);
            }
        }
        AuditCommand::Export { output } => {
            let json = audit.export_log().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("✓ Audit log exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        AuditCommand::Prune { days } => {
            let removed = audit.clear_old_entries(days).await?;
            println!("✓ Removed {} audit entries older than {} days", removed, days);
        }
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
