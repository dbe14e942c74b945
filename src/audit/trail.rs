// Warden — Audit Log
//
// The log is one JSON array stored under a single key. Every append is a
// read-modify-write of the whole array: insert, sort newest-first, cap at
// `max_entries`, drop anything past the retention window, persist.
//
// Appends are serialized through an async mutex. Only intra-process
// interleaving is guarded; two processes sharing one backing store can
// still lose a write (last writer wins).
//
// `log()` never returns an error. A failed audit write is reported on the
// tracing channel and otherwise ignored so it cannot fail the operation
// being audited.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::models::{
    AuditEntry, AuditEventType, AuditQuery, AuditResult, AuditStats, SuspiciousActivityReport,
    AUDIT_SCHEMA_VERSION,
};
use super::policy::AuditPolicy;
use super::redact::redact;
use super::AuditError;
use crate::kv::KeyValueStore;

/// Window inspected by `detect_suspicious_activity`.
const SUSPICIOUS_WINDOW_HOURS: i64 = 1;

/// `now` minus `amount` units. Negative or unrepresentable windows are errors.
fn window_start(
    now: DateTime<Utc>,
    amount: i64,
    unit: &str,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<DateTime<Utc>, AuditError> {
    if amount < 0 {
        return Err(AuditError::InvalidWindow(format!("{} {} is negative", amount, unit)));
    }
    to_duration(amount)
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| AuditError::InvalidWindow(format!("{} {} is out of range", amount, unit)))
}

pub struct AuditLog {
    kv: Arc<dyn KeyValueStore>,
    policy: AuditPolicy,
    clock: Arc<dyn Clock>,
    session_id: String,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(kv: Arc<dyn KeyValueStore>, policy: AuditPolicy) -> Self {
        Self::with_clock(kv, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KeyValueStore>, policy: AuditPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            policy,
            clock,
            session_id: Uuid::new_v4().to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Identifier stamped on every entry written by this instance.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    // ─── Persistence ─────────────────────────────────────────────────────────

    async fn load(&self) -> Result<Vec<AuditEntry>, AuditError> {
        match self.kv.get(&self.policy.storage_key).await? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    /// Like `load`, but an unreadable blob is copied to
    /// `<storage_key>.corrupt-<millis>` and a fresh log started, rather than
    /// blocking every future append. The caller must hold `write_lock`.
    async fn load_for_write(&self) -> Result<Vec<AuditEntry>, AuditError> {
        match self.load().await {
            Err(AuditError::Corrupt(e)) => {
                let backup_key = format!(
                    "{}.corrupt-{}",
                    self.policy.storage_key,
                    self.clock.now().timestamp_millis()
                );
                if let Some(blob) = self.kv.get(&self.policy.storage_key).await? {
                    self.kv.set(&backup_key, &blob).await?;
                }
                tracing::warn!(
                    error = %e,
                    backup_key = %backup_key,
                    "Audit log unreadable; preserved a copy and starting a fresh log"
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn persist(&self, entries: &[AuditEntry]) -> Result<(), AuditError> {
        let blob = serde_json::to_string(entries)?;
        self.kv.set(&self.policy.storage_key, &blob).await?;
        Ok(())
    }

    fn enforce_retention(
        &self,
        entries: &mut Vec<AuditEntry>,
        now: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        let cutoff = window_start(now, self.policy.retention_days, "days", Duration::try_days)?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(self.policy.max_entries);
        entries.retain(|e| e.timestamp >= cutoff);
        Ok(())
    }

    // ─── Writing ─────────────────────────────────────────────────────────────

    /// Record an event. `data` should be a JSON object; any other value is
    /// stored under a `value` field. Sensitive keys are masked first.
    pub async fn log(&self, event_type: AuditEventType, result: AuditResult, data: Value) {
        if let Err(e) = self.append(event_type, result, data).await {
            tracing::warn!(
                event_type = %event_type,
                error = %e,
                "Failed to write audit log entry"
            );
        }
    }

    async fn append(
        &self,
        event_type: AuditEventType,
        result: AuditResult,
        data: Value,
    ) -> Result<(), AuditError> {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let now = self.clock.now();
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            event_type,
            result,
            data: redact(data),
            session_id: self.session_id.clone(),
            schema_version: AUDIT_SCHEMA_VERSION,
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;
        // newest at the front so ties on timestamp keep the latest first
        entries.insert(0, entry);
        self.enforce_retention(&mut entries, now)?;
        self.persist(&entries).await?;

        tracing::debug!(event_type = %event_type, result = %result, "Audit log entry recorded");
        Ok(())
    }

    // ─── Reading ─────────────────────────────────────────────────────────────

    /// Filter, sort newest-first, truncate to `query.limit`.
    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, AuditError> {
        let mut entries: Vec<AuditEntry> = self
            .load()
            .await?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(query.limit);
        Ok(entries)
    }

    pub async fn stats(&self) -> Result<AuditStats, AuditError> {
        let entries = self.load().await?;

        let mut by_result = BTreeMap::new();
        let mut by_event_type = BTreeMap::new();
        for entry in &entries {
            *by_result.entry(entry.result).or_insert(0) += 1;
            *by_event_type.entry(entry.event_type).or_insert(0) += 1;
        }

        Ok(AuditStats {
            total: entries.len(),
            by_result,
            by_event_type,
            oldest: entries.iter().map(|e| e.timestamp).min(),
            newest: entries.iter().map(|e| e.timestamp).max(),
        })
    }

    /// Failed entries from the last `hours` hours.
    pub async fn recent_alerts(&self, hours: i64) -> Result<Vec<AuditEntry>, AuditError> {
        let after = window_start(self.clock.now(), hours, "hours", Duration::try_hours)?;
        let query = AuditQuery {
            result: Some(AuditResult::Failed),
            after: Some(after),
            ..Default::default()
        };
        self.query(&query).await
    }

    pub async fn detect_suspicious_activity(&self) -> Result<SuspiciousActivityReport, AuditError> {
        let since = window_start(
            self.clock.now(),
            SUSPICIOUS_WINDOW_HOURS,
            "hours",
            Duration::try_hours,
        )?;
        let recent: Vec<AuditEntry> = self
            .load()
            .await?
            .into_iter()
            .filter(|e| e.timestamp > since)
            .collect();

        let failed = recent.iter().filter(|e| e.result == AuditResult::Failed).count();
        let retrievals = recent
            .iter()
            .filter(|e| e.event_type == AuditEventType::CredentialRetrieve)
            .count();
        let unauthorized = recent
            .iter()
            .filter(|e| e.event_type == AuditEventType::UnauthorizedAccess)
            .count();

        let mut report = SuspiciousActivityReport::default();

        if failed > self.policy.failure_alert_threshold() {
            report
                .issues
                .push(format!("High number of failed operations: {} in the last hour", failed));
            report.recommendations.push(
                "Review failed credential operations and verify the environment configuration"
                    .to_string(),
            );
        }

        if retrievals > self.policy.retrieval_alert_threshold {
            report.issues.push(format!(
                "Unusually high credential retrieval volume: {} in the last hour",
                retrievals
            ));
            report.recommendations.push(
                "Check for automated processes reading credentials more often than expected"
                    .to_string(),
            );
        }

        if unauthorized > 0 {
            report
                .issues
                .push(format!("Unauthorized access attempts detected: {}", unauthorized));
            report.recommendations.push(
                "Investigate the unauthorized access attempts and rotate affected credentials"
                    .to_string(),
            );
        }

        report.has_issues = !report.issues.is_empty();
        if report.has_issues {
            tracing::warn!(issues = report.issues.len(), "Suspicious credential activity detected");
        }
        Ok(report)
    }

    /// Pretty JSON dump of the stored log. Entries were redacted on write.
    pub async fn export_log(&self) -> Result<String, AuditError> {
        let entries = self.load().await?;
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Drop entries older than `older_than_days` and record the prune as a
    /// `CONFIG_CHANGED` event. Returns the number of entries removed.
    pub async fn clear_old_entries(&self, older_than_days: i64) -> Result<usize, AuditError> {
        let cutoff = window_start(self.clock.now(), older_than_days, "days", Duration::try_days)?;
        let removed = {
            let _guard = self.write_lock.lock().await;
            let mut entries = self.load_for_write().await?;
            let before = entries.len();
            entries.retain(|e| e.timestamp >= cutoff);
            let removed = before - entries.len();
            self.persist(&entries).await?;
            removed
        };

        tracing::info!(removed, older_than_days, "Pruned audit log");
        self.log(
            AuditEventType::ConfigChanged,
            AuditResult::Success,
            serde_json::json!({
                "action": "clear_old_entries",
                "removed": removed,
                "olderThanDays": older_than_days,
            }),
        )
        .await;

        Ok(removed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
