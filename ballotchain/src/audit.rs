use crate::*;
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    VoteCast,
    CodesGenerated,
}

/// A record handed to the audit log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub action: AuditAction,
    pub election_id: String,
    pub class_id: Option<String>,
    pub detail: String,

    /// Hash of whatever identifies the caller (IP address, session)
    pub actor_hash: Option<String>,
    pub timestamp: u64,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, election_id: &str, detail: String, timestamp: u64) -> Self {
        AuditLogEntry {
            action,
            election_id: election_id.to_owned(),
            class_id: None,
            detail,
            actor_hash: None,
            timestamp,
        }
    }

    pub fn class(mut self, class_id: &str) -> Self {
        self.class_id = Some(class_id.to_owned());
        self
    }

    /// Attach a caller identifier; only its hash is kept
    pub fn actor(mut self, identifier: &str) -> Self {
        self.actor_hash = Some(hash_identifier(identifier));
        self
    }
}

/// Where audit entries go.
///
/// Writes are best-effort: a failing audit log never blocks or rolls back a vote.
pub trait AuditLog {
    fn record(&self, entry: AuditLogEntry) -> Result<()>;
}

/// Audit log that keeps entries in memory
#[derive(Default, Debug)]
pub struct MemAuditLog {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemAuditLog {
    pub fn entries(&self) -> Result<Vec<AuditLogEntry>> {
        Ok(self.entries.lock()?.clone())
    }
}

impl AuditLog for MemAuditLog {
    fn record(&self, entry: AuditLogEntry) -> Result<()> {
        self.entries.lock()?.push(entry);
        Ok(())
    }
}

/// Audit log that writes entries to the `log` facade
#[derive(Default, Debug, Clone, Copy)]
pub struct LogAuditLog;

impl AuditLog for LogAuditLog {
    fn record(&self, entry: AuditLogEntry) -> Result<()> {
        info!(target: "ballotchain::audit", "{}", serde_json::to_string(&entry)?);
        Ok(())
    }
}
