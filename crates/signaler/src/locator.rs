//! Target process lookup.
//!
//! The locator is the external channel through which the PID of the process
//! to signal becomes known. It is resolved on every dispatch and never cached.

use crate::error::SignalerError;
use nix::unistd::Pid;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable the PID is read from when no locator is configured.
pub const DEFAULT_PID_ENV: &str = "MAIN_CONTAINER_PID";

/// Where to find the PID of the process to signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetLocator {
    /// PID stored in an environment variable (`env:VAR`)
    Env(String),
    /// PID written to a file, typically on a shared volume (`file:/path`)
    File(PathBuf),
    /// Fixed PID (`pid:N` or just `N`)
    Pid(i32),
}

impl Default for TargetLocator {
    fn default() -> Self {
        TargetLocator::Env(DEFAULT_PID_ENV.to_string())
    }
}

impl TargetLocator {
    /// Look up the PID now.
    pub async fn resolve(&self) -> Result<Pid, SignalerError> {
        match self {
            TargetLocator::Env(var) => match std::env::var(var) {
                Ok(raw) => self.parse_pid(&raw),
                Err(e) => Err(self.unresolved(format!("{var}: {e}"))),
            },
            TargetLocator::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(raw) => self.parse_pid(&raw),
                Err(e) => Err(self.unresolved(format!("cannot read {}: {e}", path.display()))),
            },
            TargetLocator::Pid(pid) => self.validate(*pid),
        }
    }

    fn parse_pid(&self, raw: &str) -> Result<Pid, SignalerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(self.unresolved("PID is empty"));
        }
        let pid = trimmed
            .parse::<i32>()
            .map_err(|e| self.unresolved(format!("malformed PID {trimmed:?}: {e}")))?;
        self.validate(pid)
    }

    // 0 and negative values address process groups in kill(2).
    fn validate(&self, pid: i32) -> Result<Pid, SignalerError> {
        if pid <= 0 {
            return Err(self.unresolved(format!("PID must be positive, got {pid}")));
        }
        Ok(Pid::from_raw(pid))
    }

    fn unresolved(&self, reason: impl Into<String>) -> SignalerError {
        SignalerError::TargetUnresolved {
            locator: self.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TargetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLocator::Env(var) => write!(f, "env:{var}"),
            TargetLocator::File(path) => write!(f, "file:{}", path.display()),
            TargetLocator::Pid(pid) => write!(f, "pid:{pid}"),
        }
    }
}

impl FromStr for TargetLocator {
    type Err = SignalerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || SignalerError::InvalidLocator(s.to_string());

        if let Some(var) = s.strip_prefix("env:") {
            if var.is_empty() {
                return Err(invalid());
            }
            return Ok(TargetLocator::Env(var.to_string()));
        }
        if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(TargetLocator::File(PathBuf::from(path)));
        }

        let digits = s.strip_prefix("pid:").unwrap_or(s);
        match digits.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(TargetLocator::Pid(pid)),
            _ => Err(invalid()),
        }
    }
}
