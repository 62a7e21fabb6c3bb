//! Failure alerting for unattended backups.

use tracing::error;

/// Receives a message when an unattended job fails
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, subject: &str, details: &str);
}

/// Reports failures as `error` level log events
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, subject: &str, details: &str) {
        error!(alert = true, subject, details, "Backup job failed");
    }
}
