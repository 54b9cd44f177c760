//! Background jobs.
//!
//! Outbound email rides the job queue; a send failure is never allowed to
//! fail the request that triggered it.

mod email_job;

pub use email_job::{email_job_handler, EmailJob};

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;

/// Facade the services enqueue email through.
///
/// When the job storage is unavailable (tests, missing database) the mailer
/// degrades to logging the message, mirroring the handler's behavior when
/// SMTP is not configured.
#[derive(Clone, Default)]
pub struct Mailer {
    storage: Option<PostgresStorage<EmailJob>>,
}

impl Mailer {
    pub fn new(storage: PostgresStorage<EmailJob>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// A mailer that only logs. Used in tests and degraded startup.
    pub fn disabled() -> Self {
        Self { storage: None }
    }

    /// Enqueue an email. Failures are logged and swallowed: verification and
    /// invite flows must not fail because the mail queue is down.
    pub async fn send(&self, job: EmailJob) {
        match &self.storage {
            Some(storage) => {
                let mut storage = storage.clone();
                if let Err(e) = storage.push(job.clone()).await {
                    tracing::error!(to = %job.to, subject = %job.subject, error = %e,
                        "Failed to enqueue email job");
                }
            }
            None => {
                tracing::info!(to = %job.to, subject = %job.subject,
                    "Mail queue disabled - email not enqueued");
            }
        }
    }
}
