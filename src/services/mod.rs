//! Service layer for the watcher.
//!
//! This module contains the collaborators of the poll loop:
//! - Listing fetch and parse (`ForumClient`, `ListingParser`)
//! - Change notification (`ThreadNotifier`, `SmtpMailer`)

mod notifier;
mod threads;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Classification, ThreadRecord};

pub use notifier::{Notification, SmtpMailer, ThreadNotifier};
pub use threads::{ForumClient, ListingParser};

/// Source of the current non-sticky threads.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn fetch_threads(&self) -> Result<Vec<ThreadRecord>>;
}

/// Receiver of New/Updated classifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, thread: &ThreadRecord, classification: Classification) -> Result<()>;
}

/// Outbound email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}
