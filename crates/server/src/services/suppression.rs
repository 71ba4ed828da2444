//! Suppression handler for delivery-provider feedback.
//!
//! Consumes batches of webhook events (bounces, spam complaints) and forces
//! the affected contacts' subscriptions into `bounced`. Events for distinct
//! recipients are independent and processed concurrently; events for the
//! same recipient are applied in arrival order so a later complaint is never
//! overwritten by an earlier, slower bounce. Each event runs in its own
//! transaction: one failing event never aborts the rest of the batch.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::task::JoinSet;

use listkeeper_core::{ContactAddress, Email, SuppressionKind};

use super::subscriptions::SubscriptionService;
use crate::db::ContactRepository;

/// One delivery-feedback event as posted by the provider webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Event name (`bounce`, `spamreport`, `complaint`, ...).
    pub event: String,
    /// Recipient address the event is about.
    pub email: String,
    /// Provider bounce classification (`blocked`, `bounce`, ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// SMTP-ish status code (`5.1.1` is a permanent failure).
    #[serde(default)]
    pub status: Option<String>,
    /// Free-text provider detail.
    #[serde(default)]
    pub reason: Option<String>,
}

impl DeliveryEvent {
    /// Provider detail worth recording alongside the suppression.
    fn detail(&self) -> Option<&str> {
        self.kind.as_deref().or(self.status.as_deref())
    }
}

/// Decide whether an event suppresses its recipient.
///
/// Only hard signals suppress: a `bounce` classified `blocked` or carrying a
/// permanent (5xx) status, or any spam complaint. Soft bounces are expected
/// to self-resolve and produce no state change.
fn classify(event: &DeliveryEvent) -> Option<SuppressionKind> {
    match event.event.as_str() {
        "bounce" => {
            let blocked = event.kind.as_deref() == Some("blocked");
            let permanent = event
                .status
                .as_deref()
                .is_some_and(|s| s.starts_with('5'));
            (blocked || permanent).then_some(SuppressionKind::HardBounce)
        }
        "spamreport" | "complaint" => Some(SuppressionKind::SpamComplaint),
        _ => None,
    }
}

/// Outcome summary for one webhook batch.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct BatchReport {
    /// Events examined.
    pub processed: usize,
    /// Events that suppressed a contact.
    pub suppressed: usize,
    /// Events that matched no contact or carried no hard signal.
    pub ignored: usize,
    /// Events that errored (logged, did not abort the batch).
    pub failed: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: Self) {
        self.processed += other.processed;
        self.suppressed += other.suppressed;
        self.ignored += other.ignored;
        self.failed += other.failed;
    }
}

/// Group events by normalized recipient, preserving arrival order within
/// each group and the first-seen order of groups. Events whose recipient is
/// not a parseable address are dropped and counted.
fn group_by_recipient(events: Vec<DeliveryEvent>) -> (Vec<(Email, Vec<DeliveryEvent>)>, usize) {
    let mut groups: Vec<(Email, Vec<DeliveryEvent>)> = Vec::new();
    let mut unparseable = 0_usize;

    for event in events {
        let Ok(email) = Email::parse(&event.email) else {
            unparseable += 1;
            continue;
        };

        match groups.iter().position(|(key, _)| *key == email) {
            Some(pos) => {
                if let Some((_, bucket)) = groups.get_mut(pos) {
                    bucket.push(event);
                }
            }
            None => groups.push((email, vec![event])),
        }
    }

    (groups, unparseable)
}

/// Service consuming delivery-provider feedback.
///
/// Owns a pool handle (rather than borrowing one) because recipients are
/// fanned out onto spawned tasks.
pub struct SuppressionService {
    pool: PgPool,
}

impl SuppressionService {
    /// Create a new suppression service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Process a batch of delivery-feedback events.
    ///
    /// Never fails: unknown recipients and soft bounces are no-ops, and
    /// per-event errors are collected into the report.
    pub async fn process_batch(&self, events: Vec<DeliveryEvent>) -> BatchReport {
        let (groups, unparseable) = group_by_recipient(events);

        let mut report = BatchReport {
            processed: unparseable,
            ignored: unparseable,
            ..BatchReport::default()
        };

        let mut tasks = JoinSet::new();
        for (email, group) in groups {
            let pool = self.pool.clone();
            tasks.spawn(async move { process_recipient(&pool, &email, group).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(partial) => report.absorb(partial),
                Err(e) => {
                    tracing::error!(error = %e, "Suppression task panicked");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            suppressed = report.suppressed,
            ignored = report.ignored,
            failed = report.failed,
            "Webhook batch processed"
        );
        report
    }
}

/// Apply one recipient's events in arrival order.
async fn process_recipient(
    pool: &PgPool,
    email: &Email,
    events: Vec<DeliveryEvent>,
) -> BatchReport {
    let mut report = BatchReport::default();
    let address = ContactAddress::Email(email.clone());

    for event in events {
        report.processed += 1;

        let Some(kind) = classify(&event) else {
            report.ignored += 1;
            continue;
        };

        let contact = match ContactRepository::new(pool).get_by_address(&address).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                // A bounce for an address we don't know is simply ignored.
                report.ignored += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(recipient = %email, error = %e, "Suppression lookup failed");
                report.failed += 1;
                continue;
            }
        };

        match SubscriptionService::new(pool)
            .suppress(contact.id, kind, event.detail())
            .await
        {
            Ok(_) => report.suppressed += 1,
            Err(e) => {
                tracing::warn!(recipient = %email, error = %e, "Suppression failed");
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(event: &str, email: &str, kind: Option<&str>, status: Option<&str>) -> DeliveryEvent {
        DeliveryEvent {
            event: event.to_owned(),
            email: email.to_owned(),
            kind: kind.map(str::to_owned),
            status: status.map(str::to_owned),
            reason: None,
        }
    }

    #[test]
    fn test_blocked_bounce_is_hard() {
        assert_eq!(
            classify(&event("bounce", "a@example.com", Some("blocked"), None)),
            Some(SuppressionKind::HardBounce)
        );
    }

    #[test]
    fn test_permanent_status_bounce_is_hard() {
        assert_eq!(
            classify(&event("bounce", "a@example.com", None, Some("5.1.1"))),
            Some(SuppressionKind::HardBounce)
        );
    }

    #[test]
    fn test_soft_bounce_is_ignored() {
        assert_eq!(
            classify(&event("bounce", "a@example.com", Some("bounce"), Some("4.2.2"))),
            None
        );
        assert_eq!(classify(&event("bounce", "a@example.com", None, None)), None);
    }

    #[test]
    fn test_spam_reports_always_suppress() {
        assert_eq!(
            classify(&event("spamreport", "a@example.com", None, None)),
            Some(SuppressionKind::SpamComplaint)
        );
        assert_eq!(
            classify(&event("complaint", "a@example.com", None, None)),
            Some(SuppressionKind::SpamComplaint)
        );
    }

    #[test]
    fn test_unrelated_events_are_ignored() {
        assert_eq!(classify(&event("delivered", "a@example.com", None, None)), None);
        assert_eq!(classify(&event("open", "a@example.com", None, None)), None);
    }

    #[test]
    fn test_grouping_preserves_per_recipient_order() {
        let events = vec![
            event("bounce", "a@example.com", Some("blocked"), None),
            event("bounce", "B@example.com", Some("blocked"), None),
            event("spamreport", "A@Example.com", None, None),
        ];

        let (groups, unparseable) = group_by_recipient(events);
        assert_eq!(unparseable, 0);
        assert_eq!(groups.len(), 2);

        // Case-normalized: both "a@example.com" events land in one group,
        // in arrival order.
        let (email, bucket) = groups.first().unwrap();
        assert_eq!(email.as_str(), "a@example.com");
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.first().unwrap().event, "bounce");
        assert_eq!(bucket.last().unwrap().event, "spamreport");
    }

    #[test]
    fn test_grouping_counts_unparseable_recipients() {
        let events = vec![
            event("bounce", "not-an-email", Some("blocked"), None),
            event("bounce", "a@example.com", Some("blocked"), None),
        ];

        let (groups, unparseable) = group_by_recipient(events);
        assert_eq!(unparseable, 1);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_event_payload_parses_provider_shape() {
        let json = r#"[
            {"event": "bounce", "email": "user@example.com", "type": "blocked",
             "status": "5.1.1", "reason": "mailbox does not exist"},
            {"event": "spamreport", "email": "other@example.com"}
        ]"#;

        let events: Vec<DeliveryEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.first().unwrap().kind.as_deref(), Some("blocked"));
        assert_eq!(events.last().unwrap().kind, None);
    }
}
