#![allow(dead_code)]
use std::{sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::Duration;
use keyturn_backend::{
    db::{create_pool, run_migrations},
    repositories::{InMemorySessionStore, PgSessionStore},
    services::{
        anomaly::{AnomalyNotifier, OriginChange, WebhookError},
        AuthService, RotationSettings,
    },
    utils::{Argon2SecretHasher, TokenIssuer},
};
use tokio::sync::{mpsc, Mutex};

pub const TEST_SECRET: &str = "keyturn-test-secret";

/// Captures every alert and optionally fails delivery.
pub struct RecordingNotifier {
    alerts: Mutex<Vec<OriginChange>>,
    tx: mpsc::UnboundedSender<OriginChange>,
    fail_with_status: Option<u16>,
}

impl RecordingNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OriginChange>) {
        Self::build(None)
    }

    pub fn failing(status: u16) -> (Arc<Self>, mpsc::UnboundedReceiver<OriginChange>) {
        Self::build(Some(status))
    }

    fn build(fail_with_status: Option<u16>) -> (Arc<Self>, mpsc::UnboundedReceiver<OriginChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(Self {
            alerts: Mutex::new(Vec::new()),
            tx,
            fail_with_status,
        });
        (notifier, rx)
    }

    pub async fn alerts(&self) -> Vec<OriginChange> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl AnomalyNotifier for RecordingNotifier {
    async fn notify_origin_change(&self, alert: &OriginChange) -> Result<(), WebhookError> {
        self.alerts.lock().await.push(alert.clone());
        let _ = self.tx.send(alert.clone());
        match self.fail_with_status {
            Some(status) => Err(WebhookError::HttpStatus(status)),
            None => Ok(()),
        }
    }
}

pub fn test_settings() -> RotationSettings {
    RotationSettings {
        refresh_ttl: Duration::hours(72),
        store_timeout: StdDuration::from_secs(2),
        notify_timeout: StdDuration::from_millis(500),
    }
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, Duration::minutes(15))
}

pub struct Harness {
    pub service: AuthService,
    pub store: Arc<InMemorySessionStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub alerts: mpsc::UnboundedReceiver<OriginChange>,
}

pub fn harness() -> Harness {
    harness_with(test_issuer(), test_settings(), RecordingNotifier::new())
}

pub fn harness_with(
    issuer: TokenIssuer,
    settings: RotationSettings,
    (notifier, alerts): (Arc<RecordingNotifier>, mpsc::UnboundedReceiver<OriginChange>),
) -> Harness {
    let store = Arc::new(InMemorySessionStore::new());
    let service = AuthService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(Argon2SecretHasher::new().expect("hasher")),
        issuer,
        settings,
    );
    Harness {
        service,
        store,
        notifier,
        alerts,
    }
}

/// Waits briefly for a detached notification task to report in.
pub async fn next_alert(rx: &mut mpsc::UnboundedReceiver<OriginChange>) -> Option<OriginChange> {
    tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Asserts no further notification arrives within a short window.
pub async fn assert_no_alert(rx: &mut mpsc::UnboundedReceiver<OriginChange>) {
    let extra = tokio::time::timeout(StdDuration::from_millis(150), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra alert: {extra:?}");
}

/// Connects to `TEST_DATABASE_URL` and applies migrations. Returns `None`
/// when the variable is unset so database tests skip cleanly.
pub async fn pg_store() -> Option<PgSessionStore> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        }
    };
    let pool = create_pool(&url, StdDuration::from_secs(5))
        .await
        .expect("connect test database");
    run_migrations(&pool).await.expect("apply migrations");
    Some(PgSessionStore::new(pool))
}
