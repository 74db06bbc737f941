pub mod anomaly;
pub mod auth;

pub use anomaly::{AnomalyNotifier, OriginChange, WebhookError, WebhookNotifier};
pub use auth::{AuthService, RotationSettings, TokenPair};
