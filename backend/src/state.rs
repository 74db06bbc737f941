use std::sync::Arc;

use axum::extract::FromRef;

use crate::{handlers::client::ClientIpPolicy, services::auth::AuthService};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub client_ip: ClientIpPolicy,
}

impl AppState {
    pub fn new(auth: AuthService, client_ip: ClientIpPolicy) -> Self {
        Self {
            auth: Arc::new(auth),
            client_ip,
        }
    }
}

impl FromRef<AppState> for ClientIpPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.client_ip
    }
}
