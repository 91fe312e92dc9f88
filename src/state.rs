use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::subscriptions::Subscriptions;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) auth: AuthState,
    pub(crate) subscriptions: Subscriptions,
}
