use crate::assets;
use crate::auth as auth_service;
use crate::config;
use crate::settings::{Settings, SettingsStore};
use crate::state;
use crate::subscriptions::Subscriptions;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use tower_http::trace::TraceLayer;
use tracing::error;

mod admin;
mod auth;
mod lists;

pub(crate) fn app(config: config::AppConfig) -> Router {
    let auth = auth_service::AuthState::from_config(&config)
        .unwrap_or_else(|err| panic!("invalid auth configuration: {err}"));
    let store = SettingsStore::new(config.settings_path.clone());
    let settings = match store.load() {
        Ok(settings) => settings,
        Err(err) => {
            error!("failed to load settings, starting from defaults: {err}");
            Settings::default()
        }
    };
    let subscriptions = Subscriptions::new(config.service_url.clone(), settings, store);
    let state = state::AppState {
        config,
        auth,
        subscriptions,
    };
    Router::new()
        .route("/", get(lists::lists_page))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        .route("/admin", get(admin::settings_page).post(admin::settings_save))
        .route("/api/admin/lists", post(admin::fetch_lists))
        .route("/api/subscriptions", post(lists::subscription_action))
        .route("/static/style.css", get(assets::stylesheet))
        .route("/static/subscribe.js", get(assets::subscribe_script))
        .route("/static/admin.js", get(assets::admin_script))
        .route("/health", get(health))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
