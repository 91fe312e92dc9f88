pub mod auth;
pub mod config;
pub mod lists;
pub mod settings;
pub mod subscriptions;
pub mod users;

mod app;
mod assets;
mod state;
mod templates;

use std::net::SocketAddr;

pub async fn serve(addr: SocketAddr, config: config::AppConfig) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app::app(config))
        .await
        .expect("server error");
}
