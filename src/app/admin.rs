use crate::state;
use crate::templates;
use crate::users::User;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;

use std::collections::BTreeMap;

use super::auth::{ErrorResponse, current_user};

fn require_admin(
    state: &state::AppState,
    headers: &HeaderMap,
) -> Result<User, (StatusCode, &'static str)> {
    let user = current_user(state, headers).ok_or((StatusCode::UNAUTHORIZED, "unauthorized"))?;
    if !user.admin {
        return Err((StatusCode::FORBIDDEN, "access denied"));
    }
    Ok(user)
}

fn require_admin_json(
    state: &state::AppState,
    headers: &HeaderMap,
) -> Result<User, (StatusCode, Json<ErrorResponse>)> {
    require_admin(state, headers).map_err(|(status, error)| (status, Json(ErrorResponse { error })))
}

/// The settings page always reflects live remote state: the list cache
/// is refreshed on every render.
pub(crate) async fn settings_page(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Result<templates::AdminTemplate, (StatusCode, &'static str)> {
    require_admin(&state, &headers)?;

    let lists = state
        .subscriptions
        .available_lists(None, true)
        .await
        .unwrap_or_default();
    let settings = state.subscriptions.snapshot();
    let form_token = state.auth.issue_form_token().map_err(|err| {
        error!("failed to issue form token: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })?;

    let rows = lists
        .into_iter()
        .map(|(id, name)| {
            let enabled = settings.enabled_lists.contains(&id);
            let description = settings.descriptions.get(&id).cloned().unwrap_or_default();
            templates::AdminRow {
                id,
                name,
                enabled,
                description,
            }
        })
        .collect();

    Ok(templates::AdminTemplate {
        app_name: state.config.app_name,
        api_key: settings.api_key,
        form_token,
        rows,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveSettingsRequest {
    pub(crate) form_token: String,
    pub(crate) api_key: String,
    #[serde(default)]
    pub(crate) lists: Vec<ListSettingsEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListSettingsEntry {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) enabled: bool,
    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Serialize)]
pub(crate) struct SaveSettingsResponse {
    pub(crate) saved: bool,
}

/// Persists the submitted key, enabled IDs (in payload order) and
/// descriptions verbatim. No ownership or length checks; the
/// 50-character description limit is a client-side hint only.
pub(crate) async fn settings_save(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveSettingsRequest>,
) -> Result<Json<SaveSettingsResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin_json(&state, &headers)?;

    if state.auth.verify_form_token(&request.form_token).is_err() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "invalid form token",
            }),
        ));
    }

    let enabled_lists: Vec<String> = request
        .lists
        .iter()
        .filter(|entry| entry.enabled)
        .map(|entry| entry.id.clone())
        .collect();
    let descriptions: BTreeMap<String, String> = request
        .lists
        .into_iter()
        .map(|entry| (entry.id, entry.description))
        .collect();

    if let Err(err) = state
        .subscriptions
        .save_options(request.api_key, enabled_lists, descriptions)
    {
        error!("failed to save settings: {err}");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "failed to save settings",
            }),
        ));
    }

    Ok(Json(SaveSettingsResponse { saved: true }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct FetchListsRequest {
    pub(crate) api_key: String,
}

#[derive(Serialize)]
pub(crate) struct FetchedList {
    pub(crate) name: String,
    pub(crate) description: String,
}

/// Fetches lists for an arbitrary key. Names come from that key's
/// account; descriptions come from the currently stored mapping.
pub(crate) async fn fetch_lists(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Json(request): Json<FetchListsRequest>,
) -> Result<Json<BTreeMap<String, FetchedList>>, (StatusCode, Json<ErrorResponse>)> {
    require_admin_json(&state, &headers)?;

    let key = request.api_key.trim();
    let override_key = (!key.is_empty()).then_some(key);
    let lists = state
        .subscriptions
        .available_lists(override_key, false)
        .await
        .unwrap_or_default();
    let descriptions = state.subscriptions.snapshot().descriptions;

    let output = lists
        .into_iter()
        .map(|(id, name)| {
            let description = descriptions.get(&id).cloned().unwrap_or_default();
            (id, FetchedList { name, description })
        })
        .collect();

    Ok(Json(output))
}
