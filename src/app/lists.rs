use crate::lists::{MergeVars, SubscriptionStatus};
use crate::state;
use crate::templates;

use axum::Json;
use axum::extract::Form;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde::Serialize;

use super::auth::{ErrorResponse, current_user};

/// The lists page: one row per enabled list, resolved against the
/// cached name mapping and the viewer's live membership state. With no
/// API key configured the list section is omitted entirely.
pub(crate) async fn lists_page(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(user) = current_user(&state, &headers) else {
        return Redirect::to("/login").into_response();
    };

    let settings = state.subscriptions.snapshot();
    let configured = !settings.api_key.trim().is_empty();

    let mut rows = Vec::new();
    if configured {
        // An empty cache forces a live read here, same as the admin page.
        let names = state
            .subscriptions
            .available_lists(None, false)
            .await
            .unwrap_or_default();
        for list_id in &settings.enabled_lists {
            // A stale id missing from the cache keeps its row, with an
            // empty name.
            let name = names.get(list_id).cloned().unwrap_or_default();
            let description = settings
                .descriptions
                .get(list_id)
                .cloned()
                .unwrap_or_default();
            let subscribed = state.subscriptions.is_subscribed(&user.email, list_id).await;
            rows.push(templates::ListRow {
                id: list_id.clone(),
                name,
                description,
                subscribed,
            });
        }
    }

    templates::ListsTemplate {
        app_name: state.config.app_name,
        user_name: user.name,
        is_admin: user.admin,
        configured,
        rows,
    }
    .into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionActionForm {
    pub(crate) list_id: String,
    pub(crate) action: String,
}

#[derive(Serialize)]
pub(crate) struct SubscriptionActionResponse {
    pub(crate) status: ActionStatus,
}

/// `status` is the remote-reported string for recognized actions, and
/// the literal `false` for anything else.
#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum ActionStatus {
    Resolved(SubscriptionStatus),
    Skipped(bool),
}

pub(crate) async fn subscription_action(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Form(form): Form<SubscriptionActionForm>,
) -> Result<Json<SubscriptionActionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(user) = current_user(&state, &headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized",
            }),
        ));
    };

    let status = match form.action.as_str() {
        "subscribe" => {
            let merge = MergeVars {
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            };
            state
                .subscriptions
                .subscribe(&user.email, &form.list_id, &merge)
                .await;
            ActionStatus::Resolved(state.subscriptions.status(&user.email, &form.list_id).await)
        }
        "unsubscribe" => {
            state
                .subscriptions
                .unsubscribe(&user.email, &form.list_id)
                .await;
            ActionStatus::Resolved(state.subscriptions.status(&user.email, &form.list_id).await)
        }
        // Unknown keywords make no remote call and answer with the
        // degenerate default.
        _ => ActionStatus::Skipped(false),
    };

    Ok(Json(SubscriptionActionResponse { status }))
}
