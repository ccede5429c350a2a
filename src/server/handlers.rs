use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use tracing::{error, warn};

use super::state::{SharedNowPlaying, ServerState};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn index(State(state): State<ServerState>) -> Html<String> {
    Html(state.page.to_string())
}

/// Always 200; failures are reported as `{"error": ..}`.
pub async fn now_playing(State(service): State<SharedNowPlaying>) -> impl IntoResponse {
    Json(service.poll().await)
}

fn auth_page(status: StatusCode, message: &str) -> Response {
    (
        status,
        Html(format!(
            "<!DOCTYPE html><html><body><p>{}</p><p><a href=\"/login\">Try again</a></p></body></html>",
            message
        )),
    )
        .into_response()
}

pub async fn login(State(state): State<ServerState>) -> Response {
    let Some(auth) = state.auth else {
        return auth_page(StatusCode::NOT_FOUND, "Spotify login is not configured.");
    };

    match auth.authorize_url().await {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(err) => {
            error!(error = %err, "Cannot build Spotify authorize URL");
            auth_page(StatusCode::INTERNAL_SERVER_ERROR, "Could not start the Spotify login.")
        }
    }
}

pub async fn callback(
    State(state): State<ServerState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(auth) = state.auth else {
        return auth_page(StatusCode::NOT_FOUND, "Spotify login is not configured.");
    };

    if let Some(reason) = params.error {
        warn!(reason = %reason, "Spotify login refused");
        return auth_page(StatusCode::BAD_REQUEST, "Spotify did not grant access.");
    }

    let (Some(code), Some(login_state)) = (params.code, params.state) else {
        return auth_page(StatusCode::BAD_REQUEST, "The callback is missing its code or state.");
    };

    match auth.complete_login(&code, &login_state).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => {
            warn!(error = %err, "Spotify login failed");
            auth_page(StatusCode::BAD_REQUEST, "Spotify login failed, please try again.")
        }
    }
}
