use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info};

use crate::config::Config;
use crate::responder::{CallbackQuery, GatewayResponse, Responder};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_XML: &str = "application/xml; charset=utf-8";

/// `GET` answers the echo handshake, `POST` carries pushes.
pub fn build_router(responder: Arc<Responder>, callback_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(callback_path, get(callback_handshake).post(callback_push))
        .with_state(responder)
}

pub async fn start_server(config: &Config, responder: Arc<Responder>) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let router = build_router(responder, &config.callback_path);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind callback server at {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!(
        "Callback endpoint listening at http://{addr}{}",
        config.callback_path
    );
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn callback_handshake(
    State(responder): State<Arc<Responder>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    into_http(responder.handshake(&query), TEXT_PLAIN)
}

async fn callback_push(
    State(responder): State<Arc<Responder>>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    let Ok(body) = std::str::from_utf8(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    into_http(responder.push(&query, body), APPLICATION_XML)
}

fn into_http(response: GatewayResponse, content_type: &'static str) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if response.body.is_empty() {
        return status.into_response();
    }
    (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}
