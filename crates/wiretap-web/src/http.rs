use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use rust_embed::Embed;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{DistributionSession, TailConfig};

#[derive(Embed)]
#[folder = "assets/"]
struct ViewerAssets;

#[derive(Clone)]
pub(crate) struct ViewerState {
    log_path: Arc<PathBuf>,
    tail: TailConfig,
    shutdown: CancellationToken,
}

impl ViewerState {
    pub(crate) fn new(log_path: PathBuf, tail: TailConfig, shutdown: CancellationToken) -> Self {
        Self {
            log_path: Arc::new(log_path),
            tail,
            shutdown,
        }
    }
}

/// `/messages` upgrades to a live record feed; everything else is a page asset.
pub(crate) fn router(state: ViewerState) -> Router {
    Router::new()
        .route("/messages", get(messages_ws))
        .fallback(static_handler)
        .with_state(state)
}

async fn messages_ws(ws: WebSocketUpgrade, State(state): State<ViewerState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let session = DistributionSession::new(
            state.log_path.as_ref().clone(),
            state.tail,
            state.shutdown.clone(),
        );
        // failures are logged and reported to the viewer by the session itself
        if let Ok(end) = session.run(socket).await {
            debug!(?end, "viewer session ended");
        }
    })
}

async fn static_handler(uri: Uri) -> Response {
    let path = match uri.path().trim_start_matches('/') {
        "" => "index.html",
        path => path,
    };
    match ViewerAssets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                file.data,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
