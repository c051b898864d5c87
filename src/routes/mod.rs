use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth;
use crate::state::CloudState;

mod alerts;
mod health;
mod history;
mod ingest;
mod login;
mod predict;
mod status;

// ---

/// Assemble the full API router.
///
/// `/api/login` and `/health` are open; everything else sits behind the
/// bearer-token interceptor, composed here explicitly so no protected
/// handler can be mounted without it.
pub fn router(state: Arc<CloudState>) -> Router {
    // ---
    let protected = Router::new()
        .merge(ingest::router())
        .merge(history::router())
        .merge(alerts::router())
        .merge(predict::router())
        .merge(status::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(login::router())
        .merge(health::router())
        .merge(protected)
        .with_state(state)
}
