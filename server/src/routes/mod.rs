pub mod settings;
pub mod watchlist;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::ServerState;

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        Router::new()
            .route("/", get(|| async { "betawatch server" }))
            .route(
                "/watchlist",
                get(watchlist::list)
                    .post(watchlist::add)
                    .delete(watchlist::remove),
            )
            .route("/settings/channel", put(settings::set_channel))
            .route("/settings/interval", put(settings::set_interval))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
