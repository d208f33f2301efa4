// Re-export route modules
pub mod notify;
pub mod wsroute;

use crate::metrics;
use actix_web::web;

/// Mount every relay route. The upgrade path is configurable.
pub fn configure(cfg: &mut web::ServiceConfig, ws_path: &str) {
    cfg.route(ws_path, web::get().to(wsroute::ws_handler))
        .service(
            web::scope("/internal/v1/relay")
                .route("/users/{user_id}", web::post().to(notify::push_to_user))
                .route("/roles/{role}", web::post().to(notify::push_to_role))
                .route("/broadcast", web::post().to(notify::push_to_all)),
        )
        .route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}
