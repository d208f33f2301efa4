use actix_web::{middleware::Logger, web, App, HttpServer};
use care_relay_service::{
    config, error, logging, metrics::MetricsMiddleware, routes, state::AppState,
};

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = config::Config::from_env()?;

    let bind_addr = cfg.bind_addr();
    let ws_path = cfg.ws.path.clone();
    let state = AppState::new(cfg);

    tracing::info!(
        %bind_addr,
        ws_path = %ws_path,
        max_connections_per_user = ?state.config.ws.max_connections_per_user,
        internal_api_key = state.config.internal_api_key.is_some(),
        "starting care-relay-service"
    );

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(MetricsMiddleware)
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| routes::configure(cfg, &ws_path))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
