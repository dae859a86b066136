use crate::client::handle_client;
use crate::config::{Config, ConnectionLimits};
use crate::hub::HubHandle;
use crate::registry::SessionRegistry;
use actix_web::dev::Server;
use actix_web::middleware::Logger;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, web};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Shared by every HTTP worker.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub hub: HubHandle,
    pub limits: ConnectionLimits,
}

/// Binds the listener and returns the server future with the address it
/// listens on. Signal handling is left to the caller so shutdown can be
/// sequenced with the orchestration service.
pub fn build(config: &Config, state: AppState) -> io::Result<(Server, SocketAddr)> {
    let state = web::Data::new(state);
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .route("/health", web::get().to(health))
            .route("/ws", web::get().to(websocket))
    })
    .disable_signals();

    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    let server = server.bind(config.bind_address())?;
    let address = server
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no listener bound"))?;
    info!("Server listening on {}", address);
    Ok((server.run(), address))
}

async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "7hand Server",
    }))
}

async fn health(state: web::Data<AppState>) -> impl Responder {
    let lobbies = state.registry.lobbies().await;
    let players: usize = lobbies.iter().map(|lobby| lobby.players.len()).sum();
    let stats = state.hub.stats().await.unwrap_or_default();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "7hand",
        "lobbies": lobbies.len(),
        "players": players,
        "connections": stats.clients,
        "subscribedLobbies": stats.subscribers.len(),
    }))
}

async fn websocket(
    state: web::Data<AppState>,
    body: web::Payload,
    req: HttpRequest,
) -> impl Responder {
    match actix_ws::handle(&req, body) {
        Ok((response, session, stream)) => {
            actix_web::rt::spawn(handle_client(
                session,
                stream,
                state.registry.clone(),
                state.hub.clone(),
                state.limits,
            ));
            response.map_into_left_body()
        }
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            HttpResponse::BadRequest()
                .body(e.to_string())
                .map_into_right_body()
        }
    }
}
