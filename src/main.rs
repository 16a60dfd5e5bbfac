mod event;
mod party;
mod room;
mod round;
mod shared;
mod store;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event::EventBus;
use shared::AppState;
use store::{memory::InMemoryStore, SystemClock};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buzzrs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting buzzer quiz game server");

    // In-memory stores stand in for the durable key-value backend; any
    // implementation of AtomicStore can be swapped in here.
    let rooms: Arc<InMemoryStore<room::models::Room>> = Arc::new(InMemoryStore::new());
    let rounds: Arc<InMemoryStore<round::models::CurrentRound>> = Arc::new(InMemoryStore::new());
    let party_store: Arc<InMemoryStore<party::models::PartyGame>> = Arc::new(InMemoryStore::new());
    let app_state = AppState::new(
        rooms,
        rounds,
        party_store,
        Arc::new(SystemClock),
        EventBus::new(),
    );

    let app = Router::new()
        .route("/", get(|| async { "buzzrs game server" }))
        // Rooms
        .route("/rooms", post(room::handlers::create_room))
        .route("/rooms/:code", get(room::handlers::get_room))
        .route("/rooms/:code/join", post(room::handlers::join_room))
        .route("/rooms/:code/leave", post(room::handlers::leave_room))
        .route(
            "/rooms/:code/leaderboard",
            get(room::handlers::leaderboard),
        )
        // Rounds
        .route(
            "/rooms/:code/round",
            post(round::handlers::start_round)
                .get(round::handlers::round_view)
                .delete(round::handlers::reset_round),
        )
        .route("/rooms/:code/round/bids", post(round::handlers::submit_bid))
        .route(
            "/rooms/:code/round/finish",
            post(round::handlers::finish_round),
        )
        .route(
            "/rooms/:code/round/expire",
            post(round::handlers::finish_if_expired),
        )
        .route(
            "/rooms/:code/round/eligibility",
            get(round::handlers::check_bid),
        )
        // Party mode
        .route("/party", get(party::handlers::snapshot))
        .route("/party/players", post(party::handlers::add_player))
        .route(
            "/party/players/:id",
            axum::routing::delete(party::handlers::remove_player),
        )
        .route("/party/players/:id/press", post(party::handlers::press))
        .route(
            "/party/players/:id/reset",
            post(party::handlers::reset_player_points),
        )
        .route(
            "/party/players/:id/victories/:index",
            axum::routing::delete(party::handlers::delete_victory),
        )
        .route("/party/session", post(party::handlers::start_session))
        .route(
            "/party/session/stop",
            post(party::handlers::stop_session),
        )
        .route(
            "/party/session/expire",
            post(party::handlers::finish_if_expired),
        )
        .route("/party/max-points", put(party::handlers::set_max_points))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("failed to bind port 3000");
    info!("Server running on http://localhost:3000");
    axum::serve(listener, app).await.expect("server error");
}
