use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use connect4::{GameConfig, GameEvent, GameSnapshot};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod session;

use session::{AiTicket, AiToMove, AppState, NewGame, Session, SessionNotFound};

/// HTTP front end that hosts Connect 4 games and plays the AI side.
#[derive(Debug, Parser)]
#[command(name = "connect4-server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
    /// Pause before the AI's column is applied.
    #[arg(long, default_value_t = 500)]
    ai_delay_ms: u64,
    /// Default board rows for new games.
    #[arg(long, default_value_t = 6)]
    rows: usize,
    /// Default board columns for new games.
    #[arg(long, default_value_t = 7)]
    columns: usize,
    /// Start new games in two-player mode.
    #[arg(long)]
    no_ai: bool,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info,tower_http=debug")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let defaults = GameConfig {
        rows: cli.rows,
        columns: cli.columns,
        vs_ai: !cli.no_ai,
        seed: None,
    };
    defaults.validate()?;
    let state = Arc::new(AppState::new(
        defaults,
        Duration::from_millis(cli.ai_delay_ms),
    ));
    let app = app_router(state);

    let listener = TcpListener::bind(&cli.addr).await?;
    info!("Listening on http://{}", cli.addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/games", post(create_game))
        .route("/games/:id", get(get_game).delete(delete_game))
        .route("/games/:id/move", post(play_move))
        .route("/games/:id/reset", post(reset_game))
        .route("/games/:id/resize", post(resize_game))
        .route("/games/:id/ai", post(set_ai_mode))
        .with_state(state);
    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_origin(HeaderValue::from_static("*"))
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

#[derive(Debug, Serialize)]
struct Created {
    id: u64,
    state: GameSnapshot,
}

#[derive(Debug, Serialize)]
struct MoveReply {
    events: Vec<GameEvent>,
    state: GameSnapshot,
}

#[derive(Debug, Deserialize)]
struct MoveBody {
    column: usize,
}

#[derive(Debug, Deserialize)]
struct ResizeBody {
    rows: usize,
    columns: usize,
}

#[derive(Debug, Deserialize)]
struct AiBody {
    enabled: bool,
}

async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewGame>,
) -> Result<impl IntoResponse, ApiError> {
    let config = body.into_config(&state.defaults);
    let session = Session::new(&config)?;
    let snapshot = session.engine().snapshot();
    let id = state.insert(session);
    info!(
        id,
        rows = config.rows,
        columns = config.columns,
        vs_ai = config.vs_ai,
        "game created"
    );
    Ok((StatusCode::CREATED, NO_STORE, Json(Created { id, state: snapshot })))
}

async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot =
        state.with_session(id, |session| Ok::<_, ApiError>(session.engine().snapshot()))?;
    Ok((NO_STORE, Json(snapshot)))
}

async fn delete_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.remove(id)?;
    info!(id, "game deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn play_move(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<MoveBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (mut events, ticket) = state.with_session(id, |session| {
        let events = session.play(body.column)?;
        let ticket = session.ticket(&events);
        Ok::<_, ApiError>((events, ticket))
    })?;
    relay_ai_move(&state, id, ticket, &mut events).await?;
    reply(&state, id, events)
}

async fn reset_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.with_session(id, |session| {
        let events = session.update(|engine| {
            engine.reset();
            Ok(())
        })?;
        Ok::<_, ApiError>(events)
    })?;
    reply(&state, id, events)
}

async fn resize_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<ResizeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.with_session(id, |session| {
        let events = session.update(|engine| engine.resize(body.rows, body.columns))?;
        Ok::<_, ApiError>(events)
    })?;
    reply(&state, id, events)
}

/// Toggles AI mode; switching it on while player 2 is to move lets the AI
/// take that turn right away.
async fn set_ai_mode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<AiBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (mut events, ticket) = state.with_session(id, |session| {
        let events = session.update(|engine| {
            engine.set_ai_mode(body.enabled);
            engine.request_ai_move();
            Ok(())
        })?;
        let ticket = session.ticket(&events);
        Ok::<_, ApiError>((events, ticket))
    })?;
    relay_ai_move(&state, id, ticket, &mut events).await?;
    reply(&state, id, events)
}

/// Plays the columns the engine asks for, after the configured delay, through
/// the same move path a player uses. A ticket is dropped when the game was
/// reset, resized, toggled or moved in the meantime.
async fn relay_ai_move(
    state: &AppState,
    id: u64,
    mut pending: Option<AiTicket>,
    events: &mut Vec<GameEvent>,
) -> Result<(), ApiError> {
    while let Some(ticket) = pending {
        tokio::time::sleep(state.ai_delay).await;
        pending = state.with_session(id, |session| {
            match session.apply_ai(ticket) {
                Ok(Some(more)) => {
                    let next = session.ticket(&more);
                    events.extend(more);
                    Ok::<_, ApiError>(next)
                }
                Ok(None) => {
                    debug!(id, column = ticket.column, "stale ai move skipped");
                    Ok(None)
                }
                Err(err) => {
                    warn!(id, column = ticket.column, %err, "ai move rejected");
                    Ok(None)
                }
            }
        })?;
    }
    Ok(())
}

fn reply(state: &AppState, id: u64, events: Vec<GameEvent>) -> Result<Response, ApiError> {
    let snapshot =
        state.with_session(id, |session| Ok::<_, ApiError>(session.engine().snapshot()))?;
    Ok((
        NO_STORE,
        Json(MoveReply {
            events,
            state: snapshot,
        }),
    )
        .into_response())
}

#[derive(Debug)]
struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is::<SessionNotFound>() {
            StatusCode::NOT_FOUND
        } else if self.0.is::<AiToMove>() {
            StatusCode::CONFLICT
        } else {
            StatusCode::BAD_REQUEST
        };
        let body = format!("{}", self.0);
        (status, body).into_response()
    }
}
