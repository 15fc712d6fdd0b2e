mod config;

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use cube4::lines::{self, Coord};
use cube4::storage::{FileStore, LearnedStore};
use cube4::{
    Actor, Board, Column, Difficulty, GameSession, GameStatus, Mode, MoveRecord, Player, PlayerMapping,
    SearchRequest, SearchResponse, SearchWorker, TimeControl, WorkerReply,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = ServerConfig::from_env()?;
    let store = LearnedStore::new(FileStore::new(&config.data_dir));
    let state = AppState::new(store, SearchWorker::new().with_grace(config.grace));
    let app = app_router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .try_init();
}

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<GameSession>>,
    worker: SearchWorker,
    store: LearnedStore,
}

impl AppState {
    fn new(store: LearnedStore, worker: SearchWorker) -> Self {
        let learned = store.load();
        Self {
            session: Arc::new(Mutex::new(GameSession::new(Mode::Ai, true, learned))),
            worker,
            store,
        }
    }

    /// Writes the learned records once a game has ended. Failures only cost
    /// the learning, so they are logged and swallowed.
    fn persist(&self, session: &GameSession) {
        if let Err(err) = self.store.save(session.learned()) {
            warn!(error = %format!("{err:#}"), "failed to save learned state");
        }
    }
}

fn app_router(state: AppState, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/move", post(handle_move))
        .route("/game", get(game_view))
        .route("/game/new", post(new_game))
        .route("/game/move", post(human_move))
        .route("/profile", get(profile))
        .route("/learning", delete(clear_learning))
        .with_state(state);
    let spa = Router::new().nest_service(
        "/",
        ServeDir::new(static_dir).append_index_html_on_directories(true),
    );
    Router::new()
        .nest("/api", api)
        .merge(spa)
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_origin(axum::http::HeaderValue::from_static("*"))
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

/// Stateless search: one position in, one move out.
async fn handle_move(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let board = Board::from_cells(&request.grid)?;
    let fallback = board.moves_by_center().first().copied();
    let response = match state.worker.search(request).await {
        WorkerReply::Reply(SearchResponse {
            error: Some(err), ..
        }) => return Err(anyhow::anyhow!(err).into()),
        WorkerReply::Reply(response) => response,
        WorkerReply::TimedOut => SearchResponse {
            mv: fallback,
            depth: 0,
            error: Some("search timed out".to_string()),
        },
        WorkerReply::Failed(reason) => SearchResponse {
            mv: fallback,
            depth: 0,
            error: Some(reason),
        },
    };
    let headers = [(header::CACHE_CONTROL, "no-store")];
    Ok((headers, Json(response)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameView {
    grid: Vec<i8>,
    heights: Vec<u8>,
    move_count: usize,
    mode: Mode,
    mapping: PlayerMapping,
    turn: Player,
    status: GameStatus,
    last_move: Option<MoveRecord>,
    winning_line: Option<[Coord; 4]>,
    remaining_ms: Option<u64>,
}

impl GameView {
    fn of(session: &GameSession) -> Self {
        let board = session.board();
        Self {
            grid: board.to_wire(),
            heights: board.heights().to_vec(),
            move_count: board.moves_played(),
            mode: session.mode(),
            mapping: session.mapping(),
            turn: session.turn(),
            status: session.status(),
            last_move: board.history().last().copied(),
            winning_line: board.check_win_all().map(|winner| winner.line.map(lines::coords)),
            remaining_ms: session
                .remaining_turn_time()
                .filter(|_| !session.is_over())
                .map(|left| left.as_millis() as u64),
        }
    }
}

async fn game_view(State(state): State<AppState>) -> Json<GameView> {
    let session = state.session.lock().await;
    Json(GameView::of(&session))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewGame {
    mode: Mode,
    #[serde(default = "default_true")]
    human_first: bool,
    difficulty: Option<Difficulty>,
    time_control: Option<TimeControl>,
    random_intensity: Option<f64>,
    learning: Option<bool>,
}

async fn new_game(
    State(state): State<AppState>,
    Json(settings): Json<NewGame>,
) -> Result<Json<GameView>, ApiError> {
    let mut session = state.session.lock().await;
    session.reset(settings.mode, settings.human_first);
    if let Some(difficulty) = settings.difficulty {
        session.set_difficulty(difficulty);
    }
    if let Some(intensity) = settings.random_intensity {
        session.set_random_intensity(intensity);
    }
    if let Some(enabled) = settings.learning {
        session.set_learning(enabled);
    }
    session.set_time_control(settings.time_control.unwrap_or_default());

    if session.actor_for(session.turn()) == Actor::Computer {
        session.play_computer_turn(&state.worker).await?;
    }
    Ok(Json(GameView::of(&session)))
}

#[derive(Debug, Deserialize)]
struct HumanMove {
    x: usize,
    y: usize,
}

async fn human_move(
    State(state): State<AppState>,
    Json(mv): Json<HumanMove>,
) -> Result<Json<GameView>, ApiError> {
    let mut session = state.session.lock().await;
    if session.expire_turn()? {
        state.persist(&session);
        return Ok(Json(GameView::of(&session)));
    }

    let player = session.turn();
    session.apply_move(Column::new(mv.x, mv.y), player, Actor::Human)?;
    if !session.is_over() && session.actor_for(session.turn()) == Actor::Computer {
        session.play_computer_turn(&state.worker).await?;
    }
    if session.is_over() {
        state.persist(&session);
    }
    Ok(Json(GameView::of(&session)))
}

async fn profile(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.lock().await;
    Json(session.profile_summary())
}

async fn clear_learning(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let mut session = state.session.lock().await;
    session.clear_learning();
    state.store.clear()?;
    Ok(StatusCode::NO_CONTENT)
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
        let status = StatusCode::BAD_REQUEST;
        let body = format!("{}", self.0);
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use cube4::storage::MemoryStore;
    use cube4::LearnedState;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn test_app() -> (Router, LearnedStore) {
        test_app_with(LearnedStore::new(MemoryStore::new()))
    }

    fn test_app_with(store: LearnedStore) -> (Router, LearnedStore) {
        let state = AppState::new(store.clone(), SearchWorker::new());
        (app_router(state, Path::new("web/dist")), store)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn http_move_endpoint() {
        let (app, _) = test_app();
        let mut grid = vec![0i8; cube4::CELLS];
        grid[12] = 1;
        let body = json!({ "grid": grid, "player": -1, "timeLimitMs": 100, "maxDepth": 2 });
        let (status, bytes) = send(&app, Method::POST, "/api/move", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let response: SearchResponse = serde_json::from_slice(&bytes).unwrap();
        let mv = response.mv.unwrap();
        assert!(mv.in_bounds());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn malformed_grid_is_a_bad_request() {
        let (app, _) = test_app();
        let body = json!({ "grid": vec![0; 124], "player": 1 });
        let (status, bytes) = send(&app, Method::POST, "/api/move", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(bytes).unwrap().contains("125"));
    }

    #[tokio::test]
    async fn human_move_gets_a_computer_reply() {
        let (app, _) = test_app();
        let settings = json!({ "mode": "ai", "humanFirst": true, "difficulty": "easy" });
        let (status, _) = send(&app, Method::POST, "/api/game/new", Some(settings)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, bytes) = send(&app, Method::POST, "/api/game/move", Some(json!({ "x": 0, "y": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        let view: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["moveCount"], 2);
        assert_eq!(view["turn"], 1);
        assert_eq!(view["status"]["state"], "playing");
        assert_eq!(view["lastMove"]["player"], -1);
    }

    #[tokio::test]
    async fn computer_opens_when_human_goes_second() {
        let (app, _) = test_app();
        let settings = json!({ "mode": "ai", "humanFirst": false, "difficulty": "easy" });
        let (_, bytes) = send(&app, Method::POST, "/api/game/new", Some(settings)).await;
        let view: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["moveCount"], 1);
        assert_eq!(view["lastMove"]["column"], json!({ "x": 2, "y": 2 }));
        assert_eq!(view["mapping"]["human"], 1);
    }

    #[tokio::test]
    async fn illegal_human_move_is_rejected() {
        let (app, _) = test_app();
        let settings = json!({ "mode": "pvp" });
        send(&app, Method::POST, "/api/game/new", Some(settings)).await;
        let (status, bytes) = send(&app, Method::POST, "/api/game/move", Some(json!({ "x": 7, "y": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(bytes).unwrap().contains("out of bounds"));

        let (_, bytes) = send(&app, Method::GET, "/api/game", None).await;
        let view: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["moveCount"], 0);
    }

    #[tokio::test]
    async fn learning_is_loaded_and_cleared() {
        let store = LearnedStore::new(MemoryStore::new());
        let mut learned = LearnedState::default();
        learned.profile.games = 4;
        store.save(&learned).unwrap();

        let (app, store) = test_app_with(store);
        let (_, bytes) = send(&app, Method::GET, "/api/profile", None).await;
        let summary: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["games"], 4);

        let (status, _) = send(&app, Method::DELETE, "/api/learning", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, bytes) = send(&app, Method::GET, "/api/profile", None).await;
        let summary: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["games"], 0);
        assert_eq!(store.load().profile.games, 0);
    }
}
