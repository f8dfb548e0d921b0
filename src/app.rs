use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::auth::PasswordGate;
use crate::config::Config;
use crate::error::StoreError;
use crate::export::{archive_file_name, export_archive};
use crate::item::ItemEdit;
use crate::session::{ListView, SessionState};
use crate::store::GearStore;

const SESSION_COOKIE: &str = "session";
const MAX_BODY_BYTES: usize = 1024 * 1024;
const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// A browser session and the time it lapses unless used again.
struct SessionEntry {
    state: SessionState,
    expires_at: SystemTime,
}

impl SessionEntry {
    fn new(now: SystemTime) -> Self {
        SessionEntry {
            state: SessionState::new(),
            expires_at: now + SESSION_DURATION,
        }
    }

    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at > now
    }
}

/// Shared server state: the data directory, the password gate and every
/// browser session keyed by its cookie.
pub struct AppState {
    store: GearStore,
    gate: PasswordGate,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: GearStore, gate: PasswordGate) -> SharedState {
        Arc::new(AppState {
            store,
            gate,
            sessions: Mutex::new(HashMap::new()),
        })
    }
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
    message: Option<String>,
}

impl ApiResponse {
    fn ok() -> Self {
        ApiResponse {
            status: "ok".to_string(),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct SessionInfo {
    authenticated: bool,
    open: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

#[derive(Deserialize)]
struct NameForm {
    name: String,
}

#[derive(Deserialize)]
struct NotesForm {
    text: String,
}

#[derive(Deserialize)]
struct RowsForm {
    rows: Vec<ItemEdit>,
}

#[derive(Deserialize)]
struct RowForm {
    row: ItemEdit,
}

#[derive(Deserialize)]
struct ConfirmForm {
    confirm: bool,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidName(_)
            | StoreError::Category(_)
            | StoreError::RowOutOfRange { .. } => StatusCode::BAD_REQUEST,
            StoreError::Parse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Unauthorized => StatusCode::FORBIDDEN,
            StoreError::Io(_) | StoreError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

type ViewResult = Result<Json<ListView>, StoreError>;

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/session", get(session_info))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/lists", get(list_available).post(create_list))
        .route("/api/lists/:name", get(open_list))
        .route("/api/lists/:name/reload", post(reload_list))
        .route("/api/lists/:name/save", post(save_list))
        .route("/api/lists/:name/notes", put(update_notes))
        .route("/api/lists/:name/export", get(export_list))
        .route("/api/lists/:name/categories", post(add_category))
        .route(
            "/api/lists/:name/categories/:category",
            put(replace_category).delete(request_delete),
        )
        .route(
            "/api/lists/:name/categories/:category/confirm",
            post(confirm_delete),
        )
        .route("/api/lists/:name/categories/:category/rows", post(add_row))
        .route(
            "/api/lists/:name/categories/:category/rows/:index",
            put(update_row).delete(delete_row),
        )
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_requests))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.dir)?;
    let store = GearStore::new(&config.dir);
    let lists = store.list_available()?;
    info!(
        "Serving {} gear lists from {}",
        lists.len(),
        config.dir.display()
    );

    let app = router(AppState::new(store, config.gate));

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    info!("{} {} -> {}", method, uri, response.status());
    response
}

fn prune_expired(sessions: &mut HashMap<String, SessionEntry>, now: SystemTime) {
    let before = sessions.len();
    sessions.retain(|_, entry| entry.is_live(now));
    if sessions.len() < before {
        info!("Expired {} idle sessions", before - sessions.len());
    }
}

/// Run `f` against the caller's session, creating one (and its cookie) when
/// the request carries no live session id. Each use extends the session.
fn with_session<T>(
    state: &AppState,
    jar: CookieJar,
    f: impl FnOnce(&GearStore, &PasswordGate, &mut SessionState) -> T,
) -> (CookieJar, T) {
    let now = SystemTime::now();
    let mut sessions = state.sessions.lock().unwrap_or_else(|e| e.into_inner());
    prune_expired(&mut sessions, now);

    let known = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| sessions.contains_key(id));

    let (jar, id) = match known {
        Some(id) => (jar, id),
        None => {
            let id = Uuid::new_v4().to_string();
            let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
                .path("/")
                .http_only(true);
            (jar.add(cookie), id)
        }
    };

    let entry = sessions
        .entry(id)
        .or_insert_with(|| SessionEntry::new(now));
    entry.expires_at = now + SESSION_DURATION;
    let result = f(&state.store, &state.gate, &mut entry.state);
    (jar, result)
}

/// Read the caller's session without creating one.
fn peek_session<T>(
    state: &AppState,
    jar: &CookieJar,
    f: impl FnOnce(Option<&SessionState>) -> T,
) -> T {
    let now = SystemTime::now();
    let sessions = state.sessions.lock().unwrap_or_else(|e| e.into_inner());
    let session = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| sessions.get(cookie.value()))
        .filter(|entry| entry.is_live(now))
        .map(|entry| &entry.state);
    f(session)
}

/// Run a session operation and answer with the refreshed list view.
fn with_view(
    state: &AppState,
    jar: CookieJar,
    f: impl FnOnce(&GearStore, &mut SessionState) -> Result<(), StoreError>,
) -> (CookieJar, ViewResult) {
    with_session(state, jar, |store, _, session| {
        f(store, session)?;
        current_view(session)
    })
}

fn current_view(session: &SessionState) -> ViewResult {
    session
        .view()
        .map(Json)
        .ok_or_else(|| StoreError::NotFound("no open gear list".to_string()))
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn session_info(State(state): State<SharedState>, jar: CookieJar) -> Json<SessionInfo> {
    let info = peek_session(&state, &jar, |session| SessionInfo {
        authenticated: session.is_some_and(|s| s.authenticated),
        open: session
            .and_then(|s| s.open.as_ref())
            .map(|open| open.name.clone()),
    });
    Json(info)
}

async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Response {
    let (jar, accepted) = with_session(&state, jar, |_, gate, session| {
        session.login(gate, &form.password)
    });

    if accepted {
        info!("Session unlocked for editing");
        (jar, Json(ApiResponse::ok())).into_response()
    } else {
        warn!("Rejected password attempt");
        (
            StatusCode::UNAUTHORIZED,
            jar,
            Json(ApiResponse::error("Invalid password")),
        )
            .into_response()
    }
}

async fn logout(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, _) = with_session(&state, jar, |_, _, session| session.logout());
    (jar, Json(ApiResponse::ok()))
}

async fn list_available(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, StoreError> {
    Ok(Json(state.store.list_available()?))
}

async fn create_list(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<NameForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.create_list(store, &form.name)?;
        Ok(())
    })
}

async fn open_list(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.open_list(store, &name)?;
        Ok(())
    })
}

async fn reload_list(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.reload(store, &name)?;
        Ok(())
    })
}

async fn save_list(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.save(store, &name)?;
        Ok(())
    })
}

async fn update_notes(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
    Json(form): Json<NotesForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.set_notes(store, &name, &form.text)?;
        Ok(())
    })
}

async fn export_list(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    let result = export_archive(&state.store, &name)
        .and_then(|bytes| Ok((archive_file_name(&name)?, bytes)));

    match result {
        Ok((file_name, bytes)) => (
            [
                (header::CONTENT_TYPE, "application/gzip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn add_category(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
    Json(form): Json<NameForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.add_category(store, &name, &form.name)?;
        Ok(())
    })
}

async fn replace_category(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category)): Path<(String, String)>,
    Json(form): Json<RowsForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.edit(store, &name, |open| {
            open.replace_category(&category, form.rows);
            Ok(())
        })?;
        Ok(())
    })
}

async fn request_delete(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category)): Path<(String, String)>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.request_delete(store, &name, &category)?;
        Ok(())
    })
}

async fn confirm_delete(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category)): Path<(String, String)>,
    Json(form): Json<ConfirmForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.confirm_delete(store, &name, &category, form.confirm)?;
        Ok(())
    })
}

async fn add_row(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category)): Path<(String, String)>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.edit(store, &name, |open| open.add_row(&category))?;
        Ok(())
    })
}

async fn update_row(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category, index)): Path<(String, String, usize)>,
    Json(form): Json<RowForm>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.edit(store, &name, |open| open.update_row(&category, index, form.row))?;
        Ok(())
    })
}

async fn delete_row(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path((name, category, index)): Path<(String, String, usize)>,
) -> (CookieJar, ViewResult) {
    with_view(&state, jar, |store, session| {
        session.edit(store, &name, |open| open.delete_row(&category, index))?;
        Ok(())
    })
}
