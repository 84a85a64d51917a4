//! Session-cookie web viewer: login form, dashboard, raw JSON inspection
//! and a live-tracking toggle, all backed by one authenticated client per
//! session held in an explicit in-process store.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Settings;
use crate::core::auth::Credentials;
use crate::core::client::TrackerClient;
use crate::domain::model::Tracker;

pub const SESSION_COOKIE: &str = "petwatch_session";
pub const SESSION_MAX_AGE_SECS: i64 = 1200;

pub struct Session {
    pub client: TrackerClient,
    pub email: String,
    pub user_id: Option<String>,
    pub authenticated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn expired(&self) -> bool {
        Utc::now() - self.last_activity > Duration::seconds(SESSION_MAX_AGE_SECS)
    }
}

/// Process-wide session-id -> client map. Sessions never share a client, so
/// each entry carries its own lock and the map lock is held only for
/// lookup, insert and evict.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub async fn insert(&self, session: Session) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    /// Fetch a live session, evicting it instead when past its expiry.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let entry = {
            let sessions = self.sessions.lock().await;
            sessions.get(id).cloned()
        }?;

        if entry.lock().await.expired() {
            self.evict(id).await;
            return None;
        }
        Some(entry)
    }

    pub async fn evict(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(id).is_some()
    }

    pub async fn clear(&self) {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        sessions.clear();
        if count > 0 {
            tracing::info!("Tore down {count} session client(s)");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<SessionStore>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            store: Arc::new(SessionStore::default()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard))
        .route("/data/json/:kind", get(data_json))
        .route("/toggle-live/:tracker_id", post(toggle_live))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; Max-Age={SESSION_MAX_AGE_SECS}")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0")
}

async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<Arc<Mutex<Session>>> {
    let id = session_id_from_headers(headers)?;
    state.store.get(&id).await
}

async fn root(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    if current_session(&state, &headers).await.is_some() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

#[derive(Debug, Deserialize)]
struct LoginPageParams {
    error: Option<String>,
}

async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LoginPageParams>,
) -> Response {
    if current_session(&state, &headers).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    render_login(params.error.as_deref(), "").into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let credentials = Credentials {
        email: form.email.trim().to_string(),
        password: form.password,
    };
    if credentials.email.is_empty() || credentials.password.is_empty() {
        return render_login(Some("Email and password are required"), &credentials.email)
            .into_response();
    }

    let mut client = match TrackerClient::new(&state.settings, credentials.clone()) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("Failed to build client: {err}");
            return render_login(Some("An unexpected error occurred. Please try again."), &credentials.email)
                .into_response();
        }
    };

    match client.login().await {
        Ok(()) => {
            let now = Utc::now();
            let session = Session {
                user_id: client.user_id().map(str::to_string),
                client,
                email: credentials.email.clone(),
                authenticated_at: now,
                last_activity: now,
            };
            let id = state.store.insert(session).await;
            tracing::info!("User {} logged in", credentials.email);
            (
                [(header::SET_COOKIE, session_cookie(&id))],
                Redirect::to("/dashboard"),
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!("Login failed for {}: {err}", credentials.email);
            render_login(Some(&format!("Login failed: {err}")), &credentials.email).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from_headers(&headers) {
        if state.store.evict(&id).await {
            tracing::info!("Session evicted on logout");
        }
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct DashboardParams {
    tracker_id: Option<String>,
}

async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DashboardParams>,
) -> Response {
    let Some(session) = current_session(&state, &headers).await else {
        return Redirect::to("/login").into_response();
    };
    let mut session = session.lock().await;
    session.last_activity = Utc::now();

    let trackers = match session.client.trackers().await {
        Ok(trackers) => trackers,
        Err(err) => {
            tracing::error!("Failed to get trackers: {err}");
            Vec::new()
        }
    };

    if trackers.is_empty() {
        return render_dashboard(&session.email, &[], None, &DashboardData::default(), &[
            "No trackers found for this account".to_string(),
        ])
        .into_response();
    }

    let selected = params
        .tracker_id
        .as_deref()
        .and_then(|id| trackers.iter().find(|t| t.id == id))
        .unwrap_or(&trackers[0])
        .clone();

    // Each category is fetched independently; a failure becomes a partial
    // error instead of aborting the whole render.
    let mut data = DashboardData::default();
    let mut errors = Vec::new();

    match session.client.hardware_info(&selected.id).await {
        Ok(hw) => data.hardware_info = serde_json::to_value(hw).ok(),
        Err(err) => errors.push(format!("Hardware info: {err}")),
    }
    match session.client.latest_position(&selected.id).await {
        Ok(position) => data.latest_position = serde_json::to_value(position).ok(),
        Err(err) => errors.push(format!("Latest position: {err}")),
    }
    let to_time = Utc::now();
    let from_time = to_time - Duration::hours(2);
    match session
        .client
        .position_history(
            &selected.id,
            &from_time.timestamp().to_string(),
            &to_time.timestamp().to_string(),
            Some(100),
        )
        .await
    {
        Ok(history) => data.recent_history = serde_json::to_value(history).ok(),
        Err(err) => errors.push(format!("Position history: {err}")),
    }
    match session.client.geofences(&selected.id).await {
        Ok(geofences) => data.geofences = serde_json::to_value(geofences).ok(),
        Err(err) => errors.push(format!("Geofences: {err}")),
    }
    data.live_tracking =
        serde_json::to_value(session.client.live_tracking_state(&selected.id)).ok();

    render_dashboard(&session.email, &trackers, Some(&selected), &data, &errors).into_response()
}

#[derive(Debug, Deserialize)]
struct DataParams {
    tracker_id: Option<String>,
}

async fn data_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(params): Query<DataParams>,
) -> Response {
    let Some(session) = current_session(&state, &headers).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Authentication required"})),
        )
            .into_response();
    };
    let mut session = session.lock().await;
    session.last_activity = Utc::now();

    let tracker_id = params.tracker_id.as_deref();
    let result: Result<Value, crate::utils::error::ApiError> = match (kind.as_str(), tracker_id) {
        ("trackers", _) => session
            .client
            .trackers()
            .await
            .and_then(|v| Ok(serde_json::to_value(v)?)),
        ("hw_info", Some(id)) => session
            .client
            .hardware_info(id)
            .await
            .and_then(|v| Ok(serde_json::to_value(v)?)),
        ("latest", Some(id)) => session
            .client
            .latest_position(id)
            .await
            .and_then(|v| Ok(serde_json::to_value(v)?)),
        ("history", Some(id)) => {
            let to_time = Utc::now();
            let from_time = to_time - Duration::hours(2);
            session
                .client
                .position_history(
                    id,
                    &from_time.timestamp().to_string(),
                    &to_time.timestamp().to_string(),
                    Some(100),
                )
                .await
                .and_then(|v| Ok(serde_json::to_value(v)?))
        }
        ("geofences", Some(id)) => session
            .client
            .geofences(id)
            .await
            .and_then(|v| Ok(serde_json::to_value(v)?)),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid data kind or missing tracker_id"})),
            )
                .into_response();
        }
    };

    match result {
        Ok(data) => Json(data).into_response(),
        Err(err) => {
            tracing::error!("Error fetching {kind} data: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToggleForm {
    enable: bool,
}

async fn toggle_live(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tracker_id): Path<String>,
    Form(form): Form<ToggleForm>,
) -> Response {
    let Some(session) = current_session(&state, &headers).await else {
        return Redirect::to("/login").into_response();
    };
    let mut session = session.lock().await;
    session.last_activity = Utc::now();

    if let Err(err) = session.client.set_live_tracking(&tracker_id, form.enable).await {
        tracing::error!("Error toggling live tracking: {err}");
    }
    Redirect::to(&format!("/dashboard?tracker_id={tracker_id}")).into_response()
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.store.len().await,
    }))
}

#[derive(Debug, Default)]
struct DashboardData {
    hardware_info: Option<Value>,
    latest_position: Option<Value>,
    recent_history: Option<Value>,
    geofences: Option<Value>,
    live_tracking: Option<Value>,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_login(error: Option<&str>, email: &str) -> Html<String> {
    let error_block = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>petwatch - Login</title>
<style>
body {{ font-family: sans-serif; max-width: 24rem; margin: 4rem auto; }}
.error {{ color: #b00020; }}
label {{ display: block; margin-top: 1rem; }}
input {{ width: 100%; padding: 0.4rem; }}
button {{ margin-top: 1.5rem; padding: 0.5rem 2rem; }}
</style>
</head>
<body>
<h1>petwatch</h1>
{error_block}
<form method="post" action="/login">
<label>Email <input type="email" name="email" value="{}" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
</body>
</html>"#,
        escape_html(email)
    ))
}

fn render_dashboard(
    email: &str,
    trackers: &[Tracker],
    selected: Option<&Tracker>,
    data: &DashboardData,
    errors: &[String],
) -> Html<String> {
    let error_block = if errors.is_empty() {
        String::new()
    } else {
        let items: String = errors
            .iter()
            .map(|e| format!("<li>{}</li>", escape_html(e)))
            .collect();
        format!(r#"<div class="error"><ul>{items}</ul></div>"#)
    };

    let tracker_rows: String = trackers
        .iter()
        .map(|t| {
            let marker = if selected.map(|s| s.id == t.id).unwrap_or(false) {
                " class=\"selected\""
            } else {
                ""
            };
            format!(
                "<tr{marker}><td><a href=\"/dashboard?tracker_id={id}\">{id}</a></td>\
                 <td>{name}</td><td>{pet}</td><td>{battery}%</td><td>{charging}</td></tr>",
                id = escape_html(&t.id),
                name = escape_html(&t.name),
                pet = escape_html(&t.pet_name),
                battery = t.battery_level,
                charging = if t.charging { "charging" } else { "-" },
            )
        })
        .collect();

    let detail_block = selected
        .map(|tracker| {
            let section = |title: &str, value: &Option<Value>| {
                let body = value
                    .as_ref()
                    .and_then(|v| serde_json::to_string_pretty(v).ok())
                    .unwrap_or_else(|| "unavailable".to_string());
                format!(
                    "<h3>{title}</h3><pre>{}</pre>",
                    escape_html(&body)
                )
            };
            format!(
                r#"<h2>Tracker {id}</h2>
{hw}{latest}{history}{fences}{live}
<form method="post" action="/toggle-live/{id}">
<input type="hidden" name="enable" value="true">
<button type="submit">Enable live tracking</button>
</form>
<form method="post" action="/toggle-live/{id}">
<input type="hidden" name="enable" value="false">
<button type="submit">Disable live tracking</button>
</form>"#,
                id = escape_html(&tracker.id),
                hw = section("Hardware", &data.hardware_info),
                latest = section("Latest position", &data.latest_position),
                history = section("Recent history (2h)", &data.recent_history),
                fences = section("Geofences", &data.geofences),
                live = section("Live tracking", &data.live_tracking),
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>petwatch - Dashboard</title>
<style>
body {{ font-family: sans-serif; max-width: 56rem; margin: 2rem auto; }}
.error {{ color: #b00020; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid #ccc; padding: 0.3rem 0.6rem; }}
tr.selected {{ background: #eef; }}
pre {{ background: #f6f6f6; padding: 0.6rem; overflow-x: auto; }}
</style>
</head>
<body>
<p>Signed in as {email} <form method="post" action="/logout" style="display:inline"><button type="submit">Log out</button></form></p>
{error_block}
<h2>Trackers</h2>
<table><tr><th>ID</th><th>Name</th><th>Pet</th><th>Battery</th><th>Charging</th></tr>{tracker_rows}</table>
{detail_block}
</body>
</html>"#,
        email = escape_html(email),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_parsed_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "other=1; petwatch_session=abc-123; theme=dark".parse().unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark".parse().unwrap());
        assert_eq!(session_id_from_headers(&headers), None);
    }

    #[test]
    fn cookie_attributes_cover_expiry_and_httponly() {
        let cookie = session_cookie("abc");
        assert!(cookie.contains("petwatch_session=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1200"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn html_escaping_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>"a&b"</script>"#),
            "&lt;script&gt;&quot;a&amp;b&quot;&lt;/script&gt;"
        );
    }

    fn idle_session(last_activity: DateTime<Utc>) -> Session {
        let settings = Settings {
            base_url: "http://127.0.0.1:1".to_string(),
            max_retries: 0,
            base_backoff_ms: 1,
            email: None,
            password: None,
        };
        let credentials = Credentials {
            email: "pet@example.com".into(),
            password: "hunter2".into(),
        };
        Session {
            client: TrackerClient::new(&settings, credentials).unwrap(),
            email: "pet@example.com".into(),
            user_id: Some("7".into()),
            authenticated_at: last_activity,
            last_activity,
        }
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_lookup() {
        let store = SessionStore::default();
        let id = store
            .insert(idle_session(
                Utc::now() - Duration::seconds(SESSION_MAX_AGE_SECS + 1),
            ))
            .await;
        assert_eq!(store.len().await, 1);

        assert!(store.get(&id).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn fresh_session_survives_lookup() {
        let store = SessionStore::default();
        let id = store.insert(idle_session(Utc::now())).await;

        assert!(store.get(&id).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn login_page_preserves_email_and_escapes_error() {
        let Html(page) = render_login(Some("Login failed: <boom>"), "pet@example.com");
        assert!(page.contains("pet@example.com"));
        assert!(page.contains("Login failed: &lt;boom&gt;"));
        assert!(!page.contains("<boom>"));
    }
}
