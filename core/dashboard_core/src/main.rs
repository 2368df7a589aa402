use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use dashboard_core::{
    gantt::LaneKey,
    insights::Timeframe,
    refresh::{run_refresh, RefreshMode, RefreshSettings},
    zone::parse_date,
    Categorizer, Dashboard, DashboardSettings, DateWindow, Snapshot, SnapshotPaths,
};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use time::{format_description::well_known::Rfc3339, UtcOffset};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 17610;
const DEFAULT_SUMMARY_LIMIT: usize = 10;
const MAX_WINDOW_DAYS: u32 = 366;

#[derive(Parser, Debug)]
#[command(name = "dashboard_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17610
    /// - ip (implies port 17610), e.g. 127.0.0.1
    /// - localhost:port
    #[arg(long, default_value = "127.0.0.1:17610")]
    listen: String,

    /// Directory holding activityLogs.json and calendarEvents.json.
    #[arg(long, env = "DASHBOARD_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Activity-log snapshot (overrides --data-dir).
    #[arg(long)]
    activity_logs: Option<PathBuf>,

    /// Calendar-event snapshot (overrides --data-dir).
    #[arg(long)]
    calendar_events: Option<PathBuf>,

    /// JSON object of extra `"identifier": "Category"` entries.
    #[arg(long, env = "DASHBOARD_CATEGORIES")]
    categories: Option<PathBuf>,

    /// Default display zone as minutes east of UTC (requests may override).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    tz_offset_minutes: i32,

    /// Hour at which the Gantt chart's day starts.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..24))]
    day_start_hour: u8,

    /// Calendar whose event summaries hold the weekly goal count.
    #[arg(long, default_value = "Goals")]
    goals_calendar: String,

    /// Calendar holding the "Wake up" events.
    #[arg(long, env = "WAKE_CALENDAR", default_value = "Wake")]
    wake_calendar: String,

    /// Calendars shown in the task distribution, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "Fitness,Projects,Learning")]
    task_calendars: Vec<String>,

    #[arg(long, env = "CUSTOM_API_URL")]
    custom_api_url: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, env = "GITHUB_OWNER")]
    github_owner: Option<String>,

    #[arg(long, env = "GITHUB_REPO")]
    github_repo: Option<String>,

    #[arg(long, env = "GITHUB_WORKFLOW_ID")]
    github_workflow_id: Option<String>,

    /// Branch the workflow dispatch runs on.
    #[arg(long, default_value = "main")]
    github_ref: String,
}

#[derive(Clone)]
struct AppState {
    snapshot: Arc<Mutex<Arc<Snapshot>>>,
    dashboard: Arc<Dashboard>,
    paths: Arc<SnapshotPaths>,
    refresh: Arc<RefreshSettings>,
    http: reqwest::Client,
}

impl AppState {
    async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.lock().await.clone()
    }
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

fn ok_json<T: Serialize>(data: T) -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(data),
    })
    .into_response()
}

fn err_json(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

#[derive(Deserialize)]
struct WindowQuery {
    /// Signed so that a negative value reaches `resolve_window` instead of
    /// failing extraction.
    days: Option<i64>,
    /// Single local day, `YYYY-MM-DD`; wins over `days`.
    date: Option<String>,
    limit: Option<usize>,
    tz_offset_minutes: Option<i32>,
    day_start_hour: Option<i64>,
    group: Option<String>,
}

#[derive(Deserialize)]
struct ZoneQuery {
    tz_offset_minutes: Option<i32>,
}

#[derive(Deserialize)]
struct TimeframeQuery {
    timeframe: Option<String>,
    tz_offset_minutes: Option<i32>,
}

fn resolve_window(q: &WindowQuery) -> Result<DateWindow, Response> {
    if let Some(date) = q.date.as_deref() {
        return parse_date(date)
            .map(DateWindow::Day)
            .ok_or_else(|| err_json(StatusCode::BAD_REQUEST, "invalid_date"));
    }
    match u32::try_from(q.days.unwrap_or(1)) {
        Ok(d) if (1..=MAX_WINDOW_DAYS).contains(&d) => Ok(DateWindow::from_days(d)),
        _ => Err(err_json(StatusCode::BAD_REQUEST, "invalid_window")),
    }
}

fn resolve_day_start_hour(q: &WindowQuery) -> Result<Option<u8>, Response> {
    match q.day_start_hour {
        None => Ok(None),
        Some(h) => u8::try_from(h)
            .ok()
            .filter(|h| *h <= 23)
            .map(Some)
            .ok_or_else(|| err_json(StatusCode::BAD_REQUEST, "invalid_day_start_hour")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let categorizer = match &args.categories {
        Some(path) => Categorizer::from_file(path)?,
        None => Categorizer::default(),
    };
    let settings = DashboardSettings {
        tz_offset_minutes: args.tz_offset_minutes,
        day_start_hour: args.day_start_hour,
        goals_calendar: args.goals_calendar.clone(),
        wake_calendar: args.wake_calendar.clone(),
        task_calendars: args.task_calendars.clone(),
    };

    let mut paths = SnapshotPaths::in_dir(&args.data_dir);
    if let Some(p) = &args.activity_logs {
        paths.activity_logs = p.clone();
    }
    if let Some(p) = &args.calendar_events {
        paths.calendar_events = p.clone();
    }
    let snapshot = Snapshot::load(&paths)?;

    let refresh = RefreshSettings {
        custom_api_url: args.custom_api_url.clone(),
        github_token: args.github_token.clone(),
        github_owner: args.github_owner.clone(),
        github_repo: args.github_repo.clone(),
        github_workflow_id: args.github_workflow_id.clone(),
        github_ref: args.github_ref.clone(),
    };

    let state = AppState {
        snapshot: Arc::new(Mutex::new(Arc::new(snapshot))),
        dashboard: Arc::new(Dashboard::new(categorizer, settings)),
        paths: Arc::new(paths),
        refresh: Arc::new(refresh),
        http: reqwest::Client::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health))
        .route("/activity/summary", get(get_activity_summary))
        .route("/activity/categories", get(get_activity_categories))
        .route("/activity/gantt", get(get_activity_gantt))
        .route("/activity/gantt/lanes", get(get_activity_gantt_lanes))
        .route("/consistency/daily", get(get_consistency_daily))
        .route("/consistency/compound", get(get_consistency_compound))
        .route("/consistency/perfect_days", get(get_perfect_days))
        .route("/stats/weekly", get(get_weekly_stats))
        .route("/commitments/missed", get(get_missed_commitments))
        .route("/actions", get(get_action_items))
        .route("/tasks/distribution", get(get_task_distribution))
        .route("/wake_up/pattern", get(get_wake_up_pattern))
        .route("/wake_up/average", get(get_wake_up_average))
        .route("/trends", get(get_trends))
        .route("/goals/weekly", get(get_weekly_goals))
        .route("/snapshot/reload", post(post_snapshot_reload).options(options_ok))
        .route("/refresh", post(post_refresh).options(options_ok))
        .route("/refresh/custom", post(post_refresh_custom).options(options_ok))
        .route("/refresh/github", post(post_refresh_github).options(options_ok))
        .with_state(state.clone())
        .layer(cors);

    let addr = parse_listen(&args.listen)?;
    info!("Dashboard listening on http://{addr}");
    info!(
        "Snapshots: {} | {}",
        state.paths.activity_logs.display(),
        state.paths.calendar_events.display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        let ip = if host == "localhost" {
            Some(IpAddr::from([127, 0, 0, 1]))
        } else {
            // IPv6 without brackets: ::1:17610
            host.parse::<IpAddr>().ok()
        };
        if let Some(ip) = ip {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(ip, port));
        }
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
    activity_logs: usize,
    calendar_events: usize,
    loaded_at: String,
}

async fn health(State(state): State<AppState>) -> Response {
    let snap = state.snapshot().await;
    let counts = snap.counts();
    ok_json(HealthInfo {
        service: "dashboard_core",
        version: env!("CARGO_PKG_VERSION"),
        activity_logs: counts.activity_logs,
        calendar_events: counts.calendar_events,
        loaded_at: snap.loaded_at.format(&Rfc3339).unwrap_or_default(),
    })
}

async fn get_activity_summary(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    let window = match resolve_window(&q) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let zone = state.dashboard.zone(q.tz_offset_minutes);
    let snap = state.snapshot().await;
    let mut rows = state
        .dashboard
        .usage_summary(&snap, window, state.dashboard.today(zone));
    rows.truncate(q.limit.unwrap_or(DEFAULT_SUMMARY_LIMIT).clamp(1, 500));
    ok_json(rows)
}

async fn get_activity_categories(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    let window = match resolve_window(&q) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let zone = state.dashboard.zone(q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.categories(&snap, window, state.dashboard.today(zone)))
}

async fn get_activity_gantt(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    let window = match resolve_window(&q) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let day_start_hour = match resolve_day_start_hour(&q) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let zone = state.dashboard.zone(q.tz_offset_minutes);
    let snap = state.snapshot().await;
    let view = state.dashboard.gantt(
        &snap,
        window,
        state.dashboard.today(zone),
        zone,
        day_start_hour,
    );
    ok_json(view)
}

async fn get_activity_gantt_lanes(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    let window = match resolve_window(&q) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let key = match q.group.as_deref().unwrap_or("category") {
        "category" => LaneKey::Category,
        "app" => LaneKey::App,
        _ => return err_json(StatusCode::BAD_REQUEST, "invalid_group"),
    };
    let zone = state.dashboard.zone(q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(
        state
            .dashboard
            .gantt_lanes(&snap, window, state.dashboard.today(zone), zone, key),
    )
}

async fn get_consistency_daily(State(state): State<AppState>) -> Response {
    let snap = state.snapshot().await;
    ok_json(state.dashboard.daily_consistency(&snap))
}

async fn get_consistency_compound(State(state): State<AppState>) -> Response {
    let snap = state.snapshot().await;
    ok_json(state.dashboard.compounded_consistency(&snap))
}

fn zone_and_today(state: &AppState, tz_offset_minutes: Option<i32>) -> (UtcOffset, time::Date) {
    let zone = state.dashboard.zone(tz_offset_minutes);
    (zone, state.dashboard.today(zone))
}

async fn get_perfect_days(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (_, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.perfect_days(&snap, today))
}

async fn get_weekly_stats(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (_, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.weekly_stats(&snap, today))
}

async fn get_missed_commitments(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (zone, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.missed_commitments(&snap, today, zone))
}

async fn get_action_items(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (zone, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.action_items(&snap, today, zone))
}

async fn get_task_distribution(State(state): State<AppState>, Query(q): Query<TimeframeQuery>) -> Response {
    let timeframe = match q.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => match Timeframe::parse(raw) {
            Some(t) => t,
            None => return err_json(StatusCode::BAD_REQUEST, "invalid_timeframe"),
        },
    };
    let (_, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.task_distribution(&snap, timeframe, today))
}

async fn get_wake_up_pattern(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (zone, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.wake_up_pattern(&snap, today, zone))
}

async fn get_wake_up_average(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let zone = state.dashboard.zone(q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.wake_up_average(&snap, zone))
}

async fn get_trends(State(state): State<AppState>, Query(q): Query<ZoneQuery>) -> Response {
    let (_, today) = zone_and_today(&state, q.tz_offset_minutes);
    let snap = state.snapshot().await;
    ok_json(state.dashboard.trends(&snap, today))
}

async fn get_weekly_goals(State(state): State<AppState>) -> Response {
    let snap = state.snapshot().await;
    ok_json(state.dashboard.weekly_goals(&snap))
}

async fn post_snapshot_reload(State(state): State<AppState>) -> Response {
    let paths = state.paths.clone();
    let loaded = tokio::task::spawn_blocking(move || Snapshot::load(&paths)).await;
    match loaded {
        Ok(Ok(snapshot)) => {
            let counts = snapshot.counts();
            *state.snapshot.lock().await = Arc::new(snapshot);
            ok_json(counts)
        }
        Ok(Err(err)) => {
            error!("snapshot reload failed: {err}");
            err_json(StatusCode::INTERNAL_SERVER_ERROR, "snapshot_error")
        }
        Err(err) => {
            error!("snapshot reload task failed: {err}");
            err_json(StatusCode::INTERNAL_SERVER_ERROR, "snapshot_error")
        }
    }
}

async fn refresh_response(state: &AppState, mode: RefreshMode) -> Response {
    let outcome = run_refresh(&state.http, &state.refresh, mode).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome)).into_response()
}

async fn post_refresh(State(state): State<AppState>) -> Response {
    info!("refresh requested");
    refresh_response(&state, RefreshMode::Full).await
}

async fn post_refresh_custom(State(state): State<AppState>) -> Response {
    refresh_response(&state, RefreshMode::CustomOnly).await
}

async fn post_refresh_github(State(state): State<AppState>) -> Response {
    refresh_response(&state, RefreshMode::GitHubOnly).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_forms() {
        assert_eq!(
            parse_listen("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("0.0.0.0").unwrap().port(), DEFAULT_PORT);
        assert_eq!(
            parse_listen("localhost:8080").unwrap(),
            SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080)
        );
        assert_eq!(parse_listen("localhost").unwrap().port(), DEFAULT_PORT);
        assert!(parse_listen("localhost:notaport").is_err());
        assert!(parse_listen("example.com:80").is_err());
    }

    fn query(days: Option<i64>, date: Option<&str>) -> WindowQuery {
        WindowQuery {
            days,
            date: date.map(str::to_string),
            limit: None,
            tz_offset_minutes: None,
            day_start_hour: None,
            group: None,
        }
    }

    #[test]
    fn window_resolution() {
        assert_eq!(resolve_window(&query(None, None)).ok(), Some(DateWindow::EndingYesterday(1)));
        assert_eq!(resolve_window(&query(Some(7), None)).ok(), Some(DateWindow::Trailing(7)));
        assert_eq!(
            resolve_window(&query(Some(7), Some("2024-11-19"))).ok(),
            Some(DateWindow::Day(parse_date("2024-11-19").unwrap()))
        );

        let bad_date = resolve_window(&query(None, Some("19/11/2024"))).unwrap_err();
        assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);
        assert!(resolve_window(&query(Some(0), None)).is_err());
        assert!(resolve_window(&query(Some(10_000), None)).is_err());
    }

    #[tokio::test]
    async fn negative_days_get_the_error_envelope() {
        let resp = resolve_window(&query(Some(-1), None)).unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v, serde_json::json!({"ok": false, "error": "invalid_window"}));

        let q: WindowQuery = serde_json::from_value(serde_json::json!({"days": -1})).unwrap();
        assert_eq!(q.days, Some(-1));
        assert!(resolve_window(&q).is_err());
    }

    #[test]
    fn day_start_hour_bounds() {
        let mut q = query(None, None);
        assert_eq!(resolve_day_start_hour(&q).ok(), Some(None));
        q.day_start_hour = Some(5);
        assert_eq!(resolve_day_start_hour(&q).ok(), Some(Some(5)));
        q.day_start_hour = Some(24);
        assert!(resolve_day_start_hour(&q).is_err());
        q.day_start_hour = Some(-1);
        assert!(resolve_day_start_hour(&q).is_err());
    }
}
