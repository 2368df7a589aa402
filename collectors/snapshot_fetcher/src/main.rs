use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};

const ACTIVITY_LOGS_TABLE: &str = "activity_logs";
const CALENDAR_EVENTS_TABLE: &str = "calendar_events";

#[derive(Parser, Debug)]
#[command(name = "snapshot_fetcher", version)]
struct Args {
    /// Project URL of the hosted store, e.g. https://xyz.supabase.co
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    /// Service-role key; sent as `apikey` and bearer token.
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    supabase_key: String,

    /// Where activityLogs.json and calendarEvents.json are written.
    #[arg(long, default_value = "./data")]
    out_dir: PathBuf,

    /// Only calendar events dated on or after this day (YYYY-MM-DD).
    #[arg(long)]
    since: Option<String>,

    /// Calendar names to leave out. Repeatable.
    #[arg(long)]
    exclude_calendar: Vec<String>,

    /// Event summaries to leave out. Repeatable.
    #[arg(long)]
    exclude_summary: Vec<String>,

    /// Fetch activity logs. Disable via `--activity-logs=false`.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    activity_logs: bool,

    /// Fetch calendar events. Disable via `--calendar-events=false`.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    calendar_events: bool,

    /// Per-request timeout (seconds).
    #[arg(long, default_value_t = 60)]
    timeout_seconds: u64,
}

/// PostgREST query parameters for one table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct TableQuery {
    table: &'static str,
    params: Vec<(String, String)>,
}

fn activity_logs_query() -> TableQuery {
    TableQuery {
        table: ACTIVITY_LOGS_TABLE,
        params: vec![
            ("select".into(), "*".into()),
            ("order".into(), "date.desc".into()),
        ],
    }
}

fn calendar_events_query(
    since: Option<NaiveDate>,
    exclude_calendar: &[String],
    exclude_summary: &[String],
) -> TableQuery {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(d) = since {
        params.push(("date".into(), format!("gte.{}", d.format("%Y-%m-%d"))));
    }
    for c in exclude_calendar {
        params.push(("calendar_name".into(), format!("neq.{c}")));
    }
    for s in exclude_summary {
        params.push(("summary".into(), format!("neq.{s}")));
    }
    TableQuery {
        table: CALENDAR_EVENTS_TABLE,
        params,
    }
}

fn table_url(base: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base.trim_end_matches('/'))
}

fn output_file(table: &str) -> &'static str {
    match table {
        ACTIVITY_LOGS_TABLE => "activityLogs.json",
        _ => "calendarEvents.json",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapshot_fetcher=info".into()),
        )
        .init();

    let args = Args::parse();

    let since = match &args.since {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("invalid --since '{raw}': {e}"))?,
        ),
        None => None,
    };

    let mut queries = Vec::new();
    if args.activity_logs {
        queries.push(activity_logs_query());
    }
    if args.calendar_events {
        queries.push(calendar_events_query(
            since,
            &args.exclude_calendar,
            &args.exclude_summary,
        ));
    }
    if queries.is_empty() {
        warn!("nothing to fetch: both tables disabled");
        return Ok(());
    }

    tokio::fs::create_dir_all(&args.out_dir).await?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(args.timeout_seconds))
        .build()?;

    let started = Utc::now();
    info!(
        "fetching {} table(s) from {} at {}",
        queries.len(),
        args.supabase_url,
        started.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    for q in &queries {
        let rows = fetch_rows(&client, &args.supabase_url, &args.supabase_key, q).await?;
        let path = args.out_dir.join(output_file(q.table));
        write_pretty(&path, &rows).await?;
        info!("{}: {} rows -> {}", q.table, rows.len(), path.display());
    }

    let took = Utc::now() - started;
    info!("done in {} ms", took.num_milliseconds());
    Ok(())
}

async fn fetch_rows(
    client: &reqwest::Client,
    base_url: &str,
    key: &str,
    q: &TableQuery,
) -> anyhow::Result<Vec<Value>> {
    let res = client
        .get(table_url(base_url, q.table))
        .header("apikey", key)
        .bearer_auth(key)
        .query(&q.params)
        .send()
        .await?;
    if !res.status().is_success() {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("{}: http_{status} {body}", q.table);
    }
    let rows: Vec<Value> = res.json().await?;
    Ok(rows)
}

/// Writes next to the target and renames, so a reader never sees half a file.
async fn write_pretty(path: &Path, rows: &[Value]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
