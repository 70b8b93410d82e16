//! In-process stand-in for the Wakatime API, used by the tests.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Router};
use url::Url;

pub const ALL_TIME: &str = r#"{
  "data": {
    "is_up_to_date": true,
    "text": "3 hrs 25 mins",
    "total_seconds": 12345.0
  }
}"#;

pub const GOALS: &str = r#"{
  "data": [
    {
      "id": "5e0b1f3c",
      "title": "Code 1 hr per day",
      "type": "coding",
      "delta": "day",
      "is_enabled": true,
      "ignore_zero_days": false,
      "is_inverse": false,
      "is_snoozed": false,
      "is_tweeting": true,
      "seconds": 3600,
      "chart_data": [
        {
          "goal_seconds": 100,
          "actual_seconds": 50.0,
          "range": {"date": "2020-05-01", "start": "2020-05-01T00:00:00Z", "end": "2020-05-01T23:59:59Z", "text": "Fri May 1st 2020"}
        },
        {
          "goal_seconds": 200,
          "actual_seconds": 150.0,
          "range": {"date": "2020-05-02", "start": "2020-05-02T00:00:00Z", "end": "2020-05-02T23:59:59Z", "text": "Sat May 2nd 2020"}
        }
      ]
    }
  ],
  "total": 1,
  "total_pages": 1
}"#;

pub const LEADERS: &str = r#"{
  "current_user": {
    "rank": 42,
    "running_total": {"total_seconds": 98765.4, "daily_average": 14109}
  },
  "data": [],
  "page": 1,
  "total_pages": 1,
  "modified_at": "2020-05-02T10:00:00Z"
}"#;

pub const SUMMARIES: &str = r#"{
  "data": [
    {
      "grand_total": {"total_seconds": 5400.5, "text": "1 hr 30 mins"},
      "languages": [
        {"name": "Rust", "total_seconds": 3600.0},
        {"name": "Go", "total_seconds": 1800.5}
      ],
      "operating_systems": [{"name": "Linux", "total_seconds": 5400.5}],
      "machines": [{"name": "laptop", "machine_name_id": "m-1", "total_seconds": 5400.5}],
      "editors": [{"name": "Neovim", "total_seconds": 5400.5}],
      "projects": [{"name": "exporter", "total_seconds": 5400.5}],
      "categories": [{"name": "Coding", "total_seconds": 5400.5}],
      "range": {"date": "2020-05-02", "start": "2020-05-02T00:00:00Z", "end": "2020-05-02T23:59:59Z", "text": "Today", "timezone": "UTC"}
    }
  ],
  "start": "2020-05-02T00:00:00Z",
  "end": "2020-05-02T23:59:59Z"
}"#;

type Routes = Arc<Mutex<HashMap<String, (StatusCode, String)>>>;

pub struct Upstream {
    addr: SocketAddr,
    routes: Routes,
}

impl Upstream {
    /// Starts the stub with a healthy response for every collector endpoint.
    pub async fn start() -> Self {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let app = Router::new()
            .fallback(handle)
            .layer(Extension(routes.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);

        let upstream = Upstream { addr, routes };
        upstream.set("users/current/all_time_since_today", StatusCode::OK, ALL_TIME);
        upstream.set("users/current/goals", StatusCode::OK, GOALS);
        upstream.set("leaders", StatusCode::OK, LEADERS);
        upstream.set("users/current/summaries", StatusCode::OK, SUMMARIES);
        upstream
    }

    pub fn set(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_owned(), (status, body.to_owned()));
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/v1", self.addr)).unwrap()
    }
}

async fn handle(Extension(routes): Extension<Routes>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().trim_start_matches("/api/v1/");
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if path == "echo-auth" {
        return auth.unwrap_or_default().into_response();
    }
    if path == "slow" {
        tokio::time::sleep(Duration::from_secs(2)).await;
        return StatusCode::OK.into_response();
    }
    if let Some(code) = path.strip_prefix("status/") {
        let code = code.parse::<u16>().unwrap_or(500);
        return StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    if auth.is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let canned = routes.lock().unwrap().get(path).cloned();
    match canned {
        Some((status, body)) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
