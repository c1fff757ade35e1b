use std::net::SocketAddr;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use clap::{ArgAction, Parser};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const PROXY_PREFIX: &str = "/api/proxy";

#[derive(Parser, Debug)]
#[command(
    name = "utter-relay",
    version,
    about = "Same-origin forwarding relay for inference calls"
)]
struct RelayCli {
    /// Address to listen on
    #[arg(long, env = "UTTER_RELAY_ADDR", default_value = "127.0.0.1:8787")]
    addr: SocketAddr,

    /// Upstream inference API base URL
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    upstream: String,

    /// Credential injected into every forwarded request
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone)]
struct RelayState {
    http: reqwest::Client,
    upstream: String,
    api_key: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> anyhow::Result<()> {
    let cli = RelayCli::parse();
    init_tracing(cli.verbose);

    let state = RelayState {
        http: reqwest::Client::new(),
        upstream: cli.upstream.trim_end_matches('/').to_string(),
        api_key: cli.api_key,
    };

    let app = Router::new().fallback(forward).with_state(state);

    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, upstream = %cli.upstream, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("relay shutting down");
        })
        .await?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tracing::instrument(skip(state, headers, body), fields(method = %method, uri = %uri))]
async fn forward(
    State(state): State<RelayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(target) = target_url(&state.upstream, &uri) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    if method == Method::OPTIONS {
        return preflight_response();
    }

    let upstream_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return (StatusCode::METHOD_NOT_ALLOWED, "unsupported method").into_response(),
    };

    let mut request = state
        .http
        .request(upstream_method, &target)
        .body(body.to_vec());

    for (name, value) in headers.iter() {
        if !should_forward_header(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }
    request = request.bearer_auth(&state.api_key);

    debug!(target = %target, "forwarding request");
    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!(error = %err, "upstream unreachable");
            return (StatusCode::BAD_GATEWAY, format!("proxy error: {err}")).into_response();
        }
    };

    let status = upstream.status().as_u16();
    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, value) in upstream.headers().iter() {
        if should_return_header(name.as_str()) {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
    }
    for (name, value) in cors_headers() {
        builder = builder.header(name, value);
    }

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed reading upstream body");
            return (StatusCode::BAD_GATEWAY, format!("proxy error: {err}")).into_response();
        }
    };

    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn preflight_response() -> Response {
    let mut builder = Response::builder().status(StatusCode::NO_CONTENT);
    for (name, value) in cors_headers() {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn cors_headers() -> [(&'static str, &'static str); 3] {
    [
        ("access-control-allow-origin", "*"),
        ("access-control-allow-methods", "GET, POST, OPTIONS"),
        ("access-control-allow-headers", "*"),
    ]
}

/// Maps a relay path onto the upstream, or nothing when the request is
/// outside the proxy prefix.
fn target_url(upstream: &str, uri: &Uri) -> Option<String> {
    let path = uri.path();
    let rest = path.strip_prefix(PROXY_PREFIX)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        // e.g. /api/proxyfoo is not under the prefix
        return None;
    }
    let rest = if rest.is_empty() { "/" } else { rest };
    let query = uri
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    Some(format!("{upstream}{rest}{query}"))
}

/// Origin-identifying and connection-level headers never cross the relay;
/// the credential header is replaced, not forwarded.
fn should_forward_header(name: &str) -> bool {
    !matches!(
        name.to_ascii_lowercase().as_str(),
        "origin"
            | "referer"
            | "host"
            | "authorization"
            | "content-length"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn should_return_header(name: &str) -> bool {
    !matches!(
        name.to_ascii_lowercase().as_str(),
        "content-length" | "transfer-encoding" | "connection"
    ) && !name.to_ascii_lowercase().starts_with("access-control-")
}
