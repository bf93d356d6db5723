//! Web server: Twilio webhook, status page, health probe and learner API

pub mod http;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::tutor::Tutor;
use crate::config::Config;
use crate::messaging::twilio::{self, TwilioCredentials};

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub tutor: Arc<Tutor>,
    pub twilio: Option<Arc<TwilioCredentials>>,
}

/// All routes, ready to serve
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(http::health_handler))
        .route("/webhook", post(http::webhook_handler))
        .route("/api/users", get(http::list_users_handler))
        .route("/api/users/{user_id}/stats", get(http::user_stats_handler))
        .route("/api/users/{user_id}/vocabulary", get(http::user_vocabulary_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server and run until Ctrl-C
pub async fn start(config: Config, tutor: Tutor) -> Result<()> {
    let twilio = twilio::initialize(&reqwest::Client::new()).await.map(Arc::new);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = ServerState {
        config: Arc::new(config),
        tutor: Arc::new(tutor),
        twilio,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("WhatsApp French Tutor Bot démarré sur le port {}", addr.port());
    info!("Webhook endpoint: http://localhost:{}/webhook", addr.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}

/// Status page
async fn index_page(State(state): State<ServerState>) -> Html<String> {
    let learners = state.tutor.vocabulary().get_all_users().await.len();
    let twilio_status = match state.twilio.as_deref() {
        Some(creds) => format!(
            "✅ Twilio connected ({})",
            creds.phone_number.as_deref().unwrap_or("no phone number")
        ),
        None => "⚠️ Twilio connector not configured - basic webhook mode".to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>WhatsApp French Tutor Bot</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{
            font-family: Arial, sans-serif;
            max-width: 800px;
            margin: 50px auto;
            padding: 20px;
            background-color: #f5f5f5;
        }}
        .container {{
            background: white;
            padding: 30px;
            border-radius: 10px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #25D366; }}
        .status {{
            padding: 10px;
            background-color: #d4edda;
            border: 1px solid #c3e6cb;
            border-radius: 5px;
            margin: 20px 0;
        }}
        .setup-steps {{
            background-color: #fff3cd;
            border: 1px solid #ffc107;
            padding: 15px;
            border-radius: 5px;
            margin: 20px 0;
        }}
        code {{
            background-color: #f4f4f4;
            padding: 2px 6px;
            border-radius: 3px;
            font-family: monospace;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>🇫🇷 WhatsApp French Tutor Bot</h1>
        <div class="status">
            <p>✅ Server is running on port {port}</p>
            <p>{twilio_status}</p>
            <p>📚 Learners tracked: {learners}</p>
        </div>

        <h2>Features</h2>
        <ul>
            <li>💬 Practice French conversation in real-time</li>
            <li>✏️ Automatic error correction with explanations</li>
            <li>📚 New vocabulary introduction</li>
            <li>📝 Vocabulary logging to <code>{store}</code></li>
        </ul>

        <div class="setup-steps">
            <h2>Setup Instructions</h2>
            <ol>
                <li>Create a Twilio account and enable the WhatsApp sandbox</li>
                <li>Configure your webhook URL to: <code>https://your-host/webhook</code></li>
                <li>Set <code>OPENAI_API_KEY</code> in your environment (or run <code>french-tutor set-key</code>)</li>
                <li>Send a message to your Twilio WhatsApp number to start practicing!</li>
            </ol>
        </div>

        <h2>API</h2>
        <ul>
            <li><code>GET /health</code> - liveness probe</li>
            <li><code>GET /api/users</code> - learners with logged vocabulary</li>
            <li><code>GET /api/users/&lt;id&gt;/stats</code> - vocabulary summary</li>
            <li><code>GET /api/users/&lt;id&gt;/vocabulary</code> - full log</li>
        </ul>
    </div>
</body>
</html>"#,
        port = state.config.server.port,
        twilio_status = twilio_status,
        learners = learners,
        store = state.config.store.path.display(),
    ))
}
