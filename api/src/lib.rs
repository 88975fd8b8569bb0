pub mod password;
pub mod payments;
pub mod push;
pub mod routes;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod time;

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_session::{
    SessionMiddleware, config::BrowserSession, storage::CookieSessionStore,
};
use actix_web::cookie::{Key, time::Duration};
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use base64::Engine;
use secrecy::{ExposeSecret, SecretBox};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::payments::PaymentGateway;
use crate::push::PushClient;
use crate::time::TimeSource;

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
/// The gateway clients are constructed by the caller so tests can keep
/// their mock handles.
pub async fn build(
    config: &mut Config,
    time_source: TimeSource,
    payments: PaymentGateway,
    push: PushClient,
) -> std::io::Result<Server> {
    // Key for signing session cookies. A configured key keeps sessions
    // valid across restarts; otherwise sessions die with the process.
    let secret_key = match &config.session_master_key {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.expose_secret())
                .expect("SESSION_MASTER_KEY must be valid base64");
            Key::from(&bytes)
        }
        None => Key::generate(),
    };

    let db_pool =
        web::Data::new(PgPool::connect(&config.database_url).await.unwrap());
    let time_source = web::Data::new(time_source);
    let payments = web::Data::new(payments);
    let push = web::Data::new(push);

    // Clone config values for use in closure
    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        // Configure CORS based on allowed origins
        let cors = if allowed_origins.contains(&"*".to_string()) {
            // Allow any origin (for development)
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
        } else {
            // Production: Only allow specified origins
            let mut cors = Cors::default()
                .allow_any_method()
                .allow_any_header()
                .supports_credentials();

            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(cors)
            // Use signed cookie to track user id
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(
                    CookieSessionStore::default(),
                    secret_key.clone(),
                )
                .cookie_name("bidstream".into())
                .session_lifecycle(
                    BrowserSession::default().state_ttl(Duration::days(30)),
                )
                .build(),
            )
            .service(routes::api_services())
            .app_data(db_pool.clone())
            .app_data(time_source.clone())
            .app_data(payments.clone())
            .app_data(push.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub struct Config {
    pub database_url: String,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    pub stripe_secret_key: SecretBox<String>,
    pub stripe_webhook_secret: SecretBox<String>,
    /// HTTP endpoint push messages are POSTed to.
    pub push_gateway_url: String,
    pub push_gateway_key: SecretBox<String>,
    /// Base64-encoded key for signing session cookies.
    pub session_master_key: Option<SecretBox<String>>,
}

impl Config {
    pub fn from_env() -> Self {
        use std::env::var;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            database_url: var("DATABASE_URL").unwrap(),
            ip: var("IP_ADDRESS").unwrap(),
            port: var("PORT").unwrap().parse().unwrap(),
            allowed_origins,
            stripe_secret_key: SecretBox::new(Box::new(
                var("STRIPE_SECRET_KEY").unwrap(),
            )),
            stripe_webhook_secret: SecretBox::new(Box::new(
                var("STRIPE_WEBHOOK_SECRET").unwrap(),
            )),
            push_gateway_url: var("PUSH_GATEWAY_URL").unwrap_or_else(|_| {
                "https://fcm.googleapis.com/fcm/send".to_string()
            }),
            push_gateway_key: SecretBox::new(Box::new(
                var("PUSH_GATEWAY_KEY").unwrap(),
            )),
            session_master_key: var("SESSION_MASTER_KEY")
                .ok()
                .map(|k| SecretBox::new(Box::new(k))),
        }
    }
}
