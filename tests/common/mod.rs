#![allow(dead_code)]

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use authgate_server::{AppState, InMemoryUserStore, MemoryStore, Settings};
use std::net::SocketAddr;
use std::sync::Arc;

pub const PRIVATE_PEM: &str = include_str!("../fixtures/jwt_private.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/jwt_public.pem");

/// Built-in defaults plus fixture keys and cheap Argon2 parameters.
pub fn settings() -> Settings {
    let mut config = Settings::defaults().expect("Failed to load default settings");
    config.environment = "test".into();
    config.redis.url = String::new();
    config.jwt.private_key = Some(PRIVATE_PEM.into());
    config.jwt.public_key = Some(PUBLIC_PEM.into());
    config.hash.salt = Some("integration_salt_value".into());
    config.hash.secret = Some("integration_secret_value".into());
    config.hash.memory_kib = 1024;
    config.hash.iterations = 1;
    config
}

pub fn state(config: Settings) -> AppState {
    AppState::with_stores(
        config,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .expect("Failed to build app state")
}

pub fn client(ip: &str) -> SocketAddr {
    format!("{}:40000", ip).parse().expect("valid socket address")
}

pub fn cookie<B>(resp: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.into_owned())
}

/// The full application, `ddos` gate included, as `main` assembles it.
#[macro_export]
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::from_fn(
                    authgate_server::auth::middleware::ddos,
                ))
                .app_data(actix_web::web::Data::new($state))
                .configure(authgate_server::configure),
        )
        .await
    };
}
