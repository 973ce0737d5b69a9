pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod store;

use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, KeyStore, PasswordService, RateLimitPolicy, RateLimiter, TokenService};
pub use cache::{CacheLayer, CachedSearch, SearchProvider};
pub use db::{Credential, DbOperations, InMemoryUserStore, UserStore};
pub use store::{MemoryStore, RedisStore, SharedStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Route table. The `ddos` gate is applied by whoever builds the `App`, so it
/// covers everything including unknown paths.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use auth::handlers;
    use auth::middleware::{authenticate, brute_force};

    cfg.route("/ping", web::get().to(health_check)).service(
        web::scope("/api/v1")
            .service(
                web::scope("/users")
                    .service(
                        web::resource("/register")
                            .wrap(from_fn(brute_force))
                            .route(web::post().to(handlers::register)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(from_fn(brute_force))
                            .route(web::post().to(handlers::login)),
                    )
                    .route("/refresh", web::post().to(handlers::refresh))
                    .route("/logout", web::post().to(handlers::logout))
                    .service(
                        web::resource("/me")
                            .wrap(from_fn(authenticate))
                            .route(web::get().to(handlers::me)),
                    ),
            )
            .service(
                web::resource("/content/{kind}")
                    .wrap(from_fn(authenticate))
                    .route(web::get().to(handlers::search_content)),
            ),
    );
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub tokens: TokenService,
    pub auth_service: Arc<AuthService>,
    pub ddos_limiter: RateLimiter,
    pub brute_force_limiter: RateLimiter,
    pub cache: CacheLayer,
    pub search: Option<Arc<CachedSearch>>,
}

impl AppState {
    /// Connects Postgres and Redis as configured. An empty `redis.url` selects
    /// the process-local store, which only works for a single instance.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::connect(&config.database).await?;
        db.migrate().await?;

        let store: Arc<dyn SharedStore> = if config.redis.url.is_empty() {
            warn!("No redis.url configured, rate limits and cache are local to this process");
            let memory = Arc::new(MemoryStore::new());
            spawn_purge(memory.clone());
            memory
        } else {
            let redis = RedisStore::connect(&config.redis).await?;
            info!("Connected to shared store at {}", config.redis.url);
            Arc::new(redis)
        };

        Self::with_stores(config, Arc::new(db), store)
    }

    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserStore>,
        store: Arc<dyn SharedStore>,
    ) -> Result<Self> {
        let keys = KeyStore::from_config(&config.jwt)?;
        let tokens = TokenService::new(keys, &config.jwt);
        let passwords = PasswordService::new(&config.hash);
        let auth_service = Arc::new(AuthService::new(users, passwords, tokens.clone()));

        let limits = &config.rate_limit;
        let ddos_policy = RateLimitPolicy::from_config("ddos", &limits.ddos);
        let ddos_limiter = if limits.enabled {
            RateLimiter::new(store.clone(), ddos_policy)
        } else {
            RateLimiter::disabled(store.clone(), ddos_policy)
        }
        .fail_open(limits.fail_open);
        let brute_force_limiter = RateLimiter::new(
            store.clone(),
            RateLimitPolicy::from_config("brute_force", &limits.brute_force),
        )
        .fail_open(limits.fail_open);

        let cache = CacheLayer::new(store).with_producer_timeout(config.cache.producer_timeout());

        Ok(Self {
            config: Arc::new(config),
            tokens,
            auth_service,
            ddos_limiter,
            brute_force_limiter,
            cache,
            search: None,
        })
    }

    /// Serve `/api/v1/content/{kind}` from `provider`, cached for `cache.search_ttl_secs`.
    pub fn with_search_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(Arc::new(CachedSearch::new(
            provider,
            self.cache.clone(),
            self.config.cache.search_ttl(),
        )));
        self
    }
}

fn spawn_purge(store: Arc<MemoryStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                tracing::debug!("Purged {} expired store entries", purged);
            }
        }
    });
}
