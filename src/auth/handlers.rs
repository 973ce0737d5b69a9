use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::service::Session;
use super::session::{AuthenticatedUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::cache::{ContentKind, SearchRequest};
use crate::error::AppError;
use crate::AppState;

pub const REFRESH_PATH: &str = "/api/v1/users/refresh";

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

fn session_cookie(name: &'static str, value: String, path: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path(path)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .finish()
}

/// 200 with both cookies set and the pair echoed in the body.
fn session_response(session: Session, secure: bool) -> HttpResponse {
    let Session { identity, tokens } = session;

    HttpResponse::Ok()
        .cookie(session_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone(), "/", secure))
        .cookie(session_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone(), REFRESH_PATH, secure))
        .json(SessionResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: UserView {
                username: identity.username,
            },
        })
}

pub async fn register(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = state.auth_service.register(&req.username, &req.password).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "user": UserView { username: identity.username }
    })))
}

pub async fn login(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let session = state.auth_service.login(&req.username, &req.password).await?;
    info!("Login successful for {}", session.identity.username);

    Ok(session_response(session, state.config.is_production()))
}

pub async fn refresh(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let cookie = req.cookie(REFRESH_TOKEN_COOKIE);
    let session = state
        .auth_service
        .refresh(cookie.as_ref().map(|c| c.value()))
        .await?;

    Ok(session_response(session, state.config.is_production()))
}

/// Tokens are stateless, so this only asks the client to drop its cookies.
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    let secure = state.config.is_production();
    let mut access = session_cookie(ACCESS_TOKEN_COOKIE, String::new(), "/", secure);
    let mut refresh = session_cookie(REFRESH_TOKEN_COOKIE, String::new(), REFRESH_PATH, secure);
    access.make_removal();
    refresh.make_removal();

    HttpResponse::Ok().cookie(access).cookie(refresh).json(serde_json::json!({
        "message": "Successfully logged out"
    }))
}

pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "user": user }))
}

pub async fn search_content(
    kind: web::Path<String>,
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let search = state
        .search
        .as_ref()
        .ok_or_else(|| AppError::NotFound("content search is not configured".into()))?;

    let kind: ContentKind = kind.parse().map_err(AppError::NotFound)?;
    let query = query.into_inner();
    let results = search
        .search(&SearchRequest::new(kind, query.query, query.page))
        .await?;

    Ok(HttpResponse::Ok().json(results))
}
