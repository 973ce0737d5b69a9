//! Request gates, used with `actix_web::middleware::from_fn`.
//!
//! `ddos` throttles raw volume per client IP, `brute_force` throttles
//! authentication attempts and `authenticate` attaches an
//! [`AuthenticatedUser`] or rejects with a bare 401.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::{ready, Ready};
use std::net::SocketAddr;
use tracing::debug;

use super::rate_limit::{RateLimitDecision, RateLimiter};
use super::session::{authenticate_token, AuthenticatedUser, ACCESS_TOKEN_COOKIE};
use crate::error::{AppError, AuthError};
use crate::AppState;

fn app_state(req: &ServiceRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("application state is not registered".into()))
}

/// Short-circuit with the error's own response; the inner service never runs.
fn reject<B>(req: ServiceRequest, err: AppError) -> ServiceResponse<EitherBody<B>> {
    req.into_response(err.error_response()).map_into_right_body()
}

/// Client identifier for rate limiting: the peer IP, or with `trust_proxy`
/// the client address reported by `Forwarded`/`X-Forwarded-For`.
///
/// Requests with no resolvable address all share the `unknown` bucket.
pub fn client_id(req: &ServiceRequest, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr
                .parse::<SocketAddr>()
                .map(|socket| socket.ip().to_string())
                .unwrap_or_else(|_| addr.to_string());
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_gate(
    limiter: &RateLimiter,
    req: &ServiceRequest,
    trust_proxy: bool,
) -> Result<(), AppError> {
    match limiter.check(&client_id(req, trust_proxy)).await {
        RateLimitDecision::Allowed { .. } => Ok(()),
        RateLimitDecision::Blocked { retry_after } => {
            let retry_after_secs = (retry_after.as_millis() as u64).div_ceil(1000);
            Err(AuthError::RateLimited { retry_after_secs }.into())
        }
    }
}

pub async fn ddos(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let state = app_state(&req)?;
    match rate_gate(&state.ddos_limiter, &req, state.config.server.trust_proxy).await {
        Ok(()) => next.call(req).await.map(ServiceResponse::map_into_left_body),
        Err(e) => Ok(reject(req, e)),
    }
}

pub async fn brute_force(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let state = app_state(&req)?;
    match rate_gate(&state.brute_force_limiter, &req, state.config.server.trust_proxy).await {
        Ok(()) => next.call(req).await.map(ServiceResponse::map_into_left_body),
        Err(e) => Ok(reject(req, e)),
    }
}

pub async fn authenticate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let state = app_state(&req)?;
    let cookie = req.request().cookie(ACCESS_TOKEN_COOKIE);
    let token = cookie.as_ref().map(|c| c.value());

    match authenticate_token(&state.tokens, token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(rejection) => {
            debug!("Request to {} rejected: {:?}", req.path(), rejection);
            Ok(reject(req, AuthError::Unauthorized.into()))
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or(AppError::AuthError(AuthError::Unauthorized)),
        )
    }
}
