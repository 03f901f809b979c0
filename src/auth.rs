// src/auth.rs

//! Bearer-token caller identification.
//!
//! Tokens are issued elsewhere; this module only verifies them and records
//! the caller's user id on the request. Roles are never read from the token.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http, Error, HttpMessage, HttpRequest, HttpResponse,
};
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::{PipelineError, PipelineResult};
use crate::models::Role;
use crate::visibility::Session;

pub const VIEW_AS_HEADER: &str = "X-View-As";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated user id, stored in request extensions by the middleware.
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

fn verify_token(token: &str, secret: &str) -> Result<String, String> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    ) {
        Ok(token_data) => Ok(token_data.claims.sub),
        Err(e) => Err(format!("Token decode error: {}", e)),
    }
}

#[derive(Debug, Clone)]
pub struct Authentication {
    secret: Rc<str>,
}

impl Authentication {
    pub fn new(secret: &str) -> Self {
        Self { secret: Rc::from(secret) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service, secret: self.secret.clone() })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Requests without a token pass through; handlers that need a caller refuse them.
        let token = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        if let Some(token) = token {
            match verify_token(&token, &self.secret) {
                Ok(user_id) => {
                    req.extensions_mut().insert(CallerId(user_id));
                }
                Err(e) => {
                    warn!("Rejected bearer token: {}", e);
                    let (req_parts, _payload) = req.into_parts();
                    let resp = HttpResponse::Unauthorized()
                        .json(serde_json::json!({ "error": format!("Invalid token: {}", e) }))
                        .map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

pub fn caller_id(req: &HttpRequest) -> PipelineResult<String> {
    req.extensions()
        .get::<CallerId>()
        .map(|caller| caller.0.clone())
        .ok_or(PipelineError::Unauthorized)
}

fn view_as(req: &HttpRequest) -> PipelineResult<Option<Role>> {
    match req.headers().get(VIEW_AS_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| PipelineError::Validation("unreadable X-View-As header".into()))?;
            Role::parse(raw)
                .map(Some)
                .ok_or_else(|| PipelineError::Validation(format!("unknown role in X-View-As: {}", raw)))
        }
    }
}

/// Builds the explicit session for a team-scoped request.
pub async fn session_for(req: &HttpRequest, data: &AppState, team_id: &str) -> PipelineResult<Session> {
    let user_id = caller_id(req)?;
    let view_as = view_as(req)?;
    data.service.session(&user_id, team_id, view_as).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_jwt(user_id: &str, secret: &str, ttl: Duration) -> PipelineResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
            .map_err(|e| PipelineError::Validation(e.to_string()))
    }

    #[test]
    fn token_round_trip() {
        let token = create_jwt("u1", "secret", Duration::hours(1)).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap(), "u1");
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = create_jwt("u1", "secret", Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
