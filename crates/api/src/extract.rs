//! Request extractors: the anonymous client context and the bearer-token
//! user.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt, UserAgent};
use axum_extra::TypedHeader;
use catalog_core::identity::{resolve_visitor_id, VisitorId, UNKNOWN};
use catalog_core::interaction::Voter;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Where a request came from, as far as the edge tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: String,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = header_str(headers, "cf-connecting-ip")
            .or_else(|| {
                header_str(headers, "x-forwarded-for")
                    .and_then(|list| list.split(',').next())
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
            })
            .or_else(|| header_str(headers, "x-real-ip"))
            .unwrap_or(UNKNOWN)
            .to_string();

        let user_agent = headers
            .typed_get::<UserAgent>()
            .map(|ua| ua.as_str().to_string())
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self { ip, user_agent }
    }

    pub fn visitor_id(&self) -> VisitorId {
        resolve_visitor_id(&self.ip, &self.user_agent)
    }

    pub fn voter(&self) -> Voter {
        Voter::Visitor(self.visitor_id())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// An authenticated user, taken from an HS256 bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    pub fn voter(&self) -> Result<Voter, ApiError> {
        Voter::user(&self.user_id).map_err(ApiError::from)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;

        let key = DecodingKey::from_secret(state.config().jwt_secret.as_bytes());
        let token = decode::<Claims>(bearer.token(), &key, &Validation::new(Algorithm::HS256))
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected bearer token");
                ApiError::Unauthorized
            })?;

        let user_id = token.claims.sub.trim().to_string();
        if user_id.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(Self { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn prefers_cloudflare_ip_then_forwarded_for() {
        let ctx = ClientContext::from_headers(&headers(&[
            ("cf-connecting-ip", "1.1.1.1"),
            ("x-forwarded-for", "2.2.2.2, 3.3.3.3"),
        ]));
        assert_eq!(ctx.ip, "1.1.1.1");

        let ctx = ClientContext::from_headers(&headers(&[("x-forwarded-for", "2.2.2.2, 3.3.3.3")]));
        assert_eq!(ctx.ip, "2.2.2.2");

        let ctx = ClientContext::from_headers(&headers(&[("x-real-ip", "4.4.4.4")]));
        assert_eq!(ctx.ip, "4.4.4.4");
    }

    #[test]
    fn missing_headers_resolve_to_unknown() {
        let ctx = ClientContext::from_headers(&HeaderMap::new());
        assert_eq!(ctx.ip, UNKNOWN);
        assert_eq!(ctx.user_agent, UNKNOWN);
        assert_eq!(ctx.visitor_id(), resolve_visitor_id(UNKNOWN, UNKNOWN));
    }

    #[test]
    fn user_agent_feeds_the_visitor_id() {
        let a = ClientContext::from_headers(&headers(&[
            ("x-real-ip", "1.2.3.4"),
            ("user-agent", "test-agent"),
        ]));
        assert_eq!(a.user_agent, "test-agent");
        assert_eq!(a.visitor_id(), resolve_visitor_id("1.2.3.4", "test-agent"));
    }
}
