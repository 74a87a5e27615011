//! Authentication middleware for injecting Bearer tokens.

use std::fmt;

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// Bearer credential attached to a single request as an extension.
///
/// Each request carries the token of the identity it was issued for, so a
/// request built before a sign-out never picks up a later user's token.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Middleware that injects the Bearer token into requests.
pub struct AuthMiddleware;

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        // Inject Authorization header if the request carries a token
        if let Some(BearerToken(token)) = extensions.get::<BearerToken>() {
            if let Ok(value) = format!("Bearer {token}").parse() {
                req.headers_mut().insert(http::header::AUTHORIZATION, value);
            }
        }

        next.run(req, extensions).await
    }
}
