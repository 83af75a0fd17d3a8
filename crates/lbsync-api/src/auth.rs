//! HTTP basic authentication for admin routes

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lbsync_core::ApiConfig;
use tracing::debug;

/// Admin credentials
///
/// Without a configured password no request is ever authorized.
#[derive(Debug, Clone)]
pub struct Credentials {
    user: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.admin_user.clone(), config.admin_password.clone())
    }

    /// Whether an admin password is configured at all
    pub fn is_configured(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Check the value of an `Authorization` header
    pub fn verify(&self, authorization: Option<&str>) -> bool {
        let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) else {
            return false;
        };
        let Some((user, pass)) = authorization.and_then(decode_basic) else {
            return false;
        };

        !user.is_empty() && user == self.user && pass == password
    }
}

fn decode_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without valid admin credentials
pub async fn require_admin(
    State(credentials): State<Credentials>,
    request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if credentials.verify(authorization) {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "Rejected admin request");
    unauthorized()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=Authorization Required")],
        "Unauthorized",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
    }

    #[test]
    fn test_verify() {
        let credentials = Credentials::new("admin", Some("hunter2".to_string()));

        assert!(credentials.verify(Some(&basic("admin", "hunter2"))));
        assert!(!credentials.verify(Some(&basic("admin", "wrong"))));
        assert!(!credentials.verify(Some(&basic("root", "hunter2"))));
        assert!(!credentials.verify(Some("Bearer hunter2")));
        assert!(!credentials.verify(Some("Basic not-base64!")));
        assert!(!credentials.verify(None));
    }

    #[test]
    fn test_password_may_contain_colons() {
        let credentials = Credentials::new("admin", Some("a:b:c".to_string()));
        assert!(credentials.verify(Some(&basic("admin", "a:b:c"))));
    }

    #[test]
    fn test_unconfigured_password_rejects_everything() {
        let credentials = Credentials::new("admin", None);
        assert!(!credentials.is_configured());
        assert!(!credentials.verify(Some(&basic("admin", ""))));

        let empty = Credentials::new("admin", Some(String::new()));
        assert!(!empty.verify(Some(&basic("admin", ""))));
    }
}
