use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::Secret;
use service_core::error::AppError;

use crate::models::role::ROLE_USER;
use crate::security::AuthenticatedPrincipal;
use crate::AppState;

/// Require HTTP Basic credentials and authenticate them against stored accounts.
///
/// On success the [`AuthenticatedPrincipal`] is stored in the request extensions and
/// the username is already published into the request context.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (username, password) = parse_basic_authorization(req.headers())?;

    let principal = state
        .authenticator
        .authenticate(&username, password.as_ref())
        .await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Reject authenticated callers that lack `ROLE_USER`.
pub async fn require_user_role(req: Request, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Full authentication is required")))?;

    if !principal.has_authority(ROLE_USER) {
        tracing::info!(username = %principal.username, "Access denied, missing {}", ROLE_USER);
        return Err(AppError::Forbidden(anyhow::anyhow!("Access is denied")));
    }

    Ok(next.run(req).await)
}

/// Split an `Authorization: Basic` header into username and password.
///
/// The decoded token is split at the first `:`. A token without a separator yields a
/// username and no password, which authentication then rejects.
pub fn parse_basic_authorization(
    headers: &HeaderMap,
) -> Result<(String, Option<Secret<String>>), AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Full authentication is required")))?;

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Full authentication is required"
        )));
    }

    let decoded = STANDARD
        .decode(token.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid basic authentication token")))?;

    match decoded.split_once(':') {
        Some((username, password)) => Ok((
            username.to_string(),
            Some(Secret::new(password.to_string())),
        )),
        None => Ok((decoded, None)),
    }
}

/// The principal authenticated by [`basic_auth_middleware`].
pub struct AuthUser(pub AuthenticatedPrincipal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Authenticated principal missing from request extensions"
                ))
            })?;

        Ok(AuthUser(principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::ExposeSecret;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    fn basic(token: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(token)))
    }

    #[test]
    fn splits_at_first_colon() {
        let (username, password) = parse_basic_authorization(&basic("alice:pass:word")).unwrap();

        assert_eq!(username, "alice");
        assert_eq!(password.unwrap().expose_secret(), "pass:word");
    }

    #[test]
    fn empty_password_is_still_a_credential() {
        let (username, password) = parse_basic_authorization(&basic("alice:")).unwrap();

        assert_eq!(username, "alice");
        assert_eq!(password.unwrap().expose_secret(), "");
    }

    #[test]
    fn token_without_separator_has_no_password() {
        let (username, password) = parse_basic_authorization(&basic("alice")).unwrap();

        assert_eq!(username, "alice");
        assert!(password.is_none());
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let token = STANDARD.encode("alice:secret");
        let (username, _) = parse_basic_authorization(&headers(&format!("basic {}", token))).unwrap();

        assert_eq!(username, "alice");
    }

    #[test]
    fn rejects_missing_or_foreign_headers() {
        assert!(matches!(
            parse_basic_authorization(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            parse_basic_authorization(&headers("Bearer abc.def.ghi")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            parse_basic_authorization(&headers("Basic !!not-base64!!")),
            Err(AppError::Unauthorized(_))
        ));
    }
}
