use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Merchant id established by the auth middleware; handlers read this
/// instead of trusting the request body.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedMerchant(pub Uuid);

#[derive(Clone)]
pub struct AuthState {
    pub api_key_secret: String,
}

/// API keys are the hex HMAC-SHA256 of the merchant id under the shared
/// secret; merchants present them as the Basic-auth password.
pub fn merchant_api_key(merchant_id: Uuid, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(merchant_id.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a presented password against the merchant's key.
pub fn verify_api_key(merchant_id: Uuid, password: &str, secret: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(merchant_id.to_string().as_bytes());
    let Ok(signature) = hex::decode(password) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}

pub async fn enforce(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some((merchant_id, password)) = basic_credentials(&request) else {
        return unauthorized();
    };
    if !verify_api_key(merchant_id, &password, &state.api_key_secret) {
        return unauthorized();
    }

    request
        .extensions_mut()
        .insert(AuthenticatedMerchant(merchant_id));
    next.run(request).await
}

fn basic_credentials(request: &Request<Body>) -> Option<(Uuid, String)> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    let merchant_id = Uuid::parse_str(username).ok()?;
    Some((merchant_id, password.to_string()))
}

fn unauthorized() -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=<realm>"));
    response
}
