use crate::domain::error::PaymentError;
use crate::domain::payment::Payment;
use crate::http::middleware::auth::AuthenticatedMerchant;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(merchant): Extension<AuthenticatedMerchant>,
    body: Result<Json<Payment>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(mut payment)) = body else {
        return PaymentError::BadRequest("could not decode request body".to_string())
            .into_response();
    };
    payment.merchant_id = merchant.0;

    match state.payment_service.create_payment(payment).await {
        Ok(payment) => (StatusCode::CREATED, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return PaymentError::BadRequest("id format not accurate".to_string()).into_response();
    };

    match state.payment_service.get_payment(id).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
