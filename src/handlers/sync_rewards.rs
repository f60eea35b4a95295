//! Inbound reward sync endpoint served by the commerce side.

use crate::{
    models::{
        ErrorCode, SyncResponse,
        audit::{SyncAuditEvent, SyncEventType},
    },
    services::{
        AppMetrics,
        ledger::LedgerError,
        verifier::{VerificationError, VerificationOutcome, Verifier},
    },
    utils::{
        canonical::event_from_value,
        http::{
            extract_client_ip, extract_request_id, extract_signature_headers, extract_user_agent,
        },
    },
};
use actix_web::{
    Error, HttpRequest, HttpResponse, Result, error::InternalError, error::JsonPayloadError, web,
};
use paperclip::actix::api_v2_operation;
use serde_json::Value;
use tracing::error;

/// Apply a signed reward event
///
/// Verifies the `X-Signature`/`X-Timestamp` pair against the body, then
/// credits the subject at most once per transaction id. The body is read as
/// untyped JSON so every field that cannot be canonicalized is reported
/// precisely.
#[api_v2_operation(
    summary = "Sync Rewards",
    description = "Verifies an HMAC-signed reward event and applies it exactly once per transactionId. \
                   Requires X-Signature (hex HMAC-SHA256 over \"{timestamp}.{canonical payload}\") and X-Timestamp headers.",
    tags("Sync"),
    responses(
        (status = 200, description = "Applied, or already applied (duplicate)", body = SyncResponse),
        (status = 400, description = "Payload cannot be canonicalized", body = SyncResponse),
        (status = 401, description = "Missing or invalid signature, or stale timestamp", body = SyncResponse),
        (status = 404, description = "Unknown subject", body = SyncResponse),
        (status = 422, description = "Malformed subject or action type", body = SyncResponse),
        (status = 503, description = "Transaction pending after an earlier failure")
    )
)]
pub async fn sync_rewards(
    req: HttpRequest,
    payload: web::Json<Value>,
) -> Result<HttpResponse, Error> {
    let verifier = req
        .app_data::<web::Data<Verifier>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Sync verifier not configured"))?;
    let metrics = req.app_data::<web::Data<AppMetrics>>();
    let record = |event_type: SyncEventType| {
        if let Some(metrics) = metrics {
            metrics.record_verification(event_type.as_str());
        }
    };

    let event = match event_from_value(&payload) {
        Ok(event) => event,
        Err(err) => {
            audit_event(&req, SyncEventType::EncodingError)
                .with_reason(err.to_string())
                .log();
            record(SyncEventType::EncodingError);
            return Ok(HttpResponse::BadRequest()
                .json(SyncResponse::rejected(ErrorCode::EncodingError, err.to_string())));
        }
    };

    let audit = |event_type: SyncEventType| {
        audit_event(&req, event_type).with_event(&event.transaction_id, &event.subject_id)
    };

    let headers = match extract_signature_headers(&req) {
        Ok(headers) => headers,
        Err(reason) => {
            audit(SyncEventType::MissingCredentials).with_reason(reason).log();
            record(SyncEventType::MissingCredentials);
            return Ok(HttpResponse::Unauthorized()
                .json(SyncResponse::rejected(ErrorCode::SignatureMismatch, reason)));
        }
    };

    let result = verifier
        .verify_and_apply(&event, headers.timestamp, &headers.signature)
        .await;

    let (event_type, response) = match result {
        Ok(VerificationOutcome::Applied(applied)) => (
            SyncEventType::Applied,
            HttpResponse::Ok().json(SyncResponse::applied(&applied)),
        ),
        Ok(VerificationOutcome::Duplicate(prior)) => (
            SyncEventType::Duplicate,
            HttpResponse::Ok().json(SyncResponse::duplicate(&prior)),
        ),
        Err(err) => {
            let (event_type, response) = rejection(&err);
            audit(event_type).with_reason(err.to_string()).log();
            record(event_type);
            return Ok(response);
        }
    };

    audit(event_type).log();
    record(event_type);
    Ok(response)
}

fn audit_event(req: &HttpRequest, event_type: SyncEventType) -> SyncAuditEvent {
    SyncAuditEvent::new(event_type, extract_client_ip(req))
        .with_user_agent(extract_user_agent(req))
        .with_request_id(extract_request_id(req))
}

fn rejection(err: &VerificationError) -> (SyncEventType, HttpResponse) {
    if let VerificationError::Pending(_) = err {
        return (
            SyncEventType::InternalError,
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "error",
                "message": err.to_string(),
            })),
        );
    }

    let Some(code) = err.code() else {
        error!(error = %err, "Sync verification failed internally");
        return (
            SyncEventType::InternalError,
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "error",
                "message": "Sync could not be processed",
            })),
        );
    };

    let body = SyncResponse::rejected(code, err.to_string());
    match err {
        VerificationError::ReplayWindowExceeded { .. } => (
            SyncEventType::ReplayWindowExceeded,
            HttpResponse::Unauthorized().json(body),
        ),
        VerificationError::SignatureMismatch => (
            SyncEventType::SignatureMismatch,
            HttpResponse::Unauthorized().json(body),
        ),
        VerificationError::Rejected(LedgerError::UnknownSubject(_)) => (
            SyncEventType::BusinessRejection,
            HttpResponse::NotFound().json(body),
        ),
        VerificationError::Rejected(_) => (
            SyncEventType::BusinessRejection,
            HttpResponse::UnprocessableEntity().json(body),
        ),
        _ => (SyncEventType::EncodingError, HttpResponse::BadRequest().json(body)),
    }
}

/// Renders body deserialization failures in the sync response contract
pub fn sync_json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> Error {
    let reason = err.to_string();

    audit_event(req, SyncEventType::EncodingError)
        .with_reason(reason.as_str())
        .log();
    if let Some(metrics) = req.app_data::<web::Data<AppMetrics>>() {
        metrics.record_verification(SyncEventType::EncodingError.as_str());
    }

    let response =
        HttpResponse::BadRequest().json(SyncResponse::rejected(ErrorCode::EncodingError, reason));
    InternalError::from_response(err, response).into()
}
