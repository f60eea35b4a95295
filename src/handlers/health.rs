//! Health check endpoint handler.

use crate::{config::ServerConfig, models::HealthResponse};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

/// Health check endpoint
///
/// Returns the current health status and the protocol role of this process.
/// Used by load balancers and container health probes.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns the current health status of the service and its role (issuer or commerce).",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse)
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let role = req
        .app_data::<web::Data<ServerConfig>>()
        .map(|config| config.role.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(web::Json(HealthResponse {
        status: "healthy".to_string(),
        role,
    }))
}
