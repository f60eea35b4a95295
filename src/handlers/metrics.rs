//! Metrics endpoint handler.

use crate::{config::ServerConfig, services::AppMetrics};
use actix_web::{Error, HttpRequest, HttpResponse, Result, web};
use paperclip::actix::api_v2_operation;

/// Prometheus metrics endpoint
///
/// Returns Prometheus-formatted metrics, including the reward sync
/// verification and outbound counters.
#[api_v2_operation(
    summary = "Prometheus Metrics Endpoint",
    description = "Returns Prometheus-formatted metrics for HTTP traffic and reward sync outcomes.",
    tags("Metrics"),
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 503, description = "Metrics collection disabled")
    )
)]
pub async fn get_metrics(req: HttpRequest) -> Result<HttpResponse, Error> {
    if let Some(config) = req.app_data::<web::Data<ServerConfig>>() {
        if !config.metrics_enabled {
            return Ok(HttpResponse::ServiceUnavailable()
                .content_type("text/plain")
                .body("Metrics collection is disabled"));
        }
    }

    let Some(metrics) = req.app_data::<web::Data<AppMetrics>>() else {
        return Err(actix_web::error::ErrorServiceUnavailable(
            "Metrics not available",
        ));
    };

    metrics.update_uptime();
    match metrics.render() {
        Ok(metrics_output) => Ok(HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(metrics_output)),
        Err(e) => Err(actix_web::error::ErrorInternalServerError(format!(
            "Failed to render metrics: {}",
            e
        ))),
    }
}
