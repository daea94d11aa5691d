use axum::{extract::Request, middleware::Next, response::Response};

use crate::monitoring::{inc, METRICS};

/// Counts every request by method and final status code.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    inc(
        &METRICS.http_requests_total,
        &[method.as_str(), response.status().as_str()],
    );
    response
}
