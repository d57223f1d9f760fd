//! HTTP handlers

use actix_web::{web, HttpRequest, HttpResponse};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};
use tracing::warn;

use crate::metrics;
use crate::schema::AppSchema;
use crate::session::{SessionStore, SESSION_COOKIE};

/// Execute a GraphQL request as the user behind the session cookie, if any.
///
/// A session lookup failure is logged and the request runs anonymously.
pub async fn graphql_handler(
    schema: web::Data<AppSchema>,
    sessions: web::Data<SessionStore>,
    http_req: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();

    if let Some(cookie) = http_req.cookie(SESSION_COOKIE) {
        match sessions.user_for_cookie(cookie.value()).await {
            Ok(Some(user)) => request = request.data(user),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session lookup failed, continuing unauthenticated"),
        }
    }

    schema.execute(request).await.into()
}

pub async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn metrics_handler() -> HttpResponse {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
