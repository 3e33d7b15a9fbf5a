//! GraphQL HTTP endpoint and GraphiQL page

use axum::{
    extract::{Extension, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use juniper::http::{graphiql::graphiql_source, GraphQLRequest};

use super::middleware::{AppState, SessionUser};
use crate::graphql::CookieAction;
use crate::services::clear_session_cookie;

/// Execute a GraphQL request.
///
/// Session changes made by resolvers come back as a `Set-Cookie` header.
pub async fn graphql_handler(
    State(state): State<AppState>,
    Extension(SessionUser(user)): Extension<SessionUser>,
    Json(request): Json<GraphQLRequest>,
) -> Response {
    let context = state.graphql_context(user);
    let response = request.execute(&state.schema, &context).await;

    let status = if response.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let mut http_response = (status, Json(response)).into_response();

    if let Some(action) = context.take_cookie_action() {
        let cookie = match action {
            CookieAction::Set(token) => state.user_service.tokens().session_cookie(&token),
            CookieAction::Clear => clear_session_cookie(),
        };
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                http_response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Session cookie is not a valid header value: {}", e),
        }
    }

    http_response
}

/// GraphiQL explorer
pub async fn graphiql() -> Html<String> {
    Html(graphiql_source("/graphql", None))
}
