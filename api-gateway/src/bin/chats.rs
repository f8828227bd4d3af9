//! Chats Lambda - Handles conversation storage for signed-in users.
//!
//! Endpoints:
//! - GET /api/test - Echo the caller's user id
//! - POST /api/chats - Create a chat from the first message
//! - GET /api/userchats - List the caller's chat summaries
//! - GET /api/chats/{id} - Get a chat
//! - PUT /api/chats/{id} - Append a question/answer exchange

use lambda_http::http::header::{AUTHORIZATION, COOKIE};
use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::auth::session_cookie;
use shared::http::{error_response, failure_response, json_response, parse_json_body, route_path, Cors};
use shared::models::WhoAmI;
use shared::{
    db, extract_user_from_context, AppendAck, AppendTurnRequest, AuthenticatedUser, ChatService,
    ChatStore, Config, CreateChatRequest, IdentityVerifier, JwtVerifier, PgChatStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use validator::Validate;

/// Application state shared across requests.
struct AppState {
    service: ChatService,
    verifier: Box<dyn IdentityVerifier>,
    cors: Cors,
}

impl AppState {
    fn new(store: Arc<dyn ChatStore>, verifier: Box<dyn IdentityVerifier>, cors: Cors) -> Self {
        Self {
            service: ChatService::new(store),
            verifier,
            cors,
        }
    }
}

/// Resolve the caller from authorizer claims, the bearer token or the
/// session cookie, in that order.
fn authenticate(state: &AppState, event: &Request) -> shared::Result<AuthenticatedUser> {
    let claims = event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|authorizer| authorizer.fields.get("claims"));
    if let Some(claims) = claims {
        return extract_user_from_context(claims);
    }

    let headers = event.headers();
    if let Some(token) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return state.verifier.verify(token);
    }

    let cookie_token = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(session_cookie);
    match cookie_token {
        Some(token) => state.verifier.verify(token),
        None => Err(shared::Error::Auth("Missing session token".to_string())),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method() == Method::OPTIONS {
        return state.cors.preflight();
    }

    let response = route(&state, &event).await?;
    Ok(state.cors.apply(response))
}

async fn route(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let raw_path = event.uri().path();
    let path = route_path(raw_path);
    let method = event.method().as_str();

    info!("Received request: method={}, path={} (raw: {})", method, path, raw_path);

    let user = match authenticate(state, event) {
        Ok(user) => user,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return error_response(401, "Authentication required");
        }
    };

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("GET", ["test"]) => {
            info!(user_id = %user.user_id, "auth test");
            json_response(200, &WhoAmI { user_id: user.user_id })
        }

        ("POST", ["chats"]) => create_chat(state, event, &user).await,

        ("GET", ["userchats"]) => match state.service.list_chat_summaries(&user.user_id).await {
            Ok(chats) => json_response(200, &chats),
            Err(e) => failure_response(&e, "An error occurred while fetching the userchats."),
        },

        ("GET", ["chats", id]) => {
            let result = match parse_chat_id(id) {
                Ok(chat_id) => state.service.get_chat(chat_id, &user.user_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(chat) => json_response(200, &chat),
                Err(e) => failure_response(&e, "An error occurred while fetching the chat."),
            }
        }

        ("PUT", ["chats", id]) => append_turn(state, event, &user, id).await,

        (_, ["test"]) | (_, ["chats"]) | (_, ["userchats"]) | (_, ["chats", _]) => {
            error_response(405, "Method not allowed")
        }

        _ => error_response(404, "Not found"),
    }
}

async fn create_chat(
    state: &AppState,
    event: &Request,
    user: &AuthenticatedUser,
) -> Result<Response<Body>, Error> {
    let request: CreateChatRequest = match parse_json_body(event.body()) {
        Ok(request) => request,
        Err(e) => return failure_response(&e, "Invalid request"),
    };
    if let Err(e) = request.validate() {
        return failure_response(&shared::Error::from(e), "Invalid request");
    }

    match state.service.create_chat(&user.user_id, &request.text).await {
        Ok(chat_id) => json_response(201, &chat_id),
        Err(e) => failure_response(&e, "An error occurred while creating the chat."),
    }
}

async fn append_turn(
    state: &AppState,
    event: &Request,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<Response<Body>, Error> {
    let chat_id = match parse_chat_id(id) {
        Ok(chat_id) => chat_id,
        Err(e) => return failure_response(&e, "An error occurred while updating the chat."),
    };
    let request: AppendTurnRequest = match parse_json_body(event.body()) {
        Ok(request) => request,
        Err(e) => return failure_response(&e, "Invalid request"),
    };

    let result = state
        .service
        .append_turn(
            chat_id,
            &user.user_id,
            request.question.as_deref(),
            &request.ans,
            request.img.as_deref(),
        )
        .await;

    match result {
        Ok(outcome) => json_response(200, &AppendAck::from(outcome)),
        Err(e) => failure_response(&e, "An error occurred while updating the chat."),
    }
}

/// Malformed ids can never match a chat, so they are reported as not found.
fn parse_chat_id(id: &str) -> shared::Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| shared::Error::NotFound(format!("chat {}", id)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env();
    let store = PgChatStore::new(db::connect(&config).await?);
    let verifier = JwtVerifier::from_config(&config)?;
    let cors = Cors::new(config.client_url.as_deref());

    let state = Arc::new(AppState::new(
        Arc::new(store.clone()),
        Box::new(verifier),
        cors,
    ));

    let result = run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await;

    store.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MemoryChatStore;

    /// Accepts `Bearer user_<name>` and returns `user_<name>` as the user id.
    struct StaticVerifier;

    impl IdentityVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> shared::Result<AuthenticatedUser> {
            let token = token.strip_prefix("Bearer ").unwrap_or(token);
            if token.starts_with("user_") {
                Ok(AuthenticatedUser {
                    user_id: token.to_string(),
                })
            } else {
                Err(shared::Error::Auth("bad token".to_string()))
            }
        }
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(MemoryChatStore::new()),
            Box::new(StaticVerifier),
            Cors::new(Some("https://app.example.com")),
        ))
    }

    fn request(method: Method, path: &str, user: Option<&str>, body: Option<&str>) -> Request {
        let mut builder = lambda_http::http::Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", user));
        }
        let body = body.map(Body::from).unwrap_or(Body::Empty);
        builder.body(body).unwrap()
    }

    async fn call(state: &Arc<AppState>, req: Request) -> (u16, serde_json::Value) {
        let response = handler(Arc::clone(state), req).await.unwrap();
        let status = response.status().as_u16();
        let body = response.body().as_ref();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body).unwrap()
        };
        (status, json)
    }

    async fn create(state: &Arc<AppState>, user: &str, text: &str) -> String {
        let body = serde_json::json!({ "text": text }).to_string();
        let (status, json) =
            call(state, request(Method::POST, "/api/chats", Some(user), Some(&body))).await;
        assert_eq!(status, 201);
        json.as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let state = state();
        let (status, json) = call(&state, request(Method::GET, "/api/userchats", None, None)).await;
        assert_eq!(status, 401);
        assert_eq!(json["error"], "Authentication required");

        let (status, _) =
            call(&state, request(Method::GET, "/api/userchats", Some("nobody"), None)).await;
        assert_eq!(status, 401);
    }

    #[tokio::test]
    async fn test_session_cookie_authenticates() {
        let state = state();
        let req = lambda_http::http::Request::builder()
            .method(Method::GET)
            .uri("/api/test")
            .header(COOKIE, "theme=dark; __session=user_cookie")
            .body(Body::Empty)
            .unwrap();
        let (status, json) = call(&state, req).await;
        assert_eq!(status, 200);
        assert_eq!(json, serde_json::json!({"userId": "user_cookie"}));
    }

    #[tokio::test]
    async fn test_create_list_get_flow() {
        let state = state();
        let id = create(&state, "user_a", "What is the capital of France?").await;

        let (status, json) =
            call(&state, request(Method::GET, "/api/userchats", Some("user_a"), None)).await;
        assert_eq!(status, 200);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["chatId"], id.as_str());
        assert_eq!(json[0]["title"], "What is the capital of France?");
        assert!(json[0]["createdAt"].is_string());

        let path = format!("/api/chats/{}", id);
        let (status, json) = call(&state, request(Method::GET, &path, Some("user_a"), None)).await;
        assert_eq!(status, 200);
        assert_eq!(json["userId"], "user_a");
        assert_eq!(
            json["history"],
            serde_json::json!([{"role": "user", "parts": [{"text": "What is the capital of France?"}]}])
        );
    }

    #[tokio::test]
    async fn test_list_before_first_chat_is_empty() {
        let state = state();
        let (status, json) =
            call(&state, request(Method::GET, "/userchats", Some("user_new"), None)).await;
        assert_eq!(status, 200);
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_other_users_chat_is_not_found() {
        let state = state();
        let id = create(&state, "user_a", "private").await;
        let path = format!("/api/chats/{}", id);

        let (status, _) = call(&state, request(Method::GET, &path, Some("user_b"), None)).await;
        assert_eq!(status, 404);

        let body = r#"{"question":"hijack","ans":"no"}"#;
        let (status, _) = call(&state, request(Method::PUT, &path, Some("user_b"), Some(body))).await;
        assert_eq!(status, 404);

        let (_, json) = call(&state, request(Method::GET, &path, Some("user_a"), None)).await;
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_turns() {
        let state = state();
        let id = create(&state, "user_a", "hello").await;
        let path = format!("/api/chats/{}", id);

        let body = r#"{"question":"look","ans":"a cat","img":"/uploads/cat.png"}"#;
        let (status, json) = call(&state, request(Method::PUT, &path, Some("user_a"), Some(body))).await;
        assert_eq!(status, 200);
        assert_eq!(
            json,
            serde_json::json!({"acknowledged": true, "matchedCount": 1, "modifiedCount": 1})
        );

        let (status, _) =
            call(&state, request(Method::PUT, &path, Some("user_a"), Some(r#"{"ans":"retry"}"#))).await;
        assert_eq!(status, 200);

        let (_, json) = call(&state, request(Method::GET, &path, Some("user_a"), None)).await;
        assert_eq!(
            json["history"],
            serde_json::json!([
                {"role": "user", "parts": [{"text": "hello"}]},
                {"role": "user", "parts": [{"text": "look"}], "img": "/uploads/cat.png"},
                {"role": "model", "parts": [{"text": "a cat"}]},
                {"role": "model", "parts": [{"text": "retry"}]},
            ])
        );
    }

    #[tokio::test]
    async fn test_whitespace_text_creates_chat() {
        let state = state();
        let id = create(&state, "user_a", "   ").await;

        let (status, json) =
            call(&state, request(Method::GET, "/api/userchats", Some("user_a"), None)).await;
        assert_eq!(status, 200);
        assert_eq!(json[0]["chatId"], id.as_str());
        assert_eq!(json[0]["title"], "   ");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let state = state();
        let (status, _) =
            call(&state, request(Method::POST, "/api/chats", Some("user_a"), Some(r#"{"text":""}"#))).await;
        assert_eq!(status, 400);

        let (status, _) =
            call(&state, request(Method::POST, "/api/chats", Some("user_a"), Some("not json"))).await;
        assert_eq!(status, 400);

        let (status, _) =
            call(&state, request(Method::GET, "/api/chats/not-a-uuid", Some("user_a"), None)).await;
        assert_eq!(status, 404);

        let id = create(&state, "user_a", "hello").await;
        let path = format!("/api/chats/{}", id);
        let (status, _) =
            call(&state, request(Method::PUT, &path, Some("user_a"), Some(r#"{"question":"q"}"#))).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_routing_and_cors() {
        let state = state();
        let (status, _) =
            call(&state, request(Method::DELETE, "/api/chats", Some("user_a"), None)).await;
        assert_eq!(status, 405);

        let (status, _) = call(&state, request(Method::GET, "/api/nope", Some("user_a"), None)).await;
        assert_eq!(status, 404);

        let response = handler(
            Arc::clone(&state),
            request(Method::OPTIONS, "/api/chats", None, None),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );

        let response = handler(
            Arc::clone(&state),
            request(Method::GET, "/api/userchats", Some("user_a"), None),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }
}
