use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::controller::RuleController;
use crate::domain::{
    AuthorityRuleEntity, DegradeRuleEntity, FlowRuleEntity, ParamFlowRuleEntity, RuleEntity,
    SystemRuleEntity,
};
use crate::observability::{MetricsRegistry, RuleOp};

use super::request::{path_id, rule_body, AppQuery};
use super::response::{failure_response, into_response, HealthResponse};

/// API version prefix of the rule endpoints.
pub const API_VERSION: &str = "v2";

/// Shared application state.
pub struct AppState {
    pub flow: Arc<RuleController<FlowRuleEntity>>,
    pub degrade: Arc<RuleController<DegradeRuleEntity>>,
    pub system: Arc<RuleController<SystemRuleEntity>>,
    pub authority: Arc<RuleController<AuthorityRuleEntity>>,
    pub param_flow: Arc<RuleController<ParamFlowRuleEntity>>,

    pub metrics: Arc<MetricsRegistry>,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(&kind_prefix::<FlowRuleEntity>(), rule_routes(state.flow.clone()))
        .nest(&kind_prefix::<DegradeRuleEntity>(), rule_routes(state.degrade.clone()))
        .nest(&kind_prefix::<SystemRuleEntity>(), rule_routes(state.system.clone()))
        .nest(
            &kind_prefix::<AuthorityRuleEntity>(),
            rule_routes(state.authority.clone()),
        )
        .nest(
            &kind_prefix::<ParamFlowRuleEntity>(),
            rule_routes(state.param_flow.clone()),
        )
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn kind_prefix<T: RuleEntity>() -> String {
    format!("/{}/{}", API_VERSION, T::KIND)
}

/// The four rule endpoints of one kind.
pub fn rule_routes<T, S>(controller: Arc<RuleController<T>>) -> Router<S>
where
    T: RuleEntity,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/rules", get(list_rules::<T>))
        .route("/rule", post(create_rule::<T>))
        .route("/rule/:id", put(update_rule::<T>).delete(delete_rule::<T>))
        .with_state(controller)
}

/// `GET /v2/{kind}/rules?app=`
async fn list_rules<T: RuleEntity>(
    State(controller): State<Arc<RuleController<T>>>,
    headers: HeaderMap,
    query: Result<Query<AppQuery>, QueryRejection>,
) -> Response {
    let _timer = controller.timer();
    let app = query.map(|Query(q)| q).unwrap_or_default().app;

    let user = match controller.authenticate(RuleOp::List, &headers) {
        Ok(user) => user,
        Err(e) => return failure_response(&e),
    };

    into_response(
        controller
            .list(&user, app.as_deref().unwrap_or(""))
            .await,
    )
}

/// `POST /v2/{kind}/rule`
async fn create_rule<T: RuleEntity>(
    State(controller): State<Arc<RuleController<T>>>,
    headers: HeaderMap,
    body: Result<Json<T>, JsonRejection>,
) -> Response {
    let _timer = controller.timer();
    let entity = match rule_body(body) {
        Ok(entity) => entity,
        Err(e) => return failure_response(&e),
    };

    let user = match controller.authenticate(RuleOp::Create, &headers) {
        Ok(user) => user,
        Err(e) => return failure_response(&e),
    };

    into_response(controller.create(&user, entity).await)
}

/// `PUT /v2/{kind}/rule/{id}`
async fn update_rule<T: RuleEntity>(
    State(controller): State<Arc<RuleController<T>>>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<T>, JsonRejection>,
) -> Response {
    let _timer = controller.timer();
    let entity = match rule_body(body) {
        Ok(entity) => entity,
        Err(e) => return failure_response(&e),
    };

    let user = match controller.authenticate(RuleOp::Update, &headers) {
        Ok(user) => user,
        Err(e) => return failure_response(&e),
    };

    into_response(controller.update(&user, path_id(id), entity).await)
}

/// `DELETE /v2/{kind}/rule/{id}`
async fn delete_rule<T: RuleEntity>(
    State(controller): State<Arc<RuleController<T>>>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let _timer = controller.timer();
    let user = match controller.authenticate(RuleOp::Delete, &headers) {
        Ok(user) => user,
        Err(e) => return failure_response(&e),
    };

    into_response(controller.delete(&user, path_id(id)).await)
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP ruledash_uptime_seconds Application uptime in seconds
# TYPE ruledash_uptime_seconds counter
ruledash_uptime_seconds {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}
