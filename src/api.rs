use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    engine::Interpretation,
    error::{ApiError, ApiResult},
    prediction::{ModelInfo, PredictionSet, ScenarioParameters, KNOWN_MODELS},
    session::{AnalysisSession, Outcome, PublishedAnalysis, RequestToken},
};

// ==========================================
// 1. 应用状态 (Shared State)
// ==========================================
// 引擎本身无状态；唯一的共享可变状态是会话里的令牌与最近一次发布的结果。
pub struct AppState {
    pub session: Arc<AnalysisSession>,
}

// ==========================================
// 2. 数据传输对象 (DTOs)
// ==========================================

#[derive(Deserialize, Default)]
pub struct SeedQuery {
    // 固定随机种子，便于复现
    pub seed: Option<u64>,
}

// 请求：反事实重算
#[derive(Deserialize)]
pub struct CounterfactualRequest {
    pub baseline: PredictionSet,
    pub scenario: ScenarioParameters,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub analyzing: bool,
    pub latest_token: RequestToken,
}

// ==========================================
// 3. API 路由构建
// ==========================================
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/interpret", post(interpret))
        .route("/counterfactual", post(run_counterfactual))
        .route("/counterfactual/latest", get(latest_counterfactual))
        .route("/counterfactual/status", get(counterfactual_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // ⚠️ 开发模式：允许所有跨域
        .with_state(state)
}

// ==========================================
// 4. 处理函数 (Handlers)
// ==========================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_models() -> Json<Vec<ModelInfo>> {
    Json(KNOWN_MODELS.to_vec())
}

/// 接口：解读一批预测结果（置信度 + 归因 + 研判）
async fn interpret(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeedQuery>,
    Json(set): Json<PredictionSet>,
) -> ApiResult<Json<Interpretation>> {
    tracing::info!(
        "📥 收到解读请求: 模型={}, 出口={}, 候选数={}",
        set.model_used,
        set.request_summary.exit_ip,
        set.predictions.len()
    );

    set.validate()?;

    let mut rng = match query.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let interpretation = state.session.engine().interpret(&set, &mut rng);

    Ok(Json(interpretation))
}

/// 接口：反事实重算（带人为延迟，旧请求会被新请求顶掉）
async fn run_counterfactual(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CounterfactualRequest>,
) -> ApiResult<Json<PublishedAnalysis>> {
    req.baseline.validate()?;
    req.scenario.validate()?;

    let handle = state
        .session
        .submit(req.baseline.predictions, req.scenario, req.seed);

    match handle
        .outcome()
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))?
    {
        Outcome::Published(published) => Ok(Json(published)),
        Outcome::Superseded { token } => {
            tracing::warn!("⏭️ 分析 {} 已被更新的请求取代", token);
            Err(ApiError::Superseded { token })
        }
    }
}

async fn latest_counterfactual(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PublishedAnalysis>> {
    state
        .session
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no counterfactual analysis published yet".to_string()))
}

async fn counterfactual_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        analyzing: state.session.is_analyzing(),
        latest_token: state.session.latest_token(),
    })
}
