use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// 边界校验错误
///
/// 预测服务交过来的 `PredictionSet` 如果结构不对（名次重复、置信度越界……），
/// 核心公式不会报错，只会算出误导性的结果。所以在入口处拦下来。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("prediction set holds {len} entries but top_k is {top_k}")]
    TooManyPredictions { len: usize, top_k: usize },

    #[error("rank sequence broken at position {position}: expected {expected}, found {found}")]
    RankSequence {
        position: usize,
        expected: u32,
        found: u32,
    },

    #[error("confidence {value} of rank {rank} is outside [0, 100]")]
    ConfidenceOutOfRange { rank: u32, value: f64 },

    #[error("invalid country code {code:?} in {field}")]
    CountryCode { field: &'static str, code: String },

    #[error("guard ip of rank {rank} is empty")]
    EmptyGuardIp { rank: u32 },

    #[error("scenario {field} must be positive, got {value}")]
    NonPositiveScenario { field: &'static str, value: f64 },
}

/// 引擎常量配置错误（启动时拦截，避免请求期 clamp 崩溃）
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field}: lower bound {low} exceeds upper bound {high}")]
    InvertedRange {
        field: &'static str,
        low: f64,
        high: f64,
    },

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("invalid baseline scenario: {0}")]
    Baseline(#[from] ValidationError),
}

pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// HTTP 层错误映射
// ==========================================
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("analysis {token} was superseded by a newer request")]
    Superseded { token: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Superseded { .. } => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(msg) => {
                tracing::error!("❌ 内部错误: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_unprocessable() {
        let err = ApiError::from(ValidationError::EmptyGuardIp { rank: 3 });
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn superseded_maps_to_conflict() {
        let resp = ApiError::Superseded { token: 7 }.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
