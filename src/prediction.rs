use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 外部预测服务返回的一次完整结果
///
/// 引擎把它当作只读输入：三个解释组件都只依赖它，互相之间没有调用关系。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionSet {
    // 产生本批结果的算法标识 (xgboost / lightgbm / catboost / ensemble ...)
    pub model_used: String,

    // 查询条件：被观测到的出口节点属性
    pub request_summary: RequestSummary,

    // 请求的结果条数
    pub top_k: usize,

    // 按名次排列的候选入口节点，rank 1 在最前
    pub predictions: Vec<PredictionResult>,
}

/// 出口节点查询摘要
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RequestSummary {
    pub exit_ip: String,
    pub exit_country: String,
    // 以下数值字段预测服务可能不回传
    #[serde(default)]
    pub bandwidth: Option<f64>,
    #[serde(default)]
    pub circuit_setup_duration: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<u64>,
}

/// 单个候选入口节点 (Guard Node)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResult {
    // 名次，从 1 开始，同一批内唯一
    pub rank: u32,

    pub guard_ip: String,

    // 两位国家代码
    pub country: String,

    // 模型给出的分数 [0, 100]。
    // 注意：各候选独立打分，加起来不等于 100，不是概率分布。
    pub confidence: f64,
}

/// 反事实场景参数（用户在界面上拖动的三个旋钮）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScenarioParameters {
    // 电路建立耗时（秒），基准 2.0
    pub circuit_setup_duration: f64,
    // 传输总字节，基准 500000
    pub total_bytes: u64,
    // 出口国家，基准 "DE"
    pub exit_country: String,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            circuit_setup_duration: 2.0,
            total_bytes: 500_000,
            exit_country: "DE".to_string(),
        }
    }
}

/// 扰动后的预测结果
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CounterfactualResult {
    // rank 为重新编号后的最终名次，confidence 为扰动后的分数
    #[serde(flatten)]
    pub prediction: PredictionResult,

    // 扰动前的名次
    pub original_rank: u32,

    // 原始名次偏移量（四舍五入后、钳制与重新编号之前），负数表示向第 1 名靠拢
    pub rank_change: i64,
}

/// 归因信号的固定词表
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    #[serde(rename = "Exit Country Match")]
    ExitCountryMatch,
    #[serde(rename = "Geographic Proximity")]
    GeographicProximity,
    #[serde(rename = "Bandwidth Profile")]
    BandwidthProfile,
    #[serde(rename = "Circuit Setup Time")]
    CircuitSetupTime,
    #[serde(rename = "Historical Co-occurrence")]
    HistoricalCooccurrence,
    #[serde(rename = "Network Topology Match")]
    NetworkTopologyMatch,
    #[serde(rename = "Temporal Correlation")]
    TemporalCorrelation,
}

/// 展示提示色，纯前端用途，没有计算含义
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Positive,
    Neutral,
    Tertiary,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeatureAttribution {
    pub name: Signal,
    pub value: f64,
    pub color_tag: ColorTag,
}

/// 预测服务支持的算法目录
#[derive(Debug, Serialize, Clone, Copy)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const KNOWN_MODELS: [ModelInfo; 4] = [
    ModelInfo { id: "xgboost", name: "XGBoost", description: "Fast & Reliable" },
    ModelInfo { id: "lightgbm", name: "LightGBM", description: "Fastest Speed" },
    ModelInfo { id: "catboost", name: "CatBoost", description: "High Accuracy" },
    ModelInfo { id: "ensemble", name: "Ensemble", description: "Best (Recommended)" },
];

// ==========================================
// 边界校验
// ==========================================

// 只收两位大写字母，下游各组件都做精确比较
fn check_country(field: &'static str, code: &str) -> Result<(), ValidationError> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::CountryCode {
            field,
            code: code.to_string(),
        })
    }
}

impl PredictionSet {
    /// 校验上游预测服务的结构约束。
    ///
    /// 名次必须按顺序恰好是 1..=len；置信度必须是 [0, 100] 内的有限数。
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.predictions.len() > self.top_k {
            return Err(ValidationError::TooManyPredictions {
                len: self.predictions.len(),
                top_k: self.top_k,
            });
        }
        check_country("request_summary.exit_country", &self.request_summary.exit_country)?;

        for (idx, pred) in self.predictions.iter().enumerate() {
            let expected = idx as u32 + 1;
            if pred.rank != expected {
                return Err(ValidationError::RankSequence {
                    position: idx,
                    expected,
                    found: pred.rank,
                });
            }
            if !pred.confidence.is_finite() || !(0.0..=100.0).contains(&pred.confidence) {
                return Err(ValidationError::ConfidenceOutOfRange {
                    rank: pred.rank,
                    value: pred.confidence,
                });
            }
            if pred.guard_ip.trim().is_empty() {
                return Err(ValidationError::EmptyGuardIp { rank: pred.rank });
            }
            check_country("predictions.country", &pred.country)?;
        }
        Ok(())
    }
}

impl ScenarioParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.circuit_setup_duration.is_finite() || self.circuit_setup_duration <= 0.0 {
            return Err(ValidationError::NonPositiveScenario {
                field: "circuit_setup_duration",
                value: self.circuit_setup_duration,
            });
        }
        if self.total_bytes == 0 {
            return Err(ValidationError::NonPositiveScenario {
                field: "total_bytes",
                value: 0.0,
            });
        }
        check_country("scenario.exit_country", &self.exit_country)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn pred(rank: u32, guard_ip: &str, country: &str, confidence: f64) -> PredictionResult {
        PredictionResult {
            rank,
            guard_ip: guard_ip.to_string(),
            country: country.to_string(),
            confidence,
        }
    }

    pub fn set(exit_country: &str, predictions: Vec<PredictionResult>) -> PredictionSet {
        PredictionSet {
            model_used: "ensemble".to_string(),
            request_summary: RequestSummary {
                exit_ip: "45.33.32.156".to_string(),
                exit_country: exit_country.to_string(),
                bandwidth: Some(7.5),
                circuit_setup_duration: Some(2.0),
                total_bytes: Some(500_000),
            },
            top_k: 10,
            predictions,
        }
    }
}
