use serde::{Deserialize, Serialize};

use crate::config::TriageConfig;
use crate::prediction::PredictionResult;

/// 候选入口节点的处置状态
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Active,
    Congested,
}

impl TriageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE - High Priority",
            Self::Congested => "CONGESTED - Secondary Priority",
        }
    }
}

/// 建议的侦查动作
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ImmediateSubpoena,
    StandardInvestigation,
    MonitorOnly,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmediateSubpoena => "Immediate ISP subpoena",
            Self::StandardInvestigation => "Standard investigation",
            Self::MonitorOnly => "Monitor only",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TriageAssessment {
    pub rank: u32,
    pub guard_ip: String,
    pub status: TriageStatus,
    // 报告里直接展示的文字
    pub status_label: String,
    pub recommendation: Recommendation,
    pub recommendation_label: String,
}

pub fn assess(pred: &PredictionResult, cfg: &TriageConfig) -> TriageAssessment {
    let status = if pred.confidence > cfg.active_threshold {
        TriageStatus::Active
    } else {
        TriageStatus::Congested
    };

    let recommendation = if pred.confidence > cfg.subpoena_threshold {
        Recommendation::ImmediateSubpoena
    } else if pred.confidence > cfg.active_threshold {
        Recommendation::StandardInvestigation
    } else {
        Recommendation::MonitorOnly
    };

    TriageAssessment {
        rank: pred.rank,
        guard_ip: pred.guard_ip.clone(),
        status,
        status_label: status.as_str().to_string(),
        recommendation,
        recommendation_label: recommendation.as_str().to_string(),
    }
}

pub fn assess_all(predictions: &[PredictionResult], cfg: &TriageConfig) -> Vec<TriageAssessment> {
    predictions.iter().map(|p| assess(p, cfg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::fixtures::pred;

    #[test]
    fn thresholds_are_strict() {
        let cfg = TriageConfig::default();

        let a = assess(&pred(1, "A", "DE", 70.0), &cfg);
        assert_eq!(a.status, TriageStatus::Active);
        assert_eq!(a.recommendation, Recommendation::StandardInvestigation);

        let b = assess(&pred(2, "B", "DE", 70.1), &cfg);
        assert_eq!(b.recommendation, Recommendation::ImmediateSubpoena);

        let c = assess(&pred(3, "C", "DE", 50.0), &cfg);
        assert_eq!(c.status, TriageStatus::Congested);
        assert_eq!(c.recommendation, Recommendation::MonitorOnly);
    }

    #[test]
    fn assess_all_keeps_order() {
        let preds = vec![pred(1, "A", "DE", 90.0), pred(2, "B", "US", 10.0)];
        let out = assess_all(&preds, &TriageConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].guard_ip, "A");
        assert_eq!(out[1].status_label, "CONGESTED - Secondary Priority");
    }

    #[test]
    fn labels_reach_the_wire() {
        let a = assess(&pred(1, "A", "DE", 88.0), &TriageConfig::default());
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["status"], "active");
        assert_eq!(v["status_label"], "ACTIVE - High Priority");
        assert_eq!(v["recommendation"], "immediate_subpoena");
        assert_eq!(v["recommendation_label"], "Immediate ISP subpoena");
    }
}
