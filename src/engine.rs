use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attribution::{self, GuardRationale};
use crate::confidence;
use crate::config::EngineConfig;
use crate::counterfactual;
use crate::prediction::{
    CounterfactualResult, FeatureAttribution, PredictionResult, PredictionSet, ScenarioParameters,
};
use crate::triage::{self, TriageAssessment};

/// 一次分析的完整解读结果，整体交给展示层
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Interpretation {
    pub model_used: String,
    pub model_confidence: f64,
    pub attributions: Vec<FeatureAttribution>,
    pub rationale: GuardRationale,
    pub triage: Vec<TriageAssessment>,
}

/// 解读引擎
///
/// 只持有常量配置，不持有任何分析状态；三个组件都是对输入的纯函数，
/// 唯一的不确定性来自调用方传入的随机源。
#[derive(Debug, Clone, Default)]
pub struct InterpretationEngine {
    config: EngineConfig,
}

impl InterpretationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn aggregate_confidence(&self, predictions: &[PredictionResult]) -> f64 {
        confidence::aggregate_confidence(predictions, &self.config.aggregator)
    }

    pub fn explain_top_prediction<R: Rng + ?Sized>(
        &self,
        set: &PredictionSet,
        rng: &mut R,
    ) -> Vec<FeatureAttribution> {
        attribution::explain_top_prediction(set, &self.config.attribution, rng)
    }

    pub fn reanalyze<R: Rng + ?Sized>(
        &self,
        baseline: &[PredictionResult],
        scenario: &ScenarioParameters,
        rng: &mut R,
    ) -> Vec<CounterfactualResult> {
        counterfactual::reanalyze(baseline, scenario, &self.config.counterfactual, rng)
    }

    pub fn interpret<R: Rng + ?Sized>(&self, set: &PredictionSet, rng: &mut R) -> Interpretation {
        let model_confidence = self.aggregate_confidence(&set.predictions);
        let attributions = self.explain_top_prediction(set, rng);
        let rationale = attribution::guard_rationale(set, &self.config.attribution, rng);
        let triage = triage::assess_all(&set.predictions, &self.config.triage);

        tracing::debug!(
            model = %set.model_used,
            candidates = set.predictions.len(),
            model_confidence,
            "interpretation computed"
        );

        Interpretation {
            model_used: set.model_used.clone(),
            model_confidence,
            attributions,
            rationale,
            triage,
        }
    }
}
