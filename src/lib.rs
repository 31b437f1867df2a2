//! 入口节点预测解读引擎
//!
//! 把外部预测服务给出的候选入口节点排名，转成三样东西：
//! 模型置信度、首位候选的特征归因、以及反事实场景下的重新排名。

pub mod api;
pub mod attribution;
pub mod confidence;
pub mod config;
pub mod counterfactual;
pub mod engine;
pub mod error;
pub mod prediction;
pub mod session;
pub mod triage;

pub use engine::{Interpretation, InterpretationEngine};
pub use error::ValidationError;
pub use prediction::{
    ColorTag, CounterfactualResult, FeatureAttribution, PredictionResult, PredictionSet,
    RequestSummary, ScenarioParameters, Signal,
};
