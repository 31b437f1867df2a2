use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::prediction::ScenarioParameters;

// ==========================================
// 1. 服务配置 (环境变量)
// ==========================================
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    // 反事实分析的人为延迟（毫秒），用于呈现“分析中”状态
    pub analysis_delay_ms: u64,
    // 可选：引擎常量 JSON 文件
    pub engine_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            analysis_delay_ms: env::var("ANALYSIS_DELAY_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse()
                .context("ANALYSIS_DELAY_MS must be a number of milliseconds")?,
            engine_config_path: env::var("ENGINE_CONFIG_PATH").ok(),
        })
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }

    /// 加载引擎常量：有文件就读文件，没有就用内置默认值
    pub fn load_engine_config(&self) -> anyhow::Result<EngineConfig> {
        match &self.engine_config_path {
            Some(path) => EngineConfig::from_file(path),
            None => {
                let config = EngineConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

// ==========================================
// 2. 引擎常量
// ==========================================
// 所有权重、区间、钳制边界都在这里，构造引擎时注入，不写死在公式里。

/// 半开区间 [low, high)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.high > self.low {
            rng.gen_range(self.low..self.high)
        } else {
            self.low
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value < self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub top_weight: f64,
    pub top_window_weight: f64,
    // 前 N 名均值的窗口。除数固定为 N，不足 N 条时缺的按 0 计
    pub top_window: usize,
    pub spread_scale: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            top_weight: 0.5,
            top_window_weight: 0.3,
            top_window: 3,
            spread_scale: 20.0,
            floor: 65.0,
            ceiling: 99.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    pub exit_country_match: Band,
    pub geographic_proximity: Band,
    pub bandwidth_profile: Band,
    pub circuit_setup_time: Band,
    pub historical_cooccurrence: Band,
    pub network_topology_match: Band,
    pub temporal_correlation: Band,
    // 首位置信度高于此值才算“拓扑匹配”
    pub topology_threshold: f64,
    pub max_entries: usize,
    // “为什么是这个入口节点”面板里的支持电路数
    pub supporting_circuits: (u32, u32),
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            exit_country_match: Band::new(92.0, 97.0),
            geographic_proximity: Band::new(65.0, 75.0),
            bandwidth_profile: Band::new(78.0, 88.0),
            circuit_setup_time: Band::new(71.0, 79.0),
            historical_cooccurrence: Band::new(68.0, 75.0),
            network_topology_match: Band::new(73.0, 78.0),
            temporal_correlation: Band::new(58.0, 68.0),
            topology_threshold: 70.0,
            max_entries: 5,
            supporting_circuits: (30, 80),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterfactualConfig {
    // 基准场景，扰动量都相对它计算
    pub baseline: ScenarioParameters,
    pub duration_weight: f64,
    pub bytes_unit: f64,
    pub bytes_weight: f64,
    pub country_shift: i64,
    // 置信度噪声半宽，噪声取自 [-w, w)
    pub jitter_half_width: f64,
    pub confidence_per_rank: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub rank_floor: u32,
    pub rank_ceiling: u32,
}

impl Default for CounterfactualConfig {
    fn default() -> Self {
        Self {
            baseline: ScenarioParameters::default(),
            duration_weight: 0.5,
            bytes_unit: 100_000.0,
            bytes_weight: 0.2,
            country_shift: 1,
            jitter_half_width: 5.0,
            confidence_per_rank: 2.0,
            confidence_floor: 20.0,
            confidence_ceiling: 95.0,
            rank_floor: 1,
            rank_ceiling: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub active_threshold: f64,
    pub subpoena_threshold: f64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            active_threshold: 50.0,
            subpoena_threshold: 70.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aggregator: AggregatorConfig,
    pub attribution: AttributionConfig,
    pub counterfactual: CounterfactualConfig,
    pub triage: TriageConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取引擎配置失败: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("引擎配置格式错误: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("引擎配置取值非法: {}", path.display()))?;
        Ok(config)
    }

    /// 检查区间上下界与有限性。
    ///
    /// 下界大于上界时 `clamp` 会直接 panic，所以必须在构造引擎前拦下。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let agg = &self.aggregator;
        for (field, value) in [
            ("aggregator.top_weight", agg.top_weight),
            ("aggregator.top_window_weight", agg.top_window_weight),
            ("aggregator.spread_scale", agg.spread_scale),
        ] {
            finite(field, value)?;
        }
        ordered("aggregator.floor/ceiling", agg.floor, agg.ceiling)?;
        if agg.top_window == 0 {
            return Err(ConfigError::NonPositive { field: "aggregator.top_window" });
        }

        let attr = &self.attribution;
        for (field, band) in [
            ("attribution.exit_country_match", attr.exit_country_match),
            ("attribution.geographic_proximity", attr.geographic_proximity),
            ("attribution.bandwidth_profile", attr.bandwidth_profile),
            ("attribution.circuit_setup_time", attr.circuit_setup_time),
            ("attribution.historical_cooccurrence", attr.historical_cooccurrence),
            ("attribution.network_topology_match", attr.network_topology_match),
            ("attribution.temporal_correlation", attr.temporal_correlation),
        ] {
            ordered(field, band.low, band.high)?;
        }
        finite("attribution.topology_threshold", attr.topology_threshold)?;
        let (lo, hi) = attr.supporting_circuits;
        ordered("attribution.supporting_circuits", lo as f64, hi as f64)?;

        let cf = &self.counterfactual;
        cf.baseline.validate()?;
        for (field, value) in [
            ("counterfactual.duration_weight", cf.duration_weight),
            ("counterfactual.bytes_weight", cf.bytes_weight),
            ("counterfactual.confidence_per_rank", cf.confidence_per_rank),
        ] {
            finite(field, value)?;
        }
        if !(cf.bytes_unit.is_finite() && cf.bytes_unit > 0.0) {
            return Err(ConfigError::NonPositive { field: "counterfactual.bytes_unit" });
        }
        ordered("counterfactual.jitter_half_width", 0.0, cf.jitter_half_width)?;
        ordered(
            "counterfactual.confidence_floor/ceiling",
            cf.confidence_floor,
            cf.confidence_ceiling,
        )?;
        if cf.rank_floor == 0 {
            return Err(ConfigError::NonPositive { field: "counterfactual.rank_floor" });
        }
        ordered(
            "counterfactual.rank_floor/ceiling",
            cf.rank_floor as f64,
            cf.rank_ceiling as f64,
        )?;

        finite("triage.active_threshold", self.triage.active_threshold)?;
        finite("triage.subpoena_threshold", self.triage.subpoena_threshold)?;
        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn ordered(field: &'static str, low: f64, high: f64) -> Result<(), ConfigError> {
    finite(field, low)?;
    finite(field, high)?;
    if low > high {
        return Err(ConfigError::InvertedRange { field, low, high });
    }
    Ok(())
}
