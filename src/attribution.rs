use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{AttributionConfig, Band};
use crate::prediction::{ColorTag, FeatureAttribution, PredictionSet, Signal};

/// 模块：特征归因 (Feature Attribution)
///
/// 给首位候选生成一份“为什么是它”的信号贡献列表。
///
/// 候选信号固定 5 条：
/// 1. 出口国家匹配 / 地理邻近（二选一，看首位候选国家是否等于出口国家）
/// 2. 带宽画像、电路建立时间、历史共现（恒定三条）
/// 3. 网络拓扑匹配 / 时间相关性（二选一，看首位置信度是否高于阈值）
///
/// 每条信号的数值在各自区间内独立采样，同一输入两次调用结果不同。
/// 约定的是量级而不是精确值；随机源由调用方注入，测试里用固定种子。
pub fn explain_top_prediction<R: Rng + ?Sized>(
    set: &PredictionSet,
    cfg: &AttributionConfig,
    rng: &mut R,
) -> Vec<FeatureAttribution> {
    let Some(top) = set.predictions.first() else {
        return Vec::new();
    };

    let mut entry = |name: Signal, band: &Band, color_tag: ColorTag| FeatureAttribution {
        name,
        value: band.sample(&mut *rng),
        color_tag,
    };

    let mut features = Vec::with_capacity(5);

    if top.country == set.request_summary.exit_country {
        features.push(entry(Signal::ExitCountryMatch, &cfg.exit_country_match, ColorTag::Positive));
    } else {
        features.push(entry(
            Signal::GeographicProximity,
            &cfg.geographic_proximity,
            ColorTag::Neutral,
        ));
    }

    features.push(entry(Signal::BandwidthProfile, &cfg.bandwidth_profile, ColorTag::Positive));
    features.push(entry(Signal::CircuitSetupTime, &cfg.circuit_setup_time, ColorTag::Neutral));
    features.push(entry(
        Signal::HistoricalCooccurrence,
        &cfg.historical_cooccurrence,
        ColorTag::Neutral,
    ));

    if top.confidence > cfg.topology_threshold {
        features.push(entry(
            Signal::NetworkTopologyMatch,
            &cfg.network_topology_match,
            ColorTag::Positive,
        ));
    } else {
        features.push(entry(
            Signal::TemporalCorrelation,
            &cfg.temporal_correlation,
            ColorTag::Tertiary,
        ));
    }

    features.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    features.truncate(cfg.max_entries);
    features
}

/// 每条信号对应的采样区间
pub fn band_for(signal: Signal, cfg: &AttributionConfig) -> Band {
    match signal {
        Signal::ExitCountryMatch => cfg.exit_country_match,
        Signal::GeographicProximity => cfg.geographic_proximity,
        Signal::BandwidthProfile => cfg.bandwidth_profile,
        Signal::CircuitSetupTime => cfg.circuit_setup_time,
        Signal::HistoricalCooccurrence => cfg.historical_cooccurrence,
        Signal::NetworkTopologyMatch => cfg.network_topology_match,
        Signal::TemporalCorrelation => cfg.temporal_correlation,
    }
}

// ==========================================
// “为什么是这个入口节点”摘要
// ==========================================

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GuardRationale {
    // 支持该判断的历史电路数
    pub supporting_circuits: u32,
    pub bandwidth: String,
    pub geographic: String,
    pub temporal: String,
}

pub fn guard_rationale<R: Rng + ?Sized>(
    set: &PredictionSet,
    cfg: &AttributionConfig,
    rng: &mut R,
) -> GuardRationale {
    if set.predictions.is_empty() {
        return GuardRationale {
            supporting_circuits: 0,
            bandwidth: UNKNOWN.to_string(),
            geographic: UNKNOWN.to_string(),
            temporal: UNKNOWN.to_string(),
        };
    }

    let (lo, hi) = cfg.supporting_circuits;
    let supporting_circuits = if hi > lo { rng.gen_range(lo..hi) } else { lo };

    GuardRationale {
        supporting_circuits,
        bandwidth: "Good match".to_string(),
        geographic: "Compatible regional distribution".to_string(),
        temporal: "Active during typical circuit establishment windows".to_string(),
    }
}
