use rand::Rng;

use crate::config::CounterfactualConfig;
use crate::prediction::{CounterfactualResult, PredictionResult, ScenarioParameters};

/// 模块：反事实重排 (Counterfactual Re-ranking)
///
/// **场景**: 调查员问：“如果电路建立慢了 4 秒 / 出口换到美国，排名会怎么变？”
///
/// **流程**:
/// 1. 逐条计算名次偏移 `rank_delta`（各条之间互不影响）：
///    - 耗时影响   = (duration - 2.0) × 0.5
///    - 字节影响   = ((bytes - 500000) / 100000) × 0.2
///    - 国家影响   = 出口国家不变为 0；否则偶数名次 +1、奇数名次 -1
///    - `rank_delta = round(三者之和)`，半数远离零取整 (`f64::round`)。
///      注意与仪表盘 `Math.round` 不同：-0.5 在这里取 -1，仪表盘取 0
/// 2. 置信度 = clamp(原值 + 噪声 + rank_delta × 2, 20, 95)，噪声取自 [-5, 5)
/// 3. 临时名次 = clamp(rank + rank_delta, 1, 10)
/// 4. 按临时名次稳定排序，再按位置重新编号为 1..N
///
/// `rank_change` 记录的是第 1 步的原始偏移，不是重新编号后的名次差。
pub fn reanalyze<R: Rng + ?Sized>(
    baseline: &[PredictionResult],
    scenario: &ScenarioParameters,
    cfg: &CounterfactualConfig,
    rng: &mut R,
) -> Vec<CounterfactualResult> {
    let shared_impact = scenario_impact(scenario, cfg);
    // 精确比较；国家代码在入口处已校验为两位大写字母
    let country_changed = scenario.exit_country != cfg.baseline.exit_country;

    let mut staged: Vec<(i64, CounterfactualResult)> = baseline
        .iter()
        .map(|item| {
            let country_impact = if country_changed {
                if item.rank % 2 == 0 {
                    cfg.country_shift
                } else {
                    -cfg.country_shift
                }
            } else {
                0
            };

            let rank_delta = (shared_impact + country_impact as f64).round() as i64;

            let jitter = if cfg.jitter_half_width > 0.0 {
                rng.gen_range(-cfg.jitter_half_width..cfg.jitter_half_width)
            } else {
                0.0
            };
            let shifted = rank_delta as f64 * cfg.confidence_per_rank;
            let confidence = (item.confidence + jitter + shifted)
                .clamp(cfg.confidence_floor, cfg.confidence_ceiling);

            let provisional_rank = (item.rank as i64 + rank_delta)
                .clamp(cfg.rank_floor as i64, cfg.rank_ceiling as i64);

            let result = CounterfactualResult {
                prediction: PredictionResult {
                    confidence,
                    ..item.clone()
                },
                original_rank: item.rank,
                rank_change: rank_delta,
            };
            (provisional_rank, result)
        })
        .collect();

    // sort_by_key 是稳定排序：临时名次相同的保持原有先后
    staged.sort_by_key(|(provisional, _)| *provisional);

    staged
        .into_iter()
        .enumerate()
        .map(|(idx, (_, mut result))| {
            result.prediction.rank = idx as u32 + 1;
            result
        })
        .collect()
}

/// 与名次无关的那部分偏移（耗时 + 字节），对每条候选都一样
pub fn scenario_impact(scenario: &ScenarioParameters, cfg: &CounterfactualConfig) -> f64 {
    let duration_delta = scenario.circuit_setup_duration - cfg.baseline.circuit_setup_duration;
    let duration_impact = duration_delta * cfg.duration_weight;
    let bytes_impact = ((scenario.total_bytes as f64 - cfg.baseline.total_bytes as f64)
        / cfg.bytes_unit)
        * cfg.bytes_weight;
    duration_impact + bytes_impact
}
