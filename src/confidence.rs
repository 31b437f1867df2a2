use crate::config::AggregatorConfig;
use crate::prediction::PredictionResult;

/// 模块：置信度聚合 (Confidence Aggregator)
///
/// 把一整列候选的独立分数压成一个“模型置信度”百分比，用于页面头部展示。
///
/// **公式**:
/// $$ score = top \times 0.5 + \overline{top_3} \times 0.3 + \frac{max - min}{100} \times 20 $$
/// 最后钳制到 [65, 99.9]。
///
/// - 空输入直接返回 0，不参与钳制。
/// - $\overline{top_3}$ 固定除以 3：只有 1、2 条时缺的那几项按 0 计。
///   这是已有行为，下游依赖这个数值，不要“修正”它。
pub fn aggregate_confidence(predictions: &[PredictionResult], cfg: &AggregatorConfig) -> f64 {
    let Some(first) = predictions.first() else {
        return 0.0;
    };

    let top = first.confidence;

    let window_sum: f64 = predictions
        .iter()
        .take(cfg.top_window)
        .map(|p| p.confidence)
        .sum();
    let avg_top = window_sum / cfg.top_window.max(1) as f64;

    let (min, max) = predictions
        .iter()
        .map(|p| p.confidence)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c), hi.max(c)));
    let spread_factor = (max - min) / 100.0 * cfg.spread_scale;

    let score = top * cfg.top_weight + avg_top * cfg.top_window_weight + spread_factor;
    score.clamp(cfg.floor, cfg.ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::fixtures::pred;

    fn cfg() -> AggregatorConfig {
        AggregatorConfig::default()
    }

    #[test]
    fn empty_is_exactly_zero() {
        assert_eq!(aggregate_confidence(&[], &cfg()), 0.0);
    }

    #[test]
    fn low_scores_hit_the_floor() {
        let preds = vec![pred(1, "A", "DE", 10.0)];
        // 10*0.5 + (10/3)*0.3 + 0 = 6.0
        assert_eq!(aggregate_confidence(&preds, &cfg()), 65.0);
    }

    #[test]
    fn high_scores_hit_the_ceiling() {
        let preds = vec![
            pred(1, "A", "DE", 100.0),
            pred(2, "B", "DE", 100.0),
            pred(3, "C", "DE", 100.0),
            pred(4, "D", "DE", 0.0),
        ];
        // 50 + 30 + 20 = 100
        assert_eq!(aggregate_confidence(&preds, &cfg()), 99.9);
    }

    #[test]
    fn mid_range_value() {
        let preds = vec![
            pred(1, "A", "DE", 90.0),
            pred(2, "B", "US", 80.0),
            pred(3, "C", "FR", 70.0),
            pred(4, "D", "NL", 40.0),
        ];
        // 45 + 24 + 10 = 79
        let score = aggregate_confidence(&preds, &cfg());
        assert!((score - 79.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn short_list_still_divides_by_three() {
        let preds = vec![pred(1, "A", "DE", 90.0), pred(2, "B", "US", 90.0)];
        // 45 + (180/3)*0.3 = 45 + 18 = 63 → floor
        assert_eq!(aggregate_confidence(&preds, &cfg()), 65.0);

        let preds = vec![pred(1, "A", "DE", 100.0), pred(2, "B", "US", 100.0)];
        // 50 + 20 = 70
        let score = aggregate_confidence(&preds, &cfg());
        assert!((score - 70.0).abs() < 1e-9, "got {score}");
    }
}
