use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::engine::InterpretationEngine;
use crate::prediction::{CounterfactualResult, PredictionResult, ScenarioParameters};

/// 模块：分析会话 (Analysis Session)
///
/// **职责**: 给反事实分析套上“分析中”的人为延迟，并保证结果只按请求顺序发布。
///
/// 每次重算都领取一个单调递增的令牌 (token)。延迟结束后，
/// 如果已经有更新的令牌发出，本次结果直接作废，不会覆盖较新的请求。
/// “分析中”= 最新发出的令牌还没有发布结果。
pub struct AnalysisSession {
    engine: Arc<InterpretationEngine>,
    delay: Duration,
    issued: AtomicU64,
    published_token: AtomicU64,
    published: Mutex<Option<PublishedAnalysis>>,
}

pub type RequestToken = u64;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PublishedAnalysis {
    pub token: RequestToken,
    pub published_at: DateTime<Utc>,
    pub results: Vec<CounterfactualResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Published(PublishedAnalysis),
    Superseded { token: RequestToken },
}

/// 调用方持有的结果句柄
pub struct AnalysisHandle {
    pub token: RequestToken,
    handle: JoinHandle<Outcome>,
}

impl AnalysisHandle {
    pub async fn outcome(self) -> Result<Outcome, tokio::task::JoinError> {
        self.handle.await
    }
}

impl AnalysisSession {
    pub fn new(engine: Arc<InterpretationEngine>, delay: Duration) -> Self {
        Self {
            engine,
            delay,
            issued: AtomicU64::new(0),
            published_token: AtomicU64::new(0),
            published: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &InterpretationEngine {
        &self.engine
    }

    pub fn is_analyzing(&self) -> bool {
        self.issued.load(Ordering::SeqCst) != self.published_token.load(Ordering::SeqCst)
    }

    pub fn latest_token(&self) -> RequestToken {
        self.issued.load(Ordering::SeqCst)
    }

    /// 最近一次发布的结果
    pub async fn latest(&self) -> Option<PublishedAnalysis> {
        self.published.lock().await.clone()
    }

    /// 领取令牌并在后台调度延迟计算
    pub fn submit(
        self: &Arc<Self>,
        baseline: Vec<PredictionResult>,
        scenario: ScenarioParameters,
        seed: Option<u64>,
    ) -> AnalysisHandle {
        let token = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(token, candidates = baseline.len(), "🔄 反事实分析已排队");

        let session = Arc::clone(self);
        let handle =
            tokio::spawn(async move { session.run(token, baseline, scenario, seed).await });

        AnalysisHandle { token, handle }
    }

    async fn run(
        &self,
        token: RequestToken,
        baseline: Vec<PredictionResult>,
        scenario: ScenarioParameters,
        seed: Option<u64>,
    ) -> Outcome {
        tokio::time::sleep(self.delay).await;

        if self.issued.load(Ordering::SeqCst) != token {
            tracing::debug!(token, "analysis superseded before compute, discarding");
            return Outcome::Superseded { token };
        }
        // 计算中途 panic 也要让令牌落地，否则“分析中”永远不会结束
        let _settle = SettleOnExit { session: self, token };

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let results = self.engine.reanalyze(&baseline, &scenario, &mut rng);

        let published = PublishedAnalysis {
            token,
            published_at: Utc::now(),
            results,
        };

        let mut slot = self.published.lock().await;
        // 只允许令牌前进
        if slot.as_ref().is_some_and(|current| current.token > token) {
            return Outcome::Superseded { token };
        }
        *slot = Some(published.clone());
        self.published_token.fetch_max(token, Ordering::SeqCst);
        drop(slot);

        tracing::info!(token, "✅ 反事实分析已发布");
        Outcome::Published(published)
    }
}

/// 离开 `run` 时推进已发布令牌。正常路径下是空操作。
struct SettleOnExit<'a> {
    session: &'a AnalysisSession,
    token: RequestToken,
}

impl Drop for SettleOnExit<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::warn!(token = self.token, "⚠️ 反事实分析异常中止，保留上一次结果");
        }
        self.session
            .published_token
            .fetch_max(self.token, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::prediction::fixtures::pred;

    fn session(delay_ms: u64) -> Arc<AnalysisSession> {
        Arc::new(AnalysisSession::new(
            Arc::new(InterpretationEngine::default()),
            Duration::from_millis(delay_ms),
        ))
    }

    fn baseline() -> Vec<PredictionResult> {
        vec![pred(1, "A", "DE", 80.0), pred(2, "B", "US", 60.0)]
    }

    #[tokio::test]
    async fn single_request_publishes() {
        let session = session(10);
        assert!(!session.is_analyzing());

        let handle = session.submit(baseline(), ScenarioParameters::default(), Some(1));
        assert_eq!(handle.token, 1);
        assert!(session.is_analyzing());

        let outcome = handle.outcome().await.unwrap();
        let Outcome::Published(published) = outcome else {
            panic!("expected a published result");
        };
        assert_eq!(published.token, 1);
        assert_eq!(published.results.len(), 2);
        assert!(!session.is_analyzing());
        assert_eq!(session.latest().await, Some(published));
    }

    #[tokio::test]
    async fn stale_request_is_discarded() {
        let session = session(30);

        let first = session.submit(baseline(), ScenarioParameters::default(), Some(1));
        let second = session.submit(baseline(), ScenarioParameters::default(), Some(2));
        assert_eq!(session.latest_token(), 2);

        assert_eq!(
            first.outcome().await.unwrap(),
            Outcome::Superseded { token: 1 }
        );

        let outcome = second.outcome().await.unwrap();
        assert!(matches!(outcome, Outcome::Published(ref p) if p.token == 2));
        assert!(!session.is_analyzing());
        assert_eq!(session.latest().await.map(|p| p.token), Some(2));
    }

    #[tokio::test]
    async fn failed_run_does_not_leave_session_analyzing() {
        let mut config = EngineConfig::default();
        config.counterfactual.rank_floor = 5;
        config.counterfactual.rank_ceiling = 2;
        let session = Arc::new(AnalysisSession::new(
            Arc::new(InterpretationEngine::new(config)),
            Duration::from_millis(1),
        ));

        let handle = session.submit(baseline(), ScenarioParameters::default(), Some(1));
        assert!(handle.outcome().await.is_err());
        assert!(!session.is_analyzing());
        assert_eq!(session.latest().await, None);

        // 后续请求照常排队
        let next = session.submit(baseline(), ScenarioParameters::default(), Some(2));
        assert_eq!(next.token, 2);
        assert!(session.is_analyzing());
    }

    #[tokio::test]
    async fn seeded_runs_are_reproducible() {
        let session = session(1);
        let a = session.submit(baseline(), ScenarioParameters::default(), Some(9));
        let Outcome::Published(a) = a.outcome().await.unwrap() else {
            panic!("expected a published result");
        };
        let b = session.submit(baseline(), ScenarioParameters::default(), Some(9));
        let Outcome::Published(b) = b.outcome().await.unwrap() else {
            panic!("expected a published result");
        };
        assert_eq!(a.results, b.results);
    }
}
