use guardscope_core::{
    api,
    config::Config,
    session::AnalysisSession,
    InterpretationEngine,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guardscope_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ----------------------------------------------------------------
    // 0. 加载配置
    // ----------------------------------------------------------------
    let config = Config::from_env()?;
    let engine_config = config.load_engine_config()?;
    tracing::info!(
        "⚙️  配置加载完成: Host={}:{}, Delay={}ms, EngineConfig={}",
        config.host,
        config.port,
        config.analysis_delay_ms,
        config.engine_config_path.as_deref().unwrap_or("<default>")
    );

    // ----------------------------------------------------------------
    // 1. 引擎 & 分析会话
    // ----------------------------------------------------------------
    let engine = Arc::new(InterpretationEngine::new(engine_config));
    let session = Arc::new(AnalysisSession::new(engine, config.analysis_delay()));

    let shared_state = Arc::new(api::AppState { session });

    // ----------------------------------------------------------------
    // 2. 启动 HTTP 服务
    // ----------------------------------------------------------------
    let app = api::app(shared_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("🚀 解读服务已运行在: http://{}", addr);
    tracing::info!("   - POST /interpret      : 置信度 + 归因 + 研判");
    tracing::info!("   - POST /counterfactual : 反事实重排");

    axum::serve(listener, app).await?;

    Ok(())
}
