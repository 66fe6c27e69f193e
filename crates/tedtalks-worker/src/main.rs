use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tedtalks_analysis::{AnalysisPipeline, LexiconScorer, MoodScorer};
use tedtalks_bedrock::BedrockMoodScorer;
use tedtalks_storage::S3ConversationStore;
use tedtalks_worker::aws::build_aws_config;
use tedtalks_worker::clock::SystemClock;
use tedtalks_worker::config::{ScorerBackend, WorkerConfig};
use tedtalks_worker::orchestrator::{Orchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Structured JSON logging for CloudWatch
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config = WorkerConfig::load()?;
    info!(
        worker_id = %config.worker_id,
        bucket = %config.bucket,
        region = %config.region,
        scorer = ?config.scorer.backend,
        "starting analysis worker"
    );

    let sdk_config = build_aws_config(&config.region).await;
    let store = Arc::new(S3ConversationStore::new(
        tedtalks_storage::client::client_from_config(&sdk_config),
        config.bucket.clone(),
    ));

    let (scorer, scorer_name): (Arc<dyn MoodScorer>, &str) = match config.scorer.backend {
        ScorerBackend::Lexicon => (Arc::new(LexiconScorer::new()), LexiconScorer::NAME),
        ScorerBackend::Bedrock => (
            Arc::new(BedrockMoodScorer::new(
                tedtalks_bedrock::client::client_from_config(&sdk_config),
                config.scorer.model_id.clone(),
            )),
            BedrockMoodScorer::NAME,
        ),
    };
    let pipeline = Arc::new(AnalysisPipeline::new(
        scorer,
        scorer_name,
        &config.pipeline_config(),
    )?);

    let orchestrator = Orchestrator::new(
        store,
        pipeline,
        Arc::new(SystemClock),
        OrchestratorConfig::from(&config),
    );

    if once {
        let report = orchestrator.run_cycle().await?;
        info!(?report, "single cycle complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, finishing current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    orchestrator.run(shutdown_rx).await?;
    Ok(())
}
