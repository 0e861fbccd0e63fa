//! History Eval CLI
//!
//! Runs basic and vector-RAG multiple-choice evaluations and scores the results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use history_eval::{
    config::Config,
    eval::{EvalKind, Evaluation, EvaluationReport, Strategy, score_model_outputs},
    llm::{LlmAnswerGenerator, LlmClient},
    persistence::{load_knowledge_chunks, load_qa_set},
    qa::KnowledgeChunks,
    retrieval::ContextRetriever,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// History Eval - resumable multiple-choice history benchmark for LLMs
#[derive(Parser)]
#[command(name = "history-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Models to evaluate (comma separated); defaults to the configured list
    #[arg(long, global = true, value_delimiter = ',')]
    models: Vec<String>,

    /// Only evaluate the first N questions
    #[arg(long, global = true)]
    max_questions: Option<usize>,

    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer from parametric knowledge only
    Basic,

    /// Answer with context retrieved from the knowledge chunks
    Rag {
        /// Retrieval strategy name (see `strategies`)
        #[arg(short, long, default_value = "strategy_baseline")]
        strategy: String,
    },

    /// Score existing outputs without generating answers
    Score,

    /// List the built-in retrieval strategies
    Strategies,

    /// Test LLM connection for each model
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Basic => cmd_basic(&cli).await,
        Commands::Rag { strategy } => cmd_rag(&cli, strategy).await,
        Commands::Score => cmd_score(&cli),
        Commands::Strategies => cmd_strategies(),
        Commands::Test => cmd_test(&cli).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if !cli.models.is_empty() {
        config.models = cli.models.clone();
    }
    Ok(config)
}

/// Configuration for commands that call the LLM.
fn load_llm_config(cli: &Cli) -> Result<Config> {
    let config = load_config(cli)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn generator_factory(config: &Config) -> impl Fn(&str, &str) -> LlmAnswerGenerator<LlmClient> {
    let client = LlmClient::new(config.llm.clone());
    let limits = config.rate_limits.clone();
    let temperature = config.llm.temperature;

    move |model: &str, system_prompt: &str| {
        let limit = limits.limit_for(model);
        tracing::debug!(
            model,
            max_calls = limit.max_calls,
            window_secs = limit.window_secs,
            "rate limit"
        );
        LlmAnswerGenerator::new(client.clone(), model, system_prompt, limit)
            .with_temperature(temperature)
    }
}

async fn cmd_basic(cli: &Cli) -> Result<()> {
    let config = load_llm_config(cli)?;
    let qa_set = load_qa_set(&config.data.qa_set_path()).context("Failed to load question set")?;
    println!(
        "Running basic evaluation: {} models, {} questions",
        config.models.len(),
        qa_set.len()
    );

    let start = Instant::now();
    let report = Evaluation::basic(
        config.models.clone(),
        &qa_set,
        generator_factory(&config),
        config.data.evals_root(),
    )
    .with_max_questions(cli.max_questions)
    .with_progress(!cli.no_progress)
    .run()
    .await?;

    print_report(&report, "Basic Eval Results");
    println!("Total time: {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

async fn cmd_rag(cli: &Cli, strategy_name: &str) -> Result<()> {
    let config = load_llm_config(cli)?;
    let strategy = Strategy::by_name(strategy_name)?;
    let qa_set = load_qa_set(&config.data.qa_set_path()).context("Failed to load question set")?;
    let corpus = load_knowledge_chunks(&config.data.knowledge_chunks_path())
        .context("Failed to load knowledge chunks")?;
    println!(
        "Running vector RAG evaluation ({}): {} models, {} questions, {} chunks",
        strategy.name(),
        config.models.len(),
        qa_set.len(),
        corpus.len()
    );

    let start = Instant::now();
    let retriever = build_retriever(&config, &strategy, &corpus)?;
    println!("Index built in {:.1}s", start.elapsed().as_secs_f64());

    let report = Evaluation::vector_rag(
        config.models.clone(),
        &qa_set,
        generator_factory(&config),
        config.data.evals_root(),
        strategy.clone(),
        retriever,
    )
    .with_max_questions(cli.max_questions)
    .with_progress(!cli.no_progress)
    .run()
    .await?;

    print_report(&report, &format!("Vector RAG Results ({})", strategy.name()));
    println!("Total time: {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(feature = "local-models")]
fn build_retriever(
    config: &Config,
    strategy: &Strategy,
    corpus: &KnowledgeChunks,
) -> Result<Box<dyn ContextRetriever>> {
    use history_eval::retrieval::{
        BertCrossEncoder, CrossEncoder, EmbeddingModel, HttpCrossEncoder, VectorContextRetriever,
    };

    println!("Loading embedding model: {}", config.retrieval.embedding_model);
    let embedder = EmbeddingModel::load(&config.retrieval.embedding_model)?;

    let reranker: Option<Box<dyn CrossEncoder>> = if strategy.enable_reranking() {
        match &config.retrieval.rerank_api_base {
            Some(base) => {
                println!("Using rerank service: {}", base);
                Some(Box::new(HttpCrossEncoder::new(base.clone())))
            }
            None => {
                println!(
                    "Loading cross-encoder: {}",
                    config.retrieval.cross_encoder_model
                );
                Some(Box::new(BertCrossEncoder::load(
                    &config.retrieval.cross_encoder_model,
                )?))
            }
        }
    } else {
        None
    };

    let retriever = VectorContextRetriever::build(strategy, corpus, embedder, reranker)?;
    Ok(Box::new(retriever))
}

#[cfg(not(feature = "local-models"))]
fn build_retriever(
    _config: &Config,
    _strategy: &Strategy,
    _corpus: &KnowledgeChunks,
) -> Result<Box<dyn ContextRetriever>> {
    anyhow::bail!("Vector RAG evaluation needs local embeddings; rebuild with `--features local-models`")
}

fn cmd_score(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let qa_set = load_qa_set(&config.data.qa_set_path()).context("Failed to load question set")?;
    let root = config.data.evals_root();

    let kinds = std::iter::once(EvalKind::Basic)
        .chain(Strategy::builtin().into_iter().map(EvalKind::VectorRag));
    for kind in kinds {
        let title = match &kind {
            EvalKind::Basic => "Basic Eval Results".to_string(),
            EvalKind::VectorRag(strategy) => format!("Vector RAG Results ({})", strategy.name()),
        };
        score_model_outputs(&qa_set, &kind.output_dir(&root)).print_summary(&title);
    }
    Ok(())
}

fn cmd_strategies() -> Result<()> {
    println!("Built-in strategies");
    println!("{}", "─".repeat(40));
    for strategy in Strategy::builtin() {
        println!("  {}", strategy.name());
        println!("    {}", strategy.description());
        println!(
            "    max_results={} reranking={} chunking={:?}",
            strategy.max_results(),
            strategy.enable_reranking(),
            strategy.chunking_style()
        );
    }
    Ok(())
}

async fn cmd_test(cli: &Cli) -> Result<()> {
    println!("Testing LLM connection...\n");

    let config = load_config(cli)?;

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!(
        "  API Key:   {}",
        if config.llm.api_key.is_empty() { "(none)" } else { "(set)" }
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm.clone());
    for model in &config.models {
        match client.test_connection(model).await {
            Ok(()) => println!("  {}: ok", model),
            Err(e) => println!("  {}: failed ({})", model, e),
        }
    }

    Ok(())
}

fn print_report(report: &EvaluationReport, title: &str) {
    for pass in &report.passes {
        println!(
            "{}: {} answered, {} cached, {} failed -> {}",
            pass.model,
            pass.answered,
            pass.skipped,
            pass.failed,
            pass.output_path.display()
        );
    }
    report.scores.print_summary(title);
}
