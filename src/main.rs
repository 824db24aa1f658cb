use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use lostfound::analyze::{AnalyzeOpts, Analyzer};
use lostfound::config::Config;
use lostfound::images::{self, MODEL_INPUT_SIZE};
use lostfound::semantic::{
    Candidate, EmbeddingProvider, FastembedLoader, ImageTagger, LabelVocabulary, SearchOptions,
    SemanticSearch,
};

mod cli;

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_prepared_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(images::prepare_for_model(&data, MODEL_INPUT_SIZE)?.data)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: cli::Command, config: Config) -> anyhow::Result<()> {
    let sem = &config.semantic;
    let loader = FastembedLoader::new(sem, config.models_dir());
    log::debug!("using text model '{}'", loader.text_model());

    let provider = Arc::new(
        EmbeddingProvider::new(Arc::new(loader), sem.embed_timeout())
            .with_image_timeout(sem.image_timeout()),
    );
    let tagger = || {
        ImageTagger::new(
            provider.clone(),
            LabelVocabulary::lost_and_found(sem.tag_language),
        )
        .with_timeout(sem.tag_timeout())
    };

    match command {
        cli::Command::EmbedText { text } => {
            let embedding = provider.embed_text(&text).await?;
            print_json(&embedding)
        }

        cli::Command::EmbedImage { file } => {
            let image = read_prepared_image(&file)?;
            let embedding = provider.embed_image(&image).await?;
            print_json(&embedding)
        }

        cli::Command::Tag { file } => {
            let image = read_prepared_image(&file)?;
            print_json(&tagger().classify(&image).await)
        }

        cli::Command::Rank {
            query,
            candidates,
            rank_args,
        } => {
            let data = std::fs::read_to_string(&candidates)
                .with_context(|| format!("failed to read {}", candidates.display()))?;
            let candidates: Vec<Candidate> =
                serde_json::from_str(&data).context("candidates file is malformed")?;

            let search = SemanticSearch::new(provider.clone()).with_defaults(SearchOptions {
                top_k: rank_args.top_k.unwrap_or(sem.default_top_k),
                threshold: rank_args.threshold.unwrap_or(sem.default_threshold),
            });
            let outcome = search.search(&query, &candidates).await;
            if outcome.is_fallback() {
                log::warn!("model unavailable, results are in original order");
            }
            print_json(&outcome)
        }

        cli::Command::Analyze { file } => {
            let data =
                std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let opts = AnalyzeOpts {
                embed_timeout: sem.image_timeout(),
                tag_timeout: sem.tag_timeout(),
            };
            let analyzer = Analyzer::new(provider.clone(), tagger(), opts);
            print_json(&analyzer.analyze(&data).await)
        }

        cli::Command::Config {} => {
            print!("{}", serde_yml::to_string(&config)?);
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    let config = match &args.base_path {
        Some(base_path) => Config::load_with(base_path)?,
        None => Config::load()?,
    };

    // hf-hub reads the download mirror from the environment
    if let Some(endpoint) = &config.semantic.hf_endpoint {
        if std::env::var_os("HF_ENDPOINT").is_none() {
            std::env::set_var("HF_ENDPOINT", endpoint);
        }
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(args.command, config))
}
