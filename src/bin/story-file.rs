use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use story_stream::{
    telemetry, GenerationClient, GenerationRequest, RequestValidator, Settings, StoryPipeline,
};

#[derive(Parser)]
#[command(name = "story-file")]
#[command(about = "Generate one story and save it to a text file")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "武侠")]
    style: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    background: Option<String>,

    #[arg(long)]
    character: Option<String>,

    #[arg(long, default_value = "讲述一位年轻剑客的成长故事")]
    plot: String,

    #[arg(long, default_value = "字数约1000字")]
    other_reqs: String,

    /// Output file, overwritten if it exists
    #[arg(long, short, default_value = "武侠风格小说.txt")]
    output: PathBuf,

    /// Model name, overrides AISTUDIO_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::from_env().context("invalid configuration")?;
    if let Some(model) = cli.model {
        settings.model = model;
    }
    telemetry::init_tracing(settings.debug || cli.debug);

    let client = GenerationClient::from_settings(&settings)?;
    let pipeline = StoryPipeline::new(Arc::new(client), RequestValidator::new(settings.validation));

    let mut request = GenerationRequest::new()
        .with_style(cli.style)
        .with_plot(cli.plot)
        .with_other_reqs(cli.other_reqs);
    if let Some(title) = cli.title {
        request = request.with_title(title);
    }
    if let Some(background) = cli.background {
        request = request.with_background(background);
    }
    if let Some(character) = cli.character {
        request = request.with_character(character);
    }

    let prompt = StoryPipeline::prompt_for(&request);
    let summary = pipeline
        .generate_to_file(&prompt, &cli.output)
        .await
        .with_context(|| format!("failed to generate {}", cli.output.display()))?;

    tracing::info!(chars = summary.chars, fragments = summary.fragments, "generation finished");
    println!("小说已生成并保存为 {}", cli.output.display());
    Ok(())
}
