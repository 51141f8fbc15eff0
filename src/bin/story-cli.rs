use anyhow::Context;
use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;
use story_stream::interactive::{self, FAREWELL, GREETING, STORY_FOOTER, STORY_HEADER};
use story_stream::{
    telemetry, GenerationClient, PromptBuilder, RequestValidator, Settings, StoryPipeline,
    TerminalSink,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "story-cli")]
#[command(about = "Generate a story in the style of a famous author")]
#[command(version)]
struct Cli {
    /// Model name, overrides AISTUDIO_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature in [0, 2], overrides AISTUDIO_TEMPERATURE
    #[arg(long)]
    temperature: Option<f64>,

    /// Author number from the menu; skips the menu
    #[arg(long)]
    author: Option<usize>,

    /// Story theme; skips the theme prompt
    #[arg(long)]
    theme: Option<String>,

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
    if let Some(temperature) = cli.temperature {
        settings.temperature = temperature;
    }
    settings.validate()?;
    telemetry::init_tracing(settings.debug || cli.debug);

    println!("{}", GREETING);

    let client = match GenerationClient::from_settings(&settings) {
        Ok(client) => client,
        Err(e) => {
            println!("{}", e);
            println!("无法初始化AI客户端，程序将退出。");
            std::process::exit(1);
        }
    };
    let pipeline = StoryPipeline::new(Arc::new(client), RequestValidator::new(settings.validation));

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    let author = match cli.author {
        Some(choice) => interactive::author_by_number(choice)
            .with_context(|| format!("no author numbered {}", choice))?,
        None => interactive::choose_author(&mut input, &mut out)?,
    };
    let theme = match cli.theme.filter(|t| !t.trim().is_empty()) {
        Some(theme) => theme,
        None => interactive::read_theme(&mut input, &mut out)?,
    };
    drop(input);

    let prompt = PromptBuilder::author_imitation(author, &theme);
    println!("{}", interactive::progress_message(author, &theme));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("{}", STORY_HEADER);
    let mut sink = TerminalSink::stdout();
    let params = pipeline.client().params().clone();
    match pipeline
        .generate_into(&prompt, &params, Some(cancel), &mut sink)
        .await
    {
        Ok(_) => {
            println!("{}", STORY_FOOTER);
            println!("{}", interactive::summary(&sink.stats()));
        }
        Err(e) => println!("{}", interactive::failure_message(&e)),
    }

    println!("{}", FAREWELL);
    out.flush()?;
    Ok(())
}
