use clap::Parser;
use colored::*;
use std::env;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use debate_stream::cli::Args;
use debate_stream::render::TerminalRenderer;
use debate_stream::scoring::{now_millis, ScoreSheet};
use debate_stream::{
    fold_stream, ApiKey, ClientSettings, DebateClient, DebateError, StreamSession, Termination,
    Transcript, TranscriptReducer,
};

fn load_settings(args: &Args) -> Result<ClientSettings, DebateError> {
    let mut settings = match &args.settings {
        Some(path) => ClientSettings::from_file(path)?,
        None => ClientSettings::default(),
    }
    .with_env()?;
    if let Some(url) = &args.base_url {
        settings = ClientSettings {
            stream_timeout: settings.stream_timeout,
            connect_timeout: settings.connect_timeout,
            handshake_timeout: settings.handshake_timeout,
            ..ClientSettings::new(url.clone())
        };
    }
    if let Some(secs) = args.timeout {
        settings = settings.stream_timeout(Duration::from_secs(secs.max(1)));
    }
    settings.check()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let settings = load_settings(&args)?;
    let raw_key = args
        .api_key
        .clone()
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .ok_or("no API key: pass --api-key or export OPENAI_API_KEY")?;
    let credential = ApiKey::parse(&raw_key)?;
    let config = args.debate_config();
    config.validate()?;

    let mut renderer = TerminalRenderer::new(args.plain);
    if args.plain {
        colored::control::set_override(false);
    }
    renderer.print_header(&args.topic, &config, &settings.base_url);

    let client = DebateClient::new(settings)?;
    let mut session = StreamSession::new(client.clone());
    let handle = session.open(&args.topic, &config, &credential).await?;
    let debate_id = handle.debate_id().clone();

    let mut reducer = TranscriptReducer::new();
    let mut transcript = Transcript::new();
    let termination = {
        let fold = fold_stream(handle, &mut reducer, &mut transcript, |frame, _| {
            renderer.frame(frame);
        });
        tokio::pin!(fold);
        tokio::select! {
            t = &mut fold => t,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "interrupted, closing stream".bright_yellow());
                session.close();
                fold.await
            }
        }
    };
    session.close();
    renderer.print_footer(&transcript, &termination);

    if args.llm_judge {
        if termination == Termination::Completed {
            match client.judge_llm(&debate_id).await {
                Ok(verdict) => {
                    println!("{}", "LLM judge:".bright_cyan().bold());
                    println!("{}", serde_json::to_string_pretty(&verdict)?);
                }
                Err(e) => eprintln!("{} {}", "LLM judge unavailable:".bright_red(), e),
            }
        } else {
            warn!("skipping LLM judge: debate did not complete");
        }
    }

    if let Some(dir) = &args.export {
        if !transcript.is_settled() {
            warn!("exporting an unfinished transcript");
        }
        let mut sheet = ScoreSheet::for_transcript(&transcript);
        for entry in &args.scores {
            sheet.set_score(&entry.debater_id(), entry.criterion, entry.value)?;
        }
        if !args.ranking.is_empty() {
            sheet.set_ranking(args.ranking_ids())?;
        }
        sheet.set_judge_notes(args.notes.clone());
        let result = sheet.result(&debate_id, &args.topic, &config, &transcript, now_millis());
        let path = result.write_to(dir)?;
        println!("{} {}", "Results written to".bright_green(), path.display());
    }

    if termination.is_failure() {
        return Err(termination.to_string().into());
    }
    Ok(())
}
