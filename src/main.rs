use anyhow::{Result, bail};
use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use threadgraph::cli::{self, SourceArgs};
use threadgraph::config::Config;
use threadgraph::error::IngestError;
use threadgraph::model::EntityRecord;
use threadgraph::pipeline::Pipeline;
use threadgraph::{graph, hackernews, inputs};
use tracing::{info, warn};

fn load_config(source: &SourceArgs) -> Result<Config> {
    let mut config = Config::load(source.config.as_deref())?;
    config.apply_cli(source);
    Ok(config)
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    if config.export_paths.is_empty() {
        bail!("no export paths configured (use --export, --config or THREADGRAPH_EXPORT_PATH)");
    }
    let files = inputs::discover(&config.export_paths)?;
    info!(files = files.len(), "discovered exports");
    Ok(Pipeline::new(inputs::paths(&files), config.extract_options()))
}

fn error_json(err: &IngestError) -> Value {
    warn!(kind = err.kind(), "{}", err.describe());
    json!({
        "error": err.describe(),
        "kind": err.kind(),
        "path": err.path().display().to_string(),
    })
}

fn write_line<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Streams `items` as JSON Lines; returns how many errors were written.
fn emit<T, I, W, F>(out: &mut W, items: I, mut render: F) -> Result<usize>
where
    I: Iterator<Item = Result<T, IngestError>>,
    W: Write,
    F: FnMut(&mut W, &T) -> Result<()>,
{
    let mut errors = 0;
    for item in items {
        match item {
            Ok(value) => render(out, &value)?,
            Err(err) => {
                errors += 1;
                write_line(out, &error_json(&err))?;
            }
        }
    }
    out.flush()?;
    Ok(errors)
}

fn exit_for(errors: usize, fail_on_error: bool) -> ExitCode {
    if errors > 0 && fail_on_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(args: cli::Args) -> Result<ExitCode> {
    match args.command {
        cli::Command::Inputs { source } => {
            let config = load_config(&source)?;
            let files = inputs::discover(&config.export_paths)?;
            println!("{}", serde_json::to_string_pretty(&files)?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Facts {
            source,
            fail_on_error,
        } => {
            let pipeline = build_pipeline(&load_config(&source)?)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let errors = emit(&mut out, pipeline.facts(), |out, sourced| {
                write_line(out, &sourced.fact)
            })?;
            Ok(exit_for(errors, fail_on_error))
        }
        cli::Command::Entities {
            source,
            fail_on_error,
        } => {
            let pipeline = build_pipeline(&load_config(&source)?)?;
            let mut entities = pipeline.entities();
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let errors = emit(&mut out, entities.by_ref(), |out, entity| {
                write_line(out, &entity.record())
            })?;
            info!(stats = ?entities.stats(), "run finished");
            Ok(exit_for(errors, fail_on_error))
        }
        cli::Command::Messages {
            source,
            fail_on_error,
        } => {
            let pipeline = build_pipeline(&load_config(&source)?)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let errors = emit(&mut out, graph::messages(pipeline.entities()), |out, message| {
                write_line(out, &EntityRecord::message(message))
            })?;
            Ok(exit_for(errors, fail_on_error))
        }
        cli::Command::Stats { source } => {
            let pipeline = build_pipeline(&load_config(&source)?)?;
            let mut entities = pipeline.entities();
            for item in entities.by_ref() {
                if let Err(err) = item {
                    warn!(kind = err.kind(), "{}", err.describe());
                }
            }
            println!("{}", serde_json::to_string_pretty(&entities.stats())?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Hackernews {
            source,
            fail_on_error,
        } => {
            let mut config = load_config(&source)?;
            if !source.exports.is_empty() {
                config.hackernews_paths = source.exports.clone();
            }
            if config.hackernews_paths.is_empty() {
                bail!("no hackernews export paths configured");
            }
            let files = inputs::paths(&inputs::discover(&config.hackernews_paths)?);
            let Some(latest) = hackernews::latest_export(&files) else {
                bail!("no hackernews export found");
            };
            info!(path = %latest.display(), "reading hackernews export");
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let mut errors = 0;
            for item in hackernews::items(latest)? {
                match item {
                    Ok(item) => {
                        let mut value = serde_json::to_value(&item)?;
                        value["permalink"] = Value::String(item.permalink());
                        write_line(&mut out, &value)?;
                    }
                    Err(err) => {
                        errors += 1;
                        warn!(path = %latest.display(), "{err:#}");
                        write_line(
                            &mut out,
                            &json!({
                                "error": format!("{err:#}"),
                                "kind": "item",
                                "path": latest.display().to_string(),
                            }),
                        )?;
                    }
                }
            }
            out.flush()?;
            Ok(exit_for(errors, fail_on_error))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadgraph=info".into()),
        )
        .init();

    match run(cli::Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("threadgraph: {err:#}");
            ExitCode::FAILURE
        }
    }
}
