//! termbridge CLI: extract glossary terms from a text, or attach translations to it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use termbridge::export;
use termbridge::{
    AttachTemplate, EngineConfig, EngineError, EngineWarning, Glossary, JobEvent, JobKind, JobOutput,
    LemmaStore, TermEngine, Worker,
};

#[derive(Parser)]
#[command(name = "termbridge", version, about = "Glossary term extraction and inline translation")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the glossary terms that occur in a text
    Extract {
        /// Glossary file (.csv, .tsv, .txt, .json)
        #[arg(long)]
        glossary: PathBuf,
        #[arg(long)]
        input: PathBuf,
        /// Output prefix; defaults to the input path without extension
        #[arg(long)]
        out_prefix: Option<PathBuf>,
    },
    /// Append each matched term's translation inline
    Attach {
        #[arg(long)]
        glossary: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Overrides the configured template, e.g. "{translation} {original}"
        #[arg(long)]
        template: Option<String>,
    },
}

fn main() -> ExitCode {
    termbridge::init_tracing("termbridge=info");
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "termbridge failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EngineError> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    // Lemma data is resolved once, before any worker touches it
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let lemmas = Arc::new(runtime.block_on(LemmaStore::initialize(&config.lemma)));
    let engine = Arc::new(TermEngine::new(lemmas, config.engine_options()));
    let worker = Worker::spawn(Arc::clone(&engine))?;

    match cli.command {
        Command::Extract {
            glossary,
            input,
            out_prefix,
        } => {
            let glossary = Arc::new(Glossary::load(&glossary, config.header)?);
            let text = export::load_text(&input)?;
            print_warnings(&text.warnings);

            let id = worker.submit(JobKind::Extract {
                glossary,
                text: text.value,
            })?;
            let (output, warnings) = worker.wait_for(id, log_event)?;
            print_warnings(&warnings);

            let JobOutput::Extraction(result) = output else {
                return Err(EngineError::JobFailed("unexpected job output".into()));
            };
            print!("{}", export::render_plain_list(&result));

            let prefix = out_prefix.unwrap_or_else(|| default_prefix(&input));
            match export::export_extraction(&result, &prefix)? {
                Some(paths) => println!(
                    "{} terms written to {} and {}",
                    result.len(),
                    paths.list.display(),
                    paths.csv.display()
                ),
                None => println!("no glossary terms found"),
            }
        }
        Command::Attach {
            glossary,
            input,
            output,
            template,
        } => {
            let template = match template {
                Some(raw) => AttachTemplate::parse(&raw)?,
                None => config.template()?,
            };
            let glossary = Arc::new(Glossary::load(&glossary, config.header)?);
            let text = export::load_text(&input)?;
            print_warnings(&text.warnings);

            let id = worker.submit(JobKind::Attach {
                glossary,
                text: text.value,
                template,
            })?;
            let (job_output, warnings) = worker.wait_for(id, log_event)?;
            print_warnings(&warnings);

            let JobOutput::Attachment(attached) = job_output else {
                return Err(EngineError::JobFailed("unexpected job output".into()));
            };
            export::save_text(&output, &attached)?;
            println!("wrote {}", output.display());
        }
    }

    worker.shutdown();
    log_timings(&engine);
    Ok(())
}

fn log_timings(engine: &TermEngine) {
    let mut summary: Vec<_> = engine.metrics().summary().into_iter().collect();
    summary.sort_by(|a, b| a.0.cmp(&b.0));
    for (metric, s) in summary {
        debug!(
            metric = %metric,
            count = s.count,
            p50_us = s.p50_us,
            p95_us = s.p95_us,
            p99_us = s.p99_us,
            "timing summary"
        );
    }
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::Started { id } => info!(job = %id, "job started"),
        JobEvent::Progress { id, message } => info!(job = %id, "{message}"),
        _ => {}
    }
}

fn print_warnings(warnings: &[EngineWarning]) {
    for w in warnings {
        warn!(warning = %w, "engine warning");
        eprintln!("warning: {w}");
    }
}

fn default_prefix(input: &Path) -> PathBuf {
    input.with_extension("")
}
