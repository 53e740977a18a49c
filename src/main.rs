use anyhow::Result;
use clap::{Parser, Subcommand};
use recite::config::Config;
use recite::model::{NoteStatus, RunReport};
use recite::pipeline::Processor;
use recite::resolver::Resolver;
use recite::style::STYLE_NAMES;
use recite::ui::StatusUI;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recite")]
#[command(about = "Rewrite raw citations in Word documents into a chosen citation style")]
#[command(
    long_about = "Takes a .docx whose endnotes or footnotes hold raw, free-form citations and rewrites every note in a chosen style, applying ibid and short-form logic across the sequence and turning URLs into clickable hyperlinks.\n\nIn author-date mode it instead scans the body for (Author, Year) citations and builds a formatted References section at the end of the document."
)]
#[command(after_help = "Examples:
  recite notes thesis.docx
  recite notes thesis.docx --style \"Chicago Manual of Style\" -o out.docx
  recite references paper.docx --style \"APA (7th ed.)\"
  recite extract paper.docx
  recite styles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        about = "Rewrite every endnote and footnote into a citation style",
        long_about = "Resolve each raw note against the bibliographic providers, then rewrite the notes in document order: full citation on first appearance, short form on a repeat, ibid when a note repeats its predecessor. Failed notes keep their original text."
    )]
    Notes {
        /// Input .docx file
        input: PathBuf,
        /// Output path; defaults to <input>_recite.docx
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Citation style name (see `recite styles`)
        #[arg(long)]
        style: Option<String>,
    },

    #[command(
        about = "Build a References section from in-text author-date citations",
        long_about = "Scan the body for (Author, Year) citations, look each unique citation up, and splice a formatted, alphabetized reference list at the end of the document, replacing an existing References section when one exists."
    )]
    References {
        /// Input .docx file
        input: PathBuf,
        /// Output path; defaults to <input>_recite.docx
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Citation style name (see `recite styles`)
        #[arg(long)]
        style: Option<String>,
    },

    #[command(about = "Preview the in-text citations a document contains, without lookups")]
    Extract {
        /// Input .docx file
        input: PathBuf,
    },

    #[command(about = "List the registered citation styles")]
    Styles,

    #[command(about = "Write a config file with the default settings")]
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        Config::init()?;
        return Ok(());
    }
    let cfg = Config::load()?;

    match cli.command {
        Commands::Notes {
            input,
            output,
            style,
        } => {
            let style = style.unwrap_or_else(|| cfg.styles.notes.clone());
            let processor = build_processor(&cfg);
            let bytes = fs::read(&input)?;
            let (out, report) = processor.rewrite_notes(&bytes, &style).await;
            write_output(&input, output, &out)?;
            print_note_report(&report);
        }
        Commands::References {
            input,
            output,
            style,
        } => {
            let style = style.unwrap_or_else(|| cfg.styles.references.clone());
            let processor = build_processor(&cfg);
            let bytes = fs::read(&input)?;
            let (out, report) = processor.build_references(&bytes, &style).await;
            write_output(&input, output, &out)?;
            print_reference_report(&report);
        }
        Commands::Extract { input } => {
            let processor = build_processor(&cfg);
            let bytes = fs::read(&input)?;
            let citations = processor.extract_citations(&bytes)?;
            if citations.is_empty() {
                StatusUI::warning("No author-date citations found");
            }
            for citation in citations {
                let second = citation
                    .second_author
                    .as_deref()
                    .map(|s| format!(" & {}", s))
                    .unwrap_or_default();
                let et_al = if citation.et_al { " et al." } else { "" };
                println!("{}{}{} ({})", citation.author, second, et_al, citation.year);
            }
        }
        Commands::Styles => {
            for name in STYLE_NAMES {
                println!("{}", name);
            }
        }
        Commands::Config => unreachable!(),
    }

    Ok(())
}

fn build_processor(cfg: &Config) -> Processor {
    let resolver = Resolver::with_default_providers(cfg.resolver_settings());
    Processor::new(resolver, cfg.pipeline.note_workers)
}

fn write_output(input: &PathBuf, output: Option<PathBuf>, bytes: &[u8]) -> Result<()> {
    let path = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        input.with_file_name(format!("{}_recite.docx", stem))
    });
    fs::write(&path, bytes)?;
    StatusUI::success(&format!("Saved: {}", path.display()));
    Ok(())
}

fn print_note_report(report: &RunReport) {
    StatusUI::info(&format!(
        "Rewrote {}/{} notes",
        report.rewritten_count(),
        report.notes.len()
    ));
    if report.hyperlinks_added > 0 {
        StatusUI::info(&format!("Activated {} hyperlinks", report.hyperlinks_added));
    }
    for note in &report.notes {
        match &note.status {
            NoteStatus::Rewritten(_) => {}
            NoteStatus::ResolutionMiss => StatusUI::warning(&format!(
                "note {}: no match found, kept original text",
                note.note_id
            )),
            NoteStatus::IbidWithoutPrecedent => StatusUI::warning(&format!(
                "note {}: ibid without a preceding citation",
                note.note_id
            )),
            NoteStatus::WriteFailed(err) => {
                StatusUI::warning(&format!("note {}: write failed: {}", note.note_id, err))
            }
        }
    }
    for err in &report.errors {
        StatusUI::error(err);
    }
}

fn print_reference_report(report: &RunReport) {
    let found = report.references.iter().filter(|r| r.found).count();
    StatusUI::info(&format!(
        "Resolved {}/{} citations",
        found,
        report.references.len()
    ));
    for reference in report.references.iter().filter(|r| !r.found) {
        StatusUI::warning(&format!(
            "not found: {}, {}",
            reference.citation.author, reference.citation.year
        ));
    }
    for err in &report.errors {
        StatusUI::error(err);
    }
}
