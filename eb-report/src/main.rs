mod archive;
mod reports;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use archive::ArchiveSource;
use eb_telemetry::{LabelTable, LevelCatalog, TelemetryEngine};
use summary::ReportSummary;

#[derive(Debug, Parser)]
#[command(name = "eb-report", version = "0.1.0")]
#[command(about = "Reconstruct deaths and attempts from archived EngagementBaiting captures")]
struct Args {
    /// Archive root; every sub-folder is one capture session
    #[arg(long, default_value = "./Logs/Archived")]
    archive: PathBuf,

    /// Level catalog JSON (defaults to the built-in catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// JSON object mapping death-screen messages to sentiment labels
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Include attempt trajectories and death scatters (json only)
    #[arg(long)]
    include_paths: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    if args.output.is_some() {
        colored::control::set_override(false);
    }

    announce_banner();

    let catalog = load_catalog(args.catalog.as_deref())?;
    let mut engine = TelemetryEngine::new(catalog, ArchiveSource::new(&args.archive));
    if let Some(path) = args.labels.as_deref() {
        engine = engine.with_classifier(load_labels(path)?);
    }

    let players = engine
        .load_all()
        .with_context(|| format!("failed to load archive {}", args.archive.display()))?;
    eprintln!(
        "📂 Loaded {} sessions from {}",
        players.len().to_string().green(),
        engine.source().root().display()
    );

    let summary = ReportSummary::build(&engine.aggregator(&players), args.include_paths);
    write_reports(&args, &summary)
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    eprintln!("{}", "🍓 EngagementBaiting Report".bright_cyan().bold());
    eprintln!("{}", "===========================".cyan());
}

fn load_catalog(path: Option<&Path>) -> Result<LevelCatalog> {
    let Some(path) = path else {
        return LevelCatalog::builtin().context("built-in catalog is invalid");
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    LevelCatalog::from_json(&json)
        .with_context(|| format!("invalid catalog {}", path.display()))
}

fn load_labels(path: &Path) -> Result<LabelTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels {}", path.display()))?;
    let table = LabelTable::from_json(&json)
        .with_context(|| format!("invalid labels {}", path.display()))?;
    log::info!("loaded {} sentiment labels from {}", table.len(), path.display());
    Ok(table)
}

fn write_reports(args: &Args, summary: &ReportSummary) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(output_target.writer(), summary)?,
        "markdown" => reports::generate_markdown_report(output_target.writer(), summary)?,
        "csv" => reports::generate_csv_report(output_target.writer(), summary)?,
        _ => {
            if summary.players == 0 {
                writeln!(&mut output_target, "No sessions found.")?;
            } else {
                reports::generate_console_report(output_target.writer(), summary)?;
            }
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_telemetry::{Aggregator, PlayerDataset};

    fn base_args() -> Args {
        Args {
            archive: PathBuf::from("./Logs/Archived"),
            catalog: None,
            labels: None,
            report: "json".to_string(),
            output: None,
            include_paths: false,
            verbose: false,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "eb-report-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn sample_summary(players: &[PlayerDataset]) -> ReportSummary {
        let catalog = LevelCatalog::builtin().unwrap();
        ReportSummary::build(&Aggregator::new(&catalog, players), false)
    }

    #[test]
    fn write_reports_handles_every_format() {
        let players = vec![PlayerDataset::new("p1").with_log_fragments([
            "Entering screen \"FinalRoom\"\nShowing NEGATIVE death screen message \"x\"\nThe player died at {X:1 Y:2}\n",
        ])];
        let summary = sample_summary(&players);
        for format in ["json", "markdown", "csv", "console"] {
            let path = temp_path(format);
            let mut args = base_args();
            args.report = format.to_string();
            args.output = Some(path.clone());
            write_reports(&args, &summary).unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("FinalRoom"), "{format} output missing room");
            std::fs::remove_file(path).ok();
        }
    }

    #[test]
    fn console_report_notes_empty_archive() {
        let summary = sample_summary(&[]);
        let path = temp_path("empty");
        let mut args = base_args();
        args.report = "console".to_string();
        args.output = Some(path.clone());
        write_reports(&args, &summary).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("No sessions found."));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn catalog_and_labels_load_from_files() {
        let catalog_path = temp_path("catalog");
        std::fs::write(
            &catalog_path,
            r#"{ "default_level": "Only", "levels": [ { "name": "Only", "image": "o.png", "rooms": ["r"] } ] }"#,
        )
        .unwrap();
        let catalog = load_catalog(Some(catalog_path.as_path())).unwrap();
        assert_eq!(catalog.default_level().name, "Only");
        assert_eq!(load_catalog(None).unwrap().levels().len(), 2);

        let labels_path = temp_path("labels");
        std::fs::write(&labels_path, r#"{ "x": "POSITIVE" }"#).unwrap();
        assert_eq!(load_labels(&labels_path).unwrap().len(), 1);

        std::fs::write(&labels_path, "not json").unwrap();
        let err = load_labels(&labels_path).unwrap_err();
        assert!(err.to_string().contains("invalid labels"));

        std::fs::remove_file(catalog_path).ok();
        std::fs::remove_file(labels_path).ok();
    }

    #[test]
    fn output_target_writes_to_file() {
        let path = temp_path("target");
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target, "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        std::fs::remove_file(path).ok();
    }
}
