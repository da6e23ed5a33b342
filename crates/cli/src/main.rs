//! CLI tool for normalizing the turn structure of role-play JSONL datasets.
//!
//! This tool reads a JSONL file (or a directory of them), repairs each
//! record's conversation and writes the result with every other field and
//! every unparseable line left as it was.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::debug;

use turn_normalizer_core::{
    init_logging, process_path, Mode, NormalizerConfig, PipelineConfig, Report, RoleVocabulary,
    BARE_LABEL_WORD_LIMIT, DEFAULT_BATCH_SIZE, EXCERPT_LEN,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Every stage
    Full,
    /// Split and reconcile only
    Simple,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => Mode::Full,
            ModeArg::Simple => Mode::Simple,
        }
    }
}

/// Repair turn structure in role-play conversation JSONL.
#[derive(Parser, Debug)]
#[command(name = "turn-normalize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input JSONL file, or a directory searched for *.jsonl
    #[arg(long)]
    input: PathBuf,

    /// Output file (or directory, for directory input)
    #[arg(long)]
    output: PathBuf,

    /// Which stages to run
    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    mode: ModeArg,

    /// Normalize records in parallel batches
    #[arg(long)]
    parallel: bool,

    /// Records per parallel batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Record field holding the turn list
    #[arg(long, default_value = "conversations")]
    conversation_key: String,

    /// Turn field holding the role
    #[arg(long, default_value = "from")]
    role_key: String,

    /// Turn field holding the text
    #[arg(long, default_value = "value")]
    text_key: String,

    /// Role name of the human participant
    #[arg(long, default_value = "human")]
    human_role: String,

    /// Role name of the narrator
    #[arg(long, default_value = "gpt")]
    narrator_role: String,

    /// Role name of a leading preamble turn that is left untouched
    #[arg(long, default_value = "system")]
    system_role: String,

    /// Colon-terminated texts with fewer words than this are dropped
    #[arg(long, default_value_t = BARE_LABEL_WORD_LIMIT)]
    bare_label_words: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write run configuration and counts to this JSON file
    #[arg(long)]
    metadata: Option<PathBuf>,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            normalizer: NormalizerConfig {
                mode: self.mode.into(),
                bare_label_word_limit: self.bare_label_words,
                excerpt_len: EXCERPT_LEN,
                vocabulary: RoleVocabulary {
                    conversation_key: self.conversation_key.clone(),
                    role_key: self.role_key.clone(),
                    text_key: self.text_key.clone(),
                    human_role: self.human_role.clone(),
                    narrator_role: self.narrator_role.clone(),
                    system_role: self.system_role.clone(),
                },
            },
            parallel: self.parallel,
            batch_size: self.batch_size,
        }
    }
}

fn metadata(args: &Args, config: &PipelineConfig, report: &Report) -> serde_json::Value {
    serde_json::json!({
        "config": {
            "input": args.input.to_string_lossy(),
            "output": args.output.to_string_lossy(),
            "pipeline": config,
        },
        "counts": {
            "files": report.files,
            "records_read": report.records_read,
            "records_fixed": report.records_fixed,
            "passed_through": report.passed_through,
            "warnings": report.warnings,
        },
        "fixes": {
            "total": report.total_fixes,
            "breakdown": report.breakdown,
        },
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = args.pipeline_config();
    debug!(?config, "Pipeline configuration");

    println!("Normalizing {:?}...", args.input);
    let report = process_path(&args.input, &args.output, &config)?;

    if let Some(path) = &args.metadata {
        let metadata = metadata(&args, &config, &report);
        std::fs::write(path, serde_json::to_string_pretty(&metadata)?)?;
    }

    println!("\n[summary]");
    println!("  Records read: {}", report.records_read);
    println!("  Records fixed: {}", report.records_fixed);
    println!("  Total fixes: {}", report.total_fixes);
    println!("  Warnings: {}", report.warnings);
    println!("  Output: {:?}", args.output);
    if let Some(path) = &args.metadata {
        println!("  Metadata: {:?}", path);
    }

    Ok(())
}
