use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bwt_backtrack::align::{
    AlignConfig, AlignResult, Aligner, BacktrackLimits, ReadInput, Selection, BACKTRACK_ITER_THRESHOLD,
    BACKTRACK_THRESHOLD, DEFAULT_MAX_STEPS,
};
use bwt_backtrack::align::backtrack::{LOOKBACK_WINDOW, READ_QUALITY_CUTOFF};
use bwt_backtrack::index::{FmIndex, IndexMeta};
use bwt_backtrack::io::{fasta, fastq};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "bwt-backtrack",
    author,
    version,
    about = "FM-index short-read aligner with quality-guided backtracking",
    arg_required_else_help = true
)]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the FM index artifacts of a reference
    Index {
        /// Reference FASTA file (records are concatenated)
        reference: PathBuf,
        /// Output directory for the index artifacts
        #[arg(short, long, default_value = "ref.idx")]
        output: PathBuf,
        /// Checkpoint spacing of the tally table
        #[arg(long, default_value_t = 32)]
        checkpoint: u8,
        /// Suffix-array sample spacing
        #[arg(long, default_value_t = 16)]
        sample: u8,
    },
    /// Align reads (FASTQ) against an index directory
    Align {
        /// Index directory written by `index`
        #[arg(short = 'i', long = "index")]
        index: PathBuf,
        /// Reads FASTQ file (Phred+33)
        reads: PathBuf,
        /// Report path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Backtrack events allowed per read
        #[arg(long = "backtrack-limit", default_value_t = BACKTRACK_THRESHOLD)]
        backtrack_limit: usize,
        /// Backtrack attempts allowed from one failing position
        #[arg(long = "position-limit", default_value_t = BACKTRACK_ITER_THRESHOLD)]
        position_limit: usize,
        /// Look-back window for backtrack candidates
        #[arg(long, default_value_t = LOOKBACK_WINDOW)]
        window: usize,
        /// Quality at or below which a candidate is taken immediately
        #[arg(long = "quality-cutoff", default_value_t = READ_QUALITY_CUTOFF)]
        quality_cutoff: u8,
        /// Extension steps allowed per read (0 = unlimited)
        #[arg(long = "max-steps", default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: usize,
        /// Seed for substitute-base selection (random per run if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Try substitute bases in fixed A, C, G, T order
        #[arg(long, conflicts_with = "seed")]
        ordered: bool,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        /// Reads aligned per parallel batch
        #[arg(long = "batch-size", default_value_t = 10_000)]
        batch_size: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Index { reference, output, checkpoint, sample } => run_index(&reference, &output, checkpoint, sample),
        Commands::Align {
            index,
            reads,
            out,
            backtrack_limit,
            position_limit,
            window,
            quality_cutoff,
            max_steps,
            seed,
            ordered,
            threads,
            batch_size,
        } => {
            let selection = match (ordered, seed) {
                (true, _) => Selection::Ordered,
                (false, Some(s)) => Selection::Seeded(s),
                (false, None) => Selection::Random,
            };
            let config = AlignConfig {
                backtrack_threshold: backtrack_limit,
                limits: BacktrackLimits { per_position: position_limit, window, quality_cutoff },
                max_steps: (max_steps > 0).then_some(max_steps),
                selection,
            };
            run_align(&index, &reads, out.as_deref(), config, threads, batch_size.max(1))
        }
    }
}

fn run_index(reference: &Path, output: &Path, checkpoint: u8, sample: u8) -> Result<()> {
    let refseq = fasta::load_reference(reference)?;
    log::info!("reference: {}", reference.display());
    log::info!("sequences: {}", refseq.names.len());
    log::info!("total_len: {}", refseq.seq.len());

    let started = Instant::now();
    let mut fm = FmIndex::build(&refseq.seq, checkpoint, sample)
        .with_context(|| format!("cannot build index of '{}'", reference.display()))?;
    fm.set_meta(IndexMeta {
        reference_file: Some(reference.display().to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });
    fm.save_to_dir(output)
        .with_context(|| format!("cannot write index to '{}'", output.display()))?;
    log::info!("index saved to {} in {:.2?}", output.display(), started.elapsed());
    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    matched: usize,
    no_match: usize,
    internal: usize,
    invalid: usize,
}

fn run_align(
    index_path: &Path,
    reads_path: &Path,
    out_path: Option<&Path>,
    config: AlignConfig,
    threads: usize,
    batch_size: usize,
) -> Result<()> {
    let aligner = Aligner::load(index_path, config)
        .with_context(|| format!("cannot load index '{}'", index_path.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("cannot build thread pool")?;

    let fq = std::fs::File::open(reads_path)
        .with_context(|| format!("cannot open reads FASTQ '{}'", reads_path.display()))?;
    let mut reader = fastq::FastqReader::new(std::io::BufReader::new(fq));

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create '{}'", p.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let started = Instant::now();
    let mut tally = Tally::default();
    let mut batch: Vec<ReadInput> = Vec::with_capacity(batch_size);
    loop {
        let rec = reader.next_record()?;
        let eof = rec.is_none();
        if let Some(rec) = rec {
            match rec.phred() {
                Ok(qual) => batch.push(ReadInput { id: rec.id, seq: rec.seq, qual }),
                Err(e) => {
                    log::warn!("skipping read '{}': {}", rec.id, e);
                    writeln!(out, "{}\tINVALID\t{}", rec.id, e)?;
                    tally.invalid += 1;
                }
            }
        }
        if batch.len() >= batch_size || (eof && !batch.is_empty()) {
            let results = pool.install(|| aligner.align_batch(&batch));
            for (read, res) in batch.iter().zip(results) {
                report(&mut out, &mut tally, read, res)?;
            }
            batch.clear();
        }
        if eof {
            break;
        }
    }
    out.flush()?;

    log::info!(
        "{} matched, {} unmatched, {} internal errors, {} invalid in {:.2?}",
        tally.matched,
        tally.no_match,
        tally.internal,
        tally.invalid,
        started.elapsed()
    );
    Ok(())
}

fn report(
    out: &mut dyn Write,
    tally: &mut Tally,
    read: &ReadInput,
    res: Result<AlignResult, bwt_backtrack::align::ReadError>,
) -> Result<()> {
    match res {
        Ok(AlignResult::Matched { matched, positions }) => {
            tally.matched += 1;
            let pos: Vec<String> = positions.iter().map(u32::to_string).collect();
            writeln!(out, "{}\tMATCHED\t{}\t{}", read.id, matched, pos.join(","))?;
        }
        Ok(AlignResult::NoMatch(reason)) => {
            tally.no_match += 1;
            writeln!(out, "{}\tNO_MATCH\t{}", read.id, reason)?;
        }
        Ok(AlignResult::InternalError(msg)) => {
            tally.internal += 1;
            log::error!("read '{}': internal error: {}", read.id, msg);
            writeln!(out, "{}\tINTERNAL_ERROR\t{}", read.id, msg)?;
        }
        Err(e) => {
            tally.invalid += 1;
            log::warn!("skipping read '{}': {}", read.id, e);
            writeln!(out, "{}\tINVALID\t{}", read.id, e)?;
        }
    }
    Ok(())
}
