//! svanno: streaming structural-variant annotation
//!
//! Usage: svanno <COMMAND> [OPTIONS]

use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::io;
use std::path::PathBuf;
use std::process;

use svanno::commands::{
    ConsequenceCommand, CopyFields, Features, FilterCommand, MatchCommand, Predicate,
    ZygosityCommand,
};
use svanno::error::{Result, SvError};
use svanno::order::ContigOrder;
use svanno::vcf::SvType;

#[derive(Parser)]
#[command(name = "svanno")]
#[command(version)]
#[command(about = "svanno: streaming structural-variant matching and annotation", long_about = None)]
struct Cli {
    /// Genome file (name<TAB>length, e.g. a .fai) defining chromosome order.
    /// Defaults to the VCF ##contig lines, then chromosome name order.
    #[arg(short = 'g', long, global = true)]
    genome: Option<PathBuf>,

    /// Use strict half-open semantics for zero-length variants. By default
    /// breakends are widened to 1bp so they can overlap features.
    #[arg(long, global = true)]
    strict_intervals: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep variants passing a set of predicates
    Filter {
        /// Input VCF file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Require FILTER to be PASS or missing
        #[arg(long)]
        pass_only: bool,

        /// Keep only these SVTYPE values, matched exactly (repeatable)
        #[arg(long = "svtype")]
        svtypes: Vec<String>,

        /// Minimum SV length (variants without a length fail)
        #[arg(long)]
        min_len: Option<u64>,

        /// Maximum SV length (variants without a length fail)
        #[arg(long)]
        max_len: Option<u64>,

        /// Keep only these chromosomes (repeatable)
        #[arg(long = "chrom")]
        chroms: Vec<String>,

        /// Require this INFO key (repeatable)
        #[arg(long = "has-info")]
        has_info: Vec<String>,

        /// Keep variants matching any predicate instead of all
        #[arg(long)]
        any: bool,

        /// Keep variants that fail the predicates
        #[arg(long)]
        invert: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Match variants in A against the most similar nearby variant in B
    Match {
        /// Query VCF file A (use - for stdin)
        #[arg(short = 'a', long)]
        file_a: PathBuf,

        /// Target VCF file B (use - for stdin)
        #[arg(short = 'b', long)]
        file_b: PathBuf,

        /// Maximum start distance between matched variants
        #[arg(long, default_value = "100")]
        max_pos_diff: u64,

        /// Maximum length difference between matched variants
        #[arg(long, default_value = "100")]
        max_len_diff: u64,

        /// INFO fields to copy from the best match (comma-separated, * for all).
        /// When given, every query is written.
        #[arg(long)]
        fields: Option<String>,

        /// Write queries without a match instead of those with one
        #[arg(long)]
        invert: bool,

        /// A is not sorted; load and sort it in memory
        #[arg(long)]
        unsorted_a: bool,

        /// B is not sorted; load and sort it in memory
        #[arg(long)]
        unsorted_b: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Annotate local consequences on genes or regulatory elements
    Consequence {
        /// Input VCF file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// GFF3 gene models
        #[arg(long)]
        genes: PathBuf,

        /// GFF3 promoters and enhancers; switches to regulatory annotation
        #[arg(long)]
        regulatory: Option<PathBuf>,

        /// INFO field receiving the consequences
        #[arg(long, default_value = "SVCSQ")]
        field: String,

        /// Drop variants without a consequence
        #[arg(long)]
        require_csq: bool,

        /// Input is not sorted; load and sort it in memory
        #[arg(long)]
        unsorted: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Tag variants with heterozygous and homozygous carrier samples
    Tagzygosity {
        /// Input VCF file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// INFO field listing heterozygous alternate samples
        #[arg(long, default_value = "HET_SAMPLES")]
        het_field: String,

        /// INFO field listing homozygous alternate samples
        #[arg(long, default_value = "HOMALT_SAMPLES")]
        homalt_field: String,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Must be set before any annotation runs
    if cli.strict_intervals {
        svanno::config::set_strict_intervals(true);
    }

    let result = load_contig_order(cli.genome).and_then(|order| match cli.command {
        Commands::Filter {
            input,
            pass_only,
            svtypes,
            min_len,
            max_len,
            chroms,
            has_info,
            any,
            invert,
            stats,
        } => run_filter(
            input, pass_only, svtypes, min_len, max_len, chroms, has_info, any, invert, stats,
        ),

        Commands::Match {
            file_a,
            file_b,
            max_pos_diff,
            max_len_diff,
            fields,
            invert,
            unsorted_a,
            unsorted_b,
            stats,
        } => {
            let mut cmd = MatchCommand::new()
                .with_max_pos_diff(max_pos_diff)
                .with_max_len_diff(max_len_diff)
                .with_invert(invert)
                .with_unsorted(unsorted_a, unsorted_b);
            if let Some(fields) = fields {
                cmd = cmd.with_fields(CopyFields::parse(&fields));
            }
            if let Some(order) = order {
                cmd = cmd.with_contig_order(order);
            }
            run_match(cmd, file_a, file_b, stats)
        }

        Commands::Consequence {
            input,
            genes,
            regulatory,
            field,
            require_csq,
            unsorted,
            stats,
        } => {
            let mut cmd = ConsequenceCommand::new()
                .with_field(field)
                .with_require_csq(require_csq)
                .with_unsorted(unsorted);
            if let Some(order) = order {
                cmd = cmd.with_contig_order(order);
            }
            run_consequence(cmd, input, genes, regulatory, stats)
        }

        Commands::Tagzygosity {
            input,
            het_field,
            homalt_field,
            stats,
        } => run_tagzygosity(input, het_field, homalt_field, stats),
    });

    if let Err(e) = result {
        // Downstream closed the pipe (e.g. `| head`)
        if e.is_broken_pipe() {
            process::exit(0);
        }
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_contig_order(genome: Option<PathBuf>) -> Result<Option<ContigOrder>> {
    let Some(path) = genome else {
        return Ok(None);
    };
    let order = ContigOrder::from_file(&path).map_err(|e| {
        SvError::InvalidFormat(format!(
            "Failed to load genome file {}: {}",
            path.display(),
            e
        ))
    })?;
    info!("Loaded {} contigs from {}", order.len(), path.display());
    Ok(Some(order))
}

#[allow(clippy::too_many_arguments)]
fn run_filter(
    input: PathBuf,
    pass_only: bool,
    svtypes: Vec<String>,
    min_len: Option<u64>,
    max_len: Option<u64>,
    chroms: Vec<String>,
    has_info: Vec<String>,
    any: bool,
    invert: bool,
    stats: bool,
) -> Result<()> {
    let mut cmd = FilterCommand::new().with_any(any).with_invert(invert);
    if pass_only {
        cmd = cmd.with_predicate(Predicate::Pass);
    }
    if !svtypes.is_empty() {
        let types = svtypes.iter().map(|t| SvType::parse(t)).collect();
        cmd = cmd.with_predicate(Predicate::SvType(types));
    }
    if let Some(min) = min_len {
        cmd = cmd.with_predicate(Predicate::MinLength(min));
    }
    if let Some(max) = max_len {
        cmd = cmd.with_predicate(Predicate::MaxLength(max));
    }
    if !chroms.is_empty() {
        cmd = cmd.with_predicate(Predicate::Chrom(chroms));
    }
    for key in has_info {
        cmd = cmd.with_predicate(Predicate::HasInfo(key));
    }

    let stdout = io::stdout();
    let handle = stdout.lock();
    let result = cmd.run(&input, handle)?;

    if stats {
        eprintln!("Filter stats: {}", result);
    }
    Ok(())
}

fn run_match(cmd: MatchCommand, file_a: PathBuf, file_b: PathBuf, stats: bool) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let result = cmd.run(&file_a, &file_b, handle)?;

    if stats {
        eprintln!("Match stats: {}", result);
    }
    Ok(())
}

fn run_consequence(
    cmd: ConsequenceCommand,
    input: PathBuf,
    genes: PathBuf,
    regulatory: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    if input.to_string_lossy() == "-"
        && (genes.to_string_lossy() == "-"
            || regulatory.as_ref().is_some_and(|r| r.to_string_lossy() == "-"))
    {
        return Err(SvError::InvalidArgument(
            "Only one input can read from stdin".to_string(),
        ));
    }
    let features = Features::load(genes, regulatory)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    let result = cmd.run(&input, features, handle)?;

    if stats {
        eprintln!("Consequence stats: {}", result);
    }
    Ok(())
}

fn run_tagzygosity(
    input: PathBuf,
    het_field: String,
    homalt_field: String,
    stats: bool,
) -> Result<()> {
    let cmd = ZygosityCommand::new()
        .with_het_field(het_field)
        .with_homalt_field(homalt_field);

    let stdout = io::stdout();
    let handle = stdout.lock();
    let result = cmd.run(&input, handle)?;

    if stats {
        eprintln!("Tagzygosity stats: {}", result);
    }
    Ok(())
}
