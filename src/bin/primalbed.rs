use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use primalbed::{
    AltPolicy, MergePolicy, Mode, ParseOptions, Parsed, RemapOptions, Scheme, Severity, TableKind, Unmapped,
    ValidateOptions,
};

/// primalbed CLI
#[derive(Parser)]
#[command(name = "primalbed")]
#[command(version)]
#[command(about = "Validate, normalise and transform primer.bed schemes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How input files are read.
#[derive(Args, Clone, Debug)]
struct ParseArgs {
    /// Keep going past errors; unparseable lines and unpaired primers are reported, not fatal
    #[arg(long)]
    lenient: bool,
    /// Report amplicons whose primers overlap the insert as warnings instead of errors
    #[arg(long)]
    allow_short: bool,
    /// What to do with alternates sharing coordinates (accept, warn, reject)
    #[arg(long, default_value = "accept")]
    alt_policy: AltPolicy,
}

impl ParseArgs {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            mode: if self.lenient { Mode::Lenient } else { Mode::Strict },
            validate: ValidateOptions { allow_short_amplicons: self.allow_short, alt_policy: self.alt_policy },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more primer.bed files
    Validate {
        /// Input primer.bed files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        parse: ParseArgs,
        /// Write every finding to a JSON report
        #[arg(long)]
        json: Option<PathBuf>,
        /// Threads (default: all)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Rewrite a file in canonical order and naming
    Format {
        file: PathBuf,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Rename chromosomes and/or shift coordinates
    Remap {
        file: PathBuf,
        /// Two-column TSV: old name, new name
        #[arg(long)]
        map: Option<PathBuf>,
        /// Added to every start and end (may be negative)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
        /// Keep chromosomes missing from the map instead of failing
        #[arg(long)]
        identity: bool,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Renumber pools to 1..k
    RenumberPools {
        file: PathBuf,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Renumber amplicons 1..n in genomic order
    RenumberAmplicons {
        file: PathBuf,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Merge two schemes
    Merge {
        a: PathBuf,
        b: PathBuf,
        /// Collision handling (fail, offset, renumber)
        #[arg(long, default_value = "fail")]
        policy: MergePolicy,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Collapse alternate primers into one primer per amplicon side
    MergePrimers {
        file: PathBuf,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Rename primers to the numeric-suffix convention (or back with --v1)
    UpdateNames {
        file: PathBuf,
        /// Write `_alt` style names instead
        #[arg(long)]
        v1: bool,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Print one row per amplicon: chrom, start, end, name, pool
    Amplicons {
        file: PathBuf,
        /// Report the insert span instead of the full amplicon
        #[arg(long)]
        primertrim: bool,
        #[command(flatten)]
        parse: ParseArgs,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { files, parse, json, threads } => cmd_validate(&files, &parse, json.as_deref(), threads),

        Commands::Format { file, parse } => {
            let parsed = load(&file, &parse.options())?;
            emit(&parsed.scheme)
        }

        Commands::Remap { file, map, offset, identity, parse } => {
            let chroms = match &map {
                Some(p) => {
                    let f = File::open(p).with_context(|| format!("opening chromosome map {}", p.display()))?;
                    primalbed::read_chrom_map(f).with_context(|| format!("reading chromosome map {}", p.display()))?
                }
                None => Default::default(),
            };
            // Without a map every chromosome keeps its name.
            let unmapped = if identity || map.is_none() { Unmapped::Identity } else { Unmapped::Fail };
            let parsed = load(&file, &parse.options())?;
            let out = primalbed::remap(&parsed.scheme, &RemapOptions { chroms, offset, unmapped })
                .with_context(|| format!("remapping {}", file.display()))?;
            emit(&out)
        }

        Commands::RenumberPools { file, parse } => {
            let parsed = load(&file, &parse.options())?;
            let out = primalbed::renumber_pools(&parsed.scheme);
            for (pool, n) in primalbed::transform::pool_sizes(&out) {
                info!("pool {}: {} amplicons", pool, n);
            }
            emit(&out)
        }

        Commands::RenumberAmplicons { file, parse } => {
            let parsed = load(&file, &parse.options())?;
            let out = primalbed::renumber_amplicons(&parsed.scheme).with_context(|| format!("renumbering {}", file.display()))?;
            emit(&out)
        }

        Commands::Merge { a, b, policy, parse } => {
            let opts = parse.options();
            let left = load(&a, &opts)?;
            let right = load(&b, &opts)?;
            let out = primalbed::merge(&left.scheme, &right.scheme, policy)
                .with_context(|| format!("merging {} and {}", a.display(), b.display()))?;
            emit(&out)
        }

        Commands::MergePrimers { file, parse } => {
            let parsed = load(&file, &parse.options())?;
            let out = primalbed::merge_primers(&parsed.scheme).with_context(|| format!("merging primers of {}", file.display()))?;
            emit(&out)
        }

        Commands::UpdateNames { file, v1, parse } => {
            let parsed = load(&file, &parse.options())?;
            let out = if v1 {
                primalbed::downgrade_primernames(&parsed.scheme)
            } else {
                primalbed::update_primernames(&parsed.scheme)
            }
            .with_context(|| format!("renaming primers of {}", file.display()))?;
            emit(&out)
        }

        Commands::Amplicons { file, primertrim, parse } => {
            let parsed = load(&file, &parse.options())?;
            let kind = if primertrim { TableKind::Primertrim } else { TableKind::Amplicon };
            primalbed::write_amplicon_table(&parsed.scheme, kind, io::stdout().lock())
        }
    }
}

/// Read and parse one file, logging its findings.
fn load(path: &Path, opts: &ParseOptions) -> anyhow::Result<Parsed> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let parsed = primalbed::parse(&text, opts).with_context(|| format!("parsing {}", path.display()))?;
    log_findings(path, &parsed);
    Ok(parsed)
}

fn log_findings(path: &Path, parsed: &Parsed) {
    for f in &parsed.findings {
        match f.severity {
            Severity::Error => error!("{}: {}", path.display(), f.message),
            Severity::Warning => warn!("{}: {}", path.display(), f.message),
        }
    }
}

fn emit(scheme: &Scheme) -> anyhow::Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    out.write_all(primalbed::serialize(scheme).as_bytes())?;
    out.flush()?;
    Ok(())
}

fn cmd_validate(files: &[PathBuf], args: &ParseArgs, json: Option<&Path>, threads: Option<usize>) -> anyhow::Result<()> {
    // Always collect everything; --lenient only decides the exit status.
    let opts = args.options();

    let n = threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = ThreadPoolBuilder::new().num_threads(n).build()?;
    let results: Vec<(&PathBuf, anyhow::Result<Parsed>)> = pool.install(|| {
        files
            .par_iter()
            .map(|f| {
                let parsed = std::fs::read_to_string(f)
                    .with_context(|| format!("reading {}", f.display()))
                    .map(|text| primalbed::parse_lenient(&text, &opts));
                (f, parsed)
            })
            .collect()
    });

    let mut failed = 0usize;
    let mut report = Vec::new();
    for (file, res) in results {
        let parsed = match res {
            Ok(p) => p,
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
                report.push(serde_json::json!({ "file": file.display().to_string(), "valid": false, "error": format!("{:#}", e) }));
                continue;
            }
        };
        log_findings(file, &parsed);
        let errors = parsed.errors().count();
        let warnings = parsed.findings.len() - errors;
        if errors > 0 {
            failed += 1;
        }
        println!(
            "{}\t{}\tamplicons={}\tpools={}\terrors={}\twarnings={}",
            file.display(),
            if errors == 0 { "OK" } else { "FAIL" },
            parsed.scheme.amplicons().len(),
            parsed.scheme.pool_count(),
            errors,
            warnings
        );
        report.push(serde_json::json!({
            "file": file.display().to_string(),
            "valid": errors == 0,
            "amplicons": parsed.scheme.amplicons().len(),
            "pools": parsed.scheme.pool_count(),
            "headers": parsed.scheme.header_map(),
            "findings": parsed.findings,
        }));
    }

    if let Some(path) = json {
        let mut f = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
        serde_json::to_writer_pretty(&mut f, &report)?;
        f.flush()?;
        info!("wrote report to {}", path.display());
    }

    if failed > 0 && !args.lenient {
        bail!("{} of {} file(s) failed validation", failed, files.len());
    }
    Ok(())
}
