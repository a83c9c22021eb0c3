//! Command-line surface (ambient layer; §6 of SPEC_FULL.md).
//!
//! Grounded on the teacher's `cli.rs`: a `clap::Parser` wrapping a
//! `Subcommand` enum, one variant per operation, with a `read_params`/`run`
//! split so the binary stays a thin driver.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};

use clap::{crate_version, Parser, Subcommand};

use crate::error::UntangleError;
use crate::graph::memgraph::MemGraph;
use crate::graph::{HandleGraph, PathHandle, PathHandleGraph};
use crate::unitig::{self, UnitigConfig};
use crate::untangle::{self, UntangleConfig};

#[derive(Parser, Debug)]
#[clap(
    version = crate_version!(),
    author = "Erik Garrison <erik.garrison@gmail.com>",
    about = "Untangle nonlinear path relationships in pangenome variation graphs"
)]
struct Command {
    #[clap(subcommand)]
    cmd: Params,
}

#[derive(Subcommand, Debug)]
pub enum Params {
    #[clap(about = "Project query paths onto target paths as ranked, interval-level mappings")]
    Untangle {
        #[clap(index = 1, help = "graph in GFA1 format", required = true)]
        gfa_file: String,

        #[clap(long, help = "query path name (repeatable)")]
        query_path: Vec<String>,

        #[clap(long, help = "file of query path names, one per line")]
        query_paths_file: Option<String>,

        #[clap(long, help = "target path name (repeatable)")]
        target_path: Vec<String>,

        #[clap(long, help = "file of target path names, one per line")]
        target_paths_file: Option<String>,

        #[clap(long = "self", help = "use the query path set as the target path set too")]
        self_: bool,

        #[clap(
            long,
            default_value_t = 0,
            help = "minimum distance (bp) between adjacent cuts; closer cuts are merged"
        )]
        merge_dist: u64,

        #[clap(
            long,
            default_value_t = 1,
            help = "maximum ranked mappings emitted per query segment"
        )]
        n_best: u32,

        #[clap(long, default_value_t = 0.0, help = "minimum Jaccard score to emit")]
        min_jaccard: f64,

        #[clap(long, help = "emit PAF-like records instead of BEDPE")]
        paf: bool,

        #[clap(short, long, default_value_t = 1, help = "run in parallel on N threads")]
        threads: usize,
    },

    #[clap(about = "Emit the unitigs of the graph as FASTA or FASTQ")]
    Unitig {
        #[clap(index = 1, help = "graph in GFA1 format", required = true)]
        gfa_file: String,

        #[clap(
            long,
            default_value_t = 0,
            help = "extend unitigs by random walk until at least this length (bp)"
        )]
        unitig_to: u64,

        #[clap(
            long,
            default_value_t = 0,
            help = "extend unitigs by random walk this far past their natural end, per side (bp)"
        )]
        unitig_plus: u64,

        #[clap(long, help = "emit FASTQ with a constant quality line instead of FASTA")]
        fake_fastq: bool,
    },
}

pub fn read_params() -> Params {
    Command::parse().cmd
}

fn read_path_names_file(path: &str) -> Result<Vec<String>, UntangleError> {
    let file = fs::File::open(path)?;
    BufReader::new(file)
        .lines()
        .map(|line| line.map_err(UntangleError::from))
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .collect()
}

/// Resolves a set of path names (given directly and/or via a list file) to
/// path handles, failing the whole run on the first unknown name (§7 Input
/// violation).
fn resolve_paths(
    graph: &MemGraph,
    names: &[String],
    names_file: &Option<String>,
) -> Result<Vec<PathHandle>, UntangleError> {
    let mut all_names: Vec<String> = names.to_vec();
    if let Some(path) = names_file {
        all_names.extend(read_path_names_file(path)?);
    }
    let mut paths = Vec::with_capacity(all_names.len());
    for name in &all_names {
        match graph.get_path_handle(name) {
            Some(p) => paths.push(p),
            None => return Err(UntangleError::UnknownPath(name.clone())),
        }
    }
    Ok(paths)
}

fn set_up_threads(threads: usize) {
    if threads > 0 {
        log::info!("running on {} threads", threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    } else {
        log::info!("running using all available CPUs");
    }
}

pub fn run(params: Params) -> Result<(), UntangleError> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match params {
        Params::Untangle {
            gfa_file,
            query_path,
            query_paths_file,
            target_path,
            target_paths_file,
            self_,
            merge_dist,
            n_best,
            min_jaccard,
            paf,
            threads,
        } => {
            set_up_threads(threads);
            log::info!("loading graph from {}", gfa_file);
            let graph = MemGraph::from_path(&gfa_file)?;
            log::info!(
                "..done; found {} nodes",
                graph.get_node_count()
            );

            let queries = resolve_paths(&graph, &query_path, &query_paths_file)?;
            let targets = if self_ {
                queries.clone()
            } else {
                resolve_paths(&graph, &target_path, &target_paths_file)?
            };

            let config = UntangleConfig {
                merge_dist,
                n_best,
                min_jaccard,
                paf_output: paf,
            };
            untangle::untangle(&graph, &queries, &targets, &config, &mut out)?;
        }
        Params::Unitig {
            gfa_file,
            unitig_to,
            unitig_plus,
            fake_fastq,
        } => {
            log::info!("loading graph from {}", gfa_file);
            let graph = MemGraph::from_path(&gfa_file)?;
            let config = UnitigConfig {
                unitig_to,
                unitig_plus,
                fake_fastq,
            };
            unitig::write_unitigs(&graph, &config, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
