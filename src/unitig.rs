//! Unitig extractor (C9): maximal linear chains, with optional random-walk
//! extension, emitted as FASTA or FASTQ.
//!
//! Shares the [`HandleGraph`] traversal contract with the untangle core but
//! no other logic: it is a second, smaller consumer of the same interface
//! (§1).

use std::collections::VecDeque;
use std::io::Write;

use rand::Rng;

use crate::error::UntangleError;
use crate::graph::{Handle, HandleGraph};

#[derive(Debug, Clone, Copy)]
pub struct UnitigConfig {
    pub unitig_to: u64,
    pub unitig_plus: u64,
    pub fake_fastq: bool,
}

impl Default for UnitigConfig {
    fn default() -> Self {
        UnitigConfig {
            unitig_to: 0,
            unitig_plus: 0,
            fake_fastq: false,
        }
    }
}

/// Grows the maximal linear chain through `seed`: follow forward edges while
/// forward out-degree is exactly 1, then from the seed follow reverse edges
/// while reverse out-degree is exactly 1, prepending (§4.8). Every
/// incorporated node id is marked in `seen`.
fn grow_unitig<G: HandleGraph>(graph: &G, seed: Handle, seen: &mut [bool]) -> VecDeque<Handle> {
    let mut unitig = VecDeque::new();
    unitig.push_back(seed);

    let mut curr = seed;
    while graph.get_degree(curr, false) == 1 {
        let mut next = None;
        graph.follow_edges(curr, false, |n| {
            next = Some(n);
            false
        });
        let next = next.expect("degree 1 guarantees a neighbor");
        // A closed circular component re-enters an already-seen node
        // (possibly the seed itself); stop rather than loop forever.
        if seen[next.id().0 as usize] {
            break;
        }
        seen[next.id().0 as usize] = true;
        unitig.push_back(next);
        curr = next;
    }

    curr = seed;
    while graph.get_degree(curr, true) == 1 {
        let mut prev = None;
        graph.follow_edges(curr, true, |n| {
            prev = Some(n);
            false
        });
        let prev = prev.expect("degree 1 guarantees a neighbor");
        if seen[prev.id().0 as usize] {
            break;
        }
        seen[prev.id().0 as usize] = true;
        unitig.push_front(prev);
        curr = prev;
    }

    unitig
}

/// Extends `unitig` by random walk on both ends (§4.8). `to_add` mirrors the
/// original's override rule: a flat `unitig_plus * 2` bump, overridden by
/// `unitig_to - current_length` whenever that is larger (not additive with
/// the `unitig_plus` bump).
fn extend_unitig<G: HandleGraph>(
    graph: &G,
    unitig: &mut VecDeque<Handle>,
    config: &UnitigConfig,
    rng: &mut impl Rng,
) {
    let current_length: u64 = unitig.iter().map(|&h| graph.get_length(h)).sum();

    let mut to_add = 0u64;
    if config.unitig_plus > 0 {
        to_add = config.unitig_plus * 2;
    }
    if config.unitig_to > current_length {
        to_add = config.unitig_to - current_length;
    }
    let half = to_add / 2;

    let mut added_fwd = 0u64;
    let mut curr = *unitig.back().unwrap();
    loop {
        let degree = graph.get_degree(curr, false);
        if added_fwd >= half || degree == 0 {
            break;
        }
        let pick = rng.gen_range(0..degree);
        let mut chosen = None;
        let mut i = 0;
        graph.follow_edges(curr, false, |n| {
            if i == pick {
                chosen = Some(n);
                false
            } else {
                i += 1;
                true
            }
        });
        let next = chosen.expect("pick is within [0, degree)");
        unitig.push_back(next);
        added_fwd += graph.get_length(next);
        curr = next;
    }

    let mut added_rev = 0u64;
    curr = *unitig.front().unwrap();
    loop {
        let degree = graph.get_degree(curr, true);
        if added_rev >= half || degree == 0 {
            break;
        }
        let pick = rng.gen_range(0..degree);
        let mut chosen = None;
        let mut i = 0;
        graph.follow_edges(curr, true, |n| {
            if i == pick {
                chosen = Some(n);
                false
            } else {
                i += 1;
                true
            }
        });
        let prev = chosen.expect("pick is within [0, degree)");
        unitig.push_front(prev);
        added_rev += graph.get_length(prev);
        curr = prev;
    }
}

fn unitig_length<G: HandleGraph>(graph: &G, unitig: &VecDeque<Handle>) -> u64 {
    unitig.iter().map(|&h| graph.get_length(h)).sum()
}

/// Comma-separated signed node id list followed by ` length=<bp>` (§6).
fn format_header<G: HandleGraph>(graph: &G, unitig: &VecDeque<Handle>) -> String {
    let mut header = String::new();
    for &h in unitig {
        header.push_str(&h.id().to_string());
        header.push(if h.is_reverse() { '-' } else { '+' });
        header.push(',');
    }
    header.push_str(&format!(" length={}", unitig_length(graph, unitig)));
    header
}

fn sequence<G: HandleGraph>(graph: &G, unitig: &VecDeque<Handle>) -> Vec<u8> {
    let mut seq = Vec::new();
    for &h in unitig {
        seq.extend(graph.get_sequence(h));
    }
    seq
}

/// Extracts every maximal linear chain in the graph (§4.8), walking handles
/// in `for_each_handle`'s order and marking every incorporated node id as
/// visited so no node is emitted twice.
pub fn extract_unitigs<G: HandleGraph>(graph: &G) -> Vec<VecDeque<Handle>> {
    let mut seen = vec![false; graph.get_node_count() + 1];
    let mut unitigs = Vec::new();
    graph.for_each_handle(|handle| {
        let id = handle.id().0 as usize;
        if !seen[id] {
            seen[id] = true;
            unitigs.push(grow_unitig(graph, handle, &mut seen));
        }
    });
    unitigs
}

/// Writes every unitig in the graph as FASTA (or FASTQ, with a constant
/// `I`-quality line, when `config.fake_fastq`), extending each with a
/// bi-ended random walk when `config.unitig_to`/`unitig_plus` request it.
pub fn write_unitigs<G, W>(graph: &G, config: &UnitigConfig, out: &mut W) -> Result<(), UntangleError>
where
    G: HandleGraph,
    W: Write,
{
    let mut rng = rand::thread_rng();
    let mut seen = vec![false; graph.get_node_count() + 1];
    let mut result = Ok(());
    graph.for_each_handle(|handle| {
        if result.is_err() {
            return;
        }
        let id = handle.id().0 as usize;
        if seen[id] {
            return;
        }
        seen[id] = true;
        let mut unitig = grow_unitig(graph, handle, &mut seen);
        if config.unitig_to > 0 || config.unitig_plus > 0 {
            extend_unitig(graph, &mut unitig, config, &mut rng);
        }
        result = write_one(graph, &unitig, config.fake_fastq, out);
    });
    result
}

fn write_one<G, W>(graph: &G, unitig: &VecDeque<Handle>, fake_fastq: bool, out: &mut W) -> Result<(), UntangleError>
where
    G: HandleGraph,
    W: Write,
{
    let header = format_header(graph, unitig);
    let seq = sequence(graph, unitig);
    if fake_fastq {
        writeln!(out, "@{}", header)?;
        out.write_all(&seq)?;
        writeln!(out)?;
        writeln!(out, "+")?;
        writeln!(out, "{}", "I".repeat(seq.len()))?;
    } else {
        writeln!(out, ">{}", header)?;
        out.write_all(&seq)?;
        writeln!(out)?;
    }
    Ok(())
}
