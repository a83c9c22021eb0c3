//! Minimal GFA1 line scanner.
//!
//! Grounded on the teacher's `GraphAuxilliary::parse_nodes_gfa` /
//! `parse_edge_gfa` (manual byte-buffer tab splitting, no parser-combinator
//! dependency) extended to also record per-path/per-walk step sequences,
//! which the teacher's counting-only model never needed to materialize.

use std::io::{BufRead, BufReader, Read};
use std::str::{self, FromStr};

use crate::graph::Orientation;

pub struct ParsedSegment {
    pub name: Vec<u8>,
    pub sequence: Vec<u8>,
}

pub struct ParsedLink {
    pub from: Vec<u8>,
    pub from_orient: Orientation,
    pub to: Vec<u8>,
    pub to_orient: Orientation,
}

pub struct ParsedPath {
    pub name: String,
    /// (segment name, orientation) pairs in path order.
    pub steps: Vec<(Vec<u8>, Orientation)>,
}

#[derive(Default)]
pub struct ParsedGfa {
    pub segments: Vec<ParsedSegment>,
    pub links: Vec<ParsedLink>,
    pub paths: Vec<ParsedPath>,
}

fn orientation_from_pm(c: u8) -> Orientation {
    match c {
        b'+' => Orientation::Forward,
        b'-' => Orientation::Reverse,
        _ => panic!("expected '+' or '-' orientation marker, got {}", c as char),
    }
}

fn split_tabs(line: &[u8]) -> Vec<&[u8]> {
    line.split(|&b| b == b'\t').collect()
}

fn trim_newline(buf: &mut Vec<u8>) {
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
}

/// Parses a P-line's comma-separated `<name><+|->` segment list.
fn parse_path_step_list(field: &[u8]) -> Vec<(Vec<u8>, Orientation)> {
    field
        .split(|&b| b == b',')
        .filter(|s| !s.is_empty())
        .map(|tok| {
            let (name, orient) = tok.split_at(tok.len() - 1);
            (name.to_vec(), orientation_from_pm(orient[0]))
        })
        .collect()
}

/// Parses a W-line's `><`-delimited walk string into (segment, orientation)
/// pairs, following the same "split on the first token's own marker first"
/// trick the teacher's `parse_walk_seq_to_item_vec` uses to avoid producing a
/// spurious leading empty split.
fn parse_walk_step_list(field: &[u8]) -> Vec<(Vec<u8>, Orientation)> {
    if field.is_empty() {
        return Vec::new();
    }
    let mut steps = Vec::new();
    let mut i = 1; // skip the leading '>' or '<'
    let mut seg_start = 1;
    let mut cur_orient = match field[0] {
        b'>' => Orientation::Forward,
        b'<' => Orientation::Reverse,
        c => panic!("expected '>' or '<' in walk string, got {}", c as char),
    };
    while i < field.len() {
        match field[i] {
            b'>' | b'<' => {
                steps.push((field[seg_start..i].to_vec(), cur_orient));
                cur_orient = match field[i] {
                    b'>' => Orientation::Forward,
                    _ => Orientation::Reverse,
                };
                seg_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    steps.push((field[seg_start..].to_vec(), cur_orient));
    steps
}

pub fn parse_gfa<R: Read>(data: R) -> ParsedGfa {
    let mut reader = BufReader::new(data);
    let mut gfa = ParsedGfa::default();
    let mut buf = Vec::new();
    while reader.read_until(b'\n', &mut buf).unwrap_or(0) > 0 {
        trim_newline(&mut buf);
        if !buf.is_empty() {
            match buf[0] {
                b'S' => {
                    let cols = split_tabs(&buf);
                    gfa.segments.push(ParsedSegment {
                        name: cols[1].to_vec(),
                        sequence: cols[2].to_vec(),
                    });
                }
                b'L' => {
                    let cols = split_tabs(&buf);
                    gfa.links.push(ParsedLink {
                        from: cols[1].to_vec(),
                        from_orient: orientation_from_pm(cols[2][0]),
                        to: cols[3].to_vec(),
                        to_orient: orientation_from_pm(cols[4][0]),
                    });
                }
                b'P' => {
                    let cols = split_tabs(&buf);
                    let name = str::from_utf8(cols[1]).expect("path name is not UTF-8").to_string();
                    gfa.paths.push(ParsedPath {
                        name,
                        steps: parse_path_step_list(cols[2]),
                    });
                }
                b'W' => {
                    let cols = split_tabs(&buf);
                    let sample = str::from_utf8(cols[1]).unwrap();
                    let haplotype = str::from_utf8(cols[2]).unwrap();
                    let seqid = str::from_utf8(cols[3]).unwrap();
                    let name = match (cols[4], cols[5]) {
                        (b"*", b"*") => format!("{sample}#{haplotype}#{seqid}"),
                        (start, end) => format!(
                            "{sample}#{haplotype}#{seqid}:{}-{}",
                            usize::from_str(str::from_utf8(start).unwrap()).unwrap(),
                            usize::from_str(str::from_utf8(end).unwrap()).unwrap()
                        ),
                    };
                    gfa.paths.push(ParsedPath {
                        name,
                        steps: parse_walk_step_list(cols[6]),
                    });
                }
                _ => {}
            }
        }
        buf.clear();
    }
    gfa
}
