//! Plain-text formats: edge lists, walk corpora, initial/default embeddings, embedding tables.
//!
//! All inputs are whitespace-delimited; `#` starts a comment that runs to the end of the line.
//! Line parsers return [`Parsed`]: a record, a blank line, or a recoverable skip. Fatal
//! problems are `Err`. Whether a skip is acceptable is up to the caller.

use crate::graph::{EdgeListGraph, NodeId};
use crate::init::{sticky_from_quality, DefaultEmbeddingSpec, InitialEmbeddings};
use crate::random_walk::WalkCorpus;
use crate::skipgram::Embeddings;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Record(T),
    /// Empty or comment-only line.
    Blank,
    /// Malformed but recoverable; the reason is for logging.
    Skip(String),
}

/// One edge-list line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeLine {
    Node(NodeId),
    Edge { src: NodeId, dst: NodeId, weight: f32 },
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn tokens(line: &str) -> Vec<&str> {
    strip_comment(line).split_whitespace().collect()
}

fn parse_token<T: FromStr>(tok: &str, what: &str, line: usize) -> Result<T> {
    tok.parse()
        .map_err(|_| Error::parse(line, format!("invalid {what} `{tok}`")))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::io(path, e))
}

fn lines<R: BufRead>(reader: R) -> impl Iterator<Item = (usize, std::io::Result<String>)> {
    reader.lines().enumerate().map(|(i, l)| (i + 1, l))
}

fn read_err(e: std::io::Error) -> Error {
    Error::io("<reader>", e)
}

/// Parse `src dst [weight]` or a lone `id` (isolated node). The weight token is required when
/// `weighted` is set; extra tokens are ignored.
pub fn parse_edge_line(line: &str, line_no: usize, weighted: bool) -> Result<Parsed<EdgeLine>> {
    let toks = tokens(line);
    match toks.len() {
        0 => Ok(Parsed::Blank),
        1 => Ok(Parsed::Record(EdgeLine::Node(parse_token(
            toks[0], "node id", line_no,
        )?))),
        _ => {
            let src = parse_token(toks[0], "node id", line_no)?;
            let dst = parse_token(toks[1], "node id", line_no)?;
            let weight = if weighted {
                let tok = toks
                    .get(2)
                    .ok_or_else(|| Error::parse(line_no, "missing edge weight"))?;
                parse_token(tok, "edge weight", line_no)?
            } else {
                1.0
            };
            Ok(Parsed::Record(EdgeLine::Edge { src, dst, weight }))
        }
    }
}

/// Read an edge list. Any malformed line aborts the read.
pub fn read_edge_list<R: BufRead>(reader: R, directed: bool, weighted: bool) -> Result<EdgeListGraph> {
    let mut graph = EdgeListGraph::new(directed);
    let mut records = 0usize;
    for (line_no, line) in lines(reader) {
        let line = line.map_err(read_err)?;
        let rec = match parse_edge_line(&line, line_no, weighted)? {
            Parsed::Record(rec) => rec,
            Parsed::Blank | Parsed::Skip(_) => continue,
        };
        let added = match rec {
            EdgeLine::Node(id) => graph.add_node(id).map(|_| ()),
            EdgeLine::Edge { src, dst, weight } => graph.add_edge(src, dst, weight),
        };
        added.map_err(|e| Error::parse(line_no, e.to_string()))?;
        records += 1;
    }
    debug!(
        records,
        nodes = graph.node_count(),
        arcs = graph.edge_count(),
        "read edge list"
    );
    Ok(graph)
}

pub fn load_edge_list(path: &Path, directed: bool, weighted: bool) -> Result<EdgeListGraph> {
    read_edge_list(open(path)?, directed, weighted).map_err(|e| with_path(e, path))
}

/// Read a walk corpus: header `NumWalks MaxLen`, then one walk per line.
///
/// Short lines are padded to the longest walk read. Missing lines are not materialized, only
/// logged. A header whose table would not fit in memory, lines longer than `MaxLen`, more
/// lines than `NumWalks`, and non-numeric tokens are fatal.
pub fn read_walk_corpus<R: BufRead>(reader: R) -> Result<WalkCorpus> {
    let mut it = lines(reader);
    let (rows, width) = loop {
        let Some((line_no, line)) = it.next() else {
            return Err(Error::parse(1, "missing `NumWalks MaxLen` header"));
        };
        let line = line.map_err(read_err)?;
        let toks = tokens(&line);
        if toks.is_empty() {
            continue;
        }
        if toks.len() < 2 {
            return Err(Error::parse(line_no, "header needs `NumWalks MaxLen`"));
        }
        let rows: usize = parse_token(toks[0], "walk count", line_no)?;
        let width: usize = parse_token(toks[1], "walk length", line_no)?;
        if rows.checked_mul(width).is_none() {
            return Err(Error::parse(
                line_no,
                format!("header `{rows} {width}` describes a table too large to address"),
            ));
        }
        break (rows, width);
    };

    // Sized by what the file holds, not by what the header claims.
    let mut walks: Vec<Vec<NodeId>> = Vec::new();
    let mut longest = 0usize;
    for (line_no, line) in it {
        let line = line.map_err(read_err)?;
        let toks = tokens(&line);
        if toks.is_empty() {
            continue;
        }
        if walks.len() >= rows {
            return Err(Error::parse(
                line_no,
                format!("more than the {rows} walks declared in the header"),
            ));
        }
        if toks.len() > width {
            return Err(Error::parse(
                line_no,
                format!("walk has {} nodes, header allows {width}", toks.len()),
            ));
        }
        let walk = toks
            .iter()
            .map(|tok| parse_token(tok, "node id", line_no))
            .collect::<Result<Vec<NodeId>>>()?;
        longest = longest.max(walk.len());
        walks.push(walk);
    }
    if walks.len() < rows {
        warn!(declared = rows, read = walks.len(), "walk corpus has fewer walks than declared");
    }
    WalkCorpus::from_rows(walks, longest)
}

pub fn load_walk_corpus(path: &Path) -> Result<WalkCorpus> {
    read_walk_corpus(open(path)?).map_err(|e| with_path(e, path))
}

/// Parse `id v_1 .. v_D [quality]`. Lines with fewer than `D + 1` tokens, unparsable values, or
/// a reserved id are skipped. The quality token is only read when `sticky` is set.
pub fn parse_initial_embedding_line(
    line: &str,
    dim: usize,
    sticky: bool,
) -> Parsed<(NodeId, Vec<f32>, Option<f32>)> {
    let toks = tokens(line);
    if toks.is_empty() {
        return Parsed::Blank;
    }
    if toks.len() < dim + 1 {
        return Parsed::Skip(format!("{} tokens, need at least {}", toks.len(), dim + 1));
    }
    let id: NodeId = match toks[0].parse() {
        Ok(0) => return Parsed::Skip("node id 0 is reserved".to_string()),
        Ok(id) => id,
        Err(_) => return Parsed::Skip(format!("invalid node id `{}`", toks[0])),
    };
    let mut vector = Vec::with_capacity(dim);
    for tok in &toks[1..=dim] {
        match tok.parse::<f32>() {
            Ok(v) if v.is_finite() => vector.push(v),
            _ => return Parsed::Skip(format!("invalid value `{tok}` for node {id}")),
        }
    }
    let quality = match (sticky, toks.get(dim + 1)) {
        (true, Some(tok)) => match tok.parse::<f32>() {
            Ok(q) if q.is_finite() => Some(sticky_from_quality(q)),
            _ => return Parsed::Skip(format!("invalid quality `{tok}` for node {id}")),
        },
        _ => None,
    };
    Parsed::Record((id, vector, quality))
}

/// Add node-specific overrides from `reader` into `init`, skipping malformed lines.
/// Returns the number of overrides read.
pub fn read_initial_embeddings<R: BufRead>(
    reader: R,
    sticky: bool,
    init: &mut InitialEmbeddings,
) -> Result<usize> {
    let dim = init.dim();
    let mut count = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in lines(reader) {
        let line = line.map_err(read_err)?;
        match parse_initial_embedding_line(&line, dim, sticky) {
            Parsed::Record((id, vector, s)) => {
                init.insert_override(id, vector, s)?;
                count += 1;
            }
            Parsed::Blank => {}
            Parsed::Skip(reason) => {
                skipped += 1;
                debug!(line = line_no, %reason, "skipping initial embedding");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, read = count, "skipped malformed initial embedding lines");
    }
    Ok(count)
}

pub fn load_initial_embeddings(
    path: &Path,
    sticky: bool,
    init: &mut InitialEmbeddings,
) -> Result<usize> {
    read_initial_embeddings(open(path)?, sticky, init).map_err(|e| with_path(e, path))
}

/// Read exactly `dim` lines of `value variability`.
pub fn read_default_embedding<R: BufRead>(reader: R, dim: usize) -> Result<DefaultEmbeddingSpec> {
    let mut entries = Vec::with_capacity(dim);
    for (line_no, line) in lines(reader) {
        let line = line.map_err(read_err)?;
        let toks = tokens(&line);
        if toks.is_empty() {
            continue;
        }
        if entries.len() == dim {
            return Err(Error::parse(line_no, format!("more than {dim} default entries")));
        }
        if toks.len() < 2 {
            return Err(Error::parse(line_no, "expected `value variability`"));
        }
        let value: f32 = parse_token(toks[0], "default value", line_no)?;
        let variability: f32 = parse_token(toks[1], "variability", line_no)?;
        entries.push((value, variability));
    }
    if entries.len() != dim {
        return Err(Error::InvalidParameter(format!(
            "default embedding has {} entries, expected {dim}",
            entries.len()
        )));
    }
    DefaultEmbeddingSpec::new(entries)
}

pub fn load_default_embedding(path: &Path, dim: usize) -> Result<DefaultEmbeddingSpec> {
    read_default_embedding(open(path)?, dim).map_err(|e| with_path(e, path))
}

/// Write `N D`, then `id v_1 .. v_D` per node.
pub fn write_embeddings<W: Write>(mut w: W, emb: &Embeddings) -> std::io::Result<()> {
    writeln!(w, "{} {}", emb.len(), emb.dim())?;
    for (id, v) in emb.iter() {
        write!(w, "{id}")?;
        for x in v {
            write!(w, " {x}")?;
        }
        writeln!(w)?;
    }
    w.flush()
}

/// Read the format written by [`write_embeddings`].
pub fn read_embeddings<R: BufRead>(reader: R) -> Result<Embeddings> {
    let mut it = lines(reader);
    let (n, dim) = loop {
        let Some((line_no, line)) = it.next() else {
            return Err(Error::parse(1, "missing `N D` header"));
        };
        let line = line.map_err(read_err)?;
        let toks = tokens(&line);
        if toks.is_empty() {
            continue;
        }
        if toks.len() != 2 {
            return Err(Error::parse(line_no, "header needs `N D`"));
        }
        let n: usize = parse_token(toks[0], "node count", line_no)?;
        let dim: usize = parse_token(toks[1], "dimension", line_no)?;
        if dim.checked_add(1).and_then(|w| n.checked_mul(w)).is_none() {
            return Err(Error::parse(
                line_no,
                format!("header `{n} {dim}` describes a table too large to address"),
            ));
        }
        break (n, dim);
    };

    let mut ids = Vec::new();
    let mut data = Vec::new();
    for (line_no, line) in it {
        let line = line.map_err(read_err)?;
        let toks = tokens(&line);
        if toks.is_empty() {
            continue;
        }
        if toks.len() != dim + 1 {
            return Err(Error::parse(
                line_no,
                format!("expected {} tokens, found {}", dim + 1, toks.len()),
            ));
        }
        ids.push(parse_token(toks[0], "node id", line_no)?);
        for tok in &toks[1..] {
            data.push(parse_token(tok, "embedding value", line_no)?);
        }
    }
    if ids.len() != n {
        return Err(Error::InvalidParameter(format!(
            "header declares {n} embeddings, found {}",
            ids.len()
        )));
    }
    Embeddings::new(ids, dim, data)
}

/// Write the padded walk table, one row per line. With `header`, prefix `NumWalks MaxLen`
/// so the output can be read back by [`read_walk_corpus`].
pub fn write_walks<W: Write>(mut w: W, corpus: &WalkCorpus, header: bool) -> std::io::Result<()> {
    if header {
        writeln!(w, "{} {}", corpus.rows(), corpus.width())?;
    }
    for i in 0..corpus.rows() {
        let mut first = true;
        for v in corpus.row(i) {
            if !first {
                w.write_all(b" ")?;
            }
            write!(w, "{v}")?;
            first = false;
        }
        writeln!(w)?;
    }
    w.flush()
}

/// Write to a temporary file next to `path` and rename it into place once `f` succeeds,
/// so a failed write leaves no partial output.
pub fn write_atomically<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        f(&mut w).map_err(|e| Error::io(path, e))?;
        w.flush().map_err(|e| Error::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Readers report I/O failures against a placeholder; swap in the real path.
fn with_path(e: Error, path: &Path) -> Error {
    match e {
        Error::Io { source, .. } => Error::io(path, source),
        other => other,
    }
}
