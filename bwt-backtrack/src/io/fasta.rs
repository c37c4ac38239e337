use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

pub struct FastaReader<R: BufRead> {
    lines: std::io::Lines<R>,
    pending: Option<String>,
}

fn split_header(line: &str) -> (String, Option<String>) {
    let header = line[1..].trim();
    match header.split_once(char::is_whitespace) {
        Some((id, desc)) => {
            let desc = desc.trim();
            (id.to_string(), (!desc.is_empty()).then(|| desc.to_string()))
        }
        None => (header.to_string(), None),
    }
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), pending: None }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        // text before the first '>' is ignored
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                match self.lines.next().transpose()? {
                    None => return Ok(None),
                    Some(line) if line.starts_with('>') => break line,
                    Some(_) => {}
                }
            },
        };
        let (id, desc) = split_header(&header);

        let mut seq: Vec<u8> = Vec::new();
        while let Some(line) = self.lines.next().transpose()? {
            if line.starts_with('>') {
                self.pending = Some(line);
                break;
            }
            seq.extend(
                line.bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

/// Reference to be indexed: all records concatenated in file order.
#[derive(Debug, Clone)]
pub struct Reference {
    pub names: Vec<String>,
    pub seq: Vec<u8>,
}

/// Reads every record of a FASTA stream into one reference sequence.
/// Bases stay as read (upper-cased); validation happens at index build time.
pub fn read_reference<R: BufRead>(reader: R) -> Result<Reference> {
    let mut reader = FastaReader::new(reader);
    let mut names = Vec::new();
    let mut seq = Vec::new();
    while let Some(rec) = reader.next_record()? {
        if rec.seq.is_empty() {
            log::warn!("skipping empty FASTA record '{}'", rec.id);
            continue;
        }
        names.push(rec.id);
        seq.extend_from_slice(&rec.seq);
    }
    if names.is_empty() {
        bail!("FASTA input contains no sequences");
    }
    if names.len() > 1 {
        log::warn!("{} FASTA records concatenated into one reference; hits may span record boundaries", names.len());
    }
    Ok(Reference { names, seq })
}

pub fn load_reference(path: &Path) -> Result<Reference> {
    let fh = std::fs::File::open(path)
        .with_context(|| format!("cannot open reference FASTA '{}'", path.display()))?;
    read_reference(std::io::BufReader::new(fh))
        .with_context(|| format!("cannot read reference FASTA '{}'", path.display()))
}
