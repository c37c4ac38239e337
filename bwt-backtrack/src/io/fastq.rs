use anyhow::{anyhow, Result};
use std::io::BufRead;

/// Sanger / Illumina 1.8+ quality offset.
pub const PHRED_OFFSET: u8 = 33;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    /// Phred scores decoded from the ASCII quality line.
    pub fn phred(&self) -> Result<Vec<u8>> {
        decode_phred(&self.qual)
    }
}

pub fn decode_phred(qual: &[u8]) -> Result<Vec<u8>> {
    qual.iter()
        .enumerate()
        .map(|(i, &q)| {
            q.checked_sub(PHRED_OFFSET)
                .ok_or_else(|| anyhow!("quality byte {:#04x} at {} is below Phred+33 range", q, i))
        })
        .collect()
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, line_no: 0 }
    }

    fn next_line(&mut self) -> Result<usize> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done { return Ok(None); }

        // header line starting with '@', blank lines between records are skipped
        loop {
            if self.next_line()? == 0 { self.done = true; return Ok(None); }
            if !self.buf.trim().is_empty() { break; }
        }
        if !self.buf.starts_with('@') {
            return Err(anyhow!("line {}: FASTQ header not starting with '@'", self.line_no));
        }
        let header = self.buf[1..].trim_end().to_string();
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if self.next_line()? == 0 { return Err(anyhow!("record '{}': unexpected EOF after header", id)); }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        if self.next_line()? == 0 || !self.buf.starts_with('+') {
            return Err(anyhow!("record '{}': missing '+' line", id));
        }

        if self.next_line()? == 0 { return Err(anyhow!("record '{}': missing quality line", id)); }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        // line-wrapped records are not supported
        if qual.len() != seq.len() {
            return Err(anyhow!("record '{}': seq/qual length mismatch ({} vs {})", id, seq.len(), qual.len()));
        }

        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
