//! Access to the reference genome.

use std::{collections::HashMap, fs::File, path::Path};

use bio::io::fasta;

use crate::err::AnnoError;

/// Access to reference sequence by 1-based, closed coordinates.
///
/// Each worker owns its own instance; implementations keep a file cursor.
pub trait SequenceSource {
    /// Fetch `start..=end` of `chrom`, upper-cased.
    fn fetch(&mut self, chrom: &str, start: i32, end: i32) -> Result<Vec<u8>, AnnoError>;
}

/// Names to try for a canonical chromosome name.
fn name_candidates(chrom: &str) -> Vec<String> {
    let mut result = vec![chrom.to_string(), format!("chr{}", chrom)];
    if chrom == "MT" {
        result.push("chrM".to_string());
        result.push("M".to_string());
    }
    result
}

/// Indexed FASTA file, requires a `.fai` next to the file.
pub struct IndexedFasta {
    path: String,
    reader: fasta::IndexedReader<File>,
    names: Vec<String>,
}

impl IndexedFasta {
    #[tracing::instrument]
    pub fn from_path<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self, AnnoError> {
        tracing::debug!("opening indexed FASTA");
        let reader = fasta::IndexedReader::from_file(&path.as_ref())
            .map_err(|e| AnnoError::missing(format!("{:?}", path.as_ref()), e))?;
        let names = reader
            .index
            .sequences()
            .into_iter()
            .map(|seq| seq.name)
            .collect();
        Ok(Self {
            path: format!("{:?}", path.as_ref()),
            reader,
            names,
        })
    }

    fn resolve(&self, chrom: &str) -> Option<String> {
        name_candidates(chrom)
            .into_iter()
            .find(|name| self.names.contains(name))
    }
}

impl SequenceSource for IndexedFasta {
    fn fetch(&mut self, chrom: &str, start: i32, end: i32) -> Result<Vec<u8>, AnnoError> {
        let name = self.resolve(chrom).ok_or_else(|| {
            AnnoError::missing(&self.path, format!("no sequence for chromosome {}", chrom))
        })?;
        if start < 1 || end < start {
            return Err(AnnoError::missing(
                &self.path,
                format!("invalid interval {}:{}-{}", chrom, start, end),
            ));
        }
        self.reader
            .fetch(&name, (start - 1) as u64, end as u64)
            .map_err(|e| AnnoError::missing(&self.path, e))?;
        let mut seq = Vec::new();
        self.reader
            .read(&mut seq)
            .map_err(|e| AnnoError::missing(&self.path, e))?;
        seq.make_ascii_uppercase();
        Ok(seq)
    }
}

/// Reference sequences held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    seqs: HashMap<String, Vec<u8>>,
}

impl InMemorySource {
    pub fn new(seqs: HashMap<String, Vec<u8>>) -> Self {
        Self { seqs }
    }

    /// Load a whole (small) FASTA file.
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self, AnnoError> {
        let resource = format!("{:?}", path.as_ref());
        let reader = fasta::Reader::from_file(path.as_ref())
            .map_err(|e| AnnoError::missing(&resource, e))?;
        let mut seqs = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| AnnoError::malformed(&resource, 0, e.to_string()))?;
            seqs.insert(record.id().to_string(), record.seq().to_ascii_uppercase());
        }
        Ok(Self { seqs })
    }

    pub fn insert(&mut self, chrom: &str, seq: &[u8]) {
        self.seqs.insert(chrom.to_string(), seq.to_ascii_uppercase());
    }
}

impl SequenceSource for InMemorySource {
    fn fetch(&mut self, chrom: &str, start: i32, end: i32) -> Result<Vec<u8>, AnnoError> {
        let seq = name_candidates(chrom)
            .into_iter()
            .find_map(|name| self.seqs.get(&name))
            .ok_or_else(|| {
                AnnoError::missing("memory", format!("no sequence for chromosome {}", chrom))
            })?;
        if start < 1 || end < start || end as usize > seq.len() {
            return Err(AnnoError::missing(
                "memory",
                format!("invalid interval {}:{}-{}", chrom, start, end),
            ));
        }
        Ok(seq[(start - 1) as usize..end as usize].to_vec())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{IndexedFasta, InMemorySource, SequenceSource};

    #[test]
    fn in_memory() -> Result<(), anyhow::Error> {
        let mut source = InMemorySource::default();
        source.insert("chrM", b"acgtacgt");
        source.insert("1", b"AAAACCCC");

        assert_eq!(source.fetch("MT", 2, 4)?, b"CGT".to_vec());
        assert_eq!(source.fetch("1", 4, 5)?, b"AC".to_vec());
        assert!(source.fetch("1", 5, 9).is_err());
        assert!(source.fetch("2", 1, 1).is_err());

        Ok(())
    }

    #[test]
    fn indexed_fasta() -> Result<(), anyhow::Error> {
        let mut source = IndexedFasta::from_path("tests/data/genome.fa")?;

        assert_eq!(source.fetch("1", 1, 10)?, b"TTTTTGGGGG".to_vec());
        assert_eq!(source.fetch("1", 21, 23)?, b"ATG".to_vec());
        assert!(source.fetch("22", 1, 10).is_err());

        Ok(())
    }

    #[test]
    fn from_fasta() -> Result<(), anyhow::Error> {
        let mut source = InMemorySource::from_fasta("tests/data/genome.fa")?;
        assert_eq!(source.fetch("1", 21, 23)?, b"ATG".to_vec());

        Ok(())
    }
}
