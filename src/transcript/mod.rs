//! Transcript models, their loading from genePred files and per-chromosome tables.

use std::{collections::HashMap, io::BufRead, path::Path, time::Instant};

use indexmap::IndexMap;
use multimap::MultiMap;
use serde::{Deserialize, Serialize};

use crate::{
    common::{
        canonical_chrom,
        io::{open_read_maybe_gz, parse_col, split_tsv},
    },
    err::AnnoError,
    seq::source::SequenceSource,
};

pub mod index;
pub mod region;

pub use region::{Region, RegionType};

/// Strand of a transcript.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Strand {
    #[strum(serialize = "+")]
    #[serde(rename = "+")]
    Plus,
    #[strum(serialize = "-")]
    #[serde(rename = "-")]
    Minus,
}

/// Whether the CDS boundaries of a transcript are fully known.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Completeness {
    Complete,
    Incomplete,
    /// Non-coding transcript.
    Unknown,
}

/// A transcript with 1-based, closed coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub name: String,
    pub chrom: String,
    pub strand: Strand,
    pub tx_start: i32,
    pub tx_end: i32,
    /// First CDS base; `cds_start > cds_end` for non-coding transcripts.
    pub cds_start: i32,
    pub cds_end: i32,
    pub exon_starts: Vec<i32>,
    pub exon_ends: Vec<i32>,
    pub gene: String,
    pub gene_id: Option<String>,
    pub completeness: Completeness,
    /// Filled once by [`Transcript::attach_regions`].
    pub regions: Vec<Region>,
}

impl Transcript {
    pub fn is_coding(&self) -> bool {
        self.cds_start <= self.cds_end
    }

    pub fn has_regions(&self) -> bool {
        !self.regions.is_empty()
    }

    /// Total length of the coding regions.
    pub fn cds_len(&self) -> i32 {
        self.exon_starts
            .iter()
            .zip(self.exon_ends.iter())
            .map(|(start, end)| {
                crate::common::overlap_len((*start, *end), (self.cds_start, self.cds_end))
            })
            .sum()
    }

    /// Gene ID or `.`.
    pub fn gene_id_or_dot(&self) -> String {
        self.gene_id.clone().unwrap_or_else(|| ".".to_string())
    }

    /// Build the regions, fetching sequence for coding transcripts.
    ///
    /// A complete transcript whose CDS is no multiple of three is downgraded to incomplete.
    pub fn attach_regions(&mut self, source: &mut dyn SequenceSource) -> Result<(), AnnoError> {
        if self.has_regions() {
            return Ok(());
        }
        let sequence = if self.is_coding() {
            Some(source.fetch(&self.chrom, self.tx_start, self.tx_end)?)
        } else {
            None
        };
        self.regions = region::build_regions(self, sequence.as_deref())?;
        if self.completeness == Completeness::Complete && self.cds_len() % 3 != 0 {
            tracing::debug!(
                "transcript {} has CDS length {}, marking as incomplete",
                &self.name,
                self.cds_len()
            );
            self.completeness = Completeness::Incomplete;
        }
        Ok(())
    }
}

/// Mapping from gene symbol to gene ID, optionally per chromosome.
#[derive(Debug, Default, Clone)]
pub struct GeneIdMap {
    global: HashMap<String, String>,
    by_chrom: HashMap<(String, String), String>,
}

#[derive(Debug, Deserialize)]
struct GeneIdRecord {
    #[serde(rename = "Chrom", default)]
    chrom: Option<String>,
    #[serde(rename = "EntrezId")]
    entrez_id: String,
    #[serde(rename = "Symbol")]
    symbol: String,
}

impl GeneIdMap {
    /// Load from CSV (or TSV with `.tsv` extension) with `Symbol`, `EntrezId` and optional
    /// `Chrom` columns.
    #[tracing::instrument(skip(mt_aliases))]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(
        path: P,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        tracing::debug!("loading gene IDs from {:?}", &path);
        let source_name = format!("{:?}", path.as_ref());
        let delimiter = if path.as_ref().to_string_lossy().contains(".tsv") {
            b'\t'
        } else {
            b','
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(open_read_maybe_gz(&path)?);
        let mut result = Self::default();
        for (i, record) in reader.deserialize().enumerate() {
            let record: GeneIdRecord =
                record.map_err(|e| AnnoError::malformed(&source_name, i + 2, e.to_string()))?;
            if record.entrez_id.is_empty() || record.entrez_id == "." {
                continue;
            }
            match record.chrom {
                Some(chrom) if !chrom.is_empty() => {
                    result.by_chrom.insert(
                        (canonical_chrom(&chrom, mt_aliases), record.symbol.clone()),
                        record.entrez_id.clone(),
                    );
                }
                _ => {}
            }
            result
                .global
                .entry(record.symbol)
                .or_insert(record.entrez_id);
        }
        tracing::debug!("... done loading {} gene IDs", result.global.len());
        Ok(result)
    }

    pub fn get(&self, chrom: &str, symbol: &str) -> Option<&String> {
        self.by_chrom
            .get(&(chrom.to_string(), symbol.to_string()))
            .or_else(|| self.global.get(symbol))
    }
}

fn parse_coords(
    source_name: &str,
    line_no: usize,
    name: &str,
    value: &str,
) -> Result<Vec<i32>, AnnoError> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_col(source_name, line_no, name, s))
        .collect()
}

/// Parse one genePred line with 16 (refGene), 15 (genePredExt) or 10 (genePred) columns.
pub fn parse_genepred_line(
    source_name: &str,
    line_no: usize,
    line: &str,
    mt_aliases: &[String],
) -> Result<Transcript, AnnoError> {
    let all_cols = split_tsv(line);
    let cols = match all_cols.len() {
        16 => &all_cols[1..],
        15 | 10 => &all_cols[..],
        n => {
            return Err(AnnoError::malformed(
                source_name,
                line_no,
                format!("expected 16, 15 or 10 columns, got {}", n),
            ))
        }
    };
    let strand = cols[2].parse::<Strand>().map_err(|_| {
        AnnoError::malformed(source_name, line_no, format!("invalid strand {:?}", cols[2]))
    })?;
    let tx_start: i32 = parse_col(source_name, line_no, "txStart", cols[3])?;
    let tx_end: i32 = parse_col(source_name, line_no, "txEnd", cols[4])?;
    let cds_start: i32 = parse_col(source_name, line_no, "cdsStart", cols[5])?;
    let cds_end: i32 = parse_col(source_name, line_no, "cdsEnd", cols[6])?;
    let exon_count: usize = parse_col(source_name, line_no, "exonCount", cols[7])?;
    let exon_starts = parse_coords(source_name, line_no, "exonStarts", cols[8])?
        .into_iter()
        .map(|s| s + 1)
        .collect::<Vec<_>>();
    let exon_ends = parse_coords(source_name, line_no, "exonEnds", cols[9])?;
    if exon_starts.len() != exon_count || exon_ends.len() != exon_count || exon_count == 0 {
        return Err(AnnoError::malformed(
            source_name,
            line_no,
            format!(
                "exon count {} does not match {} starts and {} ends",
                exon_count,
                exon_starts.len(),
                exon_ends.len()
            ),
        ));
    }
    for i in 0..exon_count {
        if exon_starts[i] > exon_ends[i] || (i > 0 && exon_starts[i] <= exon_ends[i - 1]) {
            return Err(AnnoError::malformed(
                source_name,
                line_no,
                format!("exon {} is empty or not ascending", i + 1),
            ));
        }
    }

    let (gene, stats) = if cols.len() == 15 {
        (cols[11].to_string(), Some((cols[12], cols[13])))
    } else {
        (cols[0].to_string(), None)
    };
    let coding = cds_start != cds_end;
    let completeness = match (coding, stats) {
        (false, _) => Completeness::Unknown,
        (true, Some(("cmpl", "cmpl"))) | (true, None) => Completeness::Complete,
        (true, Some(_)) => Completeness::Incomplete,
    };

    Ok(Transcript {
        name: cols[0].to_string(),
        chrom: canonical_chrom(cols[1], mt_aliases),
        strand,
        tx_start: tx_start + 1,
        tx_end,
        cds_start: cds_start + 1,
        cds_end,
        exon_starts,
        exon_ends,
        gene,
        gene_id: None,
        completeness,
        regions: Vec::new(),
    })
}

/// Load transcripts from a genePred file, grouped by chromosome and sorted by start.
#[tracing::instrument(skip(gene_ids, mt_aliases))]
pub fn load_transcripts<P: AsRef<Path> + std::fmt::Debug>(
    path: P,
    gene_ids: &GeneIdMap,
    mt_aliases: &[String],
) -> Result<IndexMap<String, Vec<Transcript>>, AnnoError> {
    let before_loading = Instant::now();
    tracing::debug!("loading transcripts from {:?}", &path);
    let source_name = format!("{:?}", path.as_ref());
    let reader = open_read_maybe_gz(&path)?;
    let mut result: IndexMap<String, Vec<Transcript>> = IndexMap::new();
    let mut count = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AnnoError::missing(&source_name, e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut tx = parse_genepred_line(&source_name, i + 1, &line, mt_aliases)?;
        tx.gene_id = gene_ids.get(&tx.chrom, &tx.gene).cloned();
        result.entry(tx.chrom.clone()).or_default().push(tx);
        count += 1;
    }
    for txs in result.values_mut() {
        txs.sort_by_key(|tx| (tx.tx_start, tx.tx_end));
    }
    tracing::debug!(
        "... done loading {} transcripts in {:?}",
        count,
        before_loading.elapsed()
    );
    Ok(result)
}

/// The transcripts of one chromosome with lazily built regions.
#[derive(Debug, Clone)]
pub struct TranscriptTable {
    pub chrom: String,
    transcripts: Vec<Transcript>,
    by_name: MultiMap<String, usize>,
}

impl TranscriptTable {
    pub fn new(chrom: &str, transcripts: Vec<Transcript>) -> Self {
        let by_name = transcripts
            .iter()
            .enumerate()
            .map(|(i, tx)| (tx.name.clone(), i))
            .collect();
        Self {
            chrom: chrom.to_string(),
            transcripts,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// Indices of all transcripts with the given name.
    pub fn indices_of(&self, name: &str) -> &[usize] {
        self.by_name
            .get_vec(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Transcript with regions, built on first access.
    pub fn with_regions(
        &mut self,
        idx: usize,
        source: &mut dyn SequenceSource,
    ) -> Result<&Transcript, AnnoError> {
        let tx = &mut self.transcripts[idx];
        tx.attach_regions(source)?;
        Ok(tx)
    }
}
