//! Fixed-size genomic bins mapping to the transcripts overlapping them.

use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
    path::Path,
};

use indexmap::{IndexMap, IndexSet};

use super::Transcript;
use crate::{
    common::{
        canonical_chrom,
        io::{open_read_maybe_gz, parse_col, split_tsv},
    },
    err::AnnoError,
};

/// One bin `bin_start..=bin_end` with the names of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinIndexEntry {
    pub chrom: String,
    pub bin_start: i32,
    pub bin_end: i32,
    pub members: Vec<String>,
}

/// Bins with step `step`: `[1, S]`, `[S + 1, 2S]`, ...; only non-empty bins are stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinIndex {
    pub step: i32,
    entries: IndexMap<String, Vec<BinIndexEntry>>,
}

/// Number of the bin containing `pos`, clamped to the first bin.
fn bin_no(pos: i32, step: i32) -> i32 {
    if pos < 1 {
        1
    } else {
        (pos + step - 1) / step
    }
}

impl BinIndex {
    /// Build from `(chrom, start, end, name)` members in a single pass.
    pub fn build<'a, I>(members: I, step: i32) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32, i32, &'a str)>,
    {
        let mut bins: IndexMap<String, BTreeMap<i32, IndexSet<String>>> = IndexMap::new();
        for (chrom, start, end, name) in members {
            let chrom_bins = bins.entry(chrom.to_string()).or_default();
            for no in bin_no(start, step)..=bin_no(end, step) {
                chrom_bins.entry(no).or_default().insert(name.to_string());
            }
        }
        let entries = bins
            .into_iter()
            .map(|(chrom, chrom_bins)| {
                let chrom_entries = chrom_bins
                    .into_iter()
                    .map(|(no, members)| BinIndexEntry {
                        chrom: chrom.clone(),
                        bin_start: (no - 1) * step + 1,
                        bin_end: no * step,
                        members: members.into_iter().collect(),
                    })
                    .collect();
                (chrom, chrom_entries)
            })
            .collect();
        Self { step, entries }
    }

    /// Build from transcripts, keyed by transcript name.
    pub fn from_transcripts<'a, I>(transcripts: I, step: i32) -> Self
    where
        I: IntoIterator<Item = &'a Transcript>,
    {
        Self::build(
            transcripts
                .into_iter()
                .map(|tx| (tx.chrom.as_str(), tx.tx_start, tx.tx_end, tx.name.as_str())),
            step,
        )
    }

    /// Entries of one chromosome, sorted by bin start.
    pub fn entries(&self, chrom: &str) -> &[BinIndexEntry] {
        self.entries.get(chrom).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Members of the bins `ceil(start/S)..=ceil(end/S)`, each reported once.
    pub fn query(&self, chrom: &str, start: i32, end: i32) -> Vec<String> {
        let (first, last) = (bin_no(start, self.step), bin_no(end, self.step));
        let mut result = IndexSet::new();
        for entry in self.entries(chrom) {
            let no = bin_no(entry.bin_start, self.step);
            if no > last {
                break;
            }
            if no >= first {
                result.extend(entry.members.iter().cloned());
            }
        }
        result.into_iter().collect()
    }

    /// Write as `Chrom\tBinStart\tBinEnd\tMembers` lines.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        for entry in self.entries.values().flatten() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                &entry.chrom,
                entry.bin_start,
                entry.bin_end,
                entry.members.join(",")
            )?;
        }
        Ok(())
    }

    /// Read an index file; the step is taken from the bins.
    #[tracing::instrument(skip(mt_aliases))]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(
        path: P,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        tracing::debug!("loading transcript index from {:?}", &path);
        let source_name = format!("{:?}", path.as_ref());
        let reader = open_read_maybe_gz(&path)?;
        let mut entries: IndexMap<String, Vec<BinIndexEntry>> = IndexMap::new();
        let mut step = 0;
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| AnnoError::missing(&source_name, e))?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let cols = split_tsv(&line);
            if cols.len() != 4 {
                return Err(AnnoError::malformed(
                    &source_name,
                    i + 1,
                    format!("expected 4 columns, got {}", cols.len()),
                ));
            }
            let entry = BinIndexEntry {
                chrom: canonical_chrom(cols[0], mt_aliases),
                bin_start: parse_col(&source_name, i + 1, "bin start", cols[1])?,
                bin_end: parse_col(&source_name, i + 1, "bin end", cols[2])?,
                members: cols[3]
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
            };
            step = entry.bin_end - entry.bin_start + 1;
            let chrom_entries = entries.entry(entry.chrom.clone()).or_default();
            if let Some(prev) = chrom_entries.last() {
                if prev.bin_start >= entry.bin_start {
                    return Err(AnnoError::PreconditionViolation {
                        what: source_name.clone(),
                        index: i + 1,
                    });
                }
            }
            chrom_entries.push(entry);
        }
        if step <= 0 {
            return Err(AnnoError::malformed(&source_name, 0, "no bins in index"));
        }
        Ok(Self { step, entries })
    }
}
