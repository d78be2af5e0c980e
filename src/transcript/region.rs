//! Typed regions (CDS, UTR, intron) tiling a transcript.

use serde::{Deserialize, Serialize};

use super::{Strand, Transcript};
use crate::err::AnnoError;

/// Type of a transcript region.
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
pub enum RegionType {
    #[strum(serialize = "CDS")]
    Cds,
    #[strum(serialize = "UTR")]
    Utr,
    #[strum(serialize = "intron")]
    Intron,
}

/// A region of a transcript, 1-based and closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: i32,
    pub end: i32,
    pub kind: RegionType,
    /// Running number along the strand; 5 or 3 for UTRs.
    pub order: i32,
    /// Number of the exon this region belongs to, counted along the strand.
    pub exon: Option<i32>,
    /// Plus strand genomic sequence.
    pub sequence: Option<Vec<u8>>,
}

impl Region {
    fn new(chrom: &str, start: i32, end: i32, kind: RegionType, exon: Option<i32>) -> Self {
        Self {
            chrom: chrom.to_string(),
            start,
            end,
            kind,
            order: 0,
            exon,
            sequence: None,
        }
    }

    /// Display name, e.g. `CDS2`, `intron1`, `UTR5`, or `exon3` for coding regions in
    /// exon naming mode.
    pub fn name(&self, exon_naming: bool) -> String {
        match (exon_naming, self.kind, self.exon) {
            (true, RegionType::Cds, Some(exon)) => format!("exon{}", exon),
            _ => format!("{}{}", self.kind, self.order),
        }
    }

    pub fn contains(&self, pos: i32) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn overlaps(&self, start: i32, end: i32) -> bool {
        self.start <= end && start <= self.end
    }

    pub fn len(&self) -> i32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }
}

/// Build the regions of `tx`, sorted by start.
///
/// `sequence` is the plus strand sequence of `tx_start..=tx_end`; it is sliced into the
/// regions when given.
pub fn build_regions(tx: &Transcript, sequence: Option<&[u8]>) -> Result<Vec<Region>, AnnoError> {
    let exon_count = tx.exon_starts.len() as i32;
    let mut regions = Vec::new();
    for (i, (&start, &end)) in tx.exon_starts.iter().zip(tx.exon_ends.iter()).enumerate() {
        if i > 0 {
            let prev_end = tx.exon_ends[i - 1];
            if prev_end + 1 < start {
                regions.push(Region::new(
                    &tx.chrom,
                    prev_end + 1,
                    start - 1,
                    RegionType::Intron,
                    None,
                ));
            }
        }
        let exon = Some(match tx.strand {
            Strand::Plus => i as i32 + 1,
            Strand::Minus => exon_count - i as i32,
        });
        if !tx.is_coding() || tx.cds_start > end || tx.cds_end < start {
            regions.push(Region::new(&tx.chrom, start, end, RegionType::Utr, exon));
            continue;
        }
        let cds_start = std::cmp::max(start, tx.cds_start);
        let cds_end = std::cmp::min(end, tx.cds_end);
        if start < cds_start {
            regions.push(Region::new(&tx.chrom, start, cds_start - 1, RegionType::Utr, exon));
        }
        regions.push(Region::new(&tx.chrom, cds_start, cds_end, RegionType::Cds, exon));
        if cds_end < end {
            regions.push(Region::new(&tx.chrom, cds_end + 1, end, RegionType::Utr, exon));
        }
    }

    let (mut intron_no, mut cds_no, mut utr_no) = (1, 1, 5);
    let mut idxs = (0..regions.len()).collect::<Vec<_>>();
    if tx.strand == Strand::Minus {
        idxs.reverse();
    }
    for idx in idxs {
        let region = &mut regions[idx];
        match region.kind {
            RegionType::Intron => {
                region.order = intron_no;
                intron_no += 1;
            }
            RegionType::Cds => {
                region.order = cds_no;
                cds_no += 1;
                utr_no = 3;
            }
            RegionType::Utr => region.order = utr_no,
        }
    }

    if let Some(sequence) = sequence {
        if sequence.len() as i32 != tx.tx_end - tx.tx_start + 1 {
            return Err(AnnoError::InvalidRegions {
                transcript: tx.name.clone(),
                tx_start: tx.tx_start,
                tx_end: tx.tx_end,
                message: format!("sequence has length {}", sequence.len()),
            });
        }
        for region in regions.iter_mut() {
            let begin = (region.start - tx.tx_start) as usize;
            let end = (region.end - tx.tx_start + 1) as usize;
            region.sequence = Some(sequence[begin..end].to_vec());
        }
    }

    check_coverage(tx, &regions)?;
    Ok(regions)
}

/// Check that `regions` tile `tx_start..=tx_end` without gaps and overlaps.
pub fn check_coverage(tx: &Transcript, regions: &[Region]) -> Result<(), AnnoError> {
    let err = |message: String| AnnoError::InvalidRegions {
        transcript: tx.name.clone(),
        tx_start: tx.tx_start,
        tx_end: tx.tx_end,
        message,
    };
    let (first, last) = match (regions.first(), regions.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(err("no regions".to_string())),
    };
    if first.start != tx.tx_start || last.end != tx.tx_end {
        return Err(err(format!(
            "regions span {}-{}",
            first.start, last.end
        )));
    }
    for (prev, next) in regions.iter().zip(regions.iter().skip(1)) {
        if prev.is_empty() || prev.end + 1 != next.start {
            return Err(err(format!(
                "gap or overlap between {}-{} and {}-{}",
                prev.start, prev.end, next.start, next.end
            )));
        }
    }
    Ok(())
}
