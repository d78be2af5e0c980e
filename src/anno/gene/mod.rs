//! Consequences of small variants on transcripts.

pub mod aggregate;
pub mod coding;
pub mod position;

use serde::{Deserialize, Serialize};

use self::{coding::CdsEdit, position::TxCoords};
use crate::{
    conf::AnnotationConfig,
    seq::{self, CodonTable},
    transcript::{Completeness, Region, RegionType, Strand, Transcript},
    variant::{VarType, Variant},
};

/// Annotation of one variant on one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptAnnotation {
    pub gene: String,
    pub gene_id: String,
    pub transcript: String,
    /// Functional region, e.g. `exonic`, `splicing`, `UTR5`, `upstream`.
    pub region: String,
    /// Names of the touched regions, e.g. `CDS2` or `CDS1_intron1`.
    pub region_label: String,
    pub na_change: String,
    pub aa_change: Option<String>,
    /// Event such as `nonsynonymous_snv`, `.` if there is none.
    pub event: String,
    pub completeness: Completeness,
}

impl TranscriptAnnotation {
    fn new(tx: &Transcript, region: &str, region_label: String, na_change: String) -> Self {
        Self {
            gene: tx.gene.clone(),
            gene_id: tx.gene_id_or_dot(),
            transcript: tx.name.clone(),
            region: region.to_string(),
            region_label,
            na_change,
            aa_change: None,
            event: ".".to_string(),
            completeness: tx.completeness,
        }
    }

    /// `Gene:Transcript:Region:NAChange[:AAChange]`.
    pub fn detail(&self) -> String {
        let mut result = format!(
            "{}:{}:{}:{}",
            &self.gene, &self.transcript, &self.region_label, &self.na_change
        );
        if let Some(aa_change) = &self.aa_change {
            result.push(':');
            result.push_str(aa_change);
        }
        result
    }
}

/// Genomic interval whose regions are considered touched by `var`.
///
/// Insertions touch the base on their transcript downstream side.
pub fn footprint(var: &Variant, strand: Strand) -> (i32, i32) {
    match (var.var_type(), strand) {
        (VarType::Ins, Strand::Plus) => (var.start + 1, var.start + 1),
        (VarType::Ins, Strand::Minus) => (var.start, var.start),
        _ => (var.start, var.end),
    }
}

/// Nucleotide change from positions alone, `c.` or `n.` prefixed.
fn positional_na_change(tx: &Transcript, coords: &TxCoords, var: &Variant) -> String {
    let prefix = if tx.is_coding() { "c." } else { "n." };
    let oriented = |bases: &[u8]| match tx.strand {
        Strand::Plus => seq::to_str(bases),
        Strand::Minus => seq::to_str(&seq::revcomp(bases)),
    };
    match var.var_type() {
        VarType::Snp => format!(
            "{}{}{}>{}",
            prefix,
            coords.position(var.start),
            oriented(var.ref_bases()),
            oriented(var.alt_bases())
        ),
        VarType::Ins => {
            let (first, second) = coords.oriented(var.start, var.start + 1);
            format!(
                "{}{}_{}ins{}",
                prefix,
                coords.position(first),
                coords.position(second),
                oriented(var.alt_bases())
            )
        }
        VarType::Del | VarType::Sub => {
            let (first, last) = coords.oriented(var.start, var.end);
            let range = if first == last {
                format!("{}", coords.position(first))
            } else {
                format!("{}_{}", coords.position(first), coords.position(last))
            };
            if var.var_type() == VarType::Del {
                format!("{}{}del", prefix, range)
            } else {
                format!("{}{}delins{}", prefix, range, oriented(var.alt_bases()))
            }
        }
    }
}

/// Label of the touched regions, in transcript order.
fn region_label(touched: &[&Region], exon_naming: bool) -> String {
    match (touched.first(), touched.last()) {
        (Some(first), Some(last)) => {
            let (first, last) = (first.name(exon_naming), last.name(exon_naming));
            if first == last {
                first
            } else {
                format!("{}_{}", first, last)
            }
        }
        _ => ".".to_string(),
    }
}

/// Region name for an intronic variant, `None` if it is not close to an exon.
fn splicing_region(
    tx: &Transcript,
    intron: &Region,
    var: &Variant,
    config: &AnnotationConfig,
) -> Option<String> {
    let (d_left, d_right) = if var.var_type() == VarType::Ins {
        (var.start - intron.start + 2, intron.end - var.start + 1)
    } else {
        (var.start - intron.start + 1, intron.end - var.end + 1)
    };
    if d_left.min(d_right) > config.splicing_distance {
        return None;
    }
    let idx = tx.regions.iter().position(|r| r == intron)?;
    let neighbor = if d_left <= d_right {
        idx.checked_sub(1).and_then(|i| tx.regions.get(i))
    } else {
        tx.regions.get(idx + 1)
    };
    Some(match neighbor {
        Some(r) if r.kind == RegionType::Utr => format!("UTR{}_splicing", r.order),
        _ => "splicing".to_string(),
    })
}

/// Annotate `var` on the body of `tx`; `None` if the variant misses the transcript.
///
/// The transcript must have its regions attached.
pub fn annotate_transcript(
    tx: &Transcript,
    var: &Variant,
    config: &AnnotationConfig,
) -> Option<TranscriptAnnotation> {
    let (fp_start, fp_end) = footprint(var, tx.strand);
    let mut touched = tx
        .regions
        .iter()
        .filter(|r| r.overlaps(fp_start, fp_end))
        .collect::<Vec<_>>();
    if touched.is_empty() {
        return None;
    }
    if tx.strand == Strand::Minus {
        touched.reverse();
    }
    let coords = TxCoords::new(tx);
    let label = region_label(&touched, config.exon_naming);
    let na_change = positional_na_change(tx, &coords, var);

    if !tx.is_coding() {
        return Some(TranscriptAnnotation::new(tx, "ncRNA", label, na_change));
    }

    let has = |kind: RegionType| touched.iter().any(|r| r.kind == kind);
    let (cds, intron) = (has(RegionType::Cds), has(RegionType::Intron));
    if var.var_type() != VarType::Ins && fp_start <= tx.cds_start && fp_end >= tx.cds_end {
        let mut result = TranscriptAnnotation::new(tx, "transcript", label, na_change);
        result.event = "deletion".to_string();
        return Some(result);
    }

    if cds {
        let region = if intron { "exonic_splicing" } else { "exonic" };
        let mut result = TranscriptAnnotation::new(tx, region, label, na_change);
        if tx.completeness != Completeness::Complete {
            result.event = "incmplCDS".to_string();
            return Some(result);
        }
        if let Some(edit) = CdsEdit::new(tx, var) {
            if touched.iter().all(|r| r.kind == RegionType::Cds) {
                result.na_change = edit.na_change(var.var_type());
            }
            let change = edit.protein_change(
                var.var_type(),
                CodonTable::for_chrom(&tx.chrom),
                config.aa_short,
            );
            result.aa_change = change.aa_change;
            result.event = if intron {
                format!("{}_splicing", change.event)
            } else {
                change.event
            };
        }
        return Some(result);
    }

    if let Some(utr) = touched.iter().find(|r| r.kind == RegionType::Utr) {
        let region = format!("UTR{}", utr.order);
        return Some(TranscriptAnnotation::new(tx, &region, label, na_change));
    }

    // Only the intron is left.
    Some(match splicing_region(tx, touched[0], var, config) {
        Some(region) => {
            let mut result = TranscriptAnnotation::new(tx, &region, label, na_change);
            result.event = "splicing".to_string();
            result
        }
        None => TranscriptAnnotation::new(tx, "intronic", label, na_change),
    })
}

/// Annotate `var` as upstream or downstream of `tx` if within the flank distance.
pub fn annotate_flank(
    tx: &Transcript,
    var: &Variant,
    config: &AnnotationConfig,
) -> Option<TranscriptAnnotation> {
    let (fp_start, fp_end) = footprint(var, tx.strand);
    let (left, dist) = if fp_end < tx.tx_start {
        (true, tx.tx_start - fp_end)
    } else if fp_start > tx.tx_end {
        (false, fp_start - tx.tx_end)
    } else {
        return None;
    };
    if dist > config.flank_distance {
        return None;
    }
    let region = match (left, tx.strand) {
        (true, Strand::Plus) | (false, Strand::Minus) => "upstream",
        _ => "downstream",
    };
    let na_change = positional_na_change(tx, &TxCoords::new(tx), var);
    Some(TranscriptAnnotation::new(
        tx,
        region,
        region.to_string(),
        na_change,
    ))
}
