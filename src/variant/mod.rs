//! Variant representation and parsimony normalization.

use serde::{Deserialize, Serialize};

use crate::{common::canonical_chrom, err::AnnoError};

pub mod input;

/// Type of a normalized small variant.
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum VarType {
    Snp,
    Ins,
    Del,
    Sub,
}

/// A normalized variant with 1-based, closed coordinates.
///
/// Insertions happen between `start` and `start + 1` and have `start == end`.  The
/// derived ordering is by `(chrom, start, end, ref, alt)`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_new::new,
)]
pub struct Variant {
    pub chrom: String,
    pub start: i32,
    pub end: i32,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternative: String,
}

impl Variant {
    pub fn var_type(&self) -> VarType {
        if self.reference == "-" {
            VarType::Ins
        } else if self.alternative == "-" {
            VarType::Del
        } else if self.reference.len() == 1 && self.alternative.len() == 1 {
            VarType::Snp
        } else {
            VarType::Sub
        }
    }

    /// The five key columns, tab-separated.
    pub fn key(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            &self.chrom, self.start, self.end, &self.reference, &self.alternative
        )
    }

    /// Reference allele bases, empty for insertions.
    pub fn ref_bases(&self) -> &[u8] {
        allele_bases(&self.reference)
    }

    /// Alternative allele bases, empty for deletions.
    pub fn alt_bases(&self) -> &[u8] {
        allele_bases(&self.alternative)
    }

    /// Number of reference bases covered, 1 for insertions.
    pub fn span_len(&self) -> i32 {
        self.end - self.start + 1
    }
}

fn allele_bases(allele: &str) -> &[u8] {
    if allele == "-" {
        &[]
    } else {
        allele.as_bytes()
    }
}

fn common_prefix(lhs: &[u8], rhs: &[u8]) -> usize {
    lhs.iter().zip(rhs).take_while(|(a, b)| a == b).count()
}

fn common_suffix(lhs: &[u8], rhs: &[u8]) -> usize {
    lhs.iter()
        .rev()
        .zip(rhs.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Reduce `(chrom, pos, ref, alt)` to its minimal representation.
///
/// `-` stands for the empty allele.  Variants that are already minimal are returned
/// unchanged; a call with identical alleles is rejected.
pub fn normalize(
    chrom: &str,
    pos: i32,
    reference: &str,
    alternative: &str,
    mt_aliases: &[String],
) -> Result<Variant, AnnoError> {
    let chrom = canonical_chrom(chrom, mt_aliases);
    let reference = reference.to_ascii_uppercase();
    let alternative = alternative.to_ascii_uppercase();
    let mut ref_bases = allele_bases(&reference);
    let mut alt_bases = allele_bases(&alternative);
    if ref_bases == alt_bases {
        return Err(AnnoError::DegenerateVariant {
            chrom,
            pos,
            allele: reference,
        });
    }

    let mut pos = pos;
    if !ref_bases.is_empty() && !alt_bases.is_empty() {
        if ref_bases.starts_with(alt_bases) {
            pos += alt_bases.len() as i32;
            ref_bases = &ref_bases[alt_bases.len()..];
            alt_bases = &[];
        } else if ref_bases.ends_with(alt_bases) {
            ref_bases = &ref_bases[..ref_bases.len() - alt_bases.len()];
            alt_bases = &[];
        } else if alt_bases.starts_with(ref_bases) {
            pos += ref_bases.len() as i32 - 1;
            alt_bases = &alt_bases[ref_bases.len()..];
            ref_bases = &[];
        } else if alt_bases.ends_with(ref_bases) {
            pos -= 1;
            alt_bases = &alt_bases[..alt_bases.len() - ref_bases.len()];
            ref_bases = &[];
        } else {
            let suffix = common_suffix(ref_bases, alt_bases);
            ref_bases = &ref_bases[..ref_bases.len() - suffix];
            alt_bases = &alt_bases[..alt_bases.len() - suffix];
            let prefix = common_prefix(ref_bases, alt_bases);
            ref_bases = &ref_bases[prefix..];
            alt_bases = &alt_bases[prefix..];
            pos += prefix as i32;
            if prefix > 0 && ref_bases.is_empty() {
                pos -= 1;
            }
        }
    }

    let end = if ref_bases.is_empty() {
        pos
    } else {
        pos + ref_bases.len() as i32 - 1
    };
    let render = |bases: &[u8]| {
        if bases.is_empty() {
            "-".to_string()
        } else {
            String::from_utf8_lossy(bases).to_string()
        }
    };
    Ok(Variant {
        chrom,
        start: pos,
        end,
        reference: render(ref_bases),
        alternative: render(alt_bases),
    })
}
