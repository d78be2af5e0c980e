//! Editing of the coding sequence and the resulting nucleotide and protein changes.

use crate::{
    seq::{self, CodonTable},
    transcript::{RegionType, Strand, Transcript},
    variant::{VarType, Variant},
};

/// The coding sequence before and after applying a variant, in transcript orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsEdit {
    pub old: Vec<u8>,
    pub new: Vec<u8>,
}

/// Number of CDS bases of `tx` located before the genomic position `pos`.
fn cds_offset(tx: &Transcript, pos: i32) -> usize {
    tx.regions
        .iter()
        .filter(|r| r.kind == RegionType::Cds)
        .map(|r| {
            if pos > r.end {
                r.len()
            } else if pos > r.start {
                pos - r.start
            } else {
                0
            }
        })
        .sum::<i32>() as usize
}

impl CdsEdit {
    /// Apply `var` to the coding sequence of `tx`; `None` without attached sequence.
    pub fn new(tx: &Transcript, var: &Variant) -> Option<Self> {
        let mut cdna = Vec::new();
        for region in tx.regions.iter().filter(|r| r.kind == RegionType::Cds) {
            cdna.extend_from_slice(region.sequence.as_deref()?);
        }
        if cdna.is_empty() {
            return None;
        }

        let alt = var.alt_bases();
        let new = match var.var_type() {
            VarType::Ins => seq::insert(&cdna, cds_offset(tx, var.start + 1), alt),
            VarType::Snp | VarType::Del | VarType::Sub => {
                let (lo, hi) = (cds_offset(tx, var.start), cds_offset(tx, var.end + 1));
                // Alternative bases facing the UTR are dropped along with their reference.
                let left = (tx.cds_start - var.start).max(0) as usize;
                let right = (var.end - tx.cds_end).max(0) as usize;
                let alt = if left + right >= alt.len() {
                    &alt[..0]
                } else {
                    &alt[left..alt.len() - right]
                };
                seq::replace(&cdna, lo, hi, alt)
            }
        };

        Some(match tx.strand {
            Strand::Plus => Self { old: cdna, new },
            Strand::Minus => Self {
                old: seq::revcomp(&cdna),
                new: seq::revcomp(&new),
            },
        })
    }

    /// Length change of the coding sequence.
    pub fn delta(&self) -> i64 {
        self.new.len() as i64 - self.old.len() as i64
    }

    pub fn is_frameshift(&self) -> bool {
        self.delta() % 3 != 0
    }

    /// `c.` notation derived from the divergent window of old and new sequence.
    pub fn na_change(&self, var_type: VarType) -> String {
        let (old, new) = (&self.old, &self.new);
        let (start, end_old, end_new) = seq::difference(old, new);
        let deleted = &old[start..end_old];
        let inserted = &new[start..end_new];
        match (deleted.len(), inserted.len()) {
            (0, 0) => "c.=".to_string(),
            (1, 1) if var_type == VarType::Snp => format!(
                "c.{}{}>{}",
                start + 1,
                deleted[0] as char,
                inserted[0] as char
            ),
            (0, len) => {
                if start >= len && &old[start - len..start] == inserted {
                    if len == 1 {
                        format!("c.{}dup", start)
                    } else {
                        format!("c.{}_{}dup", start - len + 1, start)
                    }
                } else if start == 0 {
                    format!("c.-1_1ins{}", seq::to_str(inserted))
                } else {
                    format!("c.{}_{}ins{}", start, start + 1, seq::to_str(inserted))
                }
            }
            (1, 0) => format!("c.{}del", start + 1),
            (_, 0) => format!("c.{}_{}del", start + 1, end_old),
            (1, _) => format!("c.{}delins{}", start + 1, seq::to_str(inserted)),
            (_, _) => format!("c.{}_{}delins{}", start + 1, end_old, seq::to_str(inserted)),
        }
    }

    /// Protein change notation and event name.
    pub fn protein_change(
        &self,
        var_type: VarType,
        table: CodonTable,
        aa_short: bool,
    ) -> ProteinChange {
        let old = seq::translate(&self.old, table);
        let new = seq::translate(&self.new, table);
        match var_type {
            VarType::Snp => snv_change(&self.old, &self.new, &old, &new, aa_short),
            VarType::Ins | VarType::Del | VarType::Sub => {
                let kind = match var_type {
                    VarType::Ins => "ins",
                    VarType::Del => "del",
                    _ => "sub",
                };
                if self.is_frameshift() {
                    frameshift_change(kind, &old, &new, aa_short)
                } else {
                    inframe_change(kind, &old, &new, aa_short)
                }
            }
        }
    }
}

/// Result of comparing reference and alternative protein.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinChange {
    pub aa_change: Option<String>,
    pub event: String,
}

impl ProteinChange {
    fn new(aa_change: Option<String>, event: &str) -> Self {
        Self {
            aa_change,
            event: event.to_string(),
        }
    }
}

fn snv_change(old_na: &[u8], new_na: &[u8], old: &[u8], new: &[u8], short: bool) -> ProteinChange {
    let idx = match seq::first_difference(old_na, new_na) {
        Some(idx) => idx / 3,
        None => return ProteinChange::new(None, "synonymous_snv"),
    };
    let (aa1, aa2) = match (old.get(idx), new.get(idx)) {
        (Some(aa1), Some(aa2)) => (*aa1, *aa2),
        _ => return ProteinChange::new(None, "unknown"),
    };
    let (name1, name2) = (seq::aa_name(aa1, short), seq::aa_name(aa2, short));
    let no = idx + 1;
    if aa1 == aa2 {
        ProteinChange::new(Some(format!("p.{}{}=", name1, no)), "synonymous_snv")
    } else if idx == 0 && aa1 == b'M' {
        ProteinChange::new(Some(format!("p.{}{}{}", name1, no, name2)), "startloss")
    } else if aa1 == b'*' {
        ProteinChange::new(
            Some(format!("p.{}{}{}ext*?", name1, no, name2)),
            "stoploss",
        )
    } else if aa2 == b'*' {
        ProteinChange::new(Some(format!("p.{}{}{}", name1, no, name2)), "stopgain")
    } else {
        ProteinChange::new(
            Some(format!("p.{}{}{}", name1, no, name2)),
            "nonsynonymous_snv",
        )
    }
}

fn frameshift_change(kind: &str, old: &[u8], new: &[u8], short: bool) -> ProteinChange {
    let mut event = format!("{}_frameshift", kind);
    let idx = match seq::first_difference(old, new) {
        Some(idx) => idx,
        None => return ProteinChange::new(Some("p.=".to_string()), &event),
    };
    let aa1 = match old.get(idx) {
        Some(aa1) => *aa1,
        None => return ProteinChange::new(None, &event),
    };
    if idx == 0 && aa1 == b'M' {
        event.push_str("_startloss");
    }
    if aa1 == b'*' {
        event.push_str("_stoploss");
    }
    let name1 = seq::aa_name(aa1, short);
    let aa_change = match new.get(idx) {
        Some(b'*') => format!("p.{}{}{}", name1, idx + 1, seq::aa_name(b'*', short)),
        Some(aa2) => {
            let term = match new[idx..].iter().position(|aa| *aa == b'*') {
                Some(dist) => (dist + 1).to_string(),
                None => "?".to_string(),
            };
            format!("p.{}{}{}fs*{}", name1, idx + 1, seq::aa_name(*aa2, short), term)
        }
        None => format!("p.{}{}fs", name1, idx + 1),
    };
    ProteinChange::new(Some(aa_change), &event)
}

fn inframe_change(kind: &str, old: &[u8], new: &[u8], short: bool) -> ProteinChange {
    let old = seq::truncate_at_stop(old);
    let new = seq::truncate_at_stop(new);
    let mut event = format!("{}_inframe", kind);
    if old.is_empty() {
        return ProteinChange::new(None, &event);
    }
    let (mut start, mut end_old, mut end_new) = seq::difference(old, new);
    if start == end_old && start == end_new {
        return ProteinChange::new(Some("p.=".to_string()), &event);
    }

    let is_dup = start == end_old && {
        let len = end_new - start;
        start >= len && old[start - len..start] == new[start..end_new]
    };
    // Insertions need a flanking residue on both sides, widen to a delins otherwise.
    if start == end_old && !is_dup {
        if start == 0 {
            end_old += 1;
            end_new += 1;
        } else if start >= old.len() {
            start -= 1;
        }
    }
    end_old = end_old.min(old.len());
    end_new = end_new.min(new.len());
    let deleted = &old[start..end_old];
    let inserted = &new[start..end_new];

    if start == 0 && old.first() == Some(&b'M') && new.first() != Some(&b'M') {
        event.push_str("_startloss");
    }
    if deleted.contains(&b'*') && !inserted.contains(&b'*') {
        event.push_str("_stoploss");
    }
    if inserted.contains(&b'*') && !deleted.contains(&b'*') {
        event.push_str("_stopgain");
    }

    let name = |idx: usize| seq::aa_name(old[idx], short);
    let aa_change = match (deleted.len(), inserted.len()) {
        (0, len) if start >= len && &old[start - len..start] == inserted => {
            if len == 1 {
                format!("p.{}{}dup", name(start - 1), start)
            } else {
                format!(
                    "p.{}{}_{}{}dup",
                    name(start - len),
                    start - len + 1,
                    name(start - 1),
                    start
                )
            }
        }
        (0, _) => format!(
            "p.{}{}_{}{}ins{}",
            name(start - 1),
            start,
            name(start),
            start + 1,
            seq::aa_names(inserted, short)
        ),
        (1, 0) => format!("p.{}{}del", name(start), start + 1),
        (_, 0) => format!(
            "p.{}{}_{}{}del",
            name(start),
            start + 1,
            name(end_old - 1),
            end_old
        ),
        (1, _) => format!(
            "p.{}{}delins{}",
            name(start),
            start + 1,
            seq::aa_names(inserted, short)
        ),
        (_, _) => format!(
            "p.{}{}_{}{}delins{}",
            name(start),
            start + 1,
            name(end_old - 1),
            end_old,
            seq::aa_names(inserted, short)
        ),
    };
    ProteinChange::new(Some(aa_change), &event)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::CdsEdit;
    use crate::{seq::CodonTable, transcript::test::built_transcript, variant::Variant};

    #[rstest::rstest]
    #[case("TX1", "1", 29, 29, "A", "G", "c.9A>G", "p.Lys3=", "synonymous_snv")]
    #[case("TX1", "1", 21, 21, "A", "G", "c.1A>G", "p.Met1Val", "startloss")]
    #[case("TX1", "1", 30, 30, "G", "T", "c.10G>T", "p.Glu4Ter", "stopgain")]
    #[case("TX1", "1", 60, 60, "T", "C", "c.25T>C", "p.Ter9Argext*?", "stoploss")]
    #[case("TX1", "1", 29, 31, "AGA", "-", "c.10_12del", "p.Glu4del", "del_inframe")]
    #[case("TX1", "1", 33, 33, "-", "A", "c.13_14insA", "p.Leu5Hisfs*?", "ins_frameshift")]
    #[case("TX1", "1", 26, 26, "-", "GCC", "c.4_6dup", "p.Ala2dup", "ins_inframe")]
    #[case("TX1", "1", 27, 28, "AA", "GG", "c.7_8delinsGG", "p.Lys3delinsGly", "sub_inframe")]
    #[case("TX2", "2", 42, 42, "T", "A", "c.6A>T", "p.Lys2Asn", "nonsynonymous_snv")]
    #[case("TX2", "2", 38, 38, "C", "-", "c.12del", "p.Phe5Leufs*?", "del_frameshift")]
    #[allow(clippy::too_many_arguments)]
    fn coding_change(
        #[case] tx_name: &str,
        #[case] chrom: &str,
        #[case] start: i32,
        #[case] end: i32,
        #[case] reference: &str,
        #[case] alternative: &str,
        #[case] na_change: &str,
        #[case] aa_change: &str,
        #[case] event: &str,
    ) {
        let tx = built_transcript(tx_name);
        let var = Variant::new(
            chrom.into(),
            start,
            end,
            reference.into(),
            alternative.into(),
        );
        let edit = CdsEdit::new(&tx, &var).unwrap();
        assert_eq!(edit.na_change(var.var_type()), na_change);
        let change = edit.protein_change(var.var_type(), CodonTable::Standard, false);
        assert_eq!(change.aa_change.as_deref(), Some(aa_change));
        assert_eq!(change.event, event);
    }

    #[test]
    fn short_amino_acids() {
        let tx = built_transcript("TX1");
        let var = Variant::new("1".into(), 30, 30, "G".into(), "T".into());
        let edit = CdsEdit::new(&tx, &var).unwrap();
        let change = edit.protein_change(var.var_type(), CodonTable::Standard, true);
        insta::assert_snapshot!(change.aa_change.unwrap_or_default(), @"p.E4*");
    }

    #[test]
    fn minus_strand_orientation() {
        let tx = built_transcript("TX2");
        let var = Variant::new("2".into(), 42, 42, "T".into(), "A".into());
        let edit = CdsEdit::new(&tx, &var).unwrap();
        assert_eq!(edit.old, b"ATGAAACCCGGGTTTGCATGGTAA".to_vec());
        assert_eq!(edit.new, b"ATGAATCCCGGGTTTGCATGGTAA".to_vec());
    }

    #[test]
    fn frameshift_iff_length_change_not_multiple_of_three() {
        let tx = built_transcript("TX1");
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..100 {
            let len = rng.i32(1..7);
            let start = rng.i32(24..=(35 - len + 1));
            let end = start + len - 1;
            let var = if rng.bool() {
                let reference = (start..=end).map(|_| 'N').collect::<String>();
                Variant::new("1".into(), start, end, reference, "-".into())
            } else {
                let alt = (0..len).map(|_| 'T').collect::<String>();
                Variant::new("1".into(), start, start, "-".into(), alt)
            };
            let edit = CdsEdit::new(&tx, &var).unwrap();
            let change = edit.protein_change(var.var_type(), CodonTable::Standard, false);
            assert_eq!(
                change.event.contains("frameshift"),
                len % 3 != 0,
                "{:?} gave {}",
                &var,
                &change.event
            );
        }
    }
}
