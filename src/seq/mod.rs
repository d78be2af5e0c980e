//! Nucleotide and protein sequence helpers.
//!
//! All sequences are owned byte buffers; editing functions return a new buffer and
//! leave their input untouched.

pub mod source;

/// Codon table selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CodonTable {
    /// NCBI table 1.
    #[strum(serialize = "standard")]
    Standard,
    /// NCBI table 2 (vertebrate mitochondrial).
    #[strum(serialize = "mitochondrial")]
    Mitochondrial,
}

impl CodonTable {
    /// Table to use for the given canonical chromosome.
    pub fn for_chrom(chrom: &str) -> Self {
        if chrom == "MT" {
            CodonTable::Mitochondrial
        } else {
            CodonTable::Standard
        }
    }

    fn amino_acids(&self) -> &'static [u8; 64] {
        // Index is 16 * first + 4 * second + third with T=0, C=1, A=2, G=3.
        match self {
            CodonTable::Standard => {
                b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"
            }
            CodonTable::Mitochondrial => {
                b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG"
            }
        }
    }

    /// Translate one codon, `X` if it contains an ambiguous base.
    pub fn translate_codon(&self, codon: &[u8]) -> u8 {
        let mut idx = 0usize;
        for base in codon {
            let value = match base.to_ascii_uppercase() {
                b'T' | b'U' => 0,
                b'C' => 1,
                b'A' => 2,
                b'G' => 3,
                _ => return b'X',
            };
            idx = idx * 4 + value;
        }
        if codon.len() != 3 {
            b'X'
        } else {
            self.amino_acids()[idx]
        }
    }
}

/// Translate a coding sequence, a trailing partial codon is ignored.
pub fn translate(seq: &[u8], table: CodonTable) -> Vec<u8> {
    seq.chunks_exact(3)
        .map(|codon| table.translate_codon(codon))
        .collect()
}

/// Reverse complement, `N` for anything that is not a nucleotide.
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|base| match base.to_ascii_uppercase() {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            b'-' => b'-',
            _ => b'N',
        })
        .collect()
}

/// Replace `seq[start..end]` by `replacement`.
pub fn replace(seq: &[u8], start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
    let start = start.min(seq.len());
    let end = end.clamp(start, seq.len());
    let mut result = Vec::with_capacity(seq.len() - (end - start) + replacement.len());
    result.extend_from_slice(&seq[..start]);
    result.extend_from_slice(replacement);
    result.extend_from_slice(&seq[end..]);
    result
}

/// Insert `insertion` before the 0-based offset `pos`.
pub fn insert(seq: &[u8], pos: usize, insertion: &[u8]) -> Vec<u8> {
    replace(seq, pos, pos, insertion)
}

/// Index of the first differing position, also when one is a prefix of the other.
pub fn first_difference(lhs: &[u8], rhs: &[u8]) -> Option<usize> {
    let common = lhs
        .iter()
        .zip(rhs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == lhs.len() && common == rhs.len() {
        None
    } else {
        Some(common)
    }
}

/// The divergent windows of two sequences after removing shared prefix and suffix.
///
/// Returns `(start, end_lhs, end_rhs)` such that `lhs[start..end_lhs]` was replaced by
/// `rhs[start..end_rhs]`. The suffix is clipped so that prefix and suffix never claim
/// more than the shorter sequence.
pub fn difference(lhs: &[u8], rhs: &[u8]) -> (usize, usize, usize) {
    let min_len = lhs.len().min(rhs.len());
    let prefix = lhs
        .iter()
        .zip(rhs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut suffix = lhs
        .iter()
        .rev()
        .zip(rhs.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    if prefix + suffix > min_len {
        suffix = min_len - prefix;
    }
    (prefix, lhs.len() - suffix, rhs.len() - suffix)
}

/// Truncate a protein after its first stop.
pub fn truncate_at_stop(protein: &[u8]) -> &[u8] {
    match protein.iter().position(|aa| *aa == b'*') {
        Some(idx) => &protein[..=idx],
        None => protein,
    }
}

/// Name of an amino acid, one- or three-letter code.
pub fn aa_name(aa: u8, short: bool) -> String {
    if short {
        return (aa as char).to_string();
    }
    let name = match aa {
        b'A' => "Ala",
        b'R' => "Arg",
        b'N' => "Asn",
        b'D' => "Asp",
        b'C' => "Cys",
        b'Q' => "Gln",
        b'E' => "Glu",
        b'G' => "Gly",
        b'H' => "His",
        b'I' => "Ile",
        b'L' => "Leu",
        b'K' => "Lys",
        b'M' => "Met",
        b'F' => "Phe",
        b'P' => "Pro",
        b'S' => "Ser",
        b'T' => "Thr",
        b'W' => "Trp",
        b'Y' => "Tyr",
        b'V' => "Val",
        b'*' => "Ter",
        _ => "Xaa",
    };
    name.to_string()
}

/// Names of a run of amino acids, concatenated.
pub fn aa_names(protein: &[u8], short: bool) -> String {
    protein.iter().map(|aa| aa_name(*aa, short)).collect()
}

/// Render bytes as string.
pub fn to_str(seq: &[u8]) -> String {
    String::from_utf8_lossy(seq).to_string()
}
