//! Mapping of genomic positions to `c.`/`n.` coordinates of a transcript.

use std::fmt;

use crate::transcript::{Strand, Transcript};

/// Position relative to the transcript sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `c.N`, negative for the 5' UTR (`c.-N`).
    Coding(i32),
    /// `c.*N` or `n.*N`, behind the CDS or the transcript end.
    ThreePrime(i32),
    /// `n.N`, negative upstream of the transcript.
    NonCoding(i32),
}

/// An anchor plus an intronic offset, e.g. `c.15+2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPos {
    pub anchor: Anchor,
    pub offset: i32,
}

impl fmt::Display for TxPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Coding(pos) | Anchor::NonCoding(pos) => write!(f, "{}", pos)?,
            Anchor::ThreePrime(pos) => write!(f, "*{}", pos)?,
        }
        match self.offset {
            0 => Ok(()),
            o if o > 0 => write!(f, "+{}", o),
            o => write!(f, "{}", o),
        }
    }
}

/// Coordinate mapper for one transcript.
#[derive(Debug, Clone)]
pub struct TxCoords {
    strand: Strand,
    tx_start: i32,
    tx_end: i32,
    /// Exons in transcript order.
    exons: Vec<(i32, i32)>,
    tx_len: i32,
    /// Transcript positions of the first and last CDS base.
    cds: Option<(i32, i32)>,
}

impl TxCoords {
    pub fn new(tx: &Transcript) -> Self {
        let mut exons = tx
            .exon_starts
            .iter()
            .cloned()
            .zip(tx.exon_ends.iter().cloned())
            .collect::<Vec<_>>();
        if tx.strand == Strand::Minus {
            exons.reverse();
        }
        let tx_len = exons.iter().map(|(s, e)| e - s + 1).sum();
        let mut result = Self {
            strand: tx.strand,
            tx_start: tx.tx_start,
            tx_end: tx.tx_end,
            exons,
            tx_len,
            cds: None,
        };
        if tx.is_coding() {
            let (five, three) = match tx.strand {
                Strand::Plus => (tx.cds_start, tx.cds_end),
                Strand::Minus => (tx.cds_end, tx.cds_start),
            };
            result.cds = result.tx_pos(five).zip(result.tx_pos(three));
        }
        result
    }

    /// 1-based position in the spliced transcript of an exonic genomic position.
    pub fn tx_pos(&self, pos: i32) -> Option<i32> {
        let mut offset = 0;
        for &(start, end) in &self.exons {
            if start <= pos && pos <= end {
                return Some(match self.strand {
                    Strand::Plus => offset + pos - start + 1,
                    Strand::Minus => offset + end - pos + 1,
                });
            }
            offset += end - start + 1;
        }
        None
    }

    fn anchor(&self, tx_pos: i32) -> Anchor {
        match self.cds {
            Some((cds_first, _)) if tx_pos < cds_first => Anchor::Coding(tx_pos - cds_first),
            Some((cds_first, cds_last)) if tx_pos <= cds_last => {
                Anchor::Coding(tx_pos - cds_first + 1)
            }
            Some((_, cds_last)) => Anchor::ThreePrime(tx_pos - cds_last),
            None if tx_pos < 1 => Anchor::NonCoding(tx_pos - 1),
            None if tx_pos > self.tx_len => Anchor::ThreePrime(tx_pos - self.tx_len),
            None => Anchor::NonCoding(tx_pos),
        }
    }

    /// Map a genomic position; flanking positions extend the transcript linearly.
    pub fn position(&self, pos: i32) -> TxPos {
        if pos < self.tx_start || pos > self.tx_end {
            let dist = if pos < self.tx_start {
                self.tx_start - pos
            } else {
                pos - self.tx_end
            };
            let upstream = match self.strand {
                Strand::Plus => pos < self.tx_start,
                Strand::Minus => pos > self.tx_end,
            };
            let tx_pos = if upstream { 1 - dist } else { self.tx_len + dist };
            return TxPos {
                anchor: self.anchor(tx_pos),
                offset: 0,
            };
        }
        if let Some(tx_pos) = self.tx_pos(pos) {
            return TxPos {
                anchor: self.anchor(tx_pos),
                offset: 0,
            };
        }

        // Intronic: find the flanking exons in genomic order.
        let (left_end, right_start) = self
            .exons
            .iter()
            .filter(|(_, end)| *end < pos)
            .map(|(_, end)| *end)
            .max()
            .zip(
                self.exons
                    .iter()
                    .filter(|(start, _)| *start > pos)
                    .map(|(start, _)| *start)
                    .min(),
            )
            .unwrap_or((pos - 1, pos + 1));
        let (d_left, d_right) = (pos - left_end, right_start - pos);
        let ((up_base, up_dist), (down_base, down_dist)) = match self.strand {
            Strand::Plus => ((left_end, d_left), (right_start, d_right)),
            Strand::Minus => ((right_start, d_right), (left_end, d_left)),
        };
        let (base, offset) = if up_dist <= down_dist {
            (up_base, up_dist)
        } else {
            (down_base, -down_dist)
        };
        let anchor = self
            .tx_pos(base)
            .map(|tx_pos| self.anchor(tx_pos))
            .unwrap_or(Anchor::NonCoding(0));
        TxPos { anchor, offset }
    }

    /// Order two genomic positions 5' to 3' along the transcript.
    pub fn oriented(&self, first: i32, second: i32) -> (i32, i32) {
        match self.strand {
            Strand::Plus => (first, second),
            Strand::Minus => (second, first),
        }
    }
}
