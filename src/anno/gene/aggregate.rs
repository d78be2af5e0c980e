//! Selection and per-gene aggregation of transcript annotations.

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use super::{annotate_flank, annotate_transcript, TranscriptAnnotation};
use crate::{
    common::join_or_dot,
    conf::AnnotationConfig,
    transcript::{Completeness, Transcript},
    variant::Variant,
};

/// Precedence bucket of a region, lower is more important.
fn bucket(region: &str) -> usize {
    match region {
        "exonic" | "splicing" | "exonic_splicing" | "transcript" => 0,
        _ if region.ends_with("_splicing") => 0,
        "ncRNA" => 1,
        "UTR5" | "UTR3" => 2,
        "intronic" => 3,
        _ => 4,
    }
}

/// Keep the annotations of the most relevant transcripts.
///
/// Complete transcripts hitting an exon or splice site win, then any complete transcript,
/// then incomplete ones and finally non-coding ones.
pub fn select(annos: Vec<TranscriptAnnotation>) -> Vec<TranscriptAnnotation> {
    let tiers: [&dyn Fn(&TranscriptAnnotation) -> bool; 3] = [
        &|a: &TranscriptAnnotation| {
            a.completeness == Completeness::Complete && bucket(&a.region) == 0
        },
        &|a: &TranscriptAnnotation| a.completeness == Completeness::Complete,
        &|a: &TranscriptAnnotation| a.completeness == Completeness::Incomplete,
    ];
    for tier in tiers {
        if annos.iter().any(tier) {
            return annos.into_iter().filter(|a| tier(a)).collect();
        }
    }
    annos
}

/// Aggregated annotation of one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneAnnotation {
    pub gene: String,
    pub gene_id: String,
    pub regions: Vec<String>,
    pub events: Vec<String>,
    pub details: Vec<String>,
}

impl GeneAnnotation {
    /// Merge the selected annotations of one gene.
    ///
    /// Events and details are kept for every annotation, regions only for the most
    /// important bucket.
    fn from_annos(annos: &[&TranscriptAnnotation]) -> Option<Self> {
        let best = annos.iter().map(|a| bucket(&a.region)).min()?;
        let first = annos.first()?;
        let (mut regions, mut events, mut details) =
            (IndexSet::new(), IndexSet::new(), IndexSet::new());
        for anno in annos {
            if bucket(&anno.region) == best {
                regions.insert(anno.region.clone());
            }
            if anno.event != "." {
                events.insert(anno.event.clone());
            }
            details.insert(anno.detail());
        }
        Some(Self {
            gene: first.gene.clone(),
            gene_id: first.gene_id.clone(),
            regions: regions.into_iter().collect(),
            events: events.into_iter().collect(),
            details: details.into_iter().collect(),
        })
    }
}

/// Values of each gene joined with `|`, genes joined with `,`.
fn per_gene<F>(genes: &[GeneAnnotation], values: F) -> String
where
    F: Fn(&GeneAnnotation) -> &[String],
{
    genes
        .iter()
        .map(|gene| join_or_dot(values(gene), "|"))
        .join(",")
}

/// All annotations of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantAnnotation {
    /// Every transcript annotation computed, before selection.
    pub transcripts: Vec<TranscriptAnnotation>,
    pub genes: Vec<GeneAnnotation>,
}

impl VariantAnnotation {
    /// Values of the `Gene GeneID Event Region Detail` columns.
    ///
    /// The columns list the genes in the same order so that the `n`-th comma separated entry of
    /// each column belongs to the same gene.
    pub fn columns(&self) -> [String; 5] {
        if self.genes.is_empty() {
            return [
                ".".to_string(),
                ".".to_string(),
                ".".to_string(),
                "intergenic".to_string(),
                ".".to_string(),
            ];
        }
        [
            self.genes.iter().map(|g| &g.gene).join(","),
            self.genes.iter().map(|g| &g.gene_id).join(","),
            per_gene(&self.genes, |g| g.events.as_slice()),
            per_gene(&self.genes, |g| g.regions.as_slice()),
            per_gene(&self.genes, |g| g.details.as_slice()),
        ]
    }
}

/// Annotate `var` against the candidate transcripts, which must have regions attached.
///
/// Flanking annotations are only used when no transcript body is hit.
pub fn annotate_variant(
    var: &Variant,
    candidates: &[&Transcript],
    config: &AnnotationConfig,
) -> VariantAnnotation {
    let mut transcripts = candidates
        .iter()
        .filter_map(|tx| annotate_transcript(tx, var, config))
        .collect::<Vec<_>>();
    if transcripts.is_empty() {
        transcripts = candidates
            .iter()
            .filter_map(|tx| annotate_flank(tx, var, config))
            .collect();
    }

    let selected = select(transcripts.clone());
    let mut by_gene: IndexMap<&str, Vec<&TranscriptAnnotation>> = IndexMap::new();
    for anno in &selected {
        by_gene.entry(anno.gene.as_str()).or_default().push(anno);
    }
    let genes = by_gene
        .values()
        .filter_map(|annos| GeneAnnotation::from_annos(annos))
        .collect();

    VariantAnnotation { transcripts, genes }
}
