//! Implementation of `anno cnv` subcommand.

use std::{collections::HashMap, io::Write, time::Instant};

use indexmap::IndexSet;
use rayon::prelude::*;
use thousands::Separable;

use crate::{
    common::{self, io::open_write_maybe_gz, join_or_dot},
    conf::{AnnotationConfig, ConfigArgs},
    err::AnnoError,
    matcher::{check_sorted, cmp_interval, merge_overlapping},
    transcript::{
        index::BinIndex, load_transcripts, region::build_regions, GeneIdMap, Region, RegionType,
        Strand, Transcript, TranscriptTable,
    },
    variant::{input, Variant},
};

/// Command line arguments for `anno cnv` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "gene-based annotation of CNVs", long_about = None)]
pub struct Args {
    /// Path to the BED-like CNV file.
    #[arg(long)]
    pub path_input: String,
    /// Path to the genePred/refGene transcript file.
    #[arg(long)]
    pub path_genes: String,
    /// Path to the transcript bin index, built on the fly if not given.
    #[arg(long)]
    pub path_index: Option<String>,
    /// Optional CSV/TSV file mapping gene symbols to IDs.
    #[arg(long)]
    pub path_gene_ids: Option<String>,
    /// Path to the output TSV file.
    #[arg(long)]
    pub path_output: String,
    /// Set the number of threads to use, defaults to number of cores.
    #[arg(long)]
    pub num_threads: Option<usize>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Effect of a CNV on one coding transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnvAnnotation {
    pub gene: String,
    pub gene_id: String,
    pub transcript: String,
    pub strand: Strand,
    pub region: String,
    /// Touched coding regions, e.g. `CDS1_3/5`, or `.`.
    pub cds: String,
    pub tx_start: i32,
    pub tx_end: i32,
}

impl CnvAnnotation {
    /// `Gene:GeneID:Transcript:Strand:Region:CDS:txStart-txEnd`.
    pub fn text(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}-{}",
            &self.gene,
            &self.gene_id,
            &self.transcript,
            self.strand,
            &self.region,
            &self.cds,
            self.tx_start,
            self.tx_end
        )
    }
}

/// Classify the regions of `tx` hit by `cnv`; `regions` must be those of `tx`.
pub fn classify(cnv: &Variant, tx: &Transcript, regions: &[Region]) -> CnvAnnotation {
    let mut ordered = regions.iter().collect::<Vec<_>>();
    if tx.strand == Strand::Minus {
        ordered.reverse();
    }
    let cds_count = ordered.iter().filter(|r| r.kind == RegionType::Cds).count();
    let hit = ordered
        .iter()
        .filter(|r| r.overlaps(cnv.start, cnv.end))
        .collect::<Vec<_>>();
    let cdss = hit
        .iter()
        .filter(|r| r.kind == RegionType::Cds)
        .collect::<Vec<_>>();
    let utr = |order: i32| {
        hit.iter()
            .any(|r| r.kind == RegionType::Utr && r.order == order)
    };
    let (utr5, utr3) = (utr(5), utr(3));

    let region = match (cdss.is_empty(), utr5, utr3) {
        (false, true, true) if cnv.start <= tx.tx_start && cnv.end >= tx.tx_end => "transcript",
        (false, true, true) => "CDNA",
        (false, true, false) => "UTR5_CDS",
        (false, false, true) => "CDS_UTR3",
        (false, false, false) => "CDS",
        (true, true, true) => "ncRNA",
        (true, true, false) => "UTR5",
        (true, false, true) => "UTR3",
        (true, false, false) => "intronic",
    };
    let cds = match (cdss.first(), cdss.last()) {
        (Some(first), Some(last)) if first.order == last.order => {
            format!("CDS{}/{}", first.order, cds_count)
        }
        (Some(first), Some(last)) => format!("CDS{}_{}/{}", first.order, last.order, cds_count),
        _ => ".".to_string(),
    };

    CnvAnnotation {
        gene: tx.gene.clone(),
        gene_id: tx.gene_id_or_dot(),
        transcript: tx.name.clone(),
        strand: tx.strand,
        region: region.to_string(),
        cds,
        tx_start: tx.tx_start,
        tx_end: tx.tx_end,
    }
}

/// Annotate the sorted CNVs of one chromosome; non-coding transcripts are skipped.
pub fn annotate_chrom(
    cnvs: &[Variant],
    table: &TranscriptTable,
    index: &BinIndex,
) -> Result<Vec<Vec<CnvAnnotation>>, AnnoError> {
    check_sorted(cnvs, "CNVs", |v| (v.start, v.end))?;
    let queries = cnvs.iter().map(|v| (v.start, v.end)).collect::<Vec<_>>();
    let bins = index.entries(&table.chrom);
    let mut names = vec![IndexSet::new(); cnvs.len()];
    for (i, j) in merge_overlapping(&queries, bins, |q, bin| {
        cmp_interval(*q, (bin.bin_start, bin.bin_end))
    }) {
        names[i].extend(bins[j].members.iter().cloned());
    }

    let mut regions: HashMap<usize, Vec<Region>> = HashMap::new();
    let mut result = Vec::with_capacity(cnvs.len());
    for (cnv, names) in cnvs.iter().zip(names.iter()) {
        let mut annos = Vec::new();
        let idxs = names
            .iter()
            .flat_map(|name| table.indices_of(name).iter().cloned())
            .collect::<IndexSet<_>>();
        for idx in idxs {
            let tx = &table.transcripts()[idx];
            if !tx.is_coding() || cnv.end < tx.tx_start || cnv.start > tx.tx_end {
                continue;
            }
            if !regions.contains_key(&idx) {
                regions.insert(idx, build_regions(tx, None)?);
            }
            if let Some(tx_regions) = regions.get(&idx) {
                annos.push(classify(cnv, tx, tx_regions));
            }
        }
        result.push(annos);
    }
    Ok(result)
}

/// Main entry point for `anno cnv` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    if let Some(num_threads) = args.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("building global Rayon thread pool failed: {}", e))?;
    }
    let config = AnnotationConfig::from_args(&args.config)?;

    tracing::info!("Loading transcripts and CNVs...");
    let gene_ids = match &args.path_gene_ids {
        Some(path) => GeneIdMap::load(path, &config.mt_aliases)?,
        None => GeneIdMap::default(),
    };
    let transcripts = load_transcripts(&args.path_genes, &gene_ids, &config.mt_aliases)?;
    let index = match &args.path_index {
        Some(path) => BinIndex::load(path, &config.mt_aliases)?,
        None => BinIndex::from_transcripts(transcripts.values().flatten(), config.bin_step),
    };
    let cnvs = input::read_cnvs(&args.path_input, &config.mt_aliases)?;
    tracing::info!("... read {} CNVs", cnvs.len().separate_with_commas());
    common::trace_rss_now();

    tracing::info!("Annotating CNVs...");
    let before_annotation = Instant::now();
    let by_chrom = input::group_by_chrom(&cnvs);
    let annos = by_chrom
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(chrom, chrom_cnvs)| -> Result<_, anyhow::Error> {
            let table = TranscriptTable::new(
                chrom,
                transcripts.get(chrom).cloned().unwrap_or_default(),
            );
            let annos = annotate_chrom(chrom_cnvs, &table, &index)
                .map_err(|e| anyhow::anyhow!("annotation of chrom {} failed: {}", chrom, e))?;
            Ok(chrom_cnvs.iter().cloned().zip(annos).collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<HashMap<_, _>>();
    tracing::info!(
        "... done annotating CNVs in {:?}",
        before_annotation.elapsed()
    );

    let mut writer = open_write_maybe_gz(&args.path_output)?;
    writeln!(writer, "Chr\tStart\tEnd\tRef\tAlt\tRegion")?;
    for cnv in &cnvs {
        let text = join_or_dot(
            annos.get(cnv).iter().flat_map(|a| a.iter()).map(|a| a.text()),
            ",",
        );
        writeln!(writer, "{}\t{}", cnv.key(), text)?;
    }
    writer.flush()?;

    common::trace_rss_now();
    tracing::info!(
        "All of `anno cnv` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
