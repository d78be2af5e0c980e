//! Implementation of `anno snv` subcommand.

use std::{collections::HashMap, io::Write, time::Instant};

use indexmap::IndexSet;
use rayon::prelude::*;
use thousands::Separable;

use super::gene::aggregate::{annotate_variant, VariantAnnotation};
use crate::{
    common::{self, io::open_write_maybe_gz},
    conf::{AnnotationConfig, ConfigArgs},
    err::AnnoError,
    matcher::{check_sorted, cmp_interval, merge_overlapping},
    seq::source::{IndexedFasta, SequenceSource},
    transcript::{index::BinIndex, load_transcripts, GeneIdMap, Transcript, TranscriptTable},
    variant::{input, Variant},
};

/// Command line arguments for `anno snv` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "gene-based annotation of small variants", long_about = None)]
pub struct Args {
    /// Path to the AVINPUT file with the variants.
    #[arg(long)]
    pub path_input: String,
    /// Path to the genePred/refGene transcript file.
    #[arg(long)]
    pub path_genes: String,
    /// Path to the transcript bin index, built on the fly if not given.
    #[arg(long)]
    pub path_index: Option<String>,
    /// Path to the reference FASTA file, `.fai` index required.
    #[arg(long)]
    pub path_reference: String,
    /// Optional CSV/TSV file mapping gene symbols to IDs.
    #[arg(long)]
    pub path_gene_ids: Option<String>,
    /// Path to the output TSV file.
    #[arg(long)]
    pub path_output: String,
    /// Optional path to the per-transcript output TSV file.
    #[arg(long)]
    pub path_trans_output: Option<String>,
    /// Set the number of threads to use, defaults to number of cores.
    #[arg(long)]
    pub num_threads: Option<usize>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Annotate the sorted variants of one chromosome.
pub fn annotate_chrom(
    variants: &[Variant],
    table: &mut TranscriptTable,
    index: &BinIndex,
    source: &mut dyn SequenceSource,
    config: &AnnotationConfig,
) -> Result<Vec<VariantAnnotation>, AnnoError> {
    check_sorted(variants, "variants", |v| (v.start, v.end))?;
    let flank = config.flank_distance.max(0);
    let queries = variants
        .iter()
        .map(|v| (v.start - flank, v.end + flank + 1))
        .collect::<Vec<_>>();
    let bins = index.entries(&table.chrom);
    let mut names = vec![IndexSet::new(); variants.len()];
    for (i, j) in merge_overlapping(&queries, bins, |q, bin| {
        cmp_interval(*q, (bin.bin_start, bin.bin_end))
    }) {
        names[i].extend(bins[j].members.iter().cloned());
    }

    let candidate_idxs = names
        .iter()
        .map(|names| {
            names
                .iter()
                .flat_map(|name| table.indices_of(name).iter().cloned())
                .collect::<IndexSet<_>>()
        })
        .collect::<Vec<_>>();
    for idx in candidate_idxs.iter().flatten().collect::<IndexSet<_>>() {
        table.with_regions(*idx, source)?;
    }

    let transcripts = table.transcripts();
    Ok(variants
        .iter()
        .zip(candidate_idxs.iter())
        .map(|(var, idxs)| {
            let candidates = idxs
                .iter()
                .map(|idx| &transcripts[*idx])
                .collect::<Vec<&Transcript>>();
            annotate_variant(var, &candidates, config)
        })
        .collect())
}

/// Write the gene-based output in the order of `variants`.
fn write_output<W: Write>(
    writer: &mut W,
    variants: &[Variant],
    annos: &HashMap<Variant, VariantAnnotation>,
) -> Result<(), anyhow::Error> {
    writeln!(writer, "Chr\tStart\tEnd\tRef\tAlt\tGene\tGeneID\tEvent\tRegion\tDetail")?;
    for var in variants {
        let columns = annos
            .get(var)
            .map(|anno| anno.columns())
            .unwrap_or_else(|| VariantAnnotation::default().columns());
        writeln!(writer, "{}\t{}", var.key(), columns.join("\t"))?;
    }
    Ok(())
}

/// Write one row per transcript annotation.
fn write_trans_output<W: Write>(
    writer: &mut W,
    variants: &[Variant],
    annos: &HashMap<Variant, VariantAnnotation>,
) -> Result<(), anyhow::Error> {
    writeln!(
        writer,
        "Chr\tStart\tEnd\tRef\tAlt\tGene\tGeneID\tTranscript\tEvent\tRegion\tNAChange\tAAChange"
    )?;
    for var in variants {
        for anno in annos.get(var).iter().flat_map(|a| a.transcripts.iter()) {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                var.key(),
                &anno.gene,
                &anno.gene_id,
                &anno.transcript,
                &anno.event,
                &anno.region,
                &anno.na_change,
                anno.aa_change.as_deref().unwrap_or(".")
            )?;
        }
    }
    Ok(())
}

/// Main entry point for `anno snv` sub command.
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
    tracing::info!("config = {:#?}", &config);

    tracing::info!("Loading transcripts...");
    let before_loading = Instant::now();
    let gene_ids = match &args.path_gene_ids {
        Some(path) => GeneIdMap::load(path, &config.mt_aliases)?,
        None => GeneIdMap::default(),
    };
    let transcripts = load_transcripts(&args.path_genes, &gene_ids, &config.mt_aliases)?;
    let index = match &args.path_index {
        Some(path) => BinIndex::load(path, &config.mt_aliases)?,
        None => BinIndex::from_transcripts(transcripts.values().flatten(), config.bin_step),
    };
    let variants = input::read_avinput(&args.path_input, &config.mt_aliases)?;
    tracing::info!(
        "... done loading {} transcripts and {} variants in {:?}",
        transcripts.values().map(|v| v.len()).sum::<usize>().separate_with_commas(),
        variants.len().separate_with_commas(),
        before_loading.elapsed()
    );
    common::trace_rss_now();

    tracing::info!("Annotating variants...");
    let before_annotation = Instant::now();
    let by_chrom = input::group_by_chrom(&variants);
    let annos = by_chrom
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(chrom, chrom_variants)| -> Result<_, anyhow::Error> {
            let mut table = TranscriptTable::new(
                chrom,
                transcripts.get(chrom).cloned().unwrap_or_default(),
            );
            let annos = if table.is_empty() {
                vec![VariantAnnotation::default(); chrom_variants.len()]
            } else {
                let mut source = IndexedFasta::from_path(&args.path_reference)?;
                annotate_chrom(chrom_variants, &mut table, &index, &mut source, &config)
                    .map_err(|e| anyhow::anyhow!("annotation of chrom {} failed: {}", chrom, e))?
            };
            tracing::debug!("done with chromosome {}", chrom);
            Ok(chrom_variants.iter().cloned().zip(annos).collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<HashMap<_, _>>();
    tracing::info!(
        "... done annotating {} variants in {:?}",
        annos.len().separate_with_commas(),
        before_annotation.elapsed()
    );

    tracing::info!("Writing output...");
    let mut writer = open_write_maybe_gz(&args.path_output)?;
    write_output(&mut writer, &variants, &annos)?;
    writer.flush()?;
    if let Some(path) = &args.path_trans_output {
        let mut writer = open_write_maybe_gz(path)?;
        write_trans_output(&mut writer, &variants, &annos)?;
        writer.flush()?;
    }

    common::trace_rss_now();
    tracing::info!(
        "All of `anno snv` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
