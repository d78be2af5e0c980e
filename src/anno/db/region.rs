//! Implementation of `anno region` subcommand: overlap with a region database.

use std::{collections::HashMap, io::Write, time::Instant};

use indexmap::IndexSet;
use rayon::prelude::*;
use thousands::Separable;

use super::{split_row, Database};
use crate::{
    common::{
        self, canonical_chrom,
        io::{open_write_maybe_gz, parse_col},
        join_or_dot,
    },
    conf::{AnnotationConfig, ConfigArgs},
    err::AnnoError,
    matcher::{check_sorted, cmp_interval, merge_overlapping, passes_min_overlap},
    variant::{input, Variant},
};

/// Command line arguments for `anno region` subcommand.
#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about = "region-based annotation from a BED-like database",
    long_about = None
)]
pub struct Args {
    /// Path to the AVINPUT file with the variants.
    #[arg(long)]
    pub path_input: String,
    /// Path to the sorted `Chrom Start End Label` database, `<path>.idx` is used when present.
    #[arg(long)]
    pub path_db: String,
    /// Path to the output TSV file.
    #[arg(long)]
    pub path_output: String,
    /// Set the number of threads to use, defaults to number of cores.
    #[arg(long)]
    pub num_threads: Option<usize>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub chrom: String,
    pub start: i32,
    pub end: i32,
    pub label: String,
}

impl RegionRecord {
    pub fn parse(
        source_name: &str,
        row_no: usize,
        line: &str,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        let cols = split_row(source_name, row_no, line, 4)?;
        Ok(Self {
            chrom: canonical_chrom(cols[0], mt_aliases),
            start: parse_col(source_name, row_no, "start", cols[1])?,
            end: parse_col(source_name, row_no, "end", cols[2])?,
            label: cols[3].to_string(),
        })
    }
}

/// Labels of the records covering at least `min_overlap` of each variant.
///
/// Labels are deduplicated and keep database order.
pub fn annotate_chrom(
    variants: &[Variant],
    records: &[RegionRecord],
    min_overlap: f64,
) -> Result<Vec<Vec<String>>, AnnoError> {
    check_sorted(variants, "variants", |v| (v.start, v.end))?;
    check_sorted(records, "database records", |r| r.start)?;
    let queries = variants.iter().map(|v| (v.start, v.end)).collect::<Vec<_>>();
    let mut labels = vec![IndexSet::new(); variants.len()];
    for (i, j) in merge_overlapping(&queries, records, |q, r| {
        cmp_interval(*q, (r.start, r.end))
    }) {
        let record = &records[j];
        if passes_min_overlap(queries[i], (record.start, record.end), min_overlap) {
            labels[i].insert(record.label.clone());
        }
    }
    Ok(labels
        .into_iter()
        .map(|labels| labels.into_iter().collect())
        .collect())
}

/// Main entry point for `anno region` sub command.
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

    let db = Database::open(&args.path_db, &config.mt_aliases)?;
    let column = db.header.get(3).cloned().unwrap_or_else(|| db.name());
    tracing::info!("Database {} with label column {}", db.name(), &column);

    let variants = input::read_avinput(&args.path_input, &config.mt_aliases)?;
    tracing::info!("... read {} variants", variants.len().separate_with_commas());

    tracing::info!("Annotating variants...");
    let before_annotation = Instant::now();
    let by_chrom = input::group_by_chrom(&variants);
    let annos = by_chrom
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(chrom, chrom_vars)| -> Result<_, anyhow::Error> {
            let source_name = format!("{:?} chromosome {}", &args.path_db, chrom);
            let records = db
                .chrom_lines(chrom)?
                .enumerate()
                .map(|(i, line)| {
                    RegionRecord::parse(&source_name, i + 1, &line?, &config.mt_aliases)
                })
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!("{} records on chrom {}", records.len(), chrom);
            let labels = annotate_chrom(chrom_vars, &records, config.min_overlap)
                .map_err(|e| anyhow::anyhow!("annotation of chrom {} failed: {}", chrom, e))?;
            Ok(chrom_vars.iter().cloned().zip(labels).collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<HashMap<_, _>>();
    tracing::info!(
        "... done annotating variants in {:?}",
        before_annotation.elapsed()
    );

    let mut writer = open_write_maybe_gz(&args.path_output)?;
    writeln!(writer, "Chr\tStart\tEnd\tRef\tAlt\t{}", column)?;
    for var in &variants {
        let labels = join_or_dot(annos.get(var).into_iter().flatten(), ",");
        writeln!(writer, "{}\t{}", var.key(), labels)?;
    }
    writer.flush()?;

    common::trace_rss_now();
    tracing::info!(
        "All of `anno region` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{annotate_chrom, run, Args, RegionRecord};
    use crate::{
        common::Args as CommonArgs,
        conf::{AnnotationConfig, ConfigArgs},
        matcher::passes_min_overlap,
        variant::Variant,
    };

    fn region(start: i32, end: i32, label: &str) -> RegionRecord {
        RegionRecord {
            chrom: "1".into(),
            start,
            end,
            label: label.into(),
        }
    }

    fn del(start: i32, end: i32) -> Variant {
        Variant::new(
            "1".into(),
            start,
            end,
            "N".repeat((end - start + 1) as usize),
            "-".into(),
        )
    }

    #[test]
    fn default_min_overlap() {
        assert!(approx_eq!(
            f64,
            AnnotationConfig::default().min_overlap,
            0.7,
            ulps = 2
        ));
    }

    #[rstest::rstest]
    #[case((10, 19), (10, 16), true)]
    #[case((10, 19), (10, 15), false)]
    #[case((10, 19), (1, 100), true)]
    #[case((10, 10), (10, 10), true)]
    #[case((10, 19), (20, 30), false)]
    fn min_overlap(#[case] query: (i32, i32), #[case] target: (i32, i32), #[case] passes: bool) {
        assert_eq!(passes_min_overlap(query, target, 0.7), passes);
    }

    #[test]
    fn overlapping_labels() -> Result<(), anyhow::Error> {
        let variants = vec![del(5, 5), del(10, 19), del(40, 40)];
        let records = vec![
            region(1, 30, "a"),
            region(8, 12, "b"),
            region(10, 50, "a"),
            region(13, 18, "c"),
        ];
        let result = annotate_chrom(&variants, &records, 0.7)?;
        assert_eq!(
            result,
            vec![
                vec!["a".to_string()],
                vec!["a".to_string()],
                vec!["a".to_string()]
            ]
        );

        let result = annotate_chrom(&variants, &records, 0.1)?;
        assert_eq!(
            result[1],
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        Ok(())
    }

    #[test]
    fn unsorted_records() {
        let variants = vec![del(5, 5)];
        let records = vec![region(10, 20, "a"), region(1, 5, "b")];
        assert!(annotate_chrom(&variants, &records, 0.7).is_err());
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let args = Args {
            path_input: "tests/data/variants.avinput".into(),
            path_db: "tests/data/region.db".into(),
            path_output: tmp_dir.join("out.tsv").to_string_lossy().to_string(),
            num_threads: None,
            config: ConfigArgs::default(),
        };
        run(&CommonArgs::default(), &args)?;

        let text = std::fs::read_to_string(&args.path_output)?;
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "Chr\tStart\tEnd\tRef\tAlt\tRepeat",
                "1\t29\t29\tA\tG\trpt_a,rpt_b",
                "1\t60\t60\tT\tC\t.",
                "1\t29\t31\tAGA\t-\trpt_a,rpt_b",
                "1\t21\t21\tA\tG\t.",
                "1\t33\t33\t-\tA\trpt_a",
                "1\t10\t10\tT\tA\tlow_complexity",
                "1\t37\t37\tT\tC\trpt_a",
                "1\t90\t90\tA\tT\trpt_a",
                "2\t42\t42\tT\tA\trpt_d",
                "2\t35\t35\tC\tT\trpt_d",
                "2\t5\t5\tA\tC\t.",
            ]
        );
        Ok(())
    }
}
