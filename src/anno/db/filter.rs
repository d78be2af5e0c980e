//! Implementation of `anno filter` subcommand: exact match against a variant database.

use std::{cmp::Ordering, collections::HashMap, io::Write, time::Instant};

use rayon::prelude::*;
use thousands::Separable;

use super::{split_row, Database};
use crate::{
    common::{
        self, canonical_chrom,
        io::{open_write_maybe_gz, parse_col},
    },
    conf::{AnnotationConfig, ConfigArgs},
    err::AnnoError,
    matcher::{check_sorted, merge_exact},
    variant::{input, Variant},
};

/// Command line arguments for `anno filter` subcommand.
#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about = "filter-based annotation from a variant database",
    long_about = None
)]
pub struct Args {
    /// Path to the AVINPUT file with the variants.
    #[arg(long)]
    pub path_input: String,
    /// Path to the sorted database file, `<path>.idx` is used when present.
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

/// One row of a filter-based database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRecord {
    pub variant: Variant,
    /// Values of the columns after `Alt`.
    pub extras: Vec<String>,
}

impl FilterRecord {
    /// Parse `Chrom Start End Ref Alt [extra...]`, `num_extras` extra columns expected.
    pub fn parse(
        source_name: &str,
        row_no: usize,
        line: &str,
        num_extras: usize,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        let cols = split_row(source_name, row_no, line, 5 + num_extras)?;
        Ok(Self {
            variant: Variant {
                chrom: canonical_chrom(cols[0], mt_aliases),
                start: parse_col(source_name, row_no, "start", cols[1])?,
                end: parse_col(source_name, row_no, "end", cols[2])?,
                reference: cols[3].to_string(),
                alternative: cols[4].to_string(),
            },
            extras: cols[5..5 + num_extras]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

/// Position of a variant within its chromosome.
fn pos_key(var: &Variant) -> (i32, i32, &str, &str) {
    (var.start, var.end, var.reference.as_str(), var.alternative.as_str())
}

/// Check the ordering of a record stream while passing it through.
fn ascending<I>(what: String, records: I) -> impl Iterator<Item = Result<FilterRecord, AnnoError>>
where
    I: Iterator<Item = Result<FilterRecord, AnnoError>>,
{
    let mut prev: Option<Variant> = None;
    records.enumerate().map(move |(i, record)| {
        let record = record?;
        if let Some(prev) = &prev {
            if pos_key(prev).cmp(&pos_key(&record.variant)) == Ordering::Greater {
                return Err(AnnoError::PreconditionViolation {
                    what: what.clone(),
                    index: i,
                });
            }
        }
        prev = Some(record.variant.clone());
        Ok(record)
    })
}

/// Extra columns of the record matching each variant exactly, `None` if there is none.
///
/// Variants and records must be of one chromosome and sorted by position, ref and alt.
pub fn annotate_chrom<I>(
    variants: &[Variant],
    records: I,
) -> Result<Vec<Option<Vec<String>>>, AnnoError>
where
    I: Iterator<Item = Result<FilterRecord, AnnoError>>,
{
    check_sorted(variants, "variants", |v| {
        (v.start, v.end, v.reference.clone(), v.alternative.clone())
    })?;
    let mut result = vec![None; variants.len()];
    let matches = merge_exact(
        variants,
        ascending("database records".to_string(), records),
        |var, record: &FilterRecord| pos_key(var).cmp(&pos_key(&record.variant)),
    )?;
    for (i, record) in matches {
        result[i] = Some(record.extras);
    }
    Ok(result)
}

/// Main entry point for `anno filter` sub command.
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
    if db.header.len() < 5 {
        anyhow::bail!(
            "database header of {} must have at least 5 columns, got {}",
            &args.path_db,
            db.header.len()
        );
    }
    let num_extras = db.header.len() - 5;
    tracing::info!(
        "Database {} has columns {:?}, index: {}",
        db.name(),
        &db.header[5..],
        db.index.is_some()
    );

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
            let records = db.chrom_lines(chrom)?.enumerate().map(|(i, line)| {
                FilterRecord::parse(&source_name, i + 1, &line?, num_extras, &config.mt_aliases)
            });
            let annos = annotate_chrom(chrom_vars, records)
                .map_err(|e| anyhow::anyhow!("annotation of chrom {} failed: {}", chrom, e))?;
            Ok(chrom_vars
                .iter()
                .cloned()
                .zip(annos)
                .filter_map(|(var, extras)| extras.map(|extras| (var, extras)))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<HashMap<_, _>>();
    tracing::info!(
        "... found {} of {} variants in {:?}",
        annos.len().separate_with_commas(),
        variants.len().separate_with_commas(),
        before_annotation.elapsed()
    );

    let mut writer = open_write_maybe_gz(&args.path_output)?;
    write!(writer, "Chr\tStart\tEnd\tRef\tAlt")?;
    for column in &db.header[5..] {
        write!(writer, "\t{}", column)?;
    }
    writeln!(writer)?;
    let missing = vec![".".to_string(); num_extras];
    for var in &variants {
        write!(writer, "{}", var.key())?;
        for value in annos.get(var).unwrap_or(&missing) {
            write!(writer, "\t{}", value)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;

    common::trace_rss_now();
    tracing::info!(
        "All of `anno filter` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{annotate_chrom, run, Args, FilterRecord};
    use crate::{
        common::Args as CommonArgs, conf::ConfigArgs, err::AnnoError,
        transcript::test::aliases, variant::Variant,
    };

    fn record(start: i32, reference: &str, alternative: &str, extra: &str) -> FilterRecord {
        FilterRecord {
            variant: Variant::new("1".into(), start, start, reference.into(), alternative.into()),
            extras: vec![extra.to_string()],
        }
    }

    #[test]
    fn parse_record() -> Result<(), anyhow::Error> {
        let record = FilterRecord::parse("db", 1, "chrM\t10\t10\tA\tG\t0.1\tx", 2, &aliases())?;
        assert_eq!(
            record.variant,
            Variant::new("MT".into(), 10, 10, "A".into(), "G".into())
        );
        assert_eq!(record.extras, vec!["0.1", "x"]);

        assert!(FilterRecord::parse("db", 1, "1\t10\t10\tA\tG", 1, &aliases()).is_err());
        Ok(())
    }

    #[test]
    fn exact_match_only() -> Result<(), anyhow::Error> {
        let variants = vec![
            Variant::new("1".into(), 5, 5, "A".into(), "C".into()),
            Variant::new("1".into(), 10, 10, "A".into(), "T".into()),
            Variant::new("1".into(), 20, 20, "G".into(), "A".into()),
        ];
        let records = vec![
            record(10, "A", "G", "x"),
            record(10, "A", "T", "y"),
            record(15, "C", "T", "z"),
            record(20, "G", "C", "w"),
        ];
        let result = annotate_chrom(&variants, records.into_iter().map(Ok))?;
        assert_eq!(result, vec![None, Some(vec!["y".to_string()]), None]);
        Ok(())
    }

    #[test]
    fn unsorted_database() {
        let variants = vec![Variant::new("1".into(), 20, 20, "G".into(), "A".into())];
        let records = vec![record(15, "C", "T", "z"), record(10, "A", "G", "x")];
        let result = annotate_chrom(&variants, records.into_iter().map(Ok));
        assert_eq!(
            result,
            Err(AnnoError::PreconditionViolation {
                what: "database records".into(),
                index: 1
            })
        );
    }

    fn run_with(path_db: &str) -> Result<Vec<String>, anyhow::Error> {
        let tmp_dir = TempDir::default();
        let args = Args {
            path_input: "tests/data/variants.avinput".into(),
            path_db: path_db.into(),
            path_output: tmp_dir.join("out.tsv").to_string_lossy().to_string(),
            num_threads: None,
            config: ConfigArgs::default(),
        };
        run(&CommonArgs::default(), &args)?;
        Ok(std::fs::read_to_string(&args.path_output)?
            .lines()
            .map(|s| s.to_string())
            .collect())
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let lines = run_with("tests/data/filter.db")?;
        assert_eq!(
            lines,
            vec![
                "Chr\tStart\tEnd\tRef\tAlt\tAF\tClinSig",
                "1\t29\t29\tA\tG\t0.25\t.",
                "1\t60\t60\tT\tC\t.\t.",
                "1\t29\t31\tAGA\t-\t0.002\t.",
                "1\t21\t21\tA\tG\t.\t.",
                "1\t33\t33\t-\tA\t0.001\tpathogenic",
                "1\t10\t10\tT\tA\t0.01\tbenign",
                "1\t37\t37\tT\tC\t.\t.",
                "1\t90\t90\tA\tT\t.\t.",
                "2\t42\t42\tT\tA\t0.02\tuncertain",
                "2\t35\t35\tC\tT\t.\t.",
                "2\t5\t5\tA\tC\t0.3\t.",
            ]
        );
        Ok(())
    }

    #[test]
    fn run_without_index() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_db = tmp_dir.join("filter.db");
        std::fs::copy("tests/data/filter.db", &path_db)?;
        assert_eq!(
            run_with(&path_db.to_string_lossy())?,
            run_with("tests/data/filter.db")?
        );
        Ok(())
    }
}
