//! Code supporting the `tools merge` sub command.

use std::{io::BufRead, io::Write, time::Instant};

use clap::Parser;
use indexmap::IndexMap;
use thousands::Separable;
use tracing::info;

use crate::{
    common::io::{open_read_maybe_gz, open_write_maybe_gz, split_tsv},
    err::AnnoError,
};

/// Number of key columns `Chr Start End Ref Alt`.
const NUM_KEY_COLS: usize = 5;

/// Command line arguments for `tools merge` sub command.
#[derive(Parser, Debug)]
#[command(about = "merge annotation TSV files by variant", long_about = None)]
pub struct Args {
    /// Path to the primary annotation file, usually the gene-based one.
    #[arg(long, required = true)]
    pub path_input: String,
    /// Paths to further annotation files whose columns are appended.
    #[arg(long, required = true)]
    pub path_other: Vec<String>,
    /// Path to the merged output file.
    #[arg(long, required = true)]
    pub path_output: String,
}

/// Value columns of an annotation file keyed by `Chr:Start:End:Ref:Alt`.
#[derive(Debug, Clone, Default)]
pub struct AnnoTable {
    /// Header of the value columns.
    pub header: Vec<String>,
    pub rows: IndexMap<String, Vec<String>>,
}

fn row_key(cols: &[&str]) -> String {
    cols[..NUM_KEY_COLS].join(":")
}

fn split_checked<'a>(
    source_name: &str,
    line_no: usize,
    line: &'a str,
    num_cols: usize,
) -> Result<Vec<&'a str>, AnnoError> {
    let cols = split_tsv(line);
    if cols.len() != num_cols {
        return Err(AnnoError::malformed(
            source_name,
            line_no,
            format!("expected {} columns, got {}", num_cols, cols.len()),
        ));
    }
    Ok(cols)
}

impl AnnoTable {
    /// Read an annotation file with header; all rows must have the header's width.
    #[tracing::instrument]
    pub fn load(path: &str) -> Result<Self, AnnoError> {
        let mut lines = open_read_maybe_gz(path)?.lines();
        let header_line = lines
            .next()
            .transpose()
            .map_err(|e| AnnoError::missing(path, e))?
            .ok_or_else(|| AnnoError::malformed(path, 1, "missing header"))?;
        let header = split_tsv(&header_line);
        if header.len() < NUM_KEY_COLS {
            return Err(AnnoError::malformed(
                path,
                1,
                format!("expected at least {} header columns", NUM_KEY_COLS),
            ));
        }

        let mut rows = IndexMap::new();
        for (i, line) in lines.enumerate() {
            let line = line.map_err(|e| AnnoError::missing(path, e))?;
            if line.is_empty() {
                continue;
            }
            let cols = split_checked(path, i + 2, &line, header.len())?;
            rows.insert(
                row_key(&cols),
                cols[NUM_KEY_COLS..].iter().map(|s| s.to_string()).collect(),
            );
        }
        Ok(Self {
            header: header[NUM_KEY_COLS..]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows,
        })
    }
}

/// Append the value columns of `others` to each line of the primary file.
pub fn merge<R: BufRead, W: Write>(
    source_name: &str,
    primary: R,
    others: &[AnnoTable],
    writer: &mut W,
) -> Result<usize, anyhow::Error> {
    let mut lines = primary.lines();
    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| AnnoError::malformed(source_name, 1, "missing header"))?;
    let num_cols = split_tsv(&header).len();
    write!(writer, "{}", header.trim_end())?;
    for other in others {
        for column in &other.header {
            write!(writer, "\t{}", column)?;
        }
    }
    writeln!(writer)?;

    let mut count = 0;
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let cols = split_checked(source_name, i + 2, &line, num_cols)?;
        let key = row_key(&cols);
        write!(writer, "{}", cols.join("\t"))?;
        for other in others {
            match other.rows.get(&key) {
                Some(values) => write!(writer, "\t{}", values.join("\t"))?,
                None => {
                    for _ in &other.header {
                        write!(writer, "\t.")?;
                    }
                }
            }
        }
        writeln!(writer)?;
        count += 1;
    }
    Ok(count)
}

/// Main entry point for the `tools merge` sub command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    info!("Starting `tools merge`");
    info!("  common_args = {:?}", &common_args);
    info!("  args = {:?}", &args);

    let others = args
        .path_other
        .iter()
        .map(|path| AnnoTable::load(path))
        .collect::<Result<Vec<_>, _>>()?;
    let mut writer = open_write_maybe_gz(&args.path_output)?;
    let count = merge(
        &args.path_input,
        open_read_maybe_gz(&args.path_input)?,
        &others,
        &mut writer,
    )?;
    writer.flush()?;
    info!("... wrote {} rows", count.separate_with_commas());

    info!(
        "All of `tools merge` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{merge, run, AnnoTable, Args};
    use crate::common::Args as CommonArgs;

    fn write(dir: &TempDir, name: &str, text: &str) -> Result<String, anyhow::Error> {
        let path = dir.join(name);
        std::fs::write(&path, text)?;
        Ok(path.to_string_lossy().to_string())
    }

    #[test]
    fn fill_missing_with_dots() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_af = write(
            &tmp_dir,
            "af.tsv",
            "Chr\tStart\tEnd\tRef\tAlt\tAF\tAC\n1\t10\t10\tA\tG\t0.1\t3\n",
        )?;
        let others = vec![AnnoTable::load(&path_af)?];

        let primary = "Chr\tStart\tEnd\tRef\tAlt\tGene\n\
                       1\t10\t10\tA\tG\tGENEA\n\
                       1\t20\t20\tC\tT\tGENEB\n";
        let mut out = Vec::new();
        let count = merge("primary", primary.as_bytes(), &others, &mut out)?;
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out)?,
            "Chr\tStart\tEnd\tRef\tAlt\tGene\tAF\tAC\n\
             1\t10\t10\tA\tG\tGENEA\t0.1\t3\n\
             1\t20\t20\tC\tT\tGENEB\t.\t.\n"
        );
        Ok(())
    }

    #[test]
    fn ragged_rows_are_rejected() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path = write(&tmp_dir, "bad.tsv", "Chr\tStart\tEnd\tRef\tAlt\tAF\n1\t10\n")?;
        assert!(AnnoTable::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_input = write(
            &tmp_dir,
            "gene.tsv",
            "Chr\tStart\tEnd\tRef\tAlt\tGene\n1\t10\t10\tA\tG\tGENEA\n",
        )?;
        let path_region = write(
            &tmp_dir,
            "region.tsv",
            "Chr\tStart\tEnd\tRef\tAlt\tRepeat\n1\t10\t10\tA\tG\trpt_a\n",
        )?;
        let path_filter = write(&tmp_dir, "filter.tsv", "Chr\tStart\tEnd\tRef\tAlt\tAF\n")?;
        let args = Args {
            path_input,
            path_other: vec![path_region, path_filter],
            path_output: tmp_dir.join("merged.tsv").to_string_lossy().to_string(),
        };
        run(&CommonArgs::default(), &args)?;

        let text = std::fs::read_to_string(&args.path_output)?;
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "Chr\tStart\tEnd\tRef\tAlt\tGene\tRepeat\tAF",
                "1\t10\t10\tA\tG\tGENEA\trpt_a\t.",
            ]
        );
        Ok(())
    }
}
