//! Code supporting the `db build-idx` sub command.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    time::Instant,
};

use clap::Parser;
use indexmap::IndexMap;
use thousands::Separable;
use tracing::{debug, info};

use crate::{
    common::{
        io::{open_write_maybe_gz, parse_col, split_tsv},
        trace_rss_now,
    },
    err::AnnoError,
};

/// Command line arguments for `db build-idx` sub command.
#[derive(Parser, Debug)]
#[command(about = "build byte offset index of a sorted database file", long_about = None)]
pub struct Args {
    /// Path to the uncompressed, sorted database file.
    #[arg(long, required = true)]
    pub path_db: String,
    /// Path to the output index, defaults to `<path_db>.idx`.
    #[arg(long)]
    pub path_output: Option<String>,
    /// Bin size in base pairs.
    #[arg(long, default_value_t = 1000)]
    pub bin_size: i32,
}

/// Byte range of the rows in one bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxRow {
    pub chrom: String,
    pub bin_start: i32,
    pub offset_start: u64,
    pub offset_end: u64,
}

/// Scan a sorted database and collect the byte range of each `(chrom, bin)`.
///
/// Header lines starting with `#` are skipped but counted for the offsets.  A bin that
/// shows up again after another one has started means the file is not sorted.
pub fn build_index<R: BufRead>(
    source_name: &str,
    mut reader: R,
    bin_size: i32,
) -> Result<Vec<IdxRow>, AnnoError> {
    let mut rows: IndexMap<(String, i32), IdxRow> = IndexMap::new();
    let mut offset = 0u64;
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        let len = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| AnnoError::missing(source_name, e))? as u64;
        if len == 0 {
            break;
        }
        line_no += 1;
        let line = String::from_utf8_lossy(&buf);
        if line.starts_with('#') || line.trim().is_empty() {
            offset += len;
            continue;
        }
        let cols = split_tsv(&line);
        if cols.len() < 2 {
            return Err(AnnoError::malformed(
                source_name,
                line_no,
                format!("expected at least 2 columns, got {}", cols.len()),
            ));
        }
        let start: i32 = parse_col(source_name, line_no, "start", cols[1])?;
        let key = (cols[0].to_string(), start - start % bin_size);
        let is_last = rows.last().map(|(k, _)| k == &key).unwrap_or(false);
        match rows.get_mut(&key) {
            Some(row) if is_last => row.offset_end = offset + len,
            Some(_) => {
                return Err(AnnoError::PreconditionViolation {
                    what: source_name.to_string(),
                    index: line_no,
                })
            }
            None => {
                if rows.keys().last().map(|(chrom, _)| chrom) != Some(&key.0) {
                    debug!("reading chromosome {}", &key.0);
                }
                rows.insert(
                    key.clone(),
                    IdxRow {
                        chrom: key.0,
                        bin_start: key.1,
                        offset_start: offset,
                        offset_end: offset + len,
                    },
                );
            }
        }
        offset += len;
    }
    Ok(rows.into_values().collect())
}

/// Write `#Bin\t<size>` and one `Chrom\tBinStart\tByteStart\tByteEnd` line per bin.
pub fn write_index<W: Write>(
    writer: &mut W,
    bin_size: i32,
    rows: &[IdxRow],
) -> Result<(), std::io::Error> {
    writeln!(writer, "#Bin\t{}", bin_size)?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            &row.chrom, row.bin_start, row.offset_start, row.offset_end
        )?;
    }
    Ok(())
}

/// Main entry point for the `db build-idx` sub command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    info!("Starting `db build-idx`");
    info!("  common_args = {:?}", &common_args);
    info!("  args = {:?}", &args);

    if args.bin_size <= 0 {
        anyhow::bail!("bin size must be positive, got {}", args.bin_size);
    }
    if args.path_db.ends_with(".gz") {
        anyhow::bail!("cannot index compressed file {}", &args.path_db);
    }

    let file = File::open(&args.path_db)
        .map_err(|e| anyhow::anyhow!("could not open {}: {}", &args.path_db, e))?;
    let rows = build_index(&args.path_db, BufReader::new(file), args.bin_size)?;
    info!("... found {} bins", rows.len().separate_with_commas());

    let path_output = args
        .path_output
        .clone()
        .unwrap_or_else(|| format!("{}.idx", &args.path_db));
    let mut writer = open_write_maybe_gz(&path_output)?;
    write_index(&mut writer, args.bin_size, &rows)?;
    writer.flush()?;
    trace_rss_now();

    info!(
        "All of `db build-idx` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{build_index, run, Args, IdxRow};
    use crate::{
        anno::db::{Database, DbIndex},
        common::Args as CommonArgs,
        err::AnnoError,
        transcript::test::aliases,
    };

    #[test]
    fn offsets_include_header() -> Result<(), anyhow::Error> {
        let text = "#h\n1\t5\tx\n1\t7\ty\n1\t12\tz\n2\t3\tw\n";
        let rows = build_index("db", text.as_bytes(), 10)?;
        assert_eq!(
            rows,
            vec![
                IdxRow {
                    chrom: "1".into(),
                    bin_start: 0,
                    offset_start: 3,
                    offset_end: 15,
                },
                IdxRow {
                    chrom: "1".into(),
                    bin_start: 10,
                    offset_start: 15,
                    offset_end: 22,
                },
                IdxRow {
                    chrom: "2".into(),
                    bin_start: 0,
                    offset_start: 22,
                    offset_end: 28,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn unsorted_input() {
        let text = "1\t5\tx\n1\t12\ty\n1\t7\tz\n";
        assert_eq!(
            build_index("db", text.as_bytes(), 10),
            Err(AnnoError::PreconditionViolation {
                what: "db".into(),
                index: 3
            })
        );
    }

    #[test]
    fn run_matches_shipped_index() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_db = tmp_dir.join("filter.db");
        std::fs::copy("tests/data/filter.db", &path_db)?;
        let args = Args {
            path_db: path_db.to_string_lossy().to_string(),
            path_output: None,
            bin_size: 20,
        };
        run(&CommonArgs::default(), &args)?;

        let built = std::fs::read_to_string(format!("{}.idx", &args.path_db))?;
        let shipped = std::fs::read_to_string("tests/data/filter.db.idx")?;
        assert_eq!(built, shipped);

        let db = Database::open(&path_db, &aliases())?;
        assert_eq!(
            db.index,
            Some(DbIndex::load("tests/data/filter.db.idx", &aliases())?)
        );
        Ok(())
    }
}
