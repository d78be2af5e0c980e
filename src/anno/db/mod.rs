//! Sorted flat-file annotation databases and their `.idx` side files.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{
    common::{
        canonical_chrom,
        io::{open_read_maybe_gz, parse_col, split_tsv},
    },
    err::AnnoError,
};

pub mod filter;
pub mod region;

/// Byte range `[offset_start, offset_end)` holding the rows of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbBlock {
    pub bin_start: i32,
    pub offset_start: u64,
    pub offset_end: u64,
}

/// Content of a `.idx` file: bin size and blocks per canonical chromosome.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbIndex {
    pub bin_size: i32,
    pub blocks: IndexMap<String, Vec<DbBlock>>,
}

impl DbIndex {
    /// Read `#Bin\t<size>` followed by `Chrom\tBinStart\tByteStart\tByteEnd` rows.
    #[tracing::instrument(skip(mt_aliases))]
    pub fn load<P: AsRef<Path> + std::fmt::Debug>(
        path: P,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        tracing::debug!("loading database index from {:?}", &path);
        let source_name = format!("{:?}", path.as_ref());
        let reader = open_read_maybe_gz(&path)?;
        let mut result = Self::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| AnnoError::missing(&source_name, e))?;
            let cols = split_tsv(&line);
            if i == 0 {
                if cols.len() != 2 || !cols[0].starts_with('#') {
                    return Err(AnnoError::malformed(
                        &source_name,
                        1,
                        "expected `#Bin\\t<size>` header",
                    ));
                }
                result.bin_size = parse_col(&source_name, 1, "bin size", cols[1])?;
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if cols.len() != 4 {
                return Err(AnnoError::malformed(
                    &source_name,
                    i + 1,
                    format!("expected 4 columns, got {}", cols.len()),
                ));
            }
            let block = DbBlock {
                bin_start: parse_col(&source_name, i + 1, "bin start", cols[1])?,
                offset_start: parse_col(&source_name, i + 1, "byte start", cols[2])?,
                offset_end: parse_col(&source_name, i + 1, "byte end", cols[3])?,
            };
            if block.offset_end < block.offset_start {
                return Err(AnnoError::malformed(
                    &source_name,
                    i + 1,
                    "byte end before byte start",
                ));
            }
            result
                .blocks
                .entry(canonical_chrom(cols[0], mt_aliases))
                .or_default()
                .push(block);
        }
        if result.bin_size <= 0 {
            return Err(AnnoError::malformed(&source_name, 1, "bin size must be positive"));
        }
        Ok(result)
    }

    /// Byte range covering all blocks of `chrom`.
    pub fn chrom_range(&self, chrom: &str) -> Option<(u64, u64)> {
        let blocks = self.blocks.get(chrom)?;
        let start = blocks.iter().map(|b| b.offset_start).min()?;
        let end = blocks.iter().map(|b| b.offset_end).max()?;
        Some((start, end))
    }
}

/// Lines of one chromosome, read lazily.
pub type DbLines = Box<dyn Iterator<Item = Result<String, AnnoError>>>;

/// A sorted database file `Chrom Start End ...` with header line.
///
/// Every call to [`Database::chrom_lines`] opens its own reader, so one value can be shared
/// between worker threads.
#[derive(Debug, Clone)]
pub struct Database {
    pub path: PathBuf,
    /// Header columns without the leading `#`.
    pub header: Vec<String>,
    pub index: Option<DbIndex>,
    mt_aliases: Vec<String>,
}

impl Database {
    /// Open the database and its `<path>.idx` file if present.
    ///
    /// The index is ignored for gzip compressed files as these cannot be seeked.
    #[tracing::instrument(skip(mt_aliases))]
    pub fn open<P: AsRef<Path> + std::fmt::Debug>(
        path: P,
        mt_aliases: &[String],
    ) -> Result<Self, AnnoError> {
        let source_name = format!("{:?}", path.as_ref());
        let mut header_line = String::new();
        open_read_maybe_gz(&path)?
            .read_line(&mut header_line)
            .map_err(|e| AnnoError::missing(&source_name, e))?;
        if header_line.trim().is_empty() {
            return Err(AnnoError::malformed(&source_name, 1, "missing header line"));
        }
        let header = split_tsv(header_line.trim_start_matches('#'))
            .into_iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        let path_idx = PathBuf::from(format!("{}.idx", path.as_ref().display()));
        let is_gz = path.as_ref().extension().map(|s| s == "gz").unwrap_or(false);
        let index = if !path_idx.exists() {
            tracing::debug!("no index for {:?}, will scan sequentially", &path);
            None
        } else if is_gz {
            tracing::warn!("ignoring index of gzip compressed {:?}", &path);
            None
        } else {
            Some(DbIndex::load(&path_idx, mt_aliases)?)
        };

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            header,
            index,
            mt_aliases: mt_aliases.to_vec(),
        })
    }

    /// Name of the database, the file name up to the first dot.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .and_then(|s| s.split('.').next().map(|s| s.to_string()))
            .unwrap_or_default()
    }

    fn source_name(&self) -> String {
        format!("{:?}", &self.path)
    }

    /// Data lines of `chrom` in file order.
    ///
    /// With an index only the byte range of the chromosome is read, otherwise the file is
    /// scanned until the chromosome block ends.
    pub fn chrom_lines(&self, chrom: &str) -> Result<DbLines, AnnoError> {
        let source_name = self.source_name();
        let lines: DbLines = match &self.index {
            Some(index) => {
                let Some((start, end)) = index.chrom_range(chrom) else {
                    return Ok(Box::new(std::iter::empty()));
                };
                tracing::trace!("reading bytes {}..{} of {:?}", start, end, &self.path);
                let mut file = File::open(&self.path)
                    .map_err(|e| AnnoError::missing(&source_name, e))?;
                file.seek(SeekFrom::Start(start))
                    .map_err(|e| AnnoError::missing(&source_name, e))?;
                Box::new(
                    BufReader::new(file.take(end - start))
                        .lines()
                        .map(move |line| line.map_err(|e| AnnoError::missing(&source_name, e))),
                )
            }
            None => {
                let reader = open_read_maybe_gz(&self.path)?;
                Box::new(
                    reader
                        .lines()
                        .skip(1)
                        .map(move |line| line.map_err(|e| AnnoError::missing(&source_name, e))),
                )
            }
        };

        let chrom = chrom.to_string();
        let mt_aliases = self.mt_aliases.clone();
        let of_chrom = move |line: &Result<String, AnnoError>| match line {
            Ok(line) => {
                let first = line.split('\t').next().unwrap_or_default();
                canonical_chrom(first, &mt_aliases) == chrom
            }
            Err(_) => true,
        };
        let of_chrom_too = of_chrom.clone();
        Ok(Box::new(
            lines
                .filter(|line| match line {
                    Ok(line) => !line.starts_with('#') && !line.trim().is_empty(),
                    Err(_) => true,
                })
                .skip_while(move |line| !of_chrom(line))
                .take_while(move |line| of_chrom_too(line)),
        ))
    }
}

/// Split a data row and check it has at least `min_cols` columns.
pub(crate) fn split_row<'a>(
    source_name: &str,
    row_no: usize,
    line: &'a str,
    min_cols: usize,
) -> Result<Vec<&'a str>, AnnoError> {
    let cols = split_tsv(line);
    if cols.len() < min_cols {
        return Err(AnnoError::malformed(
            source_name,
            row_no,
            format!("expected at least {} columns, got {}", min_cols, cols.len()),
        ));
    }
    Ok(cols)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{Database, DbBlock};
    use crate::transcript::test::aliases;

    #[test]
    fn load_index() -> Result<(), anyhow::Error> {
        let db = Database::open("tests/data/filter.db", &aliases())?;
        let index = db.index.expect("index must be loaded");
        assert_eq!(index.bin_size, 20);
        assert_eq!(index.blocks.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(
            index.blocks["2"],
            vec![
                DbBlock {
                    bin_start: 0,
                    offset_start: 196,
                    offset_end: 215
                },
                DbBlock {
                    bin_start: 40,
                    offset_start: 215,
                    offset_end: 245
                },
            ]
        );
        assert_eq!(index.chrom_range("1"), Some((36, 196)));
        assert_eq!(index.chrom_range("X"), None);
        Ok(())
    }

    #[test]
    fn header_and_name() -> Result<(), anyhow::Error> {
        let db = Database::open("tests/data/filter.db", &aliases())?;
        assert_eq!(
            db.header,
            vec!["Chrom", "Start", "End", "Ref", "Alt", "AF", "ClinSig"]
        );
        assert_eq!(db.name(), "filter");
        Ok(())
    }

    fn collect(db: &Database, chrom: &str) -> Result<Vec<String>, anyhow::Error> {
        Ok(db.chrom_lines(chrom)?.collect::<Result<Vec<_>, _>>()?)
    }

    #[test]
    fn indexed_and_sequential_agree() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_copy = tmp_dir.join("filter.db");
        std::fs::copy("tests/data/filter.db", &path_copy)?;

        let indexed = Database::open("tests/data/filter.db", &aliases())?;
        let sequential = Database::open(&path_copy, &aliases())?;
        assert!(sequential.index.is_none());

        for chrom in ["1", "2", "X"] {
            assert_eq!(collect(&indexed, chrom)?, collect(&sequential, chrom)?);
        }
        assert_eq!(
            collect(&indexed, "2")?,
            vec!["chr2\t5\t5\tA\tC\t0.3\t.", "chr2\t42\t42\tT\tA\t0.02\tuncertain"]
        );
        assert_eq!(collect(&indexed, "1")?.len(), 6);
        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn gzip_index_is_ignored() -> Result<(), anyhow::Error> {
        use std::io::Write;

        let tmp_dir = TempDir::default();
        let path_gz = tmp_dir.join("filter.db.gz");
        {
            let file = std::fs::File::create(&path_gz)?;
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder.write_all(&std::fs::read("tests/data/filter.db")?)?;
            encoder.finish()?;
        }
        std::fs::copy("tests/data/filter.db.idx", tmp_dir.join("filter.db.gz.idx"))?;

        let db = Database::open(&path_gz, &aliases())?;
        assert!(db.index.is_none());
        assert!(logs_contain("ignoring index of gzip compressed"));
        assert_eq!(collect(&db, "2")?.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_file() {
        assert!(Database::open("tests/data/no-such.db", &aliases()).is_err());
    }
}
