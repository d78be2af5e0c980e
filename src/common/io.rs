//! Common, IO-related code.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};

use crate::err::AnnoError;

fn is_gz<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz"))
}

fn open_file<P: AsRef<Path>>(path: P) -> Result<File, AnnoError> {
    File::open(path.as_ref()).map_err(|e| AnnoError::missing(format!("{:?}", path.as_ref()), e))
}

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, AnnoError>
where
    P: AsRef<Path>,
{
    if is_gz(&path) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = open_file(&path)?;
        let decoder = MultiGzDecoder::new(BufReader::new(file));
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = open_file(&path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open a file with gzip encoder.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not create {:?}: {}", path.as_ref(), e))?;
    if is_gz(&path) {
        tracing::trace!("Opening {:?} as gzip for writing", path.as_ref());
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        Ok(Box::new(encoder))
    } else {
        tracing::trace!("Opening {:?} as plain text for writing", path.as_ref());
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Split a tab-separated line, dropping the trailing line break.
pub fn split_tsv(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r']).split('\t').collect()
}

/// Parse an integer column, reporting the line on failure.
pub fn parse_col<T: std::str::FromStr>(
    source_name: &str,
    line_no: usize,
    name: &str,
    value: &str,
) -> Result<T, AnnoError> {
    value.trim().parse::<T>().map_err(|_| {
        AnnoError::malformed(
            source_name,
            line_no,
            format!("could not parse {} from {:?}", name, value),
        )
    })
}

#[cfg(test)]
mod test {
    use std::io::{BufRead, Write};

    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("test.txt")]
    #[case("test.txt.gz")]
    fn write_then_read(#[case] filename: &str) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join(filename);

        {
            let mut f = super::open_write_maybe_gz(&path)?;
            writeln!(f, "first")?;
            writeln!(f, "second")?;
            f.flush()?;
        }

        let lines = super::open_read_maybe_gz(&path)?
            .lines()
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines, vec!["first", "second"]);

        Ok(())
    }

    #[test]
    fn open_missing() {
        let res = super::open_read_maybe_gz("tests/data/does-not-exist.txt");
        assert!(matches!(
            res,
            Err(crate::err::AnnoError::MissingResource { .. })
        ));
    }

    #[test]
    fn split_and_parse() -> Result<(), anyhow::Error> {
        let cols = super::split_tsv("1\t100\tA\r\n");
        assert_eq!(cols, vec!["1", "100", "A"]);
        let pos: i32 = super::parse_col("x", 1, "start", cols[1])?;
        assert_eq!(pos, 100);
        assert!(super::parse_col::<i32>("x", 1, "start", "A").is_err());

        Ok(())
    }
}
