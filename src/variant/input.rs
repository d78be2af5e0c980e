//! Reading of variant input files.

use std::{io::BufRead, path::Path};

use indexmap::{IndexMap, IndexSet};

use super::{normalize, Variant};
use crate::{
    common::{
        build_chrom_map, canonical_chrom, chrom_sort_key,
        io::{open_read_maybe_gz, parse_col, split_tsv},
    },
    err::AnnoError,
};

/// Read AVINPUT file `Chr Start End Ref Alt [OtherInfo...]`.
///
/// Every row is normalized; the result keeps the order of first appearance and has no
/// duplicates.
#[tracing::instrument(skip(mt_aliases))]
pub fn read_avinput<P: AsRef<Path> + std::fmt::Debug>(
    path: P,
    mt_aliases: &[String],
) -> Result<Vec<Variant>, AnnoError> {
    tracing::debug!("loading variants from {:?}", &path);
    let source_name = format!("{:?}", path.as_ref());
    let reader = open_read_maybe_gz(&path)?;
    let mut result = IndexSet::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AnnoError::missing(&source_name, e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let cols = split_tsv(&line);
        if cols.len() < 5 {
            return Err(AnnoError::malformed(
                &source_name,
                i + 1,
                format!("expected at least 5 columns, got {}", cols.len()),
            ));
        }
        let start: i32 = parse_col(&source_name, i + 1, "start", cols[1])?;
        let _end: i32 = parse_col(&source_name, i + 1, "end", cols[2])?;
        let variant = normalize(cols[0], start, cols[3], cols[4], mt_aliases)?;
        result.insert(variant);
    }
    tracing::debug!("... done loading {} variants", result.len());
    Ok(result.into_iter().collect())
}

/// Canonical CNV type from the free-text column.
pub fn cnv_type(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    match upper.as_str() {
        "DUP" | "DUPLICATION" | "GAIN" => "DUP".to_string(),
        "DEL" | "DELETION" | "LOSS" => "DEL".to_string(),
        _ => upper,
    }
}

/// Read BED-like CNV file `Chrom Start End Type [...]`, 1-based closed coordinates.
///
/// CNVs are represented as variants with reference allele `DIP`.
#[tracing::instrument(skip(mt_aliases))]
pub fn read_cnvs<P: AsRef<Path> + std::fmt::Debug>(
    path: P,
    mt_aliases: &[String],
) -> Result<Vec<Variant>, AnnoError> {
    tracing::debug!("loading CNVs from {:?}", &path);
    let source_name = format!("{:?}", path.as_ref());
    let reader = open_read_maybe_gz(&path)?;
    let mut result = IndexSet::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AnnoError::missing(&source_name, e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let cols = split_tsv(&line);
        if cols.len() < 4 {
            return Err(AnnoError::malformed(
                &source_name,
                i + 1,
                format!("expected at least 4 columns, got {}", cols.len()),
            ));
        }
        let start: i32 = parse_col(&source_name, i + 1, "start", cols[1])?;
        let end: i32 = parse_col(&source_name, i + 1, "end", cols[2])?;
        if end < start {
            return Err(AnnoError::malformed(
                &source_name,
                i + 1,
                format!("end {} before start {}", end, start),
            ));
        }
        result.insert(Variant {
            chrom: canonical_chrom(cols[0], mt_aliases),
            start,
            end,
            reference: "DIP".to_string(),
            alternative: cnv_type(cols[3]),
        });
    }
    tracing::debug!("... done loading {} CNVs", result.len());
    Ok(result.into_iter().collect())
}

/// Group variants by chromosome, each group sorted ascending.
///
/// Groups are in karyotypic order, unknown contigs last.
pub fn group_by_chrom(variants: &[Variant]) -> IndexMap<String, Vec<Variant>> {
    let chrom_map = build_chrom_map();
    let mut result: IndexMap<String, Vec<Variant>> = IndexMap::new();
    for variant in variants {
        result
            .entry(variant.chrom.clone())
            .or_default()
            .push(variant.clone());
    }
    for group in result.values_mut() {
        group.sort();
    }
    result.sort_by(|lhs, _, rhs, _| {
        chrom_sort_key(&chrom_map, lhs).cmp(&chrom_sort_key(&chrom_map, rhs))
    });
    result
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{err::AnnoError, variant::Variant};

    fn aliases() -> Vec<String> {
        crate::conf::AnnotationConfig::default().mt_aliases
    }

    #[test]
    fn read_avinput() -> Result<(), anyhow::Error> {
        let variants = super::read_avinput("tests/data/variants.avinput", &aliases())?;

        let keys = variants.iter().map(|v| v.key()).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                "1\t29\t29\tA\tG",
                "1\t60\t60\tT\tC",
                "1\t29\t31\tAGA\t-",
                "1\t21\t21\tA\tG",
                "1\t33\t33\t-\tA",
                "1\t10\t10\tT\tA",
                "1\t37\t37\tT\tC",
                "1\t90\t90\tA\tT",
                "2\t42\t42\tT\tA",
                "2\t35\t35\tC\tT",
                "2\t5\t5\tA\tC",
            ]
        );

        Ok(())
    }

    #[test]
    fn read_avinput_malformed() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("bad.avinput");
        std::fs::write(&path, "#header\n1\tten\t10\tA\tG\n")?;

        let res = super::read_avinput(&path, &aliases());
        assert!(matches!(
            res,
            Err(AnnoError::MalformedInput { line: 2, .. })
        ));

        Ok(())
    }

    #[test]
    fn read_cnvs() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("cnvs.bed");
        std::fs::write(&path, "chr1\t5\t95\tgain\nchrM\t10\t20\tLoss\n2\t1\t3\tcnv\n")?;

        let cnvs = super::read_cnvs(&path, &aliases())?;
        let keys = cnvs.iter().map(|v| v.key()).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["1\t5\t95\tDIP\tDUP", "MT\t10\t20\tDIP\tDEL", "2\t1\t3\tDIP\tCNV"]
        );

        Ok(())
    }

    #[test]
    fn group_by_chrom() -> Result<(), anyhow::Error> {
        let variants = super::read_avinput("tests/data/variants.avinput", &aliases())?;
        let groups = super::group_by_chrom(&variants);

        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        let starts = groups["1"].iter().map(|v| v.start).collect::<Vec<_>>();
        assert_eq!(starts, vec![10, 21, 29, 29, 33, 37, 60, 90]);

        let shuffled = ["GL000192.1", "X", "10", "2"]
            .iter()
            .map(|chrom| Variant::new(chrom.to_string(), 1, 1, "A".into(), "C".into()))
            .collect::<Vec<_>>();
        let groups = super::group_by_chrom(&shuffled);
        assert_eq!(
            groups.keys().collect::<Vec<_>>(),
            vec!["2", "10", "X", "GL000192.1"]
        );

        Ok(())
    }
}
