//! Common functionality.

use byte_unit::{Byte, UnitType};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indexmap::IndexMap;
use itertools::Itertools;

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(bytes) => tracing::debug!(
            "RSS now: {:.2}",
            Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary)
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Definition of canonical chromosome names.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "MT",
];

/// Build mapping of canonical chromosome names to their rank.
pub fn build_chrom_map() -> IndexMap<String, usize> {
    CHROMS
        .iter()
        .enumerate()
        .map(|(i, chrom)| (chrom.to_string(), i))
        .collect()
}

/// Map a chromosome name to its canonical form.
///
/// The `chr` prefix is stripped and every mitochondrial alias becomes `MT`.
pub fn canonical_chrom(name: &str, mt_aliases: &[String]) -> String {
    if mt_aliases.iter().any(|alias| alias == name) {
        return "MT".to_string();
    }
    let stripped = name.strip_prefix("chr").unwrap_or(name);
    if stripped == "M" || mt_aliases.iter().any(|alias| alias == stripped) {
        "MT".to_string()
    } else {
        stripped.to_string()
    }
}

/// Sort key for chromosomes: known ones by rank, others after them by name.
pub fn chrom_sort_key(chrom_map: &IndexMap<String, usize>, chrom: &str) -> (usize, String) {
    match chrom_map.get(chrom) {
        Some(rank) => (*rank, String::new()),
        None => (chrom_map.len(), chrom.to_string()),
    }
}

/// Compute the length of the overlap of two 1-based, closed intervals.
pub fn overlap_len(lhs: (i32, i32), rhs: (i32, i32)) -> i32 {
    let begin = std::cmp::max(lhs.0, rhs.0);
    let end = std::cmp::min(lhs.1, rhs.1);
    if begin > end {
        0
    } else {
        end - begin + 1
    }
}

/// Join the values with `sep`, or return `.` for an empty input.
pub fn join_or_dot<I, S>(values: I, sep: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = values.into_iter().map(|s| s.as_ref().to_string()).join(sep);
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    fn mt_aliases() -> Vec<String> {
        vec!["M".into(), "chrM".into(), "chrMT".into(), "MT".into()]
    }

    #[rstest::rstest]
    #[case("chr1", "1")]
    #[case("1", "1")]
    #[case("chrX", "X")]
    #[case("chrM", "MT")]
    #[case("M", "MT")]
    #[case("chrMT", "MT")]
    #[case("chrUn_gl000220", "Un_gl000220")]
    fn canonical_chrom(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(super::canonical_chrom(name, &mt_aliases()), expected);
    }

    #[test]
    fn canonical_chrom_custom_alias() {
        let aliases = vec!["mito".to_string()];
        assert_eq!(super::canonical_chrom("mito", &aliases), "MT");
        assert_eq!(super::canonical_chrom("chrM", &aliases), "MT");
    }

    #[test]
    fn chrom_sort_key() {
        let chrom_map = super::build_chrom_map();
        let mut chroms = vec!["X", "10", "GL000192.1", "2", "MT", "1"];
        chroms.sort_by_key(|c| super::chrom_sort_key(&chrom_map, c));
        assert_eq!(chroms, vec!["1", "2", "10", "X", "MT", "GL000192.1"]);
    }

    #[rstest::rstest]
    #[case((1, 10), (5, 20), 6)]
    #[case((1, 10), (10, 20), 1)]
    #[case((1, 10), (11, 20), 0)]
    #[case((5, 6), (1, 100), 2)]
    fn overlap_len(#[case] lhs: (i32, i32), #[case] rhs: (i32, i32), #[case] expected: i32) {
        assert_eq!(super::overlap_len(lhs, rhs), expected);
        assert_eq!(super::overlap_len(rhs, lhs), expected);
    }

    #[test]
    fn join_or_dot() {
        assert_eq!(super::join_or_dot(Vec::<String>::new(), ","), ".");
        assert_eq!(super::join_or_dot(["a", "b"], ","), "a,b");
    }
}
