//! Annotation configuration shared by all components.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Immutable annotation settings, built once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Maximal distance from an exon boundary (inclusive) for splicing calls.
    pub splicing_distance: i32,
    /// Step size of the transcript bin index.
    pub bin_step: i32,
    /// Minimal fraction of the variant overlapped in region-based annotation.
    pub min_overlap: f64,
    /// Distance for upstream/downstream annotation.
    pub flank_distance: i32,
    /// Name coding regions by their exon (`exon3`) instead of `CDS2`.
    pub exon_naming: bool,
    /// Use one-letter amino acid codes.
    pub aa_short: bool,
    /// Names that denote the mitochondrial contig.
    pub mt_aliases: Vec<String>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            splicing_distance: 2,
            bin_step: 300_000,
            min_overlap: 0.7,
            flank_distance: 1_000,
            exon_naming: false,
            aa_short: false,
            mt_aliases: vec!["M".into(), "chrM".into(), "chrMT".into(), "MT".into()],
        }
    }
}

/// Command line overrides for the configuration.
#[derive(clap::Parser, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Optional TOML file with annotation settings.
    #[arg(long)]
    pub config: Option<String>,
    /// Splicing distance, overrides config file.
    #[arg(long)]
    pub splicing_distance: Option<i32>,
    /// Bin step of the transcript index, overrides config file.
    #[arg(long)]
    pub bin_step: Option<i32>,
    /// Minimal overlap fraction for region databases, overrides config file.
    #[arg(long)]
    pub min_overlap: Option<f64>,
    /// Upstream/downstream distance, overrides config file.
    #[arg(long)]
    pub flank_distance: Option<i32>,
    /// Name coding regions by exon number.
    #[arg(long, default_value_t = false)]
    pub exon_naming: bool,
    /// Use one-letter amino acid codes.
    #[arg(long, default_value_t = false)]
    pub aa_short: bool,
}

impl AnnotationConfig {
    /// Load configuration from TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        tracing::debug!("loading annotation config from {:?}", path.as_ref());
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("could not read {:?}: {}", path.as_ref(), e))?;
        toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("could not parse {:?}: {}", path.as_ref(), e))
    }

    /// Build the configuration from optional file and command line overrides.
    pub fn from_args(args: &ConfigArgs) -> Result<Self, anyhow::Error> {
        let mut result = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(value) = args.splicing_distance {
            result.splicing_distance = value;
        }
        if let Some(value) = args.bin_step {
            result.bin_step = value;
        }
        if let Some(value) = args.min_overlap {
            result.min_overlap = value;
        }
        if let Some(value) = args.flank_distance {
            result.flank_distance = value;
        }
        result.exon_naming |= args.exon_naming;
        result.aa_short |= args.aa_short;

        if result.bin_step <= 0 {
            anyhow::bail!("bin step must be positive, got {}", result.bin_step);
        }
        if !(0.0..=1.0).contains(&result.min_overlap) {
            anyhow::bail!("minimal overlap must be in [0, 1], got {}", result.min_overlap);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::{AnnotationConfig, ConfigArgs};

    #[test]
    fn defaults() -> Result<(), anyhow::Error> {
        let conf = AnnotationConfig::from_args(&ConfigArgs::default())?;
        assert_eq!(conf, AnnotationConfig::default());
        assert_eq!(conf.splicing_distance, 2);
        assert_eq!(conf.bin_step, 300_000);

        Ok(())
    }

    #[test]
    fn file_then_overrides() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("conf.toml");
        {
            let mut f = std::fs::File::create(&path)?;
            writeln!(f, "splicing_distance = 5")?;
            writeln!(f, "aa_short = true")?;
            writeln!(f, "min_overlap = 0.5")?;
        }

        let args = ConfigArgs {
            config: Some(path.to_string_lossy().to_string()),
            min_overlap: Some(0.9),
            ..Default::default()
        };
        let conf = AnnotationConfig::from_args(&args)?;

        assert_eq!(conf.splicing_distance, 5);
        assert!(conf.aa_short);
        assert!(float_cmp::approx_eq!(f64, conf.min_overlap, 0.9, ulps = 2));
        assert_eq!(conf.bin_step, 300_000);

        Ok(())
    }

    #[test]
    fn reject_bad_overlap() {
        let args = ConfigArgs {
            min_overlap: Some(1.5),
            ..Default::default()
        };
        assert!(AnnotationConfig::from_args(&args).is_err());
    }
}
