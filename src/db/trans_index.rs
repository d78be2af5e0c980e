//! Code supporting the `db trans-index` sub command.

use std::{io::Write, time::Instant};

use clap::Parser;
use thousands::Separable;
use tracing::info;

use crate::{
    common::{io::open_write_maybe_gz, trace_rss_now},
    conf::{AnnotationConfig, ConfigArgs},
    transcript::{index::BinIndex, load_transcripts, GeneIdMap},
};

/// Command line arguments for `db trans-index` sub command.
#[derive(Parser, Debug)]
#[command(about = "build transcript bin index from genePred file", long_about = None)]
pub struct Args {
    /// Path to the genePred/refGene transcript file.
    #[arg(long, required = true)]
    pub path_genes: String,
    /// Path to the output index file.
    #[arg(long, required = true)]
    pub path_output: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Main entry point for the `db trans-index` sub command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    info!("Starting `db trans-index`");
    info!("  common_args = {:?}", &common_args);
    info!("  args = {:?}", &args);

    let config = AnnotationConfig::from_args(&args.config)?;
    let transcripts = load_transcripts(
        &args.path_genes,
        &GeneIdMap::default(),
        &config.mt_aliases,
    )?;
    info!(
        "... loaded {} transcripts on {} chromosomes",
        transcripts
            .values()
            .map(|txs| txs.len())
            .sum::<usize>()
            .separate_with_commas(),
        transcripts.len()
    );

    let index = BinIndex::from_transcripts(transcripts.values().flatten(), config.bin_step);
    let mut writer = open_write_maybe_gz(&args.path_output)?;
    index.write(&mut writer)?;
    writer.flush()?;
    trace_rss_now();

    info!(
        "All of `db trans-index` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{run, Args};
    use crate::{
        common::Args as CommonArgs,
        conf::ConfigArgs,
        transcript::{index::BinIndex, test::aliases},
    };

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let args = Args {
            path_genes: "tests/data/genes.refgene".into(),
            path_output: tmp_dir.join("genes.idx").to_string_lossy().to_string(),
            config: ConfigArgs {
                bin_step: Some(20),
                ..Default::default()
            },
        };
        run(&CommonArgs::default(), &args)?;

        let text = std::fs::read_to_string(&args.path_output)?;
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "1\t1\t20\tTX1",
                "1\t21\t40\tTX1",
                "1\t41\t60\tTX1",
                "1\t61\t80\tTX1",
                "1\t81\t100\tNR1",
                "2\t1\t20\tTX2",
                "2\t21\t40\tTX2",
                "2\t41\t60\tTX2",
            ]
        );

        let index = BinIndex::load(&args.path_output, &aliases())?;
        assert_eq!(index.step, 20);
        assert_eq!(index.query("1", 75, 90), vec!["TX1", "NR1"]);

        Ok(())
    }
}
