//! Implementation of the `layout` sub command.

use std::io::Write;

use crate::index::{layout::BitLayout, IndexConf};

/// Command line arguments for the `layout` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Print the effective index configuration", long_about = None)]
pub struct Args {
    /// Path to the index configuration JSON; reference layouts if omitted.
    #[arg(long)]
    pub conf: Option<String>,
}

fn log_layout(layout: &BitLayout) {
    tracing::info!(
        "layout {:?}: {} byte(s), {} fact(s)",
        layout.name(),
        layout.width(),
        layout.all_facts().count()
    );
    for (fact, slot) in layout.all_facts() {
        tracing::debug!("  {} = byte {} bit {}", fact, slot.byte, slot.offset);
    }
}

/// Write the effective configuration of `args` as JSON to `out`.
pub fn run_with_writer<W: Write>(out: &mut W, args: &Args) -> Result<IndexConf, anyhow::Error> {
    let (conf, _) = super::load_compiler(args.conf.as_deref())?;
    log_layout(&conf.file_layout);
    log_layout(&conf.annotation_layout);

    serde_json::to_writer_pretty(&mut *out, &conf)
        .map_err(|e| anyhow::anyhow!("could not write configuration: {}", e))?;
    writeln!(out)?;
    Ok(conf)
}

/// Main entry point for the `layout` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    run_with_writer(&mut std::io::stdout().lock(), args)?;

    Ok(())
}
