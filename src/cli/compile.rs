//! Implementation of the `compile` sub command.

use std::io::Write;

use crate::index::RecordFilter;

/// Command line arguments for the `compile` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Compile a query into index masks", long_about = None)]
pub struct Args {
    /// The query as JSON or @ with path to JSON file.
    #[arg(long)]
    pub query: String,
    /// Sample to compile FORMAT clauses for.
    #[arg(long)]
    pub sample: Option<String>,
    /// Path to the index configuration JSON; reference layouts if omitted.
    #[arg(long)]
    pub conf: Option<String>,
}

/// Compile the query of `args` into a `RecordFilter`.
pub fn compile(args: &Args) -> Result<RecordFilter, anyhow::Error> {
    let (_, compiler) = super::load_compiler(args.conf.as_deref())?;
    let query = super::load_query(&args.query)?;
    Ok(compiler.compile(&query, args.sample.as_deref()))
}

/// Write the compiled masks of `args` as JSON to `out`.
pub fn run_with_writer<W: Write>(out: &mut W, args: &Args) -> Result<(), anyhow::Error> {
    let filter = compile(args)?;
    if filter.is_unconstrained() {
        tracing::info!("query does not constrain the index");
    }
    serde_json::to_writer_pretty(&mut *out, &filter)
        .map_err(|e| anyhow::anyhow!("could not write compiled masks: {}", e))?;
    writeln!(out)?;
    Ok(())
}

/// Main entry point for the `compile` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    run_with_writer(&mut std::io::stdout().lock(), args)?;

    tracing::info!("compiled query in {:?}", before_anything.elapsed());
    Ok(())
}
