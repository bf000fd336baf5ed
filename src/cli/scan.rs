//! Implementation of the `scan` sub command.

use std::io::{BufRead, Write};

use thousands::Separable;

use crate::index::IndexRecord;

/// Command line arguments for the `scan` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Scan index records with a compiled query", long_about = None)]
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
    /// Path to TSV file with the file and annotation record bytes as hex.
    #[arg(long)]
    pub path_records: String,
}

/// Parse the stored bytes of a record, written as hex pairs in storage order.
fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, anyhow::Error> {
    let value = value.trim();
    if value.is_empty() || value.len() % 2 != 0 || value.len() > 16 {
        anyhow::bail!("record {:?} is not 1 to 8 hex-encoded bytes", value);
    }
    (0..value.len())
        .step_by(2)
        .map(|pos| {
            value
                .get(pos..pos + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| anyhow::anyhow!("invalid hex byte in record {:?}", value))
        })
        .collect()
}

/// Read records as `(line number, record)`; blank and `#` lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<(usize, IndexRecord)>, anyhow::Error> {
    let mut result = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let (file, annotation) = line.split_once('\t').ok_or_else(|| {
            anyhow::anyhow!("line {}: expected two tab-separated columns", lineno + 1)
        })?;
        let file =
            parse_hex_bytes(file).map_err(|e| anyhow::anyhow!("line {}: {}", lineno + 1, e))?;
        let annotation = parse_hex_bytes(annotation)
            .map_err(|e| anyhow::anyhow!("line {}: {}", lineno + 1, e))?;
        let record = IndexRecord::from_bytes(&file, &annotation);
        result.push((lineno + 1, record));
    }
    Ok(result)
}

/// Write the line numbers of all matching records to `out`, returning their count.
pub fn run_with_writer<W: Write>(out: &mut W, args: &Args) -> Result<usize, anyhow::Error> {
    let (_, compiler) = super::load_compiler(args.conf.as_deref())?;
    let query = super::load_query(&args.query)?;
    let filter = compiler.compile(&query, args.sample.as_deref());
    tracing::info!("compiled filter: {:?}", &filter);

    tracing::info!("reading records...");
    let file = std::fs::File::open(&args.path_records).map_err(|e| {
        anyhow::anyhow!("could not open records file {:?}: {}", &args.path_records, e)
    })?;
    let numbered = read_records(std::io::BufReader::new(file))?;
    let records = numbered.iter().map(|(_, record)| *record).collect::<Vec<_>>();

    let before_scan = std::time::Instant::now();
    let hits = filter.scan(&records);
    tracing::info!(
        "... {} of {} records may match, scanned in {:?}",
        hits.len().separate_with_commas(),
        records.len().separate_with_commas(),
        before_scan.elapsed()
    );

    for idx in &hits {
        writeln!(out, "{}", numbered[*idx].0)?;
    }
    writeln!(
        out,
        "# {} of {} records",
        hits.len().separate_with_commas(),
        records.len().separate_with_commas()
    )?;
    Ok(hits.len())
}

/// Main entry point for the `scan` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    run_with_writer(&mut std::io::stdout().lock(), args)?;

    tracing::info!("All of `scan` completed in {:?}", before_anything.elapsed());
    Ok(())
}
