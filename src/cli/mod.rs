//! Implementation of the command line sub commands.

pub mod compile;
pub mod layout;
pub mod scan;

use crate::index::{IndexConf, MaskCompiler, Query};

/// Load the index configuration and build the compilers for it.
pub(crate) fn load_compiler(
    path_conf: Option<&str>,
) -> Result<(IndexConf, MaskCompiler), anyhow::Error> {
    let conf = IndexConf::load_or_default(path_conf)?;
    let compiler = MaskCompiler::new(&conf)
        .map_err(|e| anyhow::anyhow!("invalid index configuration: {}", e))?;
    Ok((conf, compiler))
}

/// Load a query from an inline JSON document or `@` with path.
pub(crate) fn load_query(arg: &str) -> Result<Query, anyhow::Error> {
    let query: Query = crate::common::load_json_arg(arg)?;
    for key in query.unknown_keys() {
        tracing::warn!("ignoring unknown query key {:?}", key);
    }
    Ok(query)
}
