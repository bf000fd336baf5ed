//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

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

/// Load a JSON document given inline or as `@` with path to a file.
pub fn load_json_arg<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T, anyhow::Error> {
    if let Some(path) = arg.strip_prefix('@') {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to open JSON file {:?}: {}", path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("failed to parse JSON from {:?}: {}", path, e))
    } else {
        serde_json::from_str(arg).map_err(|e| anyhow::anyhow!("failed to parse JSON: {}", e))
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::load_json_arg;
    use crate::index::query::{Query, QueryParam};

    #[test]
    fn load_inline() -> Result<(), anyhow::Error> {
        let query: Query = load_json_arg(r#"{"type": "SNV", "qual": ">=30"}"#)?;

        assert_eq!(
            query,
            Query::new()
                .with(QueryParam::Type, "SNV")
                .with(QueryParam::Qual, ">=30")
        );

        Ok(())
    }

    #[test]
    fn load_from_file() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path = tmp_dir.join("query.json");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, r#"{{"filter": "PASS"}}"#)?;

        let query: Query = load_json_arg(&format!("@{}", path.display()))?;

        assert_eq!(query, Query::new().with(QueryParam::Filter, "PASS"));

        Ok(())
    }

    #[test]
    fn load_failures() {
        assert!(load_json_arg::<Query>("{").is_err());
        assert!(load_json_arg::<Query>("@/does/not/exist.json").is_err());
    }
}
