//! Configuration of one index generation, persisted next to the index.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    layout::{file_facts, BitLayout},
    popfreq::{CatalogMatch, PopulationFrequencyCatalog},
    range::LadderStepConf,
};

/// Layouts, ladders and population catalog of an index generation.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct IndexConf {
    /// Layout of the per-sample, per-file record.
    pub file_layout: BitLayout,
    /// Layout of the per-variant annotation record.
    pub annotation_layout: BitLayout,
    /// Ladder of the QUAL column.
    pub qual_ladder: Vec<LadderStepConf>,
    /// Ladders of indexed FORMAT fields, by field name.
    pub format_ladders: IndexMap<String, Vec<LadderStepConf>>,
    /// Populations of the combined rarity bit.
    pub population_catalog: PopulationFrequencyCatalog,
    /// How population filters must cover the catalog.
    #[serde(default)]
    pub catalog_match: CatalogMatch,
}

impl Default for IndexConf {
    fn default() -> Self {
        Self {
            file_layout: BitLayout::default_file_layout(),
            annotation_layout: BitLayout::default_annotation_layout(),
            qual_ladder: vec![
                LadderStepConf {
                    threshold: 20.0,
                    fact: file_facts::QUAL_GT_20.to_string(),
                },
                LadderStepConf {
                    threshold: 40.0,
                    fact: file_facts::QUAL_GT_40.to_string(),
                },
            ],
            format_ladders: [(
                String::from("DP"),
                vec![LadderStepConf {
                    threshold: 20.0,
                    fact: file_facts::DP_GT_20.to_string(),
                }],
            )]
            .into_iter()
            .collect(),
            population_catalog: PopulationFrequencyCatalog::default(),
            catalog_match: CatalogMatch::default(),
        }
    }
}

impl IndexConf {
    /// Load from a JSON file, validating the layouts.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("could not read index configuration {:?}: {}", path, e)
        })?;
        serde_json::from_str(&json).map_err(|e| {
            anyhow::anyhow!("could not parse index configuration {:?}: {}", path, e)
        })
    }

    /// Load from `path` if given, otherwise use the reference configuration.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, anyhow::Error> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
