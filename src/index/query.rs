//! Query parameters as produced by upstream query producers.

use indexmap::IndexMap;

/// Query parameters understood by the mask compilers.
///
/// The serialized names are the keys used by upstream producers and must not
/// change.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum QueryParam {
    /// Variant type, e.g., `SNV,INDEL`.
    #[strum(serialize = "type")]
    Type,
    /// Genomic region; never constrains a mask.
    #[strum(serialize = "region")]
    Region,
    /// FILTER column labels, e.g., `PASS` or `!LowQual`.
    #[strum(serialize = "filter")]
    Filter,
    /// QUAL comparison, e.g., `>=30`.
    #[strum(serialize = "qual")]
    Qual,
    /// Per-sample FORMAT clauses, e.g., `S1:DP>20;GQ>10`.
    #[strum(serialize = "format")]
    Format,
    /// Transcript biotype.
    #[strum(serialize = "biotype")]
    Biotype,
    /// Consequence type as SO term name or accession.
    #[strum(serialize = "ct")]
    ConsequenceType,
    /// Transcript flag, e.g., `basic`.
    #[strum(serialize = "transcriptFlag")]
    TranscriptFlag,
    /// Protein substitution score, e.g., `sift<0.1`.
    #[strum(serialize = "proteinSubstitution")]
    ProteinSubstitution,
    /// Population alternate frequency, e.g., `GNOMAD_EXOMES:AFR<0.01`.
    #[strum(serialize = "populationFrequencyAlt")]
    PopulationFrequencyAlt,
    /// Clinical significance, e.g., `pathogenic`.
    #[strum(serialize = "clinicalSignificance")]
    ClinicalSignificance,
}

/// A filter query: parameter keys to raw filter values.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Query {
    params: IndexMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of one parameter.
    pub fn with(mut self, param: QueryParam, value: impl Into<String>) -> Self {
        self.params.insert(param.to_string(), value.into());
        self
    }

    /// The non-empty value of `param`, if any.
    pub fn get(&self, param: QueryParam) -> Option<&str> {
        self.params
            .get(param.as_ref())
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Keys that are not a known `QueryParam`.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.params
            .keys()
            .map(String::as_str)
            .filter(|key| key.parse::<QueryParam>().is_err())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
