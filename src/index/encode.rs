//! Encoding of variants into stored index words.
//!
//! The writer side of the index; the compilers rely on exactly these
//! encodings for soundness.

use indexmap::IndexMap;

use crate::err::LayoutError;

use super::{
    annotation_mask::{
        is_lof, is_missense, BASIC_TRANSCRIPT_FLAG, PROTEIN_CODING_BIOTYPE,
    },
    conf::IndexConf,
    file_mask::{FileFacts, FILTER_PASS, SNV_TYPES},
    layout::annotation_facts,
    popfreq::{
        PopulationFrequencyCatalog, PopulationId, ALL_POPULATIONS_THRESHOLD,
        ANY_POPULATION_THRESHOLD,
    },
    range::ThresholdLadder,
};

/// The facts of one variant call in one file of one sample.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileIndexEntry {
    /// Variant type, e.g., `SNV` or `INDEL`.
    pub variant_type: String,
    /// Raw FILTER column, e.g., `PASS` or `LowQual;LowGQX`.
    pub filter: String,
    /// QUAL column, if any.
    pub qual: Option<f64>,
    /// Numeric FORMAT fields of the sample.
    pub format: IndexMap<String, f64>,
}

/// Annotation of one transcript.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptAnnotation {
    pub biotype: String,
    /// Consequence types as SO term names or accessions.
    pub consequence_types: Vec<String>,
    pub flags: Vec<String>,
}

/// The annotation facts of one variant.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationIndexEntry {
    pub transcripts: Vec<TranscriptAnnotation>,
    /// Recorded alternate allele frequencies.
    pub population_frequencies: Vec<(PopulationId, f64)>,
    pub clinical_significance: Vec<String>,
}

/// Writes `FileIndexEntry` records in the configured file layout.
#[derive(Debug, Clone)]
pub struct FileIndexEncoder {
    snv: u64,
    pass: u64,
    qual: ThresholdLadder,
    format: IndexMap<String, ThresholdLadder>,
}

impl FileIndexEncoder {
    pub fn new(conf: &IndexConf) -> Result<Self, LayoutError> {
        let FileFacts {
            snv,
            pass,
            qual,
            format,
        } = FileFacts::resolve(conf)?;
        Ok(Self {
            snv,
            pass,
            qual,
            format,
        })
    }

    pub fn encode(&self, entry: &FileIndexEntry) -> u64 {
        let mut word = 0;
        if SNV_TYPES.contains(&entry.variant_type.as_str()) {
            word |= self.snv;
        }
        if entry.filter == FILTER_PASS {
            word |= self.pass;
        }
        word |= self.qual.encode(entry.qual);
        for (field, ladder) in &self.format {
            word |= ladder.encode(entry.format.get(field).copied());
        }
        word
    }
}

/// Writes `AnnotationIndexEntry` records in the configured annotation layout.
#[derive(Debug, Clone)]
pub struct AnnotationIndexEncoder {
    catalog: PopulationFrequencyCatalog,
    any_below: u64,
    all_below: u64,
    protein_coding: u64,
    lof: u64,
    lof_missense: u64,
    lof_missense_basic: u64,
    clinical: u64,
}

impl AnnotationIndexEncoder {
    pub fn new(conf: &IndexConf) -> Result<Self, LayoutError> {
        let layout = &conf.annotation_layout;
        Ok(Self {
            catalog: conf.population_catalog.clone(),
            any_below: layout.word_mask(annotation_facts::POP_FREQ_ANY_001)?,
            all_below: layout.word_mask(annotation_facts::POP_FREQ_ALL_01)?,
            protein_coding: layout.word_mask(annotation_facts::PROTEIN_CODING)?,
            lof: layout.word_mask(annotation_facts::LOF)?,
            lof_missense: layout.word_mask(annotation_facts::LOF_MISSENSE)?,
            lof_missense_basic: layout.word_mask(annotation_facts::LOF_MISSENSE_BASIC)?,
            clinical: layout.word_mask(annotation_facts::CLINICAL)?,
        })
    }

    pub fn encode(&self, entry: &AnnotationIndexEntry) -> u64 {
        let mut word = 0;
        for tx in &entry.transcripts {
            if tx.biotype == PROTEIN_CODING_BIOTYPE {
                word |= self.protein_coding;
            }
            let lof = tx.consequence_types.iter().any(|ct| is_lof(ct));
            let lof_missense = lof || tx.consequence_types.iter().any(|ct| is_missense(ct));
            if lof {
                word |= self.lof;
            }
            if lof_missense {
                word |= self.lof_missense;
                if tx.flags.iter().any(|flag| flag == BASIC_TRANSCRIPT_FLAG) {
                    word |= self.lof_missense_basic;
                }
            }
        }

        if entry
            .population_frequencies
            .iter()
            .any(|(_, af)| *af < ANY_POPULATION_THRESHOLD)
        {
            word |= self.any_below;
        }
        let all_below = !self.catalog.is_empty()
            && self.catalog.iter().all(|pop| {
                let mut afs = entry
                    .population_frequencies
                    .iter()
                    .filter(|(other, _)| other == pop)
                    .peekable();
                afs.peek().is_some() && afs.all(|(_, af)| *af < ALL_POPULATIONS_THRESHOLD)
            });
        if all_below {
            word |= self.all_below;
        }

        if !entry.clinical_significance.is_empty() {
            word |= self.clinical;
        }
        word
    }
}
