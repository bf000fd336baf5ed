//! Compilation of a query into the guaranteed bits of the annotation record.

use crate::err::LayoutError;

use super::{
    algebra::{GuaranteedMask, MaskAlgebra},
    categorical::CategoricalField,
    conf::IndexConf,
    expr::{self, Comparison, LiteralCompiler},
    layout::annotation_facts,
    popfreq::PopulationFrequencyCompiler,
    query::{Query, QueryParam},
};

/// Loss-of-function consequences as `(SO term, SO accession)`.
pub const LOF_CONSEQUENCES: &[(&str, &str)] = &[
    ("frameshift_variant", "SO:0001589"),
    ("incomplete_terminal_codon_variant", "SO:0001626"),
    ("start_lost", "SO:0002012"),
    ("stop_gained", "SO:0001587"),
    ("stop_lost", "SO:0001578"),
    ("splice_acceptor_variant", "SO:0001574"),
    ("splice_donor_variant", "SO:0001575"),
    ("feature_truncation", "SO:0001906"),
    ("transcript_ablation", "SO:0001893"),
];

/// The missense consequence as `(SO term, SO accession)`.
pub const MISSENSE_CONSEQUENCE: (&str, &str) = ("missense_variant", "SO:0001583");

/// Biotype stored in the protein coding bit.
pub const PROTEIN_CODING_BIOTYPE: &str = "protein_coding";

/// Transcript flag refining the LOF/missense bit.
pub const BASIC_TRANSCRIPT_FLAG: &str = "basic";

/// Sources of protein substitution scores; all of them score missense changes only.
pub const PROTEIN_SUBSTITUTION_SOURCES: &[&str] = &["sift", "polyphen"];

/// Whether `term` (name or accession) is a loss-of-function consequence.
pub fn is_lof(term: &str) -> bool {
    LOF_CONSEQUENCES
        .iter()
        .any(|(name, acc)| *name == term || *acc == term)
}

/// Whether `term` (name or accession) is the missense consequence.
pub fn is_missense(term: &str) -> bool {
    MISSENSE_CONSEQUENCE.0 == term || MISSENSE_CONSEQUENCE.1 == term
}

/// Protein substitution clauses such as `sift<0.1` or `polyphen=probably damaging`.
#[derive(Debug, Clone)]
struct ProteinSubstitution {
    guaranteed: GuaranteedMask,
}

impl LiteralCompiler for ProteinSubstitution {
    type Output = GuaranteedMask;

    fn compile_literal(&self, literal: &str) -> GuaranteedMask {
        let known_source = Comparison::parse(literal)
            .map(|c| {
                PROTEIN_SUBSTITUTION_SOURCES
                    .iter()
                    .any(|source| source.eq_ignore_ascii_case(c.key))
            })
            .unwrap_or(false);
        if known_source {
            self.guaranteed
        } else {
            tracing::debug!("malformed protein substitution {:?}, not constraining", literal);
            GuaranteedMask::unconstrained()
        }
    }
}

/// Compiles annotation-level query parameters into one `GuaranteedMask`.
#[derive(Debug, Clone)]
pub struct AnnotationMaskCompiler {
    biotype: CategoricalField<GuaranteedMask>,
    consequence_type: CategoricalField<GuaranteedMask>,
    transcript_flag: CategoricalField<GuaranteedMask>,
    protein_substitution: ProteinSubstitution,
    clinical_significance: CategoricalField<GuaranteedMask>,
    population_frequency: PopulationFrequencyCompiler,
    lof_missense: u64,
}

impl AnnotationMaskCompiler {
    /// Resolve all facts in the configured annotation layout.
    pub fn new(conf: &IndexConf) -> Result<Self, LayoutError> {
        let layout = &conf.annotation_layout;
        let protein_coding = layout.word_mask(annotation_facts::PROTEIN_CODING)?;
        let lof = layout.word_mask(annotation_facts::LOF)?;
        let lof_missense = layout.word_mask(annotation_facts::LOF_MISSENSE)?;
        let basic = layout.word_mask(annotation_facts::LOF_MISSENSE_BASIC)?;
        let clinical = layout.word_mask(annotation_facts::CLINICAL)?;

        let biotype = CategoricalField::open("biotype", GuaranteedMask::unconstrained())
            .with_class([PROTEIN_CODING_BIOTYPE], GuaranteedMask(protein_coding));
        let consequence_type = LOF_CONSEQUENCES
            .iter()
            .fold(
                CategoricalField::open("ct", GuaranteedMask::unconstrained()),
                |field, (name, acc)| field.with_class([*name, *acc], GuaranteedMask(lof | lof_missense)),
            )
            .with_class(
                [MISSENSE_CONSEQUENCE.0, MISSENSE_CONSEQUENCE.1],
                GuaranteedMask(lof_missense),
            );
        let transcript_flag =
            CategoricalField::open("transcriptFlag", GuaranteedMask::unconstrained())
                .with_class([BASIC_TRANSCRIPT_FLAG], GuaranteedMask(basic));
        let clinical_significance =
            CategoricalField::open("clinicalSignificance", GuaranteedMask(clinical))
                .without_negation();
        let population_frequency = PopulationFrequencyCompiler::new(
            layout,
            conf.population_catalog.clone(),
            conf.catalog_match,
        )?;

        Ok(Self {
            biotype,
            consequence_type,
            transcript_flag,
            protein_substitution: ProteinSubstitution {
                guaranteed: GuaranteedMask(lof_missense),
            },
            clinical_significance,
            population_frequency,
            lof_missense,
        })
    }

    pub fn population_frequency(&self) -> &PopulationFrequencyCompiler {
        &self.population_frequency
    }

    /// Compile `query`; the variant type never constrains the annotation record.
    pub fn compile(&self, query: &Query) -> GuaranteedMask {
        let mut result = GuaranteedMask::unconstrained();
        if let Some(value) = query.get(QueryParam::Biotype) {
            result = result.all_of(expr::compile_str(&self.biotype, value));
        }
        if let Some(value) = query.get(QueryParam::ConsequenceType) {
            let consequence = expr::compile_str(&self.consequence_type, value);
            result = result.all_of(consequence);
            if consequence.contains(self.lof_missense) {
                if let Some(flag) = query.get(QueryParam::TranscriptFlag) {
                    result = result.all_of(expr::compile_str(&self.transcript_flag, flag));
                }
            }
        }
        if let Some(value) = query.get(QueryParam::ProteinSubstitution) {
            result = result.all_of(expr::compile_str(&self.protein_substitution, value));
        }
        if let Some(value) = query.get(QueryParam::PopulationFrequencyAlt) {
            result = result.all_of(self.population_frequency.compile(value));
        }
        if let Some(value) = query.get(QueryParam::ClinicalSignificance) {
            result = result.all_of(expr::compile_str(&self.clinical_significance, value));
        }

        tracing::trace!("annotation mask for {:?}: {:?}", query, result);
        result
    }
}
