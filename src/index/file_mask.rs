//! Compilation of a query into the mask/pattern of the per-file record.

use indexmap::IndexMap;

use crate::err::LayoutError;

use super::{
    algebra::{MaskAlgebra, MaskPattern},
    categorical::CategoricalField,
    conf::IndexConf,
    expr::{self, Comparison},
    layout::file_facts,
    query::{Query, QueryParam},
    range::{RangeCompiler, ThresholdLadder},
};

/// Labels of variant types stored as SNV.
pub const SNV_TYPES: &[&str] = &["SNV", "SNP"];

/// Variant types stored as non-SNV, each a distinct value.
pub const NON_SNV_TYPES: &[&str] = &[
    "INDEL",
    "INSERTION",
    "DELETION",
    "SV",
    "CNV",
    "DUPLICATION",
    "INVERSION",
    "TRANSLOCATION",
    "BREAKEND",
    "SYMBOLIC",
    "NO_VARIATION",
    "MIXED",
];

/// Synonymous labels of multi-nucleotide variants.
pub const MNV_TYPES: &[&str] = &["MNV", "MNP"];

/// The only FILTER label stored as passing.
pub const FILTER_PASS: &str = "PASS";

/// Separator between sample and first clause of a FORMAT value.
pub const SAMPLE_SEP: char = ':';

/// The resolved bits of the file layout.
///
/// Each field owns its bits exclusively; a fact shared by two fields would
/// make the stored bit the OR of unrelated facts.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub snv: u64,
    pub pass: u64,
    pub qual: ThresholdLadder,
    /// Ladders of indexed FORMAT fields, by field name.
    pub format: IndexMap<String, ThresholdLadder>,
}

impl FileFacts {
    /// Resolve all facts in the configured file layout.
    pub fn resolve(conf: &IndexConf) -> Result<Self, LayoutError> {
        let layout = &conf.file_layout;
        let facts = Self {
            snv: layout.word_mask(file_facts::SNV)?,
            pass: layout.word_mask(file_facts::FILTER_PASS)?,
            qual: ThresholdLadder::from_conf("QUAL", &conf.qual_ladder, layout)?,
            format: conf
                .format_ladders
                .iter()
                .map(|(field, steps)| {
                    Ok((field.clone(), ThresholdLadder::from_conf(field, steps, layout)?))
                })
                .collect::<Result<IndexMap<_, _>, LayoutError>>()?,
        };
        facts.check_disjoint()?;
        Ok(facts)
    }

    /// Fields with the bits they occupy.
    fn fields(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            (String::from("SNV"), self.snv),
            (String::from("FILTER"), self.pass),
            (String::from("QUAL"), self.qual.full_mask()),
        ];
        result.extend(
            self.format
                .iter()
                .map(|(field, ladder)| (format!("FORMAT/{}", field), ladder.full_mask())),
        );
        result
    }

    fn check_disjoint(&self) -> Result<(), LayoutError> {
        let fields = self.fields();
        for (idx, (second, mask)) in fields.iter().enumerate() {
            if let Some((first, _)) = fields[..idx].iter().find(|(_, other)| other & mask != 0) {
                return Err(LayoutError::FactReused {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Compiles `type`, `filter`, `qual` and `format` into one `MaskPattern`.
#[derive(Debug, Clone)]
pub struct FileMaskCompiler {
    variant_type: CategoricalField<MaskPattern>,
    filter: CategoricalField<MaskPattern>,
    qual: ThresholdLadder,
    format: IndexMap<String, ThresholdLadder>,
}

impl FileMaskCompiler {
    /// Resolve all facts in the configured file layout.
    pub fn new(conf: &IndexConf) -> Result<Self, LayoutError> {
        let FileFacts {
            snv,
            pass,
            qual,
            format,
        } = FileFacts::resolve(conf)?;

        let variant_type = CategoricalField::closed("type")
            .with_class(SNV_TYPES.iter().copied(), MaskPattern::set(snv))
            .with_class(MNV_TYPES.iter().copied(), MaskPattern::clear(snv))
            .with_each(NON_SNV_TYPES.iter().copied(), MaskPattern::clear(snv));
        let filter = CategoricalField::open("filter", MaskPattern::clear(pass))
            .with_class([FILTER_PASS], MaskPattern::set(pass));

        Ok(Self {
            variant_type,
            filter,
            qual,
            format,
        })
    }

    /// Ladder of the QUAL column.
    pub fn qual_ladder(&self) -> &ThresholdLadder {
        &self.qual
    }

    /// Ladder of an indexed FORMAT field.
    pub fn format_ladder(&self, field: &str) -> Option<&ThresholdLadder> {
        self.format.get(field)
    }

    pub fn variant_type(&self) -> &CategoricalField<MaskPattern> {
        &self.variant_type
    }

    /// Compile `query` for the record of `sample`.
    ///
    /// FORMAT clauses only participate if `sample` is given and named by them.
    pub fn compile(&self, query: &Query, sample: Option<&str>) -> MaskPattern {
        let mut result = MaskPattern::unconstrained();
        if let Some(value) = query.get(QueryParam::Type) {
            result = result.all_of(expr::compile_str(&self.variant_type, value));
        }
        if let Some(value) = query.get(QueryParam::Filter) {
            result = result.all_of(expr::compile_str(&self.filter, value));
        }
        if let Some(value) = query.get(QueryParam::Qual) {
            result = result.all_of(expr::compile_str(&RangeCompiler { ladder: &self.qual }, value));
        }
        if let (Some(value), Some(sample)) = (query.get(QueryParam::Format), sample) {
            result = result.all_of(self.compile_format(value, sample));
        }

        tracing::trace!("file mask for {:?} / {:?}: {:?}", query, sample, result);
        result
    }

    /// Compile a FORMAT value such as `S1:GQ>4;DP>20,S2:DP<10`.
    ///
    /// Both `,` and `;` delimit field clauses.  A clause without sample prefix
    /// belongs to the sample of the previous clause.
    pub fn compile_format(&self, value: &str, sample: &str) -> MaskPattern {
        let mut current: Option<&str> = None;
        let mut result = MaskPattern::unconstrained();
        for token in value.split([expr::AND, expr::OR]).map(str::trim) {
            if token.is_empty() {
                continue;
            }
            let clause = match token.split_once(SAMPLE_SEP) {
                Some((prefix, clause)) => {
                    current = Some(prefix.trim());
                    clause
                }
                None => token,
            };
            if current != Some(sample) {
                tracing::debug!("format clause {:?} not for sample {:?}, ignoring", token, sample);
                continue;
            }
            let Some(comparison) = Comparison::parse(clause) else {
                tracing::debug!("malformed format clause {:?}, ignoring", token);
                continue;
            };
            let Some(ladder) = self.format.get(comparison.key) else {
                continue;
            };
            match comparison.number() {
                Some(value) => result = result.all_of(ladder.compile(comparison.op, value)),
                None => tracing::debug!("malformed format clause {:?}, ignoring", token),
            }
        }
        result
    }
}
