//! Compilation of population alternate frequency filters into rarity bits.
//!
//! Clauses have the form `STUDY:POPULATION<threshold`.  Two annotation bits are
//! derived: "any recorded population below 0.001" and "all catalog populations
//! below 0.01".

use indexmap::IndexSet;

use crate::err::LayoutError;

use super::{
    algebra::{GuaranteedMask, MaskAlgebra},
    expr::{self, Comparison, ComparisonOp, Expr, LiteralCompiler},
    layout::{annotation_facts, BitLayout},
};

/// Bound for the "any population" rarity bit.
pub const ANY_POPULATION_THRESHOLD: f64 = 0.001;
/// Bound for the "all catalog populations" rarity bit.
pub const ALL_POPULATIONS_THRESHOLD: f64 = 0.01;

/// A population within a frequency study, e.g., `GNOMAD_EXOMES:AFR`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PopulationId {
    pub study: String,
    pub population: String,
}

impl PopulationId {
    pub fn new(study: &str, population: &str) -> Self {
        Self {
            study: study.to_string(),
            population: population.to_string(),
        }
    }
}

impl std::fmt::Display for PopulationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.study, self.population)
    }
}

/// The fixed set of populations whose joint rarity is stored in one bit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PopulationFrequencyCatalog {
    populations: IndexSet<PopulationId>,
}

impl PopulationFrequencyCatalog {
    pub fn new<I: IntoIterator<Item = PopulationId>>(populations: I) -> Self {
        Self {
            populations: populations.into_iter().collect(),
        }
    }

    pub fn contains(&self, population: &PopulationId) -> bool {
        self.populations.contains(population)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PopulationId> {
        self.populations.iter()
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }
}

impl Default for PopulationFrequencyCatalog {
    /// gnomAD exomes and 1000 Genomes phase 3 continental populations.
    fn default() -> Self {
        let gnomad = ["AFR", "AMR", "EAS", "FIN", "NFE", "ASJ", "OTH"]
            .into_iter()
            .map(|pop| PopulationId::new("GNOMAD_EXOMES", pop));
        let kg = ["AFR", "AMR", "EAS", "EUR", "SAS"]
            .into_iter()
            .map(|pop| PopulationId::new("1kG_phase3", pop));
        Self::new(gnomad.chain(kg))
    }
}

/// How a conjunction must cover the catalog to activate the combined bit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum CatalogMatch {
    /// The conjunction names exactly the catalog populations.
    #[default]
    Exact,
    /// The conjunction names at least the catalog populations.
    Superset,
}

/// One parsed `STUDY:POPULATION<OP><value>` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationFrequencyClause {
    pub population: PopulationId,
    pub op: ComparisonOp,
    pub value: f64,
}

impl PopulationFrequencyClause {
    pub fn parse(literal: &str) -> Option<Self> {
        let comparison = Comparison::parse(literal)?;
        let (study, population) = comparison.key.split_once(':')?;
        if study.is_empty() || population.is_empty() {
            return None;
        }
        Some(Self {
            population: PopulationId::new(study, population),
            op: comparison.op,
            value: comparison.number()?,
        })
    }

    /// Whether every frequency satisfying the clause is below `threshold`.
    pub fn is_below(&self, threshold: f64) -> bool {
        match self.op {
            ComparisonOp::Lt => self.value <= threshold,
            ComparisonOp::Le | ComparisonOp::Eq => self.value < threshold,
            ComparisonOp::Ne | ComparisonOp::Gt | ComparisonOp::Ge => false,
        }
    }
}

/// Compiles `populationFrequencyAlt` values into a `GuaranteedMask`.
#[derive(Debug, Clone)]
pub struct PopulationFrequencyCompiler {
    catalog: PopulationFrequencyCatalog,
    catalog_match: CatalogMatch,
    any_below: u64,
    all_below: u64,
}

impl PopulationFrequencyCompiler {
    pub fn new(
        layout: &BitLayout,
        catalog: PopulationFrequencyCatalog,
        catalog_match: CatalogMatch,
    ) -> Result<Self, LayoutError> {
        Ok(Self {
            catalog,
            catalog_match,
            any_below: layout.word_mask(annotation_facts::POP_FREQ_ANY_001)?,
            all_below: layout.word_mask(annotation_facts::POP_FREQ_ALL_01)?,
        })
    }

    pub fn catalog(&self) -> &PopulationFrequencyCatalog {
        &self.catalog
    }

    /// Compile a full filter value.
    pub fn compile(&self, value: &str) -> GuaranteedMask {
        match Expr::parse(value) {
            Some(expr) => expr::compile(self, &expr).all_of(self.compile_coverage(&expr)),
            None => GuaranteedMask::unconstrained(),
        }
    }

    /// The combined bit, if `expr` is a conjunction covering the catalog with
    /// every clause below `ALL_POPULATIONS_THRESHOLD`.
    fn compile_coverage(&self, expr: &Expr) -> GuaranteedMask {
        let Some(literals) = expr.conjunction_literals() else {
            return GuaranteedMask::unconstrained();
        };
        let clauses = literals
            .into_iter()
            .filter_map(PopulationFrequencyClause::parse)
            .filter(|clause| {
                self.catalog_match == CatalogMatch::Exact || self.catalog.contains(&clause.population)
            })
            .collect::<Vec<_>>();

        let named = clauses
            .iter()
            .map(|clause| &clause.population)
            .collect::<IndexSet<_>>();
        let covered = match self.catalog_match {
            CatalogMatch::Exact => {
                named.len() == self.catalog.len()
                    && named.iter().all(|pop| self.catalog.contains(pop))
            }
            CatalogMatch::Superset => self.catalog.iter().all(|pop| named.contains(pop)),
        };
        let all_below = clauses
            .iter()
            .all(|clause| clause.is_below(ALL_POPULATIONS_THRESHOLD));

        if covered && all_below && !self.catalog.is_empty() {
            GuaranteedMask(self.all_below)
        } else {
            tracing::trace!("population frequency filter does not cover catalog: {:?}", expr);
            GuaranteedMask::unconstrained()
        }
    }
}

impl LiteralCompiler for PopulationFrequencyCompiler {
    type Output = GuaranteedMask;

    fn compile_literal(&self, literal: &str) -> GuaranteedMask {
        match PopulationFrequencyClause::parse(literal) {
            Some(clause) if clause.is_below(ANY_POPULATION_THRESHOLD) => {
                GuaranteedMask(self.any_below)
            }
            Some(_) => GuaranteedMask::unconstrained(),
            None => {
                tracing::debug!("malformed population frequency {:?}, not constraining", literal);
                GuaranteedMask::unconstrained()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use rstest::rstest;

    use super::{
        CatalogMatch, PopulationFrequencyCatalog, PopulationFrequencyClause,
        PopulationFrequencyCompiler, PopulationId,
    };
    use crate::index::{algebra::GuaranteedMask, expr::ComparisonOp, layout::BitLayout};

    const ANY_001: u64 = 1 << 0;
    const ALL_01: u64 = 1 << 1;

    fn compiler(catalog_match: CatalogMatch) -> PopulationFrequencyCompiler {
        PopulationFrequencyCompiler::new(
            &BitLayout::default_annotation_layout(),
            PopulationFrequencyCatalog::default(),
            catalog_match,
        )
        .expect("default layout has rarity bits")
    }

    /// Catalog clauses with the given separator, threshold overrides by index.
    fn catalog_value(sep: &str, overrides: &[(usize, &str)], skip: Option<usize>) -> String {
        PopulationFrequencyCatalog::default()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(i, pop)| {
                let threshold = overrides
                    .iter()
                    .find(|(j, _)| *j == i)
                    .map(|(_, t)| *t)
                    .unwrap_or("0.01");
                format!("{}<{}", pop, threshold)
            })
            .join(sep)
    }

    #[rstest]
    #[case("1kG_phase3:ALL<0.01", 0)]
    #[case("1kG_phase3:ALL<0.001", ANY_001)]
    #[case("GNOMAD_GENOMES:ALL<0.001", ANY_001)]
    #[case("GNOMAD_GENOMES:ALL<0.0005", ANY_001)]
    #[case("GNOMAD_GENOMES:ALL<=0.001", 0)]
    #[case("GNOMAD_GENOMES:ALL<=0.0009", ANY_001)]
    #[case("GNOMAD_GENOMES:ALL>0.0001", 0)]
    #[case("1kG_phase3:ALL<0.001,GNOMAD_GENOMES:ALL<0.001", ANY_001)]
    #[case("1kG_phase3:ALL<0.001;GNOMAD_GENOMES:ALL<0.001", ANY_001)]
    #[case("1kG_phase3:ALL<0.1;GNOMAD_GENOMES:ALL<0.001", ANY_001)]
    #[case("1kG_phase3:ALL<0.1,GNOMAD_GENOMES:ALL<0.001", 0)]
    #[case("1kG_phase3:ALL<0.1;GNOMAD_GENOMES:ALL<0.1", 0)]
    #[case("1kG_phase3<0.0001", 0)]
    #[case(":ALL<0.0001", 0)]
    #[case("", 0)]
    fn any_population(#[case] value: &str, #[case] expected: u64) {
        assert_eq!(
            compiler(CatalogMatch::Exact).compile(value),
            GuaranteedMask(expected),
            "{}",
            value
        );
    }

    #[test]
    fn exact_catalog_coverage() {
        let compiler = compiler(CatalogMatch::Exact);

        assert_eq!(
            compiler.compile(&catalog_value(";", &[], None)),
            GuaranteedMask(ALL_01)
        );
        // one population raised above the bound
        assert_eq!(
            compiler.compile(&catalog_value(";", &[(1, "0.02")], None)),
            GuaranteedMask(0)
        );
        // one population missing
        assert_eq!(
            compiler.compile(&catalog_value(";", &[], Some(2))),
            GuaranteedMask(0)
        );
        // OR instead of AND
        assert_eq!(
            compiler.compile(&catalog_value(",", &[], None)),
            GuaranteedMask(0)
        );
        // one extra population
        assert_eq!(
            compiler.compile(&format!(
                "GNOMAD_EXOMES:ALL<0.01;{}",
                catalog_value(";", &[], None)
            )),
            GuaranteedMask(0)
        );
        // tighter bounds activate both bits
        assert_eq!(
            compiler.compile(&catalog_value(";", &[(0, "0.0005")], None)),
            GuaranteedMask(ALL_01 | ANY_001)
        );
    }

    #[test]
    fn superset_catalog_coverage() {
        let compiler = compiler(CatalogMatch::Superset);

        assert_eq!(
            compiler.compile(&format!(
                "GNOMAD_EXOMES:ALL<0.01;{}",
                catalog_value(";", &[], None)
            )),
            GuaranteedMask(ALL_01)
        );
        assert_eq!(
            compiler.compile(&format!(
                "GNOMAD_EXOMES:ALL<0.5;{}",
                catalog_value(";", &[], None)
            )),
            GuaranteedMask(ALL_01)
        );
        assert_eq!(
            compiler.compile(&catalog_value(";", &[], Some(0))),
            GuaranteedMask(0)
        );
    }

    #[test]
    fn clause_parse() {
        assert_eq!(
            PopulationFrequencyClause::parse("GNOMAD_EXOMES:AFR<=0.5"),
            Some(PopulationFrequencyClause {
                population: PopulationId::new("GNOMAD_EXOMES", "AFR"),
                op: ComparisonOp::Le,
                value: 0.5,
            })
        );
        assert_eq!(PopulationFrequencyClause::parse("GNOMAD_EXOMES:AFR<<0.5"), None);
    }

    #[test]
    fn catalog_serde() -> Result<(), anyhow::Error> {
        let catalog = PopulationFrequencyCatalog::default();
        let json = serde_json::to_string(&catalog)?;
        assert_eq!(serde_json::from_str::<PopulationFrequencyCatalog>(&json)?, catalog);
        assert_eq!(catalog.len(), 12);

        Ok(())
    }
}
