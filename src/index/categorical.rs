//! Compilation of label-valued fields (variant type, FILTER, consequence, ...).

use indexmap::IndexMap;

use super::{algebra::MaskAlgebra, expr::LiteralCompiler};

/// Static mapping from labels to compiled values for one field.
///
/// Labels are grouped into classes of synonyms (e.g., `SNV` and `SNP`) that
/// denote the same value.  Distinct classes denote distinct values, even when
/// they compile to the same bits.
#[derive(Debug, Clone)]
pub struct CategoricalField<C> {
    name: String,
    /// Compiled value of each class.
    classes: Vec<C>,
    /// Class index of each label, keyed case-sensitively.
    labels: IndexMap<String, usize>,
    /// Value of labels not listed; `None` if the field is closed.
    other: Option<C>,
    /// Whether negated literals may be compiled.
    negatable: bool,
}

impl<C: MaskAlgebra> CategoricalField<C> {
    /// A field where unlisted labels are unknown and compile to unconstrained.
    pub fn closed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            classes: Vec::new(),
            labels: IndexMap::new(),
            other: None,
            negatable: true,
        }
    }

    /// A field where every unlisted label compiles to `other`.
    pub fn open(name: &str, other: C) -> Self {
        Self {
            other: Some(other),
            ..Self::closed(name)
        }
    }

    /// Disable compilation of negated literals.
    pub fn without_negation(mut self) -> Self {
        self.negatable = false;
        self
    }

    /// Add one class of synonymous labels.
    pub fn with_class<I, S>(mut self, labels: I, value: C) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = self.classes.len();
        self.classes.push(value);
        for label in labels {
            self.labels.insert(label.into(), idx);
        }
        self
    }

    /// Add one class per label, all with the same value.
    pub fn with_each<I, S>(self, labels: I, value: C) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        labels
            .into_iter()
            .fold(self, |field, label| field.with_class([label], value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `label` is listed.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Value of `label`, falling back to the value of unlisted labels.
    pub fn lookup(&self, label: &str) -> Option<C> {
        self.labels
            .get(label)
            .map(|idx| self.classes[*idx])
            .or(self.other)
    }
}

impl<C: MaskAlgebra> LiteralCompiler for CategoricalField<C> {
    type Output = C;

    fn compile_literal(&self, literal: &str) -> C {
        self.lookup(literal).unwrap_or_else(|| {
            tracing::debug!("unknown {} label {:?}, not constraining", self.name, literal);
            C::unconstrained()
        })
    }

    /// `!label` is compiled as the OR over every value other than `label`.
    ///
    /// This is only as precise as the remaining values agree, e.g., `!PASS`
    /// leaves only failing labels while `!LowQual` still admits `PASS`.
    fn compile_negated(&self, literal: &str) -> C {
        if !self.negatable {
            return C::unconstrained();
        }
        let excluded = match self.labels.get(literal) {
            Some(idx) => Some(*idx),
            None if self.other.is_some() => None,
            None => {
                tracing::debug!("unknown {} label !{:?}, not constraining", self.name, literal);
                return C::unconstrained();
            }
        };
        // An unlisted label leaves the other unlisted labels possible.
        let remaining = self
            .classes
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != excluded)
            .map(|(_, value)| *value)
            .chain(self.other);
        remaining
            .reduce(MaskAlgebra::any_of)
            .unwrap_or_else(C::unconstrained)
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::CategoricalField;
    use crate::index::{
        algebra::{GuaranteedMask, MaskPattern},
        expr::compile_str,
    };

    const SNV: u64 = 1;
    const PASS: u64 = 2;

    fn variant_type() -> CategoricalField<MaskPattern> {
        CategoricalField::closed("type")
            .with_class(["SNV", "SNP"], MaskPattern::set(SNV))
            .with_each(["INDEL", "MNV"], MaskPattern::clear(SNV))
    }

    fn filter() -> CategoricalField<MaskPattern> {
        CategoricalField::open("filter", MaskPattern::clear(PASS))
            .with_class(["PASS"], MaskPattern::set(PASS))
    }

    #[rstest]
    #[case("SNV", MaskPattern::set(SNV))]
    #[case("SNP", MaskPattern::set(SNV))]
    #[case("INDEL", MaskPattern::clear(SNV))]
    #[case("SNV,INDEL", MaskPattern::default())]
    #[case("INDEL,MNV", MaskPattern::clear(SNV))]
    #[case("!SNV", MaskPattern::clear(SNV))]
    #[case("!SNP", MaskPattern::clear(SNV))]
    #[case("!INDEL", MaskPattern::default())]
    #[case("BOGUS", MaskPattern::default())]
    #[case("!BOGUS", MaskPattern::default())]
    fn closed_field(#[case] value: &str, #[case] expected: MaskPattern) {
        assert_eq!(compile_str(&variant_type(), value), expected, "{}", value);
    }

    #[rstest]
    #[case("PASS", MaskPattern::set(PASS))]
    #[case("!PASS", MaskPattern::clear(PASS))]
    #[case("LowQual", MaskPattern::clear(PASS))]
    #[case("!LowQual", MaskPattern::default())]
    #[case("LowGQX,LowQual", MaskPattern::clear(PASS))]
    #[case("LowGQX;LowQual", MaskPattern::clear(PASS))]
    #[case("PASS,LowQual", MaskPattern::default())]
    #[case("PASS;LowQual", MaskPattern::default())]
    #[case("!LowGQX;!LowQual", MaskPattern::default())]
    fn open_field(#[case] value: &str, #[case] expected: MaskPattern) {
        assert_eq!(compile_str(&filter(), value), expected, "{}", value);
    }

    #[test]
    fn scalar_family() {
        let field = CategoricalField::open("ct", GuaranteedMask(0))
            .with_class(["missense_variant"], GuaranteedMask(0b10))
            .with_class(["stop_lost"], GuaranteedMask(0b11));

        assert_eq!(compile_str(&field, "missense_variant"), GuaranteedMask(0b10));
        assert_eq!(compile_str(&field, "stop_lost"), GuaranteedMask(0b11));
        assert_eq!(
            compile_str(&field, "stop_lost,missense_variant"),
            GuaranteedMask(0b10)
        );
        assert_eq!(
            compile_str(&field, "stop_lost,intron_variant"),
            GuaranteedMask(0)
        );
        assert_eq!(compile_str(&field, "!intron_variant"), GuaranteedMask(0));
    }

    #[test]
    fn negation_can_be_disabled() {
        let field = variant_type().without_negation();

        assert_eq!(compile_str(&field, "!SNV"), MaskPattern::default());
        assert_eq!(compile_str(&field, "SNV"), MaskPattern::set(SNV));
    }
}
