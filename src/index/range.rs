//! Compilation of numeric comparisons against cumulative threshold ladders.

use crate::err::LayoutError;

use super::{
    algebra::{MaskAlgebra, MaskPattern},
    expr::{Comparison, ComparisonOp, LiteralCompiler},
    layout::BitLayout,
};

/// One rung of a ladder: the bit is set iff the value is `> threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderStep {
    pub threshold: f64,
    pub mask: u64,
}

/// Configuration of one rung, referring to a layout fact by name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LadderStepConf {
    pub threshold: f64,
    pub fact: String,
}

/// Strictly increasing thresholds with one bit each.
///
/// As bit `i` means "value > t_i", setting bit `i` implies all lower bits are
/// set, which is what makes the range compilation below sound.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdLadder {
    name: String,
    steps: Vec<LadderStep>,
}

impl ThresholdLadder {
    /// Construct from raw steps, validating order and bit disjointness.
    pub fn new(name: &str, steps: Vec<LadderStep>) -> Result<Self, LayoutError> {
        if steps.is_empty() {
            return Err(LayoutError::EmptyLadder(name.to_string()));
        }
        let mut seen = 0u64;
        let mut prev: Option<f64> = None;
        for step in &steps {
            if !step.threshold.is_finite() {
                return Err(LayoutError::NonFiniteThreshold {
                    ladder: name.to_string(),
                    threshold: step.threshold,
                });
            }
            if prev.map(|p| p >= step.threshold).unwrap_or(false) {
                return Err(LayoutError::LadderNotIncreasing {
                    ladder: name.to_string(),
                    threshold: step.threshold,
                });
            }
            if step.mask == 0 || seen & step.mask != 0 {
                return Err(LayoutError::LadderBitsOverlap(name.to_string()));
            }
            seen |= step.mask;
            prev = Some(step.threshold);
        }

        Ok(Self {
            name: name.to_string(),
            steps,
        })
    }

    /// Resolve the facts of `conf` in `layout`.
    pub fn from_conf(
        name: &str,
        conf: &[LadderStepConf],
        layout: &BitLayout,
    ) -> Result<Self, LayoutError> {
        let steps = conf
            .iter()
            .map(|step| {
                Ok(LadderStep {
                    threshold: step.threshold,
                    mask: layout.word_mask(&step.fact)?,
                })
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;
        Self::new(name, steps)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[LadderStep] {
        &self.steps
    }

    /// All bits of the ladder.
    pub fn full_mask(&self) -> u64 {
        self.steps.iter().fold(0, |acc, step| acc | step.mask)
    }

    /// The stored bits for `value`; a missing value sets no bit.
    pub fn encode(&self, value: Option<f64>) -> u64 {
        match value {
            Some(value) => self
                .steps
                .iter()
                .filter(|step| value > step.threshold)
                .fold(0, |acc, step| acc | step.mask),
            None => 0,
        }
    }

    /// Compile `x OP value` into the bits that are constant over its solutions.
    pub fn compile(&self, op: ComparisonOp, value: f64) -> MaskPattern {
        if value.is_nan() {
            return MaskPattern::unconstrained();
        }
        self.steps
            .iter()
            .fold(MaskPattern::unconstrained(), |acc, step| {
                match forced_bit(op, value, step.threshold) {
                    Some(true) => acc.all_of(MaskPattern::set(step.mask)),
                    Some(false) => acc.all_of(MaskPattern::clear(step.mask)),
                    None => acc,
                }
            })
    }
}

/// The value of "x > t" if it is the same for every `x` with `x OP v`.
fn forced_bit(op: ComparisonOp, v: f64, t: f64) -> Option<bool> {
    match op {
        ComparisonOp::Eq => Some(v > t),
        // x <= v <= t, or x < v <= t
        ComparisonOp::Le | ComparisonOp::Lt => (v <= t).then_some(false),
        // x >= v > t
        ComparisonOp::Ge => (v > t).then_some(true),
        // x > v >= t
        ComparisonOp::Gt => (v >= t).then_some(true),
        ComparisonOp::Ne => None,
    }
}

/// Compiles literals such as `>=30` or `30` (read as `=30`) against one ladder.
#[derive(Debug, Clone)]
pub struct RangeCompiler<'a> {
    pub ladder: &'a ThresholdLadder,
}

impl LiteralCompiler for RangeCompiler<'_> {
    type Output = MaskPattern;

    fn compile_literal(&self, literal: &str) -> MaskPattern {
        let comparison = match Comparison::parse(literal) {
            Some(comparison) if comparison.key.is_empty() => comparison
                .number()
                .map(|value| (comparison.op, value)),
            Some(_) => None,
            None => literal
                .trim()
                .parse::<f64>()
                .ok()
                .map(|value| (ComparisonOp::Eq, value)),
        };
        match comparison {
            Some((op, value)) => self.ladder.compile(op, value),
            None => {
                tracing::debug!(
                    "malformed {} literal {:?}, not constraining",
                    self.ladder.name(),
                    literal
                );
                MaskPattern::unconstrained()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::{LadderStep, RangeCompiler, ThresholdLadder};
    use crate::{
        err::LayoutError,
        index::{
            algebra::MaskPattern,
            expr::{compile_str, ComparisonOp},
        },
    };

    const GT_20: u64 = 1 << 2;
    const GT_40: u64 = 1 << 3;
    const BOTH: u64 = GT_20 | GT_40;

    fn qual_ladder() -> ThresholdLadder {
        ThresholdLadder::new(
            "QUAL",
            vec![
                LadderStep {
                    threshold: 20.0,
                    mask: GT_20,
                },
                LadderStep {
                    threshold: 40.0,
                    mask: GT_40,
                },
            ],
        )
        .expect("valid ladder")
    }

    #[rstest]
    #[case("=10", BOTH, 0)]
    #[case("=20", BOTH, 0)]
    #[case("=30", BOTH, GT_20)]
    #[case("=40", BOTH, GT_20)]
    #[case("=50", BOTH, BOTH)]
    #[case("30", BOTH, GT_20)]
    #[case("<=10", BOTH, 0)]
    #[case("<=20", BOTH, 0)]
    #[case("<=30", GT_40, 0)]
    #[case("<=40", GT_40, 0)]
    #[case("<=50", 0, 0)]
    #[case("<10", BOTH, 0)]
    #[case("<20", BOTH, 0)]
    #[case("<30", GT_40, 0)]
    #[case(">=10", 0, 0)]
    #[case(">=20", 0, 0)]
    #[case(">=30", GT_20, GT_20)]
    #[case(">=40", GT_20, GT_20)]
    #[case(">=50", BOTH, BOTH)]
    #[case(">10", 0, 0)]
    #[case(">20", GT_20, GT_20)]
    #[case(">40", BOTH, BOTH)]
    #[case("!=30", 0, 0)]
    #[case("<<30", 0, 0)]
    #[case("=abc", 0, 0)]
    #[case("QUAL>30", 0, 0)]
    fn qual_cases(#[case] value: &str, #[case] mask: u64, #[case] pattern: u64) {
        let ladder = qual_ladder();

        let res = compile_str(&RangeCompiler { ladder: &ladder }, value);

        assert_eq!(res, MaskPattern::new(mask, pattern), "value = {}", value);
    }

    #[test]
    fn invalid_ladders() {
        assert_eq!(
            ThresholdLadder::new("X", vec![]),
            Err(LayoutError::EmptyLadder(String::from("X")))
        );
        assert_eq!(
            ThresholdLadder::new(
                "X",
                vec![
                    LadderStep { threshold: 40.0, mask: 1 },
                    LadderStep { threshold: 20.0, mask: 2 },
                ]
            ),
            Err(LayoutError::LadderNotIncreasing {
                ladder: String::from("X"),
                threshold: 20.0
            })
        );
        assert_eq!(
            ThresholdLadder::new(
                "X",
                vec![
                    LadderStep { threshold: 20.0, mask: 1 },
                    LadderStep { threshold: 40.0, mask: 1 },
                ]
            ),
            Err(LayoutError::LadderBitsOverlap(String::from("X")))
        );
        assert!(matches!(
            ThresholdLadder::new(
                "X",
                vec![LadderStep { threshold: f64::INFINITY, mask: 1 }]
            ),
            Err(LayoutError::NonFiniteThreshold { .. })
        ));
    }

    #[test]
    fn encode_is_cumulative() {
        let ladder = qual_ladder();

        assert_eq!(ladder.encode(None), 0);
        assert_eq!(ladder.encode(Some(20.0)), 0);
        assert_eq!(ladder.encode(Some(20.5)), GT_20);
        assert_eq!(ladder.encode(Some(40.0)), GT_20);
        assert_eq!(ladder.encode(Some(99.0)), BOTH);
    }

    /// Longer ladders with one bit per rung, checked by brute force.
    #[test]
    fn sound_for_random_ladders() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.gen_range(1..=6);
            let mut threshold = 0.0;
            let steps = (0..len)
                .map(|i| {
                    threshold += f64::from(rng.gen_range(1..=10i32));
                    LadderStep {
                        threshold,
                        mask: 1 << i,
                    }
                })
                .collect::<Vec<_>>();
            let ladder = ThresholdLadder::new("R", steps).expect("valid ladder");

            for op in ComparisonOp::iter() {
                let v = f64::from(rng.gen_range(-5..=70i32)) / 2.0;
                let compiled = ladder.compile(op, v);
                assert_eq!(compiled, ladder.compile(op, v));

                let mut values = (-20..=160i32).map(|x| f64::from(x) / 4.0).collect::<Vec<_>>();
                values.push(v);
                for x in values.into_iter().filter(|x| op.eval(*x, v)) {
                    let stored = ladder.encode(Some(x));
                    // cumulative: a set rung implies all lower rungs are set
                    assert_eq!(stored & (stored + 1), 0);
                    assert!(
                        compiled.matches(stored),
                        "x = {}, op = {}, v = {}, ladder = {:?}",
                        x,
                        op,
                        v,
                        &ladder
                    );
                }
            }
        }
    }

    #[test]
    fn equality_constrains_full_ladder() {
        let ladder = qual_ladder();
        for v in [-1.0, 0.0, 19.9, 20.0, 35.0, 40.0, 1000.0] {
            assert_eq!(ladder.compile(ComparisonOp::Eq, v).mask, ladder.full_mask());
        }
    }
}
