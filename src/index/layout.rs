//! Registry of bit assignments in the stored index records.
//!
//! A `BitLayout` maps each semantic fact (e.g., "variant is a SNV", "QUAL > 20")
//! to a fixed slot in the stored record.  Layouts are part of an index generation
//! and are persisted next to it; changing one requires rebuilding the index.

use indexmap::IndexMap;

use crate::err::LayoutError;

/// Names of the facts stored in the per-file mask.
pub mod file_facts {
    /// Variant is a SNV (or SNP).
    pub const SNV: &str = "SNV";
    /// FILTER column is exactly `PASS`.
    pub const FILTER_PASS: &str = "FILTER_PASS";
    /// QUAL > 20.
    pub const QUAL_GT_20: &str = "QUAL_GT_20";
    /// QUAL > 40.
    pub const QUAL_GT_40: &str = "QUAL_GT_40";
    /// FORMAT/DP of the sample > 20.
    pub const DP_GT_20: &str = "DP_GT_20";
}

/// Names of the facts stored in the per-variant annotation mask.
pub mod annotation_facts {
    /// Any recorded population alternate frequency < 0.001.
    pub const POP_FREQ_ANY_001: &str = "POP_FREQ_ANY_001";
    /// All catalog populations recorded with alternate frequency < 0.01.
    pub const POP_FREQ_ALL_01: &str = "POP_FREQ_ALL_01";
    /// Any transcript with biotype `protein_coding`.
    pub const PROTEIN_CODING: &str = "PROTEIN_CODING";
    /// Any loss-of-function consequence.
    pub const LOF: &str = "LOF";
    /// Any loss-of-function or missense consequence.
    pub const LOF_MISSENSE: &str = "LOF_MISSENSE";
    /// Any loss-of-function or missense consequence on a `basic` transcript.
    pub const LOF_MISSENSE_BASIC: &str = "LOF_MISSENSE_BASIC";
    /// Any clinical significance assertion.
    pub const CLINICAL: &str = "CLINICAL";
}

/// Position of one fact in the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BitSlot {
    /// Index of the byte in the stored record.
    pub byte: usize,
    /// Offset of the lowest bit within the byte.
    pub offset: u8,
    /// Number of bits, defaults to one.
    #[serde(default = "default_slot_width")]
    pub width: u8,
}

fn default_slot_width() -> u8 {
    1
}

impl BitSlot {
    /// Single-bit slot in the given byte.
    pub fn bit(byte: usize, offset: u8) -> Self {
        Self {
            byte,
            offset,
            width: 1,
        }
    }

    /// The bits of the slot within its byte; bits beyond the byte are cut off.
    pub fn byte_mask(&self) -> u8 {
        let bits = 1u16
            .checked_shl(u32::from(self.width))
            .map_or(u16::MAX, |bit| bit - 1);
        bits.checked_shl(u32::from(self.offset)).unwrap_or(0) as u8
    }

    /// The bits of the slot within the record word; empty beyond eight bytes.
    pub fn word_mask(&self) -> u64 {
        self.byte
            .checked_mul(8)
            .and_then(|shift| u32::try_from(shift).ok())
            .and_then(|shift| u64::from(self.byte_mask()).checked_shl(shift))
            .unwrap_or(0)
    }
}

/// Serialized form of one layout entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RawFact {
    fact: String,
    #[serde(flatten)]
    slot: BitSlot,
}

/// Serialized form of a layout, validated into `BitLayout`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RawLayout {
    name: String,
    width: usize,
    facts: Vec<RawFact>,
}

/// Validated, immutable assignment of facts to bits.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct BitLayout {
    /// Name of the layout, used in error messages.
    name: String,
    /// Width of the stored record in bytes.
    width: usize,
    /// Facts in declaration order.
    facts: IndexMap<String, BitSlot>,
}

impl BitLayout {
    /// Construct a new layout, checking that all slots fit and are disjoint.
    pub fn new<I, S>(name: &str, width: usize, facts: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = (S, BitSlot)>,
        S: Into<String>,
    {
        if !(1..=8).contains(&width) {
            return Err(LayoutError::WidthOutOfRange(width));
        }

        let mut result: IndexMap<String, BitSlot> = IndexMap::new();
        for (fact, slot) in facts {
            let fact = fact.into();
            if slot.width == 0 || slot.byte >= width || u16::from(slot.offset) + u16::from(slot.width) > 8
            {
                return Err(LayoutError::SlotOutOfRange {
                    fact,
                    byte: slot.byte,
                    offset: slot.offset,
                    width: slot.width,
                });
            }
            if result.contains_key(&fact) {
                return Err(LayoutError::DuplicateFact(fact));
            }
            if let Some((other, _)) = result
                .iter()
                .find(|(_, other)| other.word_mask() & slot.word_mask() != 0)
            {
                return Err(LayoutError::OverlappingBits {
                    first: other.clone(),
                    second: fact,
                });
            }
            result.insert(fact, slot);
        }

        Ok(Self {
            name: name.to_string(),
            width,
            facts: result,
        })
    }

    /// Name of the layout.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the stored record in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Return `(bitmask, byte_index)` for the given fact.
    pub fn bit_for(&self, fact: &str) -> Result<(u8, usize), LayoutError> {
        let slot = self.slot(fact)?;
        Ok((slot.byte_mask(), slot.byte))
    }

    /// Return the bits of `fact` within the record word.
    pub fn word_mask(&self, fact: &str) -> Result<u64, LayoutError> {
        Ok(self.slot(fact)?.word_mask())
    }

    /// Return the slot of `fact`.
    pub fn slot(&self, fact: &str) -> Result<BitSlot, LayoutError> {
        self.facts
            .get(fact)
            .copied()
            .ok_or_else(|| LayoutError::UnknownFact {
                layout: self.name.clone(),
                fact: fact.to_string(),
            })
    }

    /// All facts in declaration order.
    pub fn all_facts(&self) -> impl Iterator<Item = (&str, &BitSlot)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mask covering every bit of the record.
    pub fn record_mask(&self) -> u64 {
        if self.width == 8 {
            u64::MAX
        } else {
            (1u64 << (8 * self.width)) - 1
        }
    }

    /// The reference per-file layout (one byte).
    pub fn default_file_layout() -> Self {
        use file_facts::*;
        Self {
            name: String::from("file"),
            width: 1,
            facts: [
                (SNV, BitSlot::bit(0, 0)),
                (FILTER_PASS, BitSlot::bit(0, 1)),
                (QUAL_GT_20, BitSlot::bit(0, 2)),
                (QUAL_GT_40, BitSlot::bit(0, 3)),
                (DP_GT_20, BitSlot::bit(0, 4)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }

    /// The reference per-variant annotation layout (one byte).
    pub fn default_annotation_layout() -> Self {
        use annotation_facts::*;
        Self {
            name: String::from("annotation"),
            width: 1,
            facts: [
                (POP_FREQ_ANY_001, BitSlot::bit(0, 0)),
                (POP_FREQ_ALL_01, BitSlot::bit(0, 1)),
                (PROTEIN_CODING, BitSlot::bit(0, 2)),
                (LOF, BitSlot::bit(0, 3)),
                (LOF_MISSENSE, BitSlot::bit(0, 4)),
                (LOF_MISSENSE_BASIC, BitSlot::bit(0, 5)),
                (CLINICAL, BitSlot::bit(0, 7)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }
}

impl TryFrom<RawLayout> for BitLayout {
    type Error = LayoutError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        BitLayout::new(
            &raw.name,
            raw.width,
            raw.facts.into_iter().map(|f| (f.fact, f.slot)),
        )
    }
}

impl From<BitLayout> for RawLayout {
    fn from(layout: BitLayout) -> Self {
        RawLayout {
            name: layout.name,
            width: layout.width,
            facts: layout
                .facts
                .into_iter()
                .map(|(fact, slot)| RawFact { fact, slot })
                .collect(),
        }
    }
}
