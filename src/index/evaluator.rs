//! Scan-time evaluation of compiled masks against stored index records.
//!
//! Everything here is pure and allocation-free per record.

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;

use super::{
    algebra::{GuaranteedMask, MaskPattern},
    annotation_mask::AnnotationMaskCompiler,
    file_mask::FileMaskCompiler,
    query::Query,
};

/// Whether `stored` agrees with `pattern` on all bits of `mask`.
#[inline]
pub fn matches(stored: u64, mask: u64, pattern: u64) -> bool {
    stored & mask == pattern
}

/// Whether all bits of `guaranteed` are set in `stored`.
#[inline]
pub fn matches_guaranteed(stored: u64, guaranteed: u64) -> bool {
    stored & guaranteed == guaranteed
}

/// Read a stored record of up to 8 bytes; byte `i` lands in bits `8i..8i+7`.
#[inline]
pub fn read_word(bytes: &[u8]) -> u64 {
    let len = bytes.len().min(8);
    if len == 0 {
        0
    } else {
        LittleEndian::read_uint(&bytes[..len], len)
    }
}

/// Stored words of one variant call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexRecord {
    pub file: u64,
    pub annotation: u64,
}

impl IndexRecord {
    pub fn from_bytes(file: &[u8], annotation: &[u8]) -> Self {
        Self {
            file: read_word(file),
            annotation: read_word(annotation),
        }
    }
}

/// Compiled pre-filter of one query for one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecordFilter {
    pub file: MaskPattern,
    pub annotation: GuaranteedMask,
}

impl RecordFilter {
    pub fn compile(
        file_compiler: &FileMaskCompiler,
        annotation_compiler: &AnnotationMaskCompiler,
        query: &Query,
        sample: Option<&str>,
    ) -> Self {
        Self {
            file: file_compiler.compile(query, sample),
            annotation: annotation_compiler.compile(query),
        }
    }

    /// Whether the filter rejects nothing.
    pub fn is_unconstrained(&self) -> bool {
        self.file.mask == 0 && self.annotation.0 == 0
    }

    /// Whether `record` may match; `false` means it certainly does not.
    #[inline]
    pub fn matches(&self, record: &IndexRecord) -> bool {
        matches(record.file, self.file.mask, self.file.pattern)
            && matches_guaranteed(record.annotation, self.annotation.0)
    }

    /// Indices of the records that may match, in input order.
    pub fn scan(&self, records: &[IndexRecord]) -> Vec<usize> {
        records
            .par_iter()
            .enumerate()
            .filter(|(_, record)| self.matches(record))
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;

    use super::{matches, matches_guaranteed, read_word, IndexRecord, RecordFilter};
    use crate::index::algebra::{GuaranteedMask, MaskPattern};

    #[rstest]
    #[case(0b0000, 0b0000, 0b0000, true)]
    #[case(0b1111, 0b0000, 0b0000, true)]
    #[case(0b0101, 0b0001, 0b0001, true)]
    #[case(0b0100, 0b0001, 0b0001, false)]
    #[case(0b0100, 0b1100, 0b0100, true)]
    #[case(0b1100, 0b1100, 0b0100, false)]
    fn two_array(#[case] stored: u64, #[case] mask: u64, #[case] pattern: u64, #[case] expected: bool) {
        assert_eq!(matches(stored, mask, pattern), expected);
        assert_eq!(MaskPattern::new(mask, pattern).matches(stored), expected);
    }

    #[rstest]
    #[case(0b0000, 0b0000, true)]
    #[case(0b0110, 0b0100, true)]
    #[case(0b0110, 0b0110, true)]
    #[case(0b0010, 0b0110, false)]
    fn scalar(#[case] stored: u64, #[case] guaranteed: u64, #[case] expected: bool) {
        assert_eq!(matches_guaranteed(stored, guaranteed), expected);
        assert_eq!(GuaranteedMask(guaranteed).matches(stored), expected);
    }

    #[test]
    fn read_word_little_endian() {
        assert_eq!(read_word(&[]), 0);
        assert_eq!(read_word(&[0xab]), 0xab);
        assert_eq!(read_word(&[0x01, 0x02]), 0x0201);
        assert_eq!(read_word(&[1, 0, 0, 0, 0, 0, 0, 0x80, 0xff]), 0x8000_0000_0000_0001);
        assert_eq!(
            IndexRecord::from_bytes(&[0x13], &[0x10]),
            IndexRecord {
                file: 0x13,
                annotation: 0x10
            }
        );
    }

    #[test]
    fn scan_matches_sequential_filter() {
        let mut rng = StdRng::seed_from_u64(7);
        let records = (0..10_000)
            .map(|_| IndexRecord {
                file: rng.gen_range(0..=255),
                annotation: rng.gen_range(0..=255),
            })
            .collect::<Vec<_>>();
        let filter = RecordFilter {
            file: MaskPattern::new(0b0000_0011, 0b0000_0001),
            annotation: GuaranteedMask(0b0001_0000),
        };

        let expected = records
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        assert_eq!(filter.scan(&records), expected);
        assert!(!expected.is_empty());
        assert_eq!(RecordFilter::default().scan(&records).len(), records.len());
        assert!(RecordFilter::default().is_unconstrained());
    }
}
