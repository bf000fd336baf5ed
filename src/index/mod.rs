//! Bitmask pre-filter for the per-sample variant index.
//!
//! Queries are compiled into a `MaskPattern` for the per-file record and a
//! `GuaranteedMask` for the annotation record.  Both are checked against the
//! stored words before a variant record is fetched and decoded.  Compilation
//! is lossy but sound: a record that satisfies the query is never rejected.

pub mod algebra;
pub mod annotation_mask;
pub mod categorical;
pub mod conf;
pub mod encode;
pub mod evaluator;
pub mod expr;
pub mod file_mask;
pub mod layout;
pub mod popfreq;
pub mod query;
pub mod range;

pub use algebra::{GuaranteedMask, MaskAlgebra, MaskPattern};
pub use annotation_mask::AnnotationMaskCompiler;
pub use conf::IndexConf;
pub use evaluator::{IndexRecord, RecordFilter};
pub use file_mask::FileMaskCompiler;
pub use query::{Query, QueryParam};

/// The compilers of one index generation, shareable across threads.
#[derive(Debug, Clone)]
pub struct MaskCompiler {
    pub file: FileMaskCompiler,
    pub annotation: AnnotationMaskCompiler,
}

impl MaskCompiler {
    /// Build both compilers, failing on any layout misconfiguration.
    pub fn new(conf: &IndexConf) -> Result<Self, crate::err::LayoutError> {
        Ok(Self {
            file: FileMaskCompiler::new(conf)?,
            annotation: AnnotationMaskCompiler::new(conf)?,
        })
    }

    /// Compile `query` for the records of `sample`.
    pub fn compile(&self, query: &Query, sample: Option<&str>) -> RecordFilter {
        RecordFilter::compile(&self.file, &self.annotation, query, sample)
    }
}
