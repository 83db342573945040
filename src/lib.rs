pub mod core;
#[cfg(feature = "python")]
mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use core::{
    BatchEncoding, ClipTokenizer, ClipTokenizerConfig, Encoding, ErrorKind, Padding, TokenTensors,
    TokenizerError, VocabError,
};

/// clipbpe - CLIP byte-level BPE tokenizer with Python bindings
///
/// - Unicode-category pre-tokenization without a regex engine
/// - Rayon parallelism for batch encoding
/// - Index-linked BPE merging over FxHashMap merge tables
/// - Aho-Corasick special token matching
/// - Padded batches with attention masks and byte offsets
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyClipTokenizer>()?;
    m.add("DEFAULT_SPECIAL_TOKENS", core::DEFAULT_SPECIAL_TOKENS)?;
    Ok(())
}
