//! Python bindings for the CLIP tokenizer.
//!
//! # Example
//!
//! ```python
//! from clipbpe import ClipTokenizer
//!
//! tokenizer = ClipTokenizer.from_files("vocab.json", "merges.txt", padding_length=77)
//! batch = tokenizer.encode_batch(["a photo of a cat", "a dog"])
//! batch["input_ids"]       # 2 x 77
//! batch["attention_mask"]  # 2 x 77
//! ```
//!
//! The tokenizer is immutable after construction, so one instance can be shared
//! across Python threads.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::{ClipTokenizer, ClipTokenizerConfig, TokenizerError};

fn to_py_err(e: TokenizerError) -> PyErr {
    match e {
        TokenizerError::Io(_) => PyIOError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Python wrapper for the Rust ClipTokenizer.
#[pyclass(name = "ClipTokenizer")]
pub struct PyClipTokenizer {
    inner: ClipTokenizer,
}

#[pymethods]
impl PyClipTokenizer {
    /// Create a tokenizer from vocabulary and merges contents.
    ///
    /// Args:
    ///     vocab: JSON object mapping token strings to ids
    ///     merges: Merge rules, one "left right" pair per line
    ///     padding_length: -1 pads batches to the longest row, a positive
    ///         value pads or truncates to exactly that length
    ///     special_tokens: Whitespace-separated special tokens, in priority order
    ///     unk_token: Token used for strings missing from the vocabulary
    ///
    /// Raises:
    ///     ValueError: If any argument is invalid
    #[new]
    #[pyo3(signature = (vocab, merges, padding_length=-1, special_tokens=None, unk_token=None))]
    fn new(
        vocab: &str,
        merges: &str,
        padding_length: i64,
        special_tokens: Option<String>,
        unk_token: Option<String>,
    ) -> PyResult<Self> {
        let mut config = ClipTokenizerConfig::new(vocab, merges).with_padding_length(padding_length);
        if special_tokens.is_some() {
            config = config.with_special_tokens(special_tokens);
        }
        if let Some(unk) = unk_token {
            config = config.with_unk_token(unk);
        }
        let inner = ClipTokenizer::from_config(&config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Create a tokenizer from `vocab.json` and `merges.txt` files.
    ///
    /// Raises:
    ///     IOError: If a file cannot be read
    ///     ValueError: If the contents are invalid
    #[staticmethod]
    #[pyo3(signature = (vocab_path, merges_path, padding_length=-1))]
    fn from_files(vocab_path: &str, merges_path: &str, padding_length: i64) -> PyResult<Self> {
        let vocab = std::fs::read_to_string(vocab_path)
            .map_err(|e| to_py_err(TokenizerError::Io(e)))?;
        let merges = std::fs::read_to_string(merges_path)
            .map_err(|e| to_py_err(TokenizerError::Io(e)))?;
        let config = ClipTokenizerConfig::new(vocab, merges).with_padding_length(padding_length);
        let inner = ClipTokenizer::from_config(&config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Encode text to token IDs, framed by start and end tokens.
    ///
    /// Args:
    ///     text: Input text to encode
    ///     max_length: Stop adding content tokens once this many are emitted
    ///
    /// Returns:
    ///     List of token IDs
    #[pyo3(signature = (text, max_length=None))]
    fn encode(&self, text: &str, max_length: Option<usize>) -> Vec<u32> {
        self.inner.encode(text, max_length.unwrap_or(usize::MAX)).ids
    }

    /// Encode text and return `(ids, offsets)`.
    ///
    /// Offsets are byte spans into the lowercased, whitespace-cleaned text.
    #[pyo3(signature = (text, max_length=None))]
    fn encode_with_offsets(
        &self,
        text: &str,
        max_length: Option<usize>,
    ) -> (Vec<u32>, Vec<(usize, usize)>) {
        let encoding = self
            .inner
            .encode_with_offsets(text, max_length.unwrap_or(usize::MAX));
        (encoding.ids, encoding.offsets.unwrap_or_default())
    }

    /// Batch encode multiple texts in parallel and pad them.
    ///
    /// Returns:
    ///     Dict with "input_ids" and "attention_mask", plus "offset_mapping"
    ///     when `with_offsets` is true
    #[pyo3(signature = (texts, with_offsets=false))]
    fn encode_batch<'py>(
        &self,
        py: Python<'py>,
        texts: Vec<String>,
        with_offsets: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let batch = self.inner.encode_batch(&texts, with_offsets);
        let dict = PyDict::new(py);
        dict.set_item("input_ids", batch.input_ids)?;
        dict.set_item("attention_mask", batch.attention_mask)?;
        if let Some(offsets) = batch.offset_mapping {
            dict.set_item("offset_mapping", offsets)?;
        }
        Ok(dict)
    }

    /// Decode token IDs to a string.
    ///
    /// Raises:
    ///     ValueError: If an id is outside the vocabulary
    #[pyo3(signature = (tokens, skip_special_tokens=true))]
    fn decode(&self, tokens: Vec<u32>, skip_special_tokens: bool) -> PyResult<String> {
        self.inner
            .decode(&tokens, skip_special_tokens)
            .map_err(to_py_err)
    }

    /// Look up a token, returning the unknown-token id when absent.
    fn token_to_id(&self, token: &str) -> u32 {
        self.inner.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> PyResult<String> {
        self.inner
            .id_to_token(id)
            .map(str::to_string)
            .map_err(to_py_err)
    }

    /// Get the vocabulary size (including added tokens).
    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    #[getter]
    fn padding_length(&self) -> i64 {
        self.inner.padding().into()
    }

    #[getter]
    fn bos_token_id(&self) -> u32 {
        self.inner.bos_token_id()
    }

    #[getter]
    fn eos_token_id(&self) -> u32 {
        self.inner.eos_token_id()
    }

    #[getter]
    fn pad_token_id(&self) -> u32 {
        self.inner.pad_token_id()
    }

    fn __repr__(&self) -> String {
        format!(
            "ClipTokenizer(vocab_size={}, padding_length={})",
            self.inner.vocab_size(),
            i64::from(self.inner.padding())
        )
    }
}
