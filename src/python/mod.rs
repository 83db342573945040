mod bindings;

pub use bindings::PyClipTokenizer;
