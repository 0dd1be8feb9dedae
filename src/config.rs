/// Interpreter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Nested function invocations allowed before a recursion error.
    pub max_call_depth: usize,
    /// Name reported in diagnostics for source passed in directly.
    pub source_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: 1000,
            source_name: "<stdin>".to_string(),
        }
    }
}

impl Config {
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }
}
