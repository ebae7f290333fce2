use anyhow::Result;

/// Label the reference transform puts in front of every reply
pub const DEFAULT_LABEL: &str = "Processed: ";

/// Capability every server must be built with.
///
/// Implementations are shared read-only across all connection tasks, so they
/// must be `Send + Sync`. Returning an error drops the connection without a
/// reply.
pub trait RequestProcessor: Send + Sync + 'static {
    /// Transforms one decrypted request into the reply text
    fn process(&self, request: &str) -> Result<String>;
}

impl<F> RequestProcessor for F
where
    F: Fn(&str) -> Result<String> + Send + Sync + 'static,
{
    fn process(&self, request: &str) -> Result<String> {
        self(request)
    }
}

/// Reference transform: reverses the request and prefixes a fixed label
#[derive(Debug, Clone)]
pub struct ReverseProcessor {
    label: String,
}

impl Default for ReverseProcessor {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl ReverseProcessor {
    /// Creates the transform with [`DEFAULT_LABEL`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the label
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Label prepended to each reply
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl RequestProcessor for ReverseProcessor {
    fn process(&self, request: &str) -> Result<String> {
        let reversed: String = request.chars().rev().collect();
        Ok(format!("{}{}", self.label, reversed))
    }
}
