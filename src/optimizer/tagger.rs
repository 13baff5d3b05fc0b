//! Process-wide plan tags.

use uuid::Uuid;

/// Stamps every submitted plan with an opaque tag so later reads can be
/// correlated with the engine run that produced them.
#[derive(Debug, Clone)]
pub struct Tagger {
    prefix: String,
}

impl Default for Tagger {
    fn default() -> Self {
        Self::new()
    }
}

impl Tagger {
    pub fn new() -> Self {
        Self {
            prefix: format!("cm/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// A fresh tag. Unique per call.
    pub fn tag(&self) -> String {
        format!("{}/{}", self.prefix, Uuid::new_v4())
    }
}
