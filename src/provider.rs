use serde::{Deserialize, Serialize};

/// A webhook provider. New providers only need an entry here plus an
/// `Adapter` impl (adapter::tradetron / adapter::algotest) — the cache's
/// `(strategy, provider)` lookup keys off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Tradetron,
    Algotest,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Tradetron => "tradetron",
            Provider::Algotest => "algotest",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
