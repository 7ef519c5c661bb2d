pub mod autocomplete;

use anyhow::Result;

use crate::types::KeywordCandidate;

pub use autocomplete::AutocompleteProvider;

/// Capability interface for keyword suggestion sources.
///
/// Providers that report unavailable are skipped by the research engine
/// without error.
pub trait KeywordDataProvider {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    async fn get_keyword_suggestions(&self, seed: &str) -> Result<Vec<KeywordCandidate>>;
}

/// The registered set of providers. Closed by design: the engine iterates a
/// `Vec<Provider>` rather than dispatching on trait objects.
#[derive(Debug, Clone)]
pub enum Provider {
    Autocomplete(AutocompleteProvider),
}

impl KeywordDataProvider for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::Autocomplete(p) => p.name(),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            Provider::Autocomplete(p) => p.is_available(),
        }
    }

    async fn get_keyword_suggestions(&self, seed: &str) -> Result<Vec<KeywordCandidate>> {
        match self {
            Provider::Autocomplete(p) => p.get_keyword_suggestions(seed).await,
        }
    }
}
