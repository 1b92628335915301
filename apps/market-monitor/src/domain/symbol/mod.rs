//! Symbol Translation
//!
//! Maps exchange-native market symbols back to canonical `BASE/QUOTE` form at
//! the persistence boundary.

use std::collections::HashMap;

/// Per-exchange lookup from native symbol to canonical symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTranslation {
    entries: HashMap<String, HashMap<String, String>>,
}

impl SymbolTranslation {
    /// Create an empty translation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native → canonical mapping for an exchange.
    pub fn insert(
        &mut self,
        exchange: impl Into<String>,
        native: impl Into<String>,
        canonical: impl Into<String>,
    ) {
        self.entries
            .entry(exchange.into())
            .or_default()
            .insert(native.into(), canonical.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(
        mut self,
        exchange: impl Into<String>,
        native: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        self.insert(exchange, native, canonical);
        self
    }

    /// Canonical symbol for an exchange-native market.
    #[must_use]
    pub fn canonical(&self, exchange: &str, native: &str) -> Option<&str> {
        self.entries
            .get(exchange)
            .and_then(|markets| markets.get(native))
            .map(String::as_str)
    }

    /// Whether no mappings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }
}

/// Split a canonical `BASE/QUOTE` symbol.
#[must_use]
pub fn split_canonical(symbol: &str) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once('/')?;
    let base = base.trim();
    let quote = quote.trim();
    if base.is_empty() || quote.is_empty() || quote.contains('/') {
        return None;
    }
    Some((base, quote))
}
