//! Candidate set carried between filter stages.

use serde::Serialize;
use std::collections::HashMap;

use crate::data::Security;

/// Attributes gathered for a candidate as it passes each stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateAttributes {
    /// Display name
    pub name: String,
    /// Total market value (market-cap stage)
    pub market_cap: Option<f64>,
    /// Current ratio (liquidity stage)
    pub current_ratio: Option<f64>,
    /// Net profit of the most recent fiscal year checked
    pub net_profit: Option<f64>,
    /// Trailing dividend yield (dividend stage)
    pub dividend_yield: Option<f64>,
}

/// Ordered symbols surviving the pipeline so far.
///
/// Each stage consumes the set and produces a new one; the survivors keep
/// their relative order and accumulated attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    symbols: Vec<String>,
    attributes: HashMap<String, CandidateAttributes>,
}

impl CandidateSet {
    /// Seed a set from listed securities, dropping duplicate symbols.
    pub fn from_securities<'a, I>(securities: I) -> Self
    where
        I: IntoIterator<Item = &'a Security>,
    {
        let mut set = Self::default();
        for security in securities {
            if set.attributes.contains_key(&security.symbol) {
                continue;
            }
            set.symbols.push(security.symbol.clone());
            set.attributes.insert(
                security.symbol.clone(),
                CandidateAttributes {
                    name: security.name.clone(),
                    ..Default::default()
                },
            );
        }
        set
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in pipeline order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.attributes.contains_key(symbol)
    }

    pub fn attributes(&self, symbol: &str) -> Option<&CandidateAttributes> {
        self.attributes.get(symbol)
    }

    /// Iterate `(symbol, attributes)` in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CandidateAttributes)> {
        self.symbols
            .iter()
            .filter_map(|s| self.attributes.get(s).map(|a| (s.as_str(), a)))
    }

    /// Produce the subset for which `keep` returns true.
    ///
    /// `keep` may record stage attributes on the entries it keeps.
    pub fn narrow<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&str, &mut CandidateAttributes) -> bool,
    {
        let Self {
            symbols: input,
            attributes: mut pool,
        } = self;

        let mut symbols = Vec::with_capacity(input.len());
        let mut attributes = HashMap::with_capacity(input.len());
        for symbol in input {
            let Some(mut attrs) = pool.remove(&symbol) else {
                continue;
            };
            if keep(&symbol, &mut attrs) {
                attributes.insert(symbol.clone(), attrs);
                symbols.push(symbol);
            }
        }

        Self {
            symbols,
            attributes,
        }
    }
}
