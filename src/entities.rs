//! EntityResolver: normalizes entity identifiers and resolves tickers to CIKs
//! through a packaged ticker -> CIK map.

use std::collections::{HashMap, HashSet};

const PACKAGED_TICKERS_CSV: &str = include_str!("resources/tickers.csv");

/// Strips whitespace and, if purely numeric, zero-pads to width 10.
pub fn normalize_entity_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed:0>10}")
    } else {
        trimmed.to_string()
    }
}

pub struct EntityResolver {
    ticker_to_ciks: HashMap<String, HashSet<String>>,
}

/// Outcome of resolving an optional entity-id/ticker selection.
pub struct Resolution {
    /// 10-digit zero-padded CIKs; empty means "no filter".
    pub entity_ids: HashSet<String>,
    /// Label used to group output: a single ticker (upper-cased),
    /// else a single resolved entity id, else `None`.
    pub group_label: Option<String>,
}

impl EntityResolver {
    pub fn from_packaged_default() -> Self {
        Self::from_csv(PACKAGED_TICKERS_CSV)
    }

    fn from_csv(csv: &str) -> Self {
        let mut map: HashMap<String, HashSet<String>> = HashMap::new();
        for line in csv.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((ticker, cik)) = line.split_once(',') {
                map.entry(ticker.trim().to_uppercase())
                    .or_default()
                    .insert(normalize_entity_id(cik));
            }
        }
        Self { ticker_to_ciks: map }
    }

    /// Returns the union of the normalized entity IDs and the entity IDs that
    /// the given tickers resolve to, plus a group label when exactly one
    /// unambiguous selector was given.
    pub fn resolve(&self, entity_ids: &[String], tickers: &[String]) -> Resolution {
        let mut resolved: HashSet<String> = entity_ids.iter().map(|id| normalize_entity_id(id)).collect();

        for ticker in tickers {
            if let Some(ciks) = self.ticker_to_ciks.get(&ticker.to_uppercase()) {
                resolved.extend(ciks.iter().cloned());
            }
        }

        let group_label = if tickers.len() == 1 {
            Some(tickers[0].to_uppercase())
        } else if resolved.len() == 1 {
            resolved.iter().next().cloned()
        } else {
            None
        };

        Resolution {
            entity_ids: resolved,
            group_label,
        }
    }
}
