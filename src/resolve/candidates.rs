use crate::constants::DOMESTIC_EXCHANGES;

fn is_domestic(exchange: &str) -> bool {
    DOMESTIC_EXCHANGES.contains(&exchange)
}

/// Uppercased, trimmed exchange hint; blank counts as absent.
pub fn normalize_exchange(exchange: Option<&str>) -> Option<String> {
    exchange
        .map(|e| e.trim().to_uppercase())
        .filter(|e| !e.is_empty())
}

/// Provider symbols to try for `symbol`, most plausible first.
///
/// Domestic listings are quoted bare, so the bare symbol leads; foreign
/// listings need the exchange suffix, so `SYMBOL.EXCHANGE` leads. The result
/// holds no duplicates and is empty for a blank symbol.
pub fn generate(symbol: &str, exchange: Option<&str>) -> Vec<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Vec::new();
    }

    let ordered = match normalize_exchange(exchange) {
        Some(ex) if is_domestic(&ex) => vec![symbol.clone(), format!("{}.{}", symbol, ex)],
        Some(ex) => vec![format!("{}.{}", symbol, ex), symbol.clone()],
        None => vec![symbol],
    };

    let mut candidates: Vec<String> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}
