use std::io::Write;

use csv::Writer;

use crate::model::{self, Outcome};
use crate::resolve::batch::{BatchEntry, BatchRun};

const HEADER: [&str; 10] = [
    "symbol",
    "exchange",
    "note",
    "status",
    "yahoo_symbol",
    "price",
    "currency",
    "name",
    "dividends",
    "error",
];

/// Writes one CSV row per entry.
pub fn write_report<W: Write>(out: W, entries: &[BatchEntry]) -> model::Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(HEADER)?;

    for entry in entries {
        let input = &entry.input;
        let exchange = entry.result.exchange.as_deref().unwrap_or("");
        let note = input.note.as_deref().unwrap_or("");

        match &entry.result.outcome {
            Outcome::Resolved(security) => writer.write_record([
                entry.result.symbol.as_str(),
                exchange,
                note,
                "resolved",
                security.yahoo_symbol.as_str(),
                security.price.price.to_string().as_str(),
                security.currency.as_str(),
                security.name.as_deref().unwrap_or(""),
                security.dividends.len().to_string().as_str(),
                "",
            ])?,
            Outcome::Unresolved { last_error } => writer.write_record([
                entry.result.symbol.as_str(),
                exchange,
                note,
                "unresolved",
                "",
                "",
                "",
                "",
                "",
                last_error.as_deref().unwrap_or(""),
            ])?,
        }
    }
    writer.flush()?;
    Ok(())
}

/// Logs and writes resolved/unresolved counts plus the unresolved symbols.
pub fn write_summary<W: Write>(mut out: W, run: &BatchRun) -> model::Result<()> {
    let total = run.entries.len();
    let resolved = run.resolved_count();
    log::info!(
        "Resolved {} of {} symbols in {} batches ({} disambiguation prompts)",
        resolved,
        total,
        run.stats.batches,
        run.stats.disambiguations
    );
    writeln!(out, "Resolved: {}  Unresolved: {}", resolved, total - resolved)?;
    for entry in run.entries.iter().filter(|e| !e.result.is_resolved()) {
        writeln!(
            out,
            "  unresolved: {} ({}) {}",
            entry.input.symbol,
            entry.input.exchange.as_deref().unwrap_or("-"),
            entry.result.failure_reason().unwrap_or("")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PriceSnapshot, ResolutionResult, Security, SymbolInput};

    fn resolved() -> BatchEntry {
        BatchEntry {
            input: SymbolInput {
                symbol: "ivv".into(),
                exchange: Some("asx".into()),
                note: Some("super".into()),
            },
            result: ResolutionResult {
                symbol: "IVV".into(),
                exchange: Some("ASX".into()),
                outcome: Outcome::Resolved(Security {
                    yahoo_symbol: "IVV.AX".into(),
                    currency: "AUD".into(),
                    exchange_name: Some("ASX".into()),
                    name: Some("iShares S&P 500, AUD".into()),
                    instrument_type: Some("ETF".into()),
                    price: PriceSnapshot {
                        price: 55.94,
                        currency: "AUD".into(),
                        as_of: None,
                    },
                    dividends: Vec::new(),
                }),
            },
        }
    }

    fn unresolved() -> BatchEntry {
        BatchEntry {
            input: SymbolInput::new("XYZQ", Some("NASDAQ")),
            result: ResolutionResult {
                symbol: "XYZQ".into(),
                exchange: Some("NASDAQ".into()),
                outcome: Outcome::Unresolved {
                    last_error: Some("No data: no market price".into()),
                },
            },
        }
    }

    #[test]
    fn report_has_one_row_per_entry() {
        let mut buf = Vec::new();
        write_report(&mut buf, &[resolved(), unresolved()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "IVV,ASX,super,resolved,IVV.AX,55.94,AUD,\"iShares S&P 500, AUD\",0,"
        );
        assert_eq!(
            lines[2],
            "XYZQ,NASDAQ,,unresolved,,,,,,No data: no market price"
        );
    }
}
