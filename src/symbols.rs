use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::model::{self, ImportError, SymbolInput};

/// Reads `(symbol, exchange, note)` rows from a headered CSV file. Header
/// names are case-insensitive; `ticker` is accepted for `symbol`.
pub fn read_symbols_from_file(symbols_file_path: &Path) -> model::Result<Vec<SymbolInput>> {
    let display = symbols_file_path.display().to_string();
    if !symbols_file_path.exists() {
        return Err(ImportError::FileNotFound(display));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(symbols_file_path)?;

    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    reader.set_headers(headers);

    let mut symbols = Vec::new();
    for (line, row) in reader.deserialize::<SymbolInput>().enumerate() {
        let input = row?;
        if input.symbol.is_empty() {
            // +2: header row and 1-based numbering.
            log::warn!("{}: skipping row {} with empty symbol", display, line + 2);
            continue;
        }
        symbols.push(input);
    }

    if symbols.is_empty() {
        return Err(ImportError::EmptySymbolFile(display));
    }
    log::info!("read {} symbols from {}", symbols.len(), display);
    Ok(symbols)
}
