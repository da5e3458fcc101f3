use std::io::{self, BufRead, Stderr, StdinLock, Write};

use super::candidates::normalize_exchange;
use super::resolver::TickerResolver;
use crate::model::{ResolutionResult, SearchMatch};

/// Picks one of several search matches for an unresolved symbol.
pub trait Disambiguator {
    /// Index into `matches` of the chosen entry, or `None` to skip.
    fn choose(&mut self, query: &str, matches: &[SearchMatch]) -> Option<usize>;
}

/// Never prompts; every unresolved symbol stays unresolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Disambiguator for NonInteractive {
    fn choose(&mut self, _query: &str, _matches: &[SearchMatch]) -> Option<usize> {
        None
    }
}

/// Line-oriented prompt: prints a numbered table and reads a 1-based choice.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<StdinLock<'static>, Stderr> {
    /// Prompts on stderr so a report written to stdout stays clean.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

fn truncate(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn print_table(&mut self, query: &str, matches: &[SearchMatch]) -> io::Result<()> {
        writeln!(self.output, "\nPossible matches for '{}':", query)?;
        writeln!(
            self.output,
            "{:<4} {:<12} {:<10} {:<8} {:<40}",
            "No.", "Symbol", "Exchange", "Type", "Name"
        )?;
        writeln!(self.output, "{}", "-".repeat(78))?;
        for (i, m) in matches.iter().enumerate() {
            writeln!(
                self.output,
                "{:<4} {:<12} {:<10} {:<8} {:<40}",
                i + 1,
                truncate(&m.symbol, 12),
                truncate(m.exchange.as_deref().unwrap_or(""), 10),
                truncate(m.quote_type.as_deref().unwrap_or(""), 8),
                truncate(m.name.as_deref().unwrap_or(""), 40)
            )?;
        }
        Ok(())
    }

    fn prompt(&mut self, query: &str, matches: &[SearchMatch]) -> io::Result<Option<usize>> {
        if matches.is_empty() {
            writeln!(self.output, "No alternatives found.")?;
            return Ok(None);
        }
        self.print_table(query, matches)?;

        let mut line = String::new();
        loop {
            write!(
                self.output,
                "Enter the number of the correct symbol (or press Enter to skip): "
            )?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=matches.len()).contains(&n) => return Ok(Some(n - 1)),
                Ok(_) => writeln!(
                    self.output,
                    "Please enter a number between 1 and {}.",
                    matches.len()
                )?,
                Err(_) => writeln!(self.output, "Invalid input. Enter a number.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Disambiguator for ConsolePrompt<R, W> {
    fn choose(&mut self, query: &str, matches: &[SearchMatch]) -> Option<usize> {
        match self.prompt(query, matches) {
            Ok(choice) => choice,
            Err(e) => {
                log::warn!("prompt for {} failed: {}", query, e);
                None
            }
        }
    }
}

/// Searches for `query`, lets `disambiguator` pick a match and resolves the
/// pick. `None` when nothing was chosen.
pub async fn disambiguate(
    resolver: &TickerResolver,
    disambiguator: &mut dyn Disambiguator,
    query: &str,
) -> Option<ResolutionResult> {
    let matches = resolver.client().search(query).await.unwrap_or_else(|e| {
        log::warn!("search for {} failed: {}", query, e);
        Vec::new()
    });

    let selected = matches.get(disambiguator.choose(query, &matches)?)?;
    log::info!(
        "{}: operator selected {} ({})",
        query,
        selected.symbol,
        selected.exchange.as_deref().unwrap_or("-")
    );
    // Search hits are already provider symbols, so no exchange suffix is tried.
    let mut result = resolver.resolve(&selected.symbol, None).await;
    result.exchange = normalize_exchange(selected.exchange.as_deref());
    Some(result)
}
