//! Terminal output for the memoria CLI.
//!
//! Command results go to stdout; errors go to stderr. With `--no-color`
//! every helper falls back to bracketed plain-text tags.

use owo_colors::OwoColorize;

pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "memoria".bright_cyan().bold(),
                version.dimmed(),
                "Persistent memory for AI assistants".bright_white(),
            );
        } else {
            println!("\n   memoria {}\n   Persistent memory for AI assistants\n", version);
        }
    }

    /// A status word colored by severity: green for healthy states, yellow
    /// for degraded or inactive ones, red for anything else.
    pub fn status(&self, label: &str, status: &str) {
        if !self.colored {
            println!("  {}: {}", label, status);
            return;
        }
        let styled = match status {
            "healthy" | "success" | "running" => status.green().bold().to_string(),
            "degraded" | "disabled" | "skipped" | "stopped" => status.yellow().bold().to_string(),
            _ => status.red().bold().to_string(),
        };
        println!("  {}: {}", label.bright_white().bold(), styled);
    }

    /// Pretty JSON, uncolored so it can be piped.
    pub fn json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Progress line for the n-th of `total` items.
    pub fn step(&self, n: u32, total: u32, message: &str) {
        let counter = format!("[{}/{}]", n, total);
        if self.colored {
            println!("  {} {}", counter.dimmed(), message);
        } else {
            println!("  {} {}", counter, message);
        }
    }

    /// Something written to disk by `memoria init`.
    pub fn created(&self, kind: &str, path: &str) {
        if self.colored {
            println!("  {} {} {}", "✓".green().bold(), kind.dimmed(), path.bright_white());
        } else {
            println!("  [CREATED] {} {}", kind, path);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!("  {} {} {}", "○".yellow(), path.dimmed(), format!("({})", reason).yellow());
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "tip:".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// A shell command the user can copy.
    pub fn command(&self, cmd: &str) {
        let line = format!("$ {}", cmd);
        if self.colored {
            println!("     {}", line.bright_cyan());
        } else {
            println!("     {}", line);
        }
    }

    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "✓".green().bold(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    pub fn newline(&self) {
        println!();
    }

    /// Print a header row for `columns` (title, width) and return a table
    /// that prints rows with the same widths.
    pub fn table<'a>(&'a self, columns: &[(&str, usize)]) -> Table<'a> {
        let widths: Vec<usize> = columns.iter().map(|(_, w)| *w).collect();
        let titles: Vec<&str> = columns.iter().map(|(t, _)| *t).collect();
        let header = pad_cells(&titles, &widths);
        let rule_len = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(rule_len).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(rule_len));
        }
        Table { output: self, widths }
    }
}

/// Fixed-width rows under a header printed by [`Output::table`].
pub struct Table<'a> {
    output: &'a Output,
    widths: Vec<usize>,
}

impl Table<'_> {
    /// Cells beyond the declared columns are printed unpadded; the last
    /// column is never padded.
    pub fn row(&self, cells: &[&str]) {
        let line = pad_cells(cells, &self.widths);
        if self.output.colored {
            println!("    {}", line.bright_white());
        } else {
            println!("    {}", line);
        }
    }
}

fn pad_cells(cells: &[&str], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| match widths.get(i) {
            Some(width) if i < last => format!("{:<width$}", cell, width = *width),
            _ => cell.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_modes() {
        assert!(Output::new().colored);
        assert!(Output::default().colored);
        assert!(!Output::no_color().colored);
    }

    #[test]
    fn test_pad_cells() {
        assert_eq!(pad_cells(&["0.912", "ai_memory", "tea"], &[6, 10, 40]), "0.912  ai_memory  tea");
        assert_eq!(pad_cells(&["a", "b", "extra"], &[2]), "a  b extra");
        assert_eq!(pad_cells(&[], &[3]), "");
    }

    #[test]
    fn test_table_with_mismatched_rows() {
        let output = Output::no_color();
        let table = output.table(&[("Score", 6), ("Type", 18), ("Content", 60)]);
        table.row(&["0.5", "conversation", "hello"]);
        table.row(&["only one"]);
        table.row(&[]);
    }

    #[test]
    fn test_helpers_in_both_modes() {
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("stored");
            output.info("info");
            output.warning("careful");
            output.error("failed");
            output.step(1, 3, "chat.json: 2 message(s)");
            output.created("config", "memoria.toml");
            output.skipped("memory_data", "already exists");
            output.header("System health");
            output.subheader("Databases");
            output.kv("model", "nomic");
            output.list_item("search_memories");
            output.hint("Use --force to run anyway");
            output.command("memoria health");
            output.complete("done");
            output.status("status", "degraded");
            output.json(&serde_json::json!({ "status": "success" }));
            output.newline();
        }
    }
}
