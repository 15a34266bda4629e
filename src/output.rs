//! Console output for build progress

use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
    verbosity: u8,
}

impl Default for Output {
    fn default() -> Self {
        Self::new(OutputFormat::Text, 1)
    }
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: u8) -> Self {
        Self { format, verbosity }
    }

    /// Output that prints nothing but errors
    pub fn quiet() -> Self {
        Self::new(OutputFormat::Text, 0)
    }

    pub fn with_verbosity(self, verbosity: u8) -> Self {
        Self { verbosity, ..self }
    }

    /// Prints a timestamped progress line
    pub fn log(&self, message: &str) {
        match self.format {
            OutputFormat::Text => {
                let stamp = chrono::Local::now().format("%H:%M:%S").to_string();
                println!("[{}] {}", stamp.dimmed(), message);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "time": chrono::Local::now().to_rfc3339(),
                        "message": message,
                    })
                );
            }
        }
    }

    /// Prints an informational line (only when verbose)
    pub fn info(&self, message: &str) {
        if !self.is_verbose() {
            return;
        }
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => println!("{}", serde_json::json!({ "message": message })),
        }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message.green()),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints an error message
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Text => eprintln!("{} {}", "Error:".red(), message),
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": message
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        let json = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        if let Ok(json) = json {
            println!("{}", json);
        }
    }

    /// Prints a blank line (text only, when verbose)
    pub fn blank(&self) {
        if self.format == OutputFormat::Text && self.is_verbose() {
            println!();
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Returns true if summaries should be printed
    pub fn is_verbose(&self) -> bool {
        self.verbosity >= 1
    }
}

/// Formats an elapsed time the way build logs usually do
pub fn format_elapsed(elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    if micros < 1_000 {
        format!("{} μs", micros)
    } else if micros < 1_000_000 {
        format!("{} ms", elapsed.as_millis())
    } else {
        format!("{:.2} s", elapsed.as_secs_f64())
    }
}
