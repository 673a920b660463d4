use clap::{Parser, ValueEnum};

/// Output format for tracing logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable output for local development.
    Pretty,
    /// Newline-delimited JSON for log collectors.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "evalsync", about = "Course review ingestion service")]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    pub tracing: TracingFormat,

    /// Run exactly one ingestion cycle and exit instead of looping.
    #[arg(long)]
    pub once: bool,
}
