use anyhow::{Context, Result};
use blockspace_editor::list_format::{
    add_bullet_prefix, normalize_list_lines, number_lines, renumber_lines, strip_list_prefixes,
};
use clap::{Args, ValueEnum};
use std::io::Read;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatOp {
    /// Prefix every line with "• "
    Bullet,
    /// Number unnumbered lines by position
    Number,
    /// Re-derive 1., 2., ... for numbered lines
    Renumber,
    /// Remove every list marker
    Strip,
    /// Drop blank lines between list items
    Normalize,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Transform to apply
    #[arg(value_enum)]
    pub op: FormatOp,

    /// Input file (stdin when omitted)
    pub file: Option<PathBuf>,
}

pub fn apply(op: FormatOp, text: &str) -> String {
    match op {
        FormatOp::Bullet => add_bullet_prefix(text),
        FormatOp::Number => number_lines(text),
        FormatOp::Renumber => renumber_lines(text),
        FormatOp::Strip => strip_list_prefixes(text),
        FormatOp::Normalize => normalize_list_lines(text),
    }
}

pub fn format(args: FormatArgs) -> Result<()> {
    let input = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    // A trailing newline belongs to the file, not to the last list item
    let (body, newline) = match input.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (input.as_str(), ""),
    };

    print!("{}{}", apply(args.op, body), newline);
    Ok(())
}
