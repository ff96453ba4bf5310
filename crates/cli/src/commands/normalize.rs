//! Normalize command - one-shot caption to title normalization

use anyhow::{Context, Result};
use feed_relay_domain::normalize::{NormalizeOptions, normalize};
use serde::Serialize;
use std::io::{self, Read};

use crate::args::NormalizeArgs;

#[derive(Debug, Serialize)]
struct NormalizeOutput<'a> {
    input: &'a str,
    title: &'a str,
    chars: usize,
    empty: bool,
}

pub async fn execute(args: NormalizeArgs) -> Result<()> {
    let text = get_input_text(&args)?;
    let options = NormalizeOptions {
        strip_prefix: !args.no_strip_prefix,
        cap_length: !args.no_cap,
    };

    let title = normalize(&text, options);
    tracing::debug!(input_len = text.len(), title_len = title.len(), "Normalized text");

    if args.json {
        let output = NormalizeOutput {
            input: &text,
            title: &title,
            chars: title.chars().count(),
            empty: title.is_empty(),
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        println!("{}", title);
    }

    Ok(())
}

fn get_input_text(args: &NormalizeArgs) -> Result<String> {
    if let Some(ref text) = args.text {
        return Ok(text.clone());
    }

    match args.file {
        Some(ref path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;
            Ok(text)
        }
    }
}
