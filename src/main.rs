use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use pyino::{Config, Translator};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing configuration path after {arg}"))?;
                config_path = Some(PathBuf::from(path));
            }
            "--output" | "-o" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing output path after {arg}"))?;
                output_path = Some(PathBuf::from(path));
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let translator = Translator::new(config).context("Applying configuration")?;

    let source = if let Some(path) = &input_path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let name = input_path.as_deref().unwrap_or("<stdin>");
    let output = translator
        .translate(&source)
        .with_context(|| format!("Translating {name}"))?;

    match output_path {
        Some(path) => fs::write(&path, output)
            .with_context(|| format!("Writing {}", path.display()))?,
        None => print!("{output}"),
    }
    Ok(())
}
