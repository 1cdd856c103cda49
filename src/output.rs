use std::{fs::File, io::prelude::*};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// JSON format used for logging or writing to a *.json file
  Json,
  /// Text format used for writing to stdout
  #[default]
  Text,
}

/// Results that can be rendered in every output [`Format`]
pub trait Render: Serialize {
  fn to_stdout_table(&self) -> Result<String>;
}

/// Renders `yes` for true and an empty cell for false
pub fn tabled_bool(value: bool) -> String {
  if value { "yes".to_owned() } else { String::new() }
}

pub fn render<T: Render>(results: &T, format: &Format) -> Result<String> {
  match format {
    Format::Json => Ok(serde_json::to_string_pretty(results)?),
    Format::Text => results.to_stdout_table(),
  }
}

pub fn output<T: Render>(results: &T, format: &Format, filename: &Option<String>) -> Result<()> {
  let output = render(results, format)?;

  match filename {
    Some(filename) => {
      let mut file = File::create(filename).with_context(|| format!("Failed to create output file: {filename}"))?;
      file.write_all(output.as_bytes())?;
    }
    None => {
      println!("{output}");
    }
  }

  Ok(())
}
