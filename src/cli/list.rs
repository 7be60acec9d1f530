//! The `list` subcommand.

use serde_json::json;

use crate::cli::{ListArgs, OutputFormat};
use crate::errors::ScanResult;
use crate::manifest::Manifest;

pub fn cmd_list(args: ListArgs) -> ScanResult<()> {
    let manifest = Manifest::load(&args.manifest)?;

    match args.format {
        OutputFormat::Table => {
            let id_width = manifest
                .games
                .iter()
                .map(|e| e.id.to_string().len())
                .max()
                .unwrap_or(2)
                .max(2);
            println!("{:<id_width$}  {:<14}  title", "id", "status");
            for entry in &manifest.games {
                println!(
                    "{:<id_width$}  {:<14}  {}",
                    entry.id.to_string(),
                    entry.status.as_str(),
                    entry.title
                );
            }
        }
        OutputFormat::Json => {
            let records: Vec<_> = manifest
                .games
                .iter()
                .map(|e| {
                    json!({
                        "id": e.id,
                        "title": e.title,
                        "status": e.status,
                        "movement": e.movement_input(),
                    })
                })
                .collect();
            println!("{:#}", serde_json::Value::Array(records));
        }
    }
    Ok(())
}
