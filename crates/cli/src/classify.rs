//! `specmerge classify` — preview document roles.

use std::path::PathBuf;

use serde::Serialize;
use specmerge_recon::config::RoleConfig;
use specmerge_recon::role::{classify_with_source, Role, RoleSource};

use crate::CliError;

#[derive(Debug, Serialize)]
struct ClassifiedFile {
    filename: String,
    role: Role,
    decided_by: RoleSource,
}

pub fn cmd_classify(filenames: Vec<String>, config_path: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    // With a config, its keywords apply and declared role overrides win
    let (roles, overrides) = match config_path {
        Some(ref path) => {
            let config = crate::recon::read_config(path)?;
            let overrides: Vec<(String, Role)> = config
                .documents
                .iter()
                .filter_map(|d| d.role.map(|role| (d.display_filename().to_string(), role)))
                .collect();
            (config.roles, overrides)
        }
        None => (RoleConfig::default(), Vec::new()),
    };

    let classified: Vec<ClassifiedFile> = filenames
        .into_iter()
        .map(|filename| {
            let forced = overrides.iter().find(|(f, _)| *f == filename).map(|(_, r)| *r);
            let (role, decided_by) = classify_with_source(&filename, forced, &roles);
            ClassifiedFile { filename, role, decided_by }
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&classified)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        for c in &classified {
            println!("{:<22} {}", c.role.to_string(), c.filename);
        }
    }

    let summaries = classified.iter().filter(|c| c.role == Role::QuantitySummary).count();
    if summaries > 1 {
        eprintln!("note: {summaries} files classify as quantity summaries; a run accepts only one");
    }
    Ok(())
}
