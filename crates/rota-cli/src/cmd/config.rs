use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use rota_core::{ConfigStore, RotationConfig};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the stored rotation config
    Show,

    /// Check the rotation config without contacting the role service
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let store = ConfigStore::at_root(root);
    let config = store
        .load()
        .with_context(|| format!("cannot use {}", store.path().display()))?;

    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

fn show(config: &RotationConfig, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Conditions that load fine but leave the engine unable to rotate.
fn warnings(config: &RotationConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.role_id.is_unset() {
        warnings.push("role_id is unset".to_string());
    }
    if config.roster.is_empty() {
        warnings.push("roster is empty".to_string());
    } else if config.index >= config.roster.len() {
        warnings.push(format!(
            "index {} is outside the roster of {}",
            config.index,
            config.roster.len()
        ));
    }
    warnings
}

fn validate(config: &RotationConfig, json: bool) -> anyhow::Result<()> {
    let warnings = warnings(config);

    if json {
        print_json(&serde_json::json!({
            "valid": true,
            "warnings": warnings,
        }))?;
        return Ok(());
    }

    if warnings.is_empty() {
        println!("Config OK ({} participants, {})", config.roster.len(), config.schedule);
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{RoleId, Schedule};

    #[test]
    fn fresh_default_warns_about_role_and_roster() {
        let config = RotationConfig::new(RoleId::unset());
        let w = warnings(&config);
        assert_eq!(w, vec!["role_id is unset", "roster is empty"]);
    }

    #[test]
    fn index_past_roster_warns() {
        let config = RotationConfig {
            role_id: RoleId::new("900"),
            roster: vec!["1".into()],
            index: 3,
            schedule: Schedule::new(0, 0, 0).unwrap(),
        };
        assert_eq!(warnings(&config), vec!["index 3 is outside the roster of 1"]);
    }
}
