use crate::output::print_json;
use anyhow::Context;
use rota_core::{ConfigStore, RoleId};
use std::path::Path;

pub fn run(root: &Path, role: Option<&str>, force: bool, json: bool) -> anyhow::Result<()> {
    let store = ConfigStore::at_root(root);
    let created = store
        .init_default(role.map(RoleId::new), force)
        .with_context(|| format!("failed to write {}", store.path().display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": store.path(),
            "created": created,
        }))?;
        return Ok(());
    }

    if created {
        let config = store.load()?;
        println!("Created {}", store.path().display());
        println!("  schedule: {}", config.schedule);
        if config.role_id.is_unset() {
            println!("  next: set role_id and add roster entries, then run `rota serve`");
        }
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            store.path().display()
        );
    }
    Ok(())
}
