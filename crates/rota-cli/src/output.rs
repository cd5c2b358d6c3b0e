use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print collected revoke failures from an engine response, if any.
pub fn print_revoke_failures(value: &serde_json::Value) {
    let Some(failures) = value["revoke_failures"].as_array() else {
        return;
    };
    for failure in failures {
        eprintln!(
            "warning: could not revoke from {}: {}",
            failure["participant"].as_str().unwrap_or("?"),
            failure["reason"].as_str().unwrap_or("unknown error"),
        );
    }
}
