//! Human-readable error descriptions and structured JSON error formatting.

use impulse_core::error::{BuildError, CoverError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingOutput => {
                "What happened: No impulse output was provided to the cover.\nLikely causes: The output pin failed to initialize or was not wired into the builder.\nHow to fix: Check [pins] output in the config and that the backend created it.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/impulse_cover.toml for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoverError>() {
        return match ce {
            CoverError::Lockout => "What happened: The safety lockout is active.\nLikely causes: Too many movement cycles inside the safety window, or one movement ran longer than the safety timeout (jam, miswired end-stop, wrong travel durations).\nHow to fix: Inspect the cover, then issue `reset` from `impulse run`. Adjust [safety] or [cover] durations if they are wrong.".to_string(),
            CoverError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing [pins] output, zero durations or out-of-range safety values.\nHow to fix: Edit the TOML config and try again."
            ),
            CoverError::Hardware(msg) | CoverError::HardwareFault(msg) => format!(
                "What happened: Hardware access failed ({msg}).\nLikely causes: Wrong pin numbers, missing GPIO permissions, or a disconnected line.\nHow to fix: Fix the [pins] values in the config; ensure the process can access GPIO."
            ),
            CoverError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: The cover kept moving longer than its configured travel allows.\nHow to fix: Re-run with --log-level=debug and check [cover] durations."
            ),
        };
    }

    // String-based heuristics for errors coming from init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("gpio") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 3 for safety lockout, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 2;
    }
    match err.downcast_ref::<CoverError>() {
        Some(CoverError::Config(_)) => 2,
        Some(CoverError::Lockout) => 3,
        _ => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingOutput => "MissingOutput",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<CoverError>() {
        Some(CoverError::Lockout) => "SafetyLockout",
        Some(CoverError::Config(_)) => "InvalidConfig",
        Some(CoverError::Hardware(_) | CoverError::HardwareFault(_)) => "Hardware",
        Some(CoverError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
