//! Log management subcommands: `roll`, `clear`, `status`, `path`.

use crate::report::format_duration;
use crate::CliError;
use tracker_core::{EventKind, TrackerConfig, TrackerLog};

pub fn roll(log: &TrackerLog) -> Result<(), CliError> {
    let rolled = log.roll_log()?;
    println!("Rolled tracking log to {}", rolled.display());
    Ok(())
}

pub fn clear(log: &TrackerLog, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }
    if log.clear_log()? {
        println!("Cleared {}", log.current_log_file().display());
    } else {
        println!("Tracking log is already empty.");
    }
    Ok(())
}

pub fn status(log: &TrackerLog, config: &TrackerConfig) -> Result<(), CliError> {
    let rolled = log.rolled_files()?;
    let size = log.size_in_bytes();
    let limit = log.config().max_bytes_to_process;

    println!("Log file:       {}", log.current_log_file().display());
    println!("Read scope:     {:?}", log.config().read_scope);
    println!(
        "Size in scope:  {size} bytes (limit {limit}){}",
        if log.is_too_large_to_process() {
            ", too large to analyze"
        } else {
            ""
        }
    );
    println!("Rolled files:   {}", rolled.len());
    for path in &rolled {
        println!("  {}", path.display());
    }
    println!(
        "Idle threshold: {}",
        format_duration(config.stats.idle_threshold())
    );

    let tracked: Vec<&str> = EventKind::ALL
        .into_iter()
        .filter(|kind| config.tracking.accepts(*kind))
        .map(EventKind::tag)
        .collect();
    if tracked.is_empty() {
        println!("Tracking:       off");
    } else {
        println!("Tracking:       {}", tracked.join(", "));
    }
    Ok(())
}

pub fn path(log: &TrackerLog, folder: bool) {
    if folder {
        println!("{}", log.log_dir().display());
    } else {
        println!("{}", log.current_log_file().display());
    }
}
