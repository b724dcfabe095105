use crate::error::CliError;
use engine_core::progress::ProgressStatus;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_progress_table(status: &ProgressStatus) {
    println!("Progress for job '{}':", status.job_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Stage", status.stage);
    println!(
        "{:<16} {}",
        "Step",
        status.step.as_deref().unwrap_or("n/a")
    );
    if let Some(table) = &status.table {
        println!("{:<16} {}", "Table", table);
        println!(
            "{:<16} {}/{} ({:.1}%)",
            "Rows",
            status.offset,
            status.total,
            status.fraction * 100.0
        );
    }
    println!("{:<16} {}", "Rows committed", status.rows_committed);
    println!("{:<16} {}", "Errors", status.errors.len());
    println!("{:<16} {}", "Last update", status.last_update.to_rfc3339());
}
