use std::path::Path;

use crate::commands::{open_migrated, run_with_config, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let result = run_with_config("migrate", config_path, |config| async move {
        let pool = open_migrated(&config).await?;
        pool.close().await;
        Ok(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
