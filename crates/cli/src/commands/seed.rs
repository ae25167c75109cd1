use std::path::Path;

use roombook_db::{SampleRooms, SeedResult, VerificationResult};

use crate::commands::{open_migrated, run_with_config, CommandResult, Failure};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let result = run_with_config("seed", config_path, |config| async move {
        let pool = open_migrated(&config).await?;

        let seeded = SampleRooms::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));
        let run_result = match seeded {
            Ok(seeded) if seeded.skipped => Ok(seeded),
            Ok(seeded) => SampleRooms::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))
                .and_then(|verification| check_verification(seeded, &verification)),
            Err(failure) => Err(failure),
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) if seeded.skipped => CommandResult::success(
            "seed",
            "rooms already present; sample catalog left untouched",
        ),
        Ok(seeded) => {
            CommandResult::success("seed", format!("inserted {} sample rooms", seeded.inserted))
        }
        Err(failure) => failure,
    }
}

fn check_verification(
    seeded: SeedResult,
    verification: &VerificationResult,
) -> Result<SeedResult, Failure> {
    if verification.all_present {
        return Ok(seeded);
    }
    Err(("seed_verification", verification_message(&verification.checks), 6u8))
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some sample rooms failed to load".to_string()
    } else {
        format!("Seed verification failed for rooms: {}", failed_checks.join(", "))
    }
}
