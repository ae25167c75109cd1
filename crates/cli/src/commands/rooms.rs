use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use roombook_core::BookingService;
use roombook_db::SqlBookingStore;
use serde_json::json;

use crate::commands::{open_migrated, run_with_config, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let result = run_with_config("rooms", config_path, |config| async move {
        let pool = open_migrated(&config).await?;
        let bookings =
            BookingService::new(Arc::new(SqlBookingStore::new(pool.clone())), config.booking_policy());

        let listing = async {
            let rooms = bookings.list_rooms(Utc::now()).await?;
            let statistics = bookings.room_statistics().await?;
            Ok::<_, roombook_core::BookingError>((rooms, statistics))
        }
        .await
        .map_err(|error| (error.error_class(), error.to_string(), 5u8));

        pool.close().await;
        listing
    });

    match result {
        Ok((rooms, statistics)) => CommandResult::success_with(
            "rooms",
            format!("{} rooms", rooms.len()),
            Some(json!({ "rooms": rooms, "statistics": statistics })),
        ),
        Err(failure) => failure,
    }
}
