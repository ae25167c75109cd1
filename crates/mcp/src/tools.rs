//! Names of every tool the server registers.

pub const ALL_TOOL_NAMES: &[&str] = &[
    "search_available_rooms",
    "get_room_info",
    "list_rooms",
    "create_reservation",
    "get_reservation_details",
    "cancel_reservation",
    "send_notification",
    "start_reservation_session",
    "answer_session",
    "revise_session",
    "get_session_status",
    "confirm_session",
    "abandon_session",
];

pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();
