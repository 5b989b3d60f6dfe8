pub mod api;
pub mod discord_bridge;
pub mod doctor;
pub mod scheduler;
pub mod worker;
