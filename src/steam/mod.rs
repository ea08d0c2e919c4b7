pub mod client;

pub use client::{ReviewQuery, SteamClient};
