//! Configuration (§2.1, §6): `PORT` from the environment, default 8080.
//!
//! Grounded on the teacher's `main.rs` bootstrap idiom (`dotenv().ok()` then
//! `std::env::var(..).unwrap_or_else(..)`), minus the database URL — persistence
//! is a stated non-goal here.

pub struct Config {
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        Config { port }
    }
}
