use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding all quest data
    pub database_path: String,
    /// IANA timezone that defines the player's day
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "questr.db".to_string(),
            timezone: detect_system_timezone(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("QUESTR_"))
            .extract()
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    Tz::from_str(timezone).map_err(|_| {
        format!(
            "Invalid timezone: '{}'. Use IANA timezone names like {}",
            timezone,
            suggest_timezone(timezone).join(", ")
        )
    })
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    // Method 1: Check TZ environment variable
    if let Ok(tz) = std::env::var("TZ") {
        if Tz::from_str(&tz).is_ok() {
            return tz;
        }
    }

    // Method 2: Try to read from /etc/timezone (Linux)
    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if Tz::from_str(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    // Method 3: Ask the platform
    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if Tz::from_str(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

const COMMON_TIMEZONES: [&str; 12] = [
    "UTC",
    "America/New_York",
    "America/Chicago",
    "America/Los_Angeles",
    "America/Sao_Paulo",
    "Europe/London",
    "Europe/Berlin",
    "Europe/Istanbul",
    "Asia/Kolkata",
    "Asia/Tokyo",
    "Australia/Sydney",
    "Pacific/Auckland",
];

/// Suggests similar timezone names when validation fails
pub fn suggest_timezone(invalid_tz: &str) -> Vec<&'static str> {
    let lower_invalid = invalid_tz.to_lowercase();

    let suggestions: Vec<&'static str> = COMMON_TIMEZONES
        .iter()
        .copied()
        .filter(|tz| {
            let lower_tz = tz.to_lowercase();
            !lower_invalid.is_empty()
                && (lower_tz.contains(&lower_invalid)
                    || lower_tz
                        .rsplit('/')
                        .next()
                        .map_or(false, |city| lower_invalid.contains(city)))
        })
        .collect();

    if suggestions.is_empty() {
        COMMON_TIMEZONES.iter().copied().take(4).collect()
    } else {
        suggestions
    }
}
