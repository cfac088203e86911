//! config-rs/lib.rs
//! Shared configuration utilities for the diagnosis services
//! Provides bind address resolution and typed environment lookups

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Get service port from environment variables with proper fallback
///
/// Checks `<SERVICE>_SERVICE_PORT` first, then the generic `PORT` variable
/// set by most container platforms.
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "DIAGNOSIS")
/// * `default_port` - The default port to use if not specified in environment
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    let raw = env::var(&var_name).or_else(|_| env::var("PORT"));

    match raw {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port '{}' in {}, using default {}", value, var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// A full `<SERVICE>_SERVICE_ADDR` override wins, in either `host:port` or
/// `http://host:port` form. Otherwise binds all interfaces on the resolved port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let stripped = addr_str
            .strip_prefix("http://")
            .or_else(|| addr_str.strip_prefix("https://"))
            .unwrap_or(&addr_str);

        match stripped.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Read a non-blank string variable, trimmed
pub fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a variable and parse it, falling back to `default` when unset or invalid
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env_string(name) {
        Some(value) => value.parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value '{}' for {}, using default", value, name);
            default
        }),
        None => default,
    }
}

/// Read a boolean flag. Accepts `1`, `true`, `yes` and `on` (case-insensitive)
pub fn env_flag(name: &str) -> bool {
    env_string(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Read a comma separated list, dropping blank entries
///
/// Returns `None` when the variable is unset or holds no usable entries.
pub fn env_list(name: &str) -> Option<Vec<String>> {
    let items: Vec<String> = env_string(name)?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
