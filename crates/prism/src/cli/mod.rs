//! Command handlers for the `prism` binary.

pub mod backend;
pub mod config;
pub mod health;
pub mod supervise;
pub mod transform;
pub mod versions;

use console::Style;
use prism_core::HealthStatus;

/// One-line colored rendering of a health status.
pub(crate) fn format_health(status: &HealthStatus) -> String {
    if status.online {
        Style::new().green().apply_to(format!("● {}", status.message)).to_string()
    } else {
        Style::new().red().apply_to(format!("● {}", status.message)).to_string()
    }
}
