//! Logging initialization module
//!
//! Provides a single initialization point for the logging facility.

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

const DEFAULT_DEV_FILTER: &str = "kestrel_core=debug,kestrel_store=debug,kestrel_engine=debug";
const DEFAULT_PROD_FILTER: &str = "kestrel_core=info,kestrel_store=info,kestrel_engine=info";

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Human-readable output for development
    #[default]
    Development,
    /// JSON structured output for production
    Production,
    /// Test capture mode for deterministic testing
    Test,
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// This function should be called once at application startup.
/// It sets up the tracing subscriber based on the selected profile.
/// `RUST_LOG` overrides the default filter of either profile.
///
/// # Example
///
/// ```
/// use kestrel_core::logging_facility::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DEV_FILTER)),
                )
                .finish()
                .try_init()
                .ok();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_PROD_FILTER)),
                )
                .finish()
                .try_init()
                .ok();
        }
        Profile::Test => {
            // Test capture installs its own subscriber via init_test_capture()
            tracing_subscriber::registry().try_init().ok();
        }
    });
}
