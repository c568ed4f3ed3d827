use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    /// Maximum cluster distance at which an existing feedback is cloned
    /// onto an ungraded item instead of falling back to manual grading.
    pub distance_threshold: f64,
    /// Minimum number of credited items a cluster must have before its
    /// dispersion (and hence the score acceptance window) is defined.
    pub dispersion_threshold_size: usize,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(|| {
            let project_name = env::var("PROJECT_NAME").unwrap_or_else(|_| "assessment-engine".into());
            let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".into());
            let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/engine.log".into());
            let distance_threshold = env::var("DISTANCE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0);
            let dispersion_threshold_size = env::var("DISPERSION_THRESHOLD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                fs::create_dir_all(parent).expect("Failed to create log directory");
            }

            Config {
                project_name,
                log_level,
                log_file,
                distance_threshold,
                dispersion_threshold_size,
            }
        })
    }

    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized")
    }
}
