use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use flowgate_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries = effective_entries(&config);
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        lines.push(render_line(
            key,
            &value,
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn effective_entries(config: &AppConfig) -> Vec<(&'static str, String, &'static [&'static str])> {
    let key_source = match (&config.flows.private_key_pem, &config.flows.private_key_path) {
        (Some(_), _) => "<redacted inline pem>".to_string(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => "<unset>".to_string(),
    };

    vec![
        entry("database.url", config.database.url.clone(), &["FLOWGATE_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["FLOWGATE_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["FLOWGATE_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["FLOWGATE_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["FLOWGATE_SERVER_PORT"]),
        entry(
            "server.webhook_path",
            config.server.webhook_path.clone(),
            &["FLOWGATE_SERVER_WEBHOOK_PATH"],
        ),
        entry(
            "flows.private_key",
            key_source,
            &["FLOWGATE_FLOWS_PRIVATE_KEY_PEM", "FLOWGATE_FLOWS_PRIVATE_KEY_PATH"],
        ),
        entry(
            "flows.session_ttl_secs",
            config.flows.session_ttl_secs.to_string(),
            &["FLOWGATE_FLOWS_SESSION_TTL_SECS"],
        ),
        entry(
            "flows.sweep_interval_secs",
            config.flows.sweep_interval_secs.to_string(),
            &["FLOWGATE_FLOWS_SWEEP_INTERVAL_SECS"],
        ),
        entry("calendar.enabled", config.calendar.enabled.to_string(), &["FLOWGATE_CALENDAR_ENABLED"]),
        entry(
            "calendar.base_url",
            config.calendar.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["FLOWGATE_CALENDAR_BASE_URL"],
        ),
        entry(
            "calendar.api_key",
            redact(config.calendar.api_key.is_some()),
            &["FLOWGATE_CALENDAR_API_KEY"],
        ),
        entry(
            "notifier.webhook_url",
            config.notifier.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["FLOWGATE_NOTIFIER_WEBHOOK_URL"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["FLOWGATE_LOGGING_LEVEL", "FLOWGATE_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["FLOWGATE_LOGGING_FORMAT", "FLOWGATE_LOG_FORMAT"],
        ),
    ]
}

fn entry(
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key, value, env_keys)
}

fn redact(present: bool) -> String {
    if present { "<redacted>" } else { "<unset>" }.to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    ["flowgate.toml", "config/flowgate.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        let file_keys: &[&str] = if key_path == "flows.private_key" {
            &["flows.private_key_pem", "flows.private_key_path"]
        } else {
            &[key_path]
        };
        if file_keys.iter().any(|key| contains_path(doc, key)) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
