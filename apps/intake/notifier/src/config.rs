//! Settings loaded from the environment

use core_config::server::ServerConfig;
use core_config::{
    ConfigError, Environment, FromEnv, env_duration_secs, env_flag, env_optional, env_or_default,
    env_parse, env_required,
};
use domain_intake::{IntakeResult, Monitor, ServiceAccountKey};
use email::{SendPolicy, SmtpConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Where a service-account key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    File(PathBuf),
    /// Base64-encoded key JSON
    Inline(String),
}

impl KeySource {
    /// `{PREFIX}_SERVICE_ACCOUNT_KEY_FILE` wins over `{PREFIX}_SERVICE_ACCOUNT_KEY`
    fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let file_key = format!("{}_SERVICE_ACCOUNT_KEY_FILE", prefix);
        let inline_key = format!("{}_SERVICE_ACCOUNT_KEY", prefix);

        if let Some(path) = env_optional(&file_key) {
            return Ok(KeySource::File(PathBuf::from(path)));
        }
        env_optional(&inline_key)
            .map(KeySource::Inline)
            .ok_or_else(|| ConfigError::MissingEnvVar(format!("{} or {}", file_key, inline_key)))
    }

    pub fn load(&self) -> IntakeResult<ServiceAccountKey> {
        match self {
            KeySource::File(path) => ServiceAccountKey::from_file(path),
            KeySource::Inline(encoded) => ServiceAccountKey::from_base64(encoded),
        }
    }
}

/// A Firebase project and the credentials to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub project_id: String,
    pub key: KeySource,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub smtp: SmtpConfig,
    /// Project holding enrollment applications
    pub enrollment: ProjectConfig,
    pub enrollment_collection: String,
    pub enrollment_interval: Duration,
    /// Association project; its monitors only run when this is set
    pub association: Option<ProjectConfig>,
    pub association_interval: Duration,
    pub templates_dir: PathBuf,
    pub send_policy: SendPolicy,
    pub record_concurrency: usize,
}

fn smtp_from_env() -> Result<SmtpConfig, ConfigError> {
    let username = env_or_default("SMTP_USER", "");
    let from_email = env_optional("EMAIL_FROM_ADDRESS")
        .or_else(|| Some(username.clone()).filter(|u| !u.is_empty()))
        .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_FROM_ADDRESS or SMTP_USER".to_string()))?;

    Ok(SmtpConfig {
        host: env_required("SMTP_HOST")?,
        port: env_parse("SMTP_PORT", 587u16)?,
        username,
        password: env_or_default("SMTP_PASSWORD", ""),
        from_email,
        from_name: env_or_default("EMAIL_FROM_NAME", "Notifications"),
        use_tls: env_flag("SMTP_USE_TLS", true)?,
    })
}

fn send_policy_from_env() -> Result<SendPolicy, ConfigError> {
    let max_attempts: u32 = env_parse("SEND_MAX_ATTEMPTS", 1)?;
    if max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "SEND_MAX_ATTEMPTS must be at least 1".to_string(),
        ));
    }

    Ok(SendPolicy {
        timeout: env_duration_secs("SEND_TIMEOUT_SECS", 30)?,
        max_attempts,
        backoff: Duration::from_millis(env_parse("SEND_BACKOFF_MS", 1000u64)?),
    })
}

impl FromEnv for NotifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let enrollment = ProjectConfig {
            project_id: env_required("FIREBASE_PROJECT_ID")?,
            key: KeySource::from_env("FIREBASE")?,
        };

        let association = match env_optional("ASSOCIATION_PROJECT_ID") {
            Some(project_id) => Some(ProjectConfig {
                project_id,
                key: KeySource::from_env("ASSOCIATION")?,
            }),
            None => None,
        };

        let record_concurrency: usize = env_parse("RECORD_CONCURRENCY", 1)?;
        if record_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "RECORD_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            smtp: smtp_from_env()?,
            enrollment,
            enrollment_collection: env_required("FIREBASE_COLLECTION")?,
            enrollment_interval: env_duration_secs("ENROLLMENT_POLL_INTERVAL_SECS", 300)?,
            association,
            association_interval: env_duration_secs("ASSOCIATION_POLL_INTERVAL_SECS", 60)?,
            templates_dir: PathBuf::from(env_or_default("TEMPLATES_DIR", "templates")),
            send_policy: send_policy_from_env()?,
            record_concurrency,
        })
    }
}

impl NotifierConfig {
    /// Enabled monitors, enrollment first
    pub fn monitors(&self) -> Vec<Monitor> {
        let mut monitors = vec![Monitor::enrollment(
            self.enrollment_collection.clone(),
            self.enrollment_interval,
        )];
        if self.association.is_some() {
            monitors.push(Monitor::contact_messages(self.association_interval));
            monitors.push(Monitor::admin_notifications(self.association_interval));
        }
        monitors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_intake::MonitorKind;

    const ALL_KEYS: [&str; 20] = [
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USER",
        "SMTP_PASSWORD",
        "SMTP_USE_TLS",
        "EMAIL_FROM_ADDRESS",
        "EMAIL_FROM_NAME",
        "FIREBASE_PROJECT_ID",
        "FIREBASE_SERVICE_ACCOUNT_KEY_FILE",
        "FIREBASE_SERVICE_ACCOUNT_KEY",
        "FIREBASE_COLLECTION",
        "ASSOCIATION_PROJECT_ID",
        "ASSOCIATION_SERVICE_ACCOUNT_KEY_FILE",
        "ASSOCIATION_SERVICE_ACCOUNT_KEY",
        "ENROLLMENT_POLL_INTERVAL_SECS",
        "ASSOCIATION_POLL_INTERVAL_SECS",
        "SEND_TIMEOUT_SECS",
        "SEND_MAX_ATTEMPTS",
        "SEND_BACKOFF_MS",
        "RECORD_CONCURRENCY",
    ];

    /// Clear every notifier variable, then apply `vars`
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let mut all: Vec<(&str, Option<&str>)> = ALL_KEYS.iter().map(|k| (*k, None)).collect();
        for (key, value) in vars {
            all.retain(|(k, _)| k != key);
            all.push((*key, Some(*value)));
        }
        temp_env::with_vars(all, f);
    }

    const MINIMAL: [(&str, &str); 5] = [
        ("SMTP_HOST", "smtp.example.com"),
        ("SMTP_USER", "notifier@example.com"),
        ("FIREBASE_PROJECT_ID", "enrollment-prod"),
        ("FIREBASE_SERVICE_ACCOUNT_KEY_FILE", "/secrets/enrollment.json"),
        ("FIREBASE_COLLECTION", "inscricoes"),
    ];

    #[test]
    fn test_minimal_config_uses_defaults() {
        with_env(&MINIMAL, || {
            let config = NotifierConfig::from_env().unwrap();

            assert_eq!(config.smtp.port, 587);
            assert!(config.smtp.use_tls);
            assert_eq!(config.smtp.from_email, "notifier@example.com");
            assert_eq!(config.smtp.from_name, "Notifications");
            assert_eq!(
                config.enrollment.key,
                KeySource::File(PathBuf::from("/secrets/enrollment.json"))
            );
            assert_eq!(config.enrollment_interval, Duration::from_secs(300));
            assert_eq!(config.association_interval, Duration::from_secs(60));
            assert_eq!(config.send_policy, SendPolicy::default());
            assert_eq!(config.record_concurrency, 1);
            assert!(config.association.is_none());

            let monitors = config.monitors();
            assert_eq!(monitors.len(), 1);
            assert_eq!(monitors[0].collection, "inscricoes");
        });
    }

    #[test]
    fn test_association_project_enables_its_monitors() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("ASSOCIATION_PROJECT_ID", "association-prod"),
            ("ASSOCIATION_SERVICE_ACCOUNT_KEY", "eyJ9"),
            ("ASSOCIATION_POLL_INTERVAL_SECS", "15"),
        ]);

        with_env(&vars, || {
            let config = NotifierConfig::from_env().unwrap();
            let association = config.association.clone().unwrap();
            assert_eq!(association.key, KeySource::Inline("eyJ9".to_string()));

            let kinds: Vec<MonitorKind> = config.monitors().iter().map(|m| m.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    MonitorKind::Enrollment,
                    MonitorKind::ContactMessages,
                    MonitorKind::AdminNotifications
                ]
            );
            assert_eq!(config.monitors()[1].interval, Duration::from_secs(15));
        });
    }

    #[test]
    fn test_association_without_key_is_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("ASSOCIATION_PROJECT_ID", "association-prod"));

        with_env(&vars, || {
            let err = NotifierConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("ASSOCIATION_SERVICE_ACCOUNT_KEY"));
        });
    }

    #[test]
    fn test_missing_smtp_host_names_the_key() {
        let vars: Vec<(&str, &str)> = MINIMAL.iter().copied().filter(|(k, _)| *k != "SMTP_HOST").collect();

        with_env(&vars, || {
            let err = NotifierConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "SMTP_HOST"));
        });
    }

    #[test]
    fn test_send_policy_overrides() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("SEND_TIMEOUT_SECS", "10"),
            ("SEND_MAX_ATTEMPTS", "3"),
            ("SEND_BACKOFF_MS", "250"),
            ("RECORD_CONCURRENCY", "4"),
            ("SMTP_USE_TLS", "false"),
            ("EMAIL_FROM_ADDRESS", "secretaria@example.com"),
        ]);

        with_env(&vars, || {
            let config = NotifierConfig::from_env().unwrap();
            assert_eq!(config.send_policy.timeout, Duration::from_secs(10));
            assert_eq!(config.send_policy.max_attempts, 3);
            assert_eq!(config.send_policy.backoff, Duration::from_millis(250));
            assert_eq!(config.record_concurrency, 4);
            assert!(!config.smtp.use_tls);
            assert_eq!(config.smtp.from_email, "secretaria@example.com");
        });
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("SEND_MAX_ATTEMPTS", "0"));

        with_env(&vars, || {
            assert!(matches!(
                NotifierConfig::from_env(),
                Err(ConfigError::Invalid(_))
            ));
        });
    }
}
