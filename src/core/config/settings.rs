use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_f64, parse_run_store,
    parse_u16, parse_u32, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, DatabaseSettings, OrchestrationSettings, RedisSettings,
    RuntimeSettings, ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("AYATEST_HOST", "0.0.0.0");
        let port = env_or_default("AYATEST_PORT", "8000");

        let environment =
            parse_environment(env_optional("AYATEST_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("AYATEST_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Ayatest Sessions");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "ayatest");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "ayatest_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let log_level = env_or_default("AYATEST_LOG_LEVEL", "info");
        let json =
            env_optional("AYATEST_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let run_store = parse_run_store(env_or_default("RUN_STORE", "postgres"))?;
        let retry_initial_ms = parse_u64(
            "ACTIVITY_RETRY_INITIAL_MS",
            env_or_default("ACTIVITY_RETRY_INITIAL_MS", "1000"),
        )?;
        let retry_backoff =
            parse_f64("ACTIVITY_RETRY_BACKOFF", env_or_default("ACTIVITY_RETRY_BACKOFF", "2.0"))?;
        let retry_max_interval_ms = parse_u64(
            "ACTIVITY_RETRY_MAX_INTERVAL_MS",
            env_or_default("ACTIVITY_RETRY_MAX_INTERVAL_MS", "60000"),
        )?;
        let retry_max_attempts = parse_u32(
            "ACTIVITY_RETRY_MAX_ATTEMPTS",
            env_or_default("ACTIVITY_RETRY_MAX_ATTEMPTS", "3"),
        )?;
        let default_session_minutes = parse_u32(
            "DEFAULT_SESSION_MINUTES",
            env_or_default("DEFAULT_SESSION_MINUTES", "45"),
        )?;
        let reminder_minutes =
            parse_u32("REMINDER_MINUTES", env_or_default("REMINDER_MINUTES", "5"))?;
        let resume_on_startup = env_optional("RESUME_RUNS_ON_STARTUP")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
            orchestration: OrchestrationSettings {
                run_store,
                retry_initial_ms,
                retry_backoff,
                retry_max_interval_ms,
                retry_max_attempts,
                default_session_minutes,
                reminder_minutes,
                resume_on_startup,
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn orchestration(&self) -> &OrchestrationSettings {
        &self.orchestration
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let orchestration = &self.orchestration;

        if orchestration.retry_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ACTIVITY_RETRY_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if orchestration.retry_backoff < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "ACTIVITY_RETRY_BACKOFF",
                value: orchestration.retry_backoff.to_string(),
            });
        }

        if orchestration.retry_max_interval_ms < orchestration.retry_initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "ACTIVITY_RETRY_MAX_INTERVAL_MS",
                value: orchestration.retry_max_interval_ms.to_string(),
            });
        }

        if orchestration.default_session_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DEFAULT_SESSION_MINUTES",
                value: "0".to_string(),
            });
        }

        if orchestration.reminder_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REMINDER_MINUTES",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}
