use std::time::Duration;

use crate::loader::Resolved;
use crate::schema;
use crate::ConfigError;

/// Fully resolved service configuration.
///
/// Built once at startup by [`crate::ConfigLoader`] and only read afterwards.
/// Components should receive the section they need rather than the whole value.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app: AppConfig,
    pub debug: DebugConfig,
    pub mailer: MailerConfig,
    pub http: HttpConfig,
    pub grpc: GrpcConfig,
    pub mongodb: MongoConfig,
    pub mysql: MysqlConfig,
    pub auth: AuthConfig,
    pub facebook: OAuthProviderConfig,
    pub google: OAuthProviderConfig,
    pub command_bus: CommandBusConfig,
    pub event_bus: EventBusConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    pub(crate) fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        Ok(Self {
            app: AppConfig::from_resolved(r)?,
            debug: DebugConfig::from_resolved(r)?,
            mailer: MailerConfig::from_resolved(r)?,
            http: HttpConfig::from_resolved(r)?,
            grpc: GrpcConfig::from_resolved(r)?,
            mongodb: MongoConfig::from_resolved(r)?,
            mysql: MysqlConfig::from_resolved(r)?,
            auth: AuthConfig::from_resolved(r)?,
            facebook: OAuthProviderConfig::from_resolved(
                r,
                &schema::FACEBOOK,
                "FACEBOOK_CLIENT_ID",
                "FACEBOOK_CLIENT_SECRET",
            )?,
            google: OAuthProviderConfig::from_resolved(
                r,
                &schema::GOOGLE,
                "GOOGLE_CLIENT_ID",
                "GOOGLE_CLIENT_SECRET",
            )?,
            command_bus: CommandBusConfig::from_resolved(r)?,
            event_bus: EventBusConfig::from_resolved(r)?,
            logging: LoggingConfig::from_resolved(r)?,
        })
    }
}

/// Application identity
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub domain: String,
    pub environment: String,
    pub shutdown_timeout: Duration,
    pub secret: String,
    pub api_base_url: String,
}

impl AppConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::APP;
        Ok(Self {
            domain: r.string(s, "APP_DOMAIN")?,
            environment: r.string(s, "APP_ENV")?,
            shutdown_timeout: r.duration(s, "APP_SHUTDOWN_TIMEOUT")?,
            secret: r.string(s, "USER_SECRET")?,
            api_base_url: r.string(s, "USER_BASE_URL")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub host: String,
    pub port: u16,
}

impl DebugConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::DEBUG;
        Ok(Self {
            host: r.string(s, "DEBUG_HOST")?,
            port: r.integer(s, "DEBUG_PORT")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outbound mail
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl MailerConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::MAILER;
        Ok(Self {
            host: r.string(s, "MAILER_HOST")?,
            port: r.integer(s, "MAILER_PORT")?,
            user: r.string(s, "MAILER_USER")?,
            password: r.string(s, "MAILER_PASSWORD")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, each `scheme "://" host [ ":" port ]` or `*`.
    pub origins: Vec<String>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
}

impl HttpConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::HTTP;
        Ok(Self {
            host: r.string(s, "HOST")?,
            port: r.integer(s, "HTTP_PORT")?,
            origins: r.list(s, "HTTP_ORIGINS")?,
            read_timeout: r.duration(s, "HTTP_SERVER_READ_TIMEOUT")?,
            write_timeout: r.duration(s, "HTTP_SERVER_WRITE_TIMEOUT")?,
            idle_timeout: r.duration(s, "HTTP_SERVER_SHUTDOWN_TIMEOUT")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.origins.iter().any(|o| o == "*")
    }
}

/// gRPC server and keepalive settings
#[derive(Debug, Clone)]
pub struct GrpcConfig {
    pub host: String,
    pub port: u16,
    /// Clients pinging more often than this are disconnected.
    pub server_min_time: Duration,
    /// Ping a client after it has been idle this long.
    pub server_time: Duration,
    /// How long the server waits for a ping ack.
    pub server_timeout: Duration,
    /// Client ping interval when there is no activity.
    pub conn_time: Duration,
    /// How long the client waits for a ping ack.
    pub conn_timeout: Duration,
}

impl GrpcConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::GRPC;
        Ok(Self {
            host: r.string(s, "GRPC_HOST")?,
            port: r.integer(s, "GRPC_PORT")?,
            server_min_time: r.duration(s, "GRPC_SERVER_MIN_TIME")?,
            server_time: r.duration(s, "GRPC_SERVER_TIME")?,
            server_timeout: r.duration(s, "GRPC_SERVER_TIMEOUT")?,
            conn_time: r.duration(s, "GRPC_CONN_TIME")?,
            conn_timeout: r.duration(s, "GRPC_CONN_TIMEOUT")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MongoConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::MONGODB;
        Ok(Self {
            host: r.string(s, "MONGO_HOST")?,
            port: r.integer(s, "MONGO_PORT")?,
            user: r.string(s, "MONGO_USER")?,
            password: r.string(s, "MONGO_PASS")?,
            database: r.string(s, "MONGO_DATABASE")?,
        })
    }

    /// Create a connection URL for this database configuration
    pub fn connection_url(&self) -> String {
        format!(
            "mongodb://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Maximum amount of time a connection may be reused.
    pub conn_max_lifetime: Duration,
    pub max_idle_conns: usize,
    pub max_open_conns: usize,
}

impl MysqlConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::MYSQL;
        Ok(Self {
            host: r.string(s, "MYSQL_HOST")?,
            port: r.integer(s, "MYSQL_PORT")?,
            user: r.string(s, "MYSQL_USER")?,
            password: r.string(s, "MYSQL_PASS")?,
            database: r.string(s, "MYSQL_DATABASE")?,
            conn_max_lifetime: r.duration(s, "MYSQL_CONN_MAX_LIFETIME")?,
            max_idle_conns: r.integer(s, "MYSQL_MAX_IDLE_CONNS")?,
            max_open_conns: r.integer(s, "MYSQL_MAX_OPEN_CONNS")?,
        })
    }

    /// Driver DSN in `user:pass@tcp(host:port)/db` form.
    pub fn dsn(&self) -> String {
        format!(
            "{}:{}@tcp({}:{})/{}?parseTime=true",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub host: String,
    pub secret: String,
}

impl AuthConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::AUTH;
        Ok(Self {
            host: r.string(s, "AUTH_HOST")?,
            secret: r.string(s, "AUTH_SECRET")?,
        })
    }
}

/// Client credentials for one OAuth provider. Both are empty when unset.
#[derive(Debug, Clone, Default)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthProviderConfig {
    fn from_resolved(
        r: &Resolved,
        s: &schema::SectionSpec,
        id_key: &'static str,
        secret_key: &'static str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: r.string(s, id_key)?,
            client_secret: r.string(s, secret_key)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CommandBusConfig {
    /// Zero at resolution time is replaced by the available parallelism.
    pub queue_size: usize,
}

impl CommandBusConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_size: r.integer(&schema::COMMAND_BUS, schema::BUS_BUFFER_KEY)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Zero at resolution time is replaced by the available parallelism.
    pub queue_size: usize,
}

impl EventBusConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_size: r.integer(&schema::EVENT_BUS, schema::BUS_BUFFER_KEY)?,
        })
    }
}

/// Logging Configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Extra `target=level` filter directives.
    pub directives: Vec<String>,
}

impl LoggingConfig {
    fn from_resolved(r: &Resolved) -> Result<Self, ConfigError> {
        let s = &schema::LOGGING;
        Ok(Self {
            level: r.string(s, "LOG_LEVEL")?,
            format: r.string(s, "LOG_FORMAT")?,
            directives: r.list(s, "LOG_DIRECTIVES")?,
        })
    }

    /// Filter string for an env-filter: the base level followed by each directive.
    pub fn filter(&self) -> String {
        let mut filter = self.level.clone();
        for directive in self.directives.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
            filter.push(',');
            filter.push_str(directive);
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directives: Vec::new(),
        }
    }
}
