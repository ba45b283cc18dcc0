//! Declarative table of every configuration field the service reads.
//!
//! The loader walks [`SCHEMA`] section by section; nothing else decides which
//! environment variables exist or what they default to.

/// Target type of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Duration,
    StringList { separator: char },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Duration => "duration",
            FieldKind::StringList { .. } => "string list",
        }
    }
}

/// One configuration value: where it comes from and how to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    /// Literal in source form. `None` means an unset variable resolves to the
    /// kind's zero value.
    pub default: Option<&'static str>,
    /// Sensitive values are never written to logs.
    pub sensitive: bool,
}

impl FieldSpec {
    const fn new(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            default: None,
            sensitive: false,
        }
    }

    pub const fn string(key: &'static str) -> Self {
        Self::new(key, FieldKind::String)
    }

    pub const fn integer(key: &'static str) -> Self {
        Self::new(key, FieldKind::Integer)
    }

    pub const fn duration(key: &'static str) -> Self {
        Self::new(key, FieldKind::Duration)
    }

    pub const fn list(key: &'static str, separator: char) -> Self {
        Self::new(key, FieldKind::StringList { separator })
    }

    pub const fn with_default(self, value: &'static str) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    pub const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }
}

/// A named, ordered group of fields.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl SectionSpec {
    pub fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

pub const APP: SectionSpec = SectionSpec {
    name: "app",
    fields: &[
        FieldSpec::string("APP_DOMAIN").with_default("https://go-api-boilerplate.local"),
        FieldSpec::string("APP_ENV").with_default("development"),
        FieldSpec::duration("APP_SHUTDOWN_TIMEOUT").with_default("5s"),
        FieldSpec::string("USER_SECRET").with_default("secret").sensitive(),
        FieldSpec::string("USER_BASE_URL").with_default("https://api.go-api-boilerplate.local/users"),
    ],
};

pub const DEBUG: SectionSpec = SectionSpec {
    name: "debug",
    fields: &[
        FieldSpec::string("DEBUG_HOST").with_default("0.0.0.0"),
        FieldSpec::integer("DEBUG_PORT").with_default("4000"),
    ],
};

pub const MAILER: SectionSpec = SectionSpec {
    name: "mailer",
    fields: &[
        FieldSpec::string("MAILER_HOST").with_default("0.0.0.0"),
        FieldSpec::integer("MAILER_PORT").with_default("1025"),
        FieldSpec::string("MAILER_USER").with_default("example@email.test"),
        FieldSpec::string("MAILER_PASSWORD").with_default("password").sensitive(),
    ],
};

pub const HTTP: SectionSpec = SectionSpec {
    name: "http",
    fields: &[
        FieldSpec::string("HOST").with_default("0.0.0.0"),
        FieldSpec::integer("HTTP_PORT").with_default("3000"),
        // scheme "://" host [ ":" port ]
        FieldSpec::list("HTTP_ORIGINS", '|').with_default("*"),
        FieldSpec::duration("HTTP_SERVER_READ_TIMEOUT").with_default("5s"),
        FieldSpec::duration("HTTP_SERVER_WRITE_TIMEOUT").with_default("10s"),
        FieldSpec::duration("HTTP_SERVER_SHUTDOWN_TIMEOUT").with_default("120s"),
    ],
};

pub const GRPC: SectionSpec = SectionSpec {
    name: "grpc",
    fields: &[
        FieldSpec::string("GRPC_HOST").with_default("0.0.0.0"),
        FieldSpec::integer("GRPC_PORT").with_default("3001"),
        FieldSpec::duration("GRPC_SERVER_MIN_TIME").with_default("5m"),
        FieldSpec::duration("GRPC_SERVER_TIME").with_default("2h"),
        FieldSpec::duration("GRPC_SERVER_TIMEOUT").with_default("20s"),
        FieldSpec::duration("GRPC_CONN_TIME").with_default("10s"),
        FieldSpec::duration("GRPC_CONN_TIMEOUT").with_default("20s"),
    ],
};

pub const MONGODB: SectionSpec = SectionSpec {
    name: "mongodb",
    fields: &[
        FieldSpec::string("MONGO_HOST").with_default("0.0.0.0"),
        FieldSpec::integer("MONGO_PORT").with_default("27017"),
        FieldSpec::string("MONGO_USER").with_default("root"),
        FieldSpec::string("MONGO_PASS").with_default("password").sensitive(),
        FieldSpec::string("MONGO_DATABASE").with_default("user"),
    ],
};

pub const MYSQL: SectionSpec = SectionSpec {
    name: "mysql",
    fields: &[
        FieldSpec::string("MYSQL_HOST").with_default("0.0.0.0"),
        FieldSpec::integer("MYSQL_PORT").with_default("3306"),
        FieldSpec::string("MYSQL_USER").with_default("root"),
        FieldSpec::string("MYSQL_PASS").with_default("password").sensitive(),
        FieldSpec::string("MYSQL_DATABASE").with_default("goapiboilerplate"),
        FieldSpec::duration("MYSQL_CONN_MAX_LIFETIME").with_default("5m"),
        FieldSpec::integer("MYSQL_MAX_IDLE_CONNS").with_default("0"),
        FieldSpec::integer("MYSQL_MAX_OPEN_CONNS").with_default("5"),
    ],
};

pub const AUTH: SectionSpec = SectionSpec {
    name: "auth",
    fields: &[
        FieldSpec::string("AUTH_HOST").with_default("0.0.0.0"),
        FieldSpec::string("AUTH_SECRET").with_default("secret").sensitive(),
    ],
};

pub const FACEBOOK: SectionSpec = SectionSpec {
    name: "facebook",
    fields: &[
        FieldSpec::string("FACEBOOK_CLIENT_ID"),
        FieldSpec::string("FACEBOOK_CLIENT_SECRET").sensitive(),
    ],
};

pub const GOOGLE: SectionSpec = SectionSpec {
    name: "google",
    fields: &[
        FieldSpec::string("GOOGLE_CLIENT_ID"),
        FieldSpec::string("GOOGLE_CLIENT_SECRET").sensitive(),
    ],
};

/// Shared by the command bus and the event bus.
pub const BUS_BUFFER_KEY: &str = "COMMAND_BUS_BUFFER";

pub const COMMAND_BUS: SectionSpec = SectionSpec {
    name: "command_bus",
    fields: &[FieldSpec::integer(BUS_BUFFER_KEY).with_default("0")],
};

pub const EVENT_BUS: SectionSpec = SectionSpec {
    name: "event_bus",
    fields: &[FieldSpec::integer(BUS_BUFFER_KEY).with_default("0")],
};

pub const LOGGING: SectionSpec = SectionSpec {
    name: "logging",
    fields: &[
        FieldSpec::string("LOG_LEVEL").with_default("info"),
        FieldSpec::string("LOG_FORMAT").with_default("pretty"),
        // e.g. "config=debug,service=trace"
        FieldSpec::list("LOG_DIRECTIVES", ','),
    ],
};

pub const SCHEMA: &[SectionSpec] = &[
    APP,
    DEBUG,
    MAILER,
    HTTP,
    GRPC,
    MONGODB,
    MYSQL,
    AUTH,
    FACEBOOK,
    GOOGLE,
    COMMAND_BUS,
    EVENT_BUS,
    LOGGING,
];

pub fn section(name: &str) -> Option<&'static SectionSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}
