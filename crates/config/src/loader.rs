//! Resolution of the schema against an environment.
//!
//! A [`ConfigLoader`] is used exactly once: [`ConfigLoader::load`] consumes it
//! and returns either a complete [`ServiceConfig`] or the first
//! [`ConfigError`] encountered. There is no partially loaded configuration.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::env::{EnvSource, NotUnicode, ProcessEnv};
use crate::schema::{FieldSpec, SectionSpec, SCHEMA};
use crate::types::ServiceConfig;
use crate::value::{convert, Value, ValueError};
use crate::ConfigError;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Environment,
    Default,
    /// Unset with no declared default.
    Zero,
}

impl ValueSource {
    fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Environment => "environment",
            ValueSource::Default => "default",
            ValueSource::Zero => "zero value",
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedField {
    value: Value,
    source: ValueSource,
}

/// Every schema field converted to its kind, keyed by section and env key.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    fields: HashMap<(&'static str, &'static str), ResolvedField>,
}

impl Resolved {
    fn get(
        &self,
        section: &SectionSpec,
        key: &'static str,
        expected: &'static str,
    ) -> Result<&Value, ConfigError> {
        self.fields
            .get(&(section.name, key))
            .map(|f| &f.value)
            .ok_or(ConfigError::UndeclaredField {
                section: section.name,
                key,
                expected,
            })
    }

    fn mismatch(section: &SectionSpec, key: &'static str, expected: &'static str) -> ConfigError {
        ConfigError::UndeclaredField {
            section: section.name,
            key,
            expected,
        }
    }

    pub fn source(&self, section: &SectionSpec, key: &'static str) -> Option<ValueSource> {
        self.fields.get(&(section.name, key)).map(|f| f.source)
    }

    pub fn string(&self, section: &SectionSpec, key: &'static str) -> Result<String, ConfigError> {
        match self.get(section, key, "string")? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(Self::mismatch(section, key, "string")),
        }
    }

    /// Integer narrowed to `T`.
    ///
    /// A value that parses as `i64` but does not fit `T` (a negative queue
    /// size, a port above 65535) is reported as [`ConfigError::Conversion`]
    /// with [`ValueError::OutOfRange`].
    pub fn integer<T: TryFrom<i64>>(
        &self,
        section: &SectionSpec,
        key: &'static str,
    ) -> Result<T, ConfigError> {
        match self.get(section, key, "integer")? {
            Value::Integer(n) => T::try_from(*n).map_err(|_| ConfigError::Conversion {
                section: section.name,
                key,
                value: n.to_string(),
                reason: ValueError::OutOfRange {
                    value: *n,
                    target: std::any::type_name::<T>(),
                },
            }),
            _ => Err(Self::mismatch(section, key, "integer")),
        }
    }

    pub fn duration(
        &self,
        section: &SectionSpec,
        key: &'static str,
    ) -> Result<Duration, ConfigError> {
        match self.get(section, key, "duration")? {
            Value::Duration(d) => Ok(*d),
            _ => Err(Self::mismatch(section, key, "duration")),
        }
    }

    pub fn list(
        &self,
        section: &SectionSpec,
        key: &'static str,
    ) -> Result<Vec<String>, ConfigError> {
        match self.get(section, key, "string list")? {
            Value::List(items) => Ok(items.clone()),
            _ => Err(Self::mismatch(section, key, "string list")),
        }
    }
}

pub struct ConfigLoader<E> {
    env: E,
    schema: &'static [SectionSpec],
    parallelism: Option<NonZeroUsize>,
}

impl ConfigLoader<ProcessEnv> {
    pub fn from_process_env() -> Self {
        Self::new(ProcessEnv)
    }
}

impl<E: EnvSource> ConfigLoader<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            schema: SCHEMA,
            parallelism: None,
        }
    }

    /// Resolve against a different field table. `load` still expects every
    /// section of the service schema to be present.
    #[cfg(test)]
    fn with_schema(mut self, schema: &'static [SectionSpec]) -> Self {
        self.schema = schema;
        self
    }

    /// Override the detected parallelism used by the derivation pass.
    pub fn with_parallelism(mut self, parallelism: NonZeroUsize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Read and convert every field of the schema.
    pub fn resolve(self) -> Result<Resolved, ConfigError> {
        let mut raw_cache: HashMap<&'static str, Result<Option<String>, NotUnicode>> =
            HashMap::new();
        let mut resolved = Resolved::default();

        for section in self.schema {
            for field in section.fields {
                // Fields sharing a key must see the same raw value.
                let env_value = match raw_cache
                    .entry(field.key)
                    .or_insert_with(|| self.env.var(field.key))
                    .clone()
                {
                    Ok(value) => value.filter(|v| !v.is_empty()),
                    Err(NotUnicode { lossy }) => {
                        tracing::error!(
                            section = section.name,
                            key = field.key,
                            "Configuration value is not valid unicode"
                        );
                        return Err(ConfigError::Conversion {
                            section: section.name,
                            key: field.key,
                            value: lossy,
                            reason: ValueError::NotUnicode,
                        });
                    }
                };
                let entry = resolve_field(section, field, env_value)?;
                resolved.fields.insert((section.name, field.key), entry);
            }
        }

        Ok(resolved)
    }

    /// Resolve the schema, build the typed snapshot and run the derivation pass.
    pub fn load(self) -> Result<ServiceConfig, ConfigError> {
        let parallelism = self.parallelism.unwrap_or_else(available_parallelism);
        let resolved = self.resolve()?;
        let mut config = ServiceConfig::from_resolved(&resolved)?;
        derive_queue_capacities(&mut config, parallelism);
        Ok(config)
    }
}

fn resolve_field(
    section: &SectionSpec,
    field: &FieldSpec,
    env_value: Option<String>,
) -> Result<ResolvedField, ConfigError> {
    let (raw, source) = match (env_value, field.default) {
        (Some(value), _) => (value, ValueSource::Environment),
        (None, Some(default)) => (default.to_string(), ValueSource::Default),
        (None, None) => {
            tracing::debug!(
                section = section.name,
                key = field.key,
                source = ValueSource::Zero.as_str(),
                "Resolved configuration field"
            );
            return Ok(ResolvedField {
                value: Value::zero(field.kind),
                source: ValueSource::Zero,
            });
        }
    };

    let value = convert(field.kind, &raw).map_err(|reason| {
        tracing::error!(
            section = section.name,
            key = field.key,
            kind = field.kind.name(),
            error = %reason,
            "Failed to convert configuration field"
        );
        ConfigError::Conversion {
            section: section.name,
            key: field.key,
            value: raw.clone(),
            reason,
        }
    })?;

    if field.sensitive {
        tracing::debug!(
            section = section.name,
            key = field.key,
            source = source.as_str(),
            "Resolved configuration field"
        );
    } else {
        tracing::debug!(
            section = section.name,
            key = field.key,
            source = source.as_str(),
            value = %raw,
            "Resolved configuration field"
        );
    }

    Ok(ResolvedField { value, source })
}

/// Number of logical CPUs usable by this process, or 1 if it cannot be determined.
pub fn available_parallelism() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not determine available parallelism, using 1");
        NonZeroUsize::MIN
    })
}

/// Replace zero queue capacities with `parallelism`. Nonzero values are kept.
pub fn derive_queue_capacities(config: &mut ServiceConfig, parallelism: NonZeroUsize) {
    for (name, queue_size) in [
        ("command_bus", &mut config.command_bus.queue_size),
        ("event_bus", &mut config.event_bus.queue_size),
    ] {
        if *queue_size == 0 {
            *queue_size = parallelism.get();
            tracing::info!(
                section = name,
                queue_size = *queue_size,
                "Derived queue size from available parallelism"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec, BUS_BUFFER_KEY, COMMAND_BUS, EVENT_BUS, HTTP};
    use std::cell::RefCell;

    fn parallelism(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let env: HashMap<&str, &str> = vars.iter().copied().collect();
        ConfigLoader::new(env).with_parallelism(parallelism(8)).load()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.http.port, 3000);
        assert_eq!(config.grpc.port, 3001);
        assert_eq!(config.http.origins, vec!["*"]);
        assert_eq!(config.app.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.command_bus.queue_size, 8);
        assert_eq!(config.event_bus.queue_size, 8);
    }

    #[test]
    fn test_env_overrides_default() {
        let config = load(&[("HTTP_PORT", "8080"), ("APP_SHUTDOWN_TIMEOUT", "30s")]).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.app.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_env_value_falls_back_to_default() {
        let config = load(&[("HTTP_PORT", ""), ("HTTP_ORIGINS", "")]).unwrap();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.http.origins, vec!["*"]);
    }

    #[test]
    fn test_origins_split_in_order() {
        let config = load(&[("HTTP_ORIGINS", "https://a.test|https://b.test")]).unwrap();
        assert_eq!(config.http.origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn test_invalid_integer_aborts_load() {
        let err = load(&[("HTTP_PORT", "notanumber")]).unwrap_err();
        match err {
            ConfigError::Conversion {
                section,
                key,
                value,
                reason,
            } => {
                assert_eq!(section, "http");
                assert_eq!(key, "HTTP_PORT");
                assert_eq!(value, "notanumber");
                assert!(matches!(reason, ValueError::Integer(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_duration_aborts_load() {
        let err = load(&[("HTTP_SERVER_READ_TIMEOUT", "5x")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conversion {
                key: "HTTP_SERVER_READ_TIMEOUT",
                reason: ValueError::Duration(_),
                ..
            }
        ));
        assert!(err.to_string().contains("5x"));
    }

    #[test]
    fn test_port_out_of_range_is_conversion_failure() {
        let err = load(&[("GRPC_PORT", "70000")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conversion {
                key: "GRPC_PORT",
                reason: ValueError::OutOfRange { value: 70000, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_negative_queue_size_is_rejected() {
        let err = load(&[(BUS_BUFFER_KEY, "-1")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conversion {
                section: "command_bus",
                ..
            }
        ));
    }

    #[test]
    fn test_nonzero_queue_size_is_kept() {
        let config = load(&[(BUS_BUFFER_KEY, "250")]).unwrap();
        assert_eq!(config.command_bus.queue_size, 250);
        assert_eq!(config.event_bus.queue_size, 250);
    }

    #[test]
    fn test_explicit_zero_queue_size_is_derived() {
        let config = load(&[(BUS_BUFFER_KEY, "0")]).unwrap();
        assert_eq!(config.command_bus.queue_size, 8);
        assert_eq!(config.event_bus.queue_size, 8);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let mut config = load(&[]).unwrap();
        derive_queue_capacities(&mut config, parallelism(3));
        assert_eq!(config.command_bus.queue_size, 8);
        assert_eq!(config.event_bus.queue_size, 8);

        config.event_bus.queue_size = 0;
        derive_queue_capacities(&mut config, parallelism(3));
        assert_eq!(config.command_bus.queue_size, 8);
        assert_eq!(config.event_bus.queue_size, 3);
    }

    #[test]
    fn test_detected_parallelism_is_positive() {
        assert!(available_parallelism().get() >= 1);
    }

    /// Returns a different value on every read of the same key.
    struct ChangingEnv {
        reads: RefCell<usize>,
    }

    impl EnvSource for ChangingEnv {
        fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
            if key != BUS_BUFFER_KEY {
                return Ok(None);
            }
            let mut reads = self.reads.borrow_mut();
            *reads += 1;
            Ok(Some((*reads * 100).to_string()))
        }
    }

    /// Holds undecodable bytes for a single key.
    struct BadBytesEnv(&'static str);

    impl EnvSource for BadBytesEnv {
        fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
            if key == self.0 {
                Err(NotUnicode {
                    lossy: "https://a.test|\u{FFFD}".to_string(),
                })
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn test_non_unicode_value_aborts_load() {
        let err = ConfigLoader::new(BadBytesEnv("HTTP_ORIGINS"))
            .with_parallelism(parallelism(2))
            .load()
            .unwrap_err();
        match err {
            ConfigError::Conversion {
                section,
                key,
                value,
                reason,
            } => {
                assert_eq!(section, "http");
                assert_eq!(key, "HTTP_ORIGINS");
                assert_eq!(value, "https://a.test|\u{FFFD}");
                assert_eq!(reason, ValueError::NotUnicode);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_unicode_value_for_field_without_default_aborts_load() {
        let err = ConfigLoader::new(BadBytesEnv("GOOGLE_CLIENT_SECRET"))
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conversion {
                key: "GOOGLE_CLIENT_SECRET",
                reason: ValueError::NotUnicode,
                ..
            }
        ));
    }

    #[test]
    fn test_every_default_applies_when_unset() {
        let resolved = ConfigLoader::new(HashMap::<&str, &str>::new())
            .resolve()
            .unwrap();

        for section in SCHEMA {
            for field in section.fields {
                let expected = match field.default {
                    Some(default) => convert(field.kind, default).unwrap(),
                    None => Value::zero(field.kind),
                };
                let actual = &resolved.fields[&(section.name, field.key)];
                assert_eq!(actual.value, expected, "{}.{}", section.name, field.key);
                let source = if field.default.is_some() {
                    ValueSource::Default
                } else {
                    ValueSource::Zero
                };
                assert_eq!(actual.source, source, "{}.{}", section.name, field.key);
            }
        }
    }

    #[test]
    fn test_every_env_value_overrides_default() {
        let overrides: HashMap<&str, &str> = SCHEMA
            .iter()
            .flat_map(|section| section.fields)
            .map(|field| {
                let value = match field.kind {
                    FieldKind::String => "override",
                    FieldKind::Integer => "7",
                    FieldKind::Duration => "42s",
                    FieldKind::StringList { .. } => "x",
                };
                (field.key, value)
            })
            .collect();
        let resolved = ConfigLoader::new(&overrides).resolve().unwrap();

        for section in SCHEMA {
            for field in section.fields {
                let actual = &resolved.fields[&(section.name, field.key)];
                assert_eq!(
                    actual.value,
                    convert(field.kind, overrides[field.key]).unwrap(),
                    "{}.{}",
                    section.name,
                    field.key
                );
                assert_eq!(actual.source, ValueSource::Environment);
            }
        }
    }

    #[test]
    fn test_shared_key_read_once_per_load() {
        let env = ChangingEnv {
            reads: RefCell::new(0),
        };
        let resolved = ConfigLoader::new(&env).resolve().unwrap();

        assert_eq!(*env.reads.borrow(), 1);
        assert_eq!(
            resolved.integer::<usize>(&COMMAND_BUS, BUS_BUFFER_KEY).unwrap(),
            100
        );
        assert_eq!(
            resolved.integer::<usize>(&EVENT_BUS, BUS_BUFFER_KEY).unwrap(),
            100
        );
    }

    #[test]
    fn test_value_sources() {
        let env: HashMap<&str, &str> = HashMap::from([("HTTP_PORT", "9000")]);
        let resolved = ConfigLoader::new(env).resolve().unwrap();

        assert_eq!(
            resolved.source(&HTTP, "HTTP_PORT"),
            Some(ValueSource::Environment)
        );
        assert_eq!(resolved.source(&HTTP, "HOST"), Some(ValueSource::Default));
        assert_eq!(
            resolved.source(&crate::schema::GOOGLE, "GOOGLE_CLIENT_ID"),
            Some(ValueSource::Zero)
        );
        assert_eq!(resolved.source(&HTTP, "MISSING"), None);
    }

    #[test]
    fn test_kind_mismatch_is_reported() {
        let resolved = ConfigLoader::new(HashMap::<&str, &str>::new())
            .resolve()
            .unwrap();
        let err = resolved.duration(&HTTP, "HTTP_PORT").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UndeclaredField {
                section: "http",
                key: "HTTP_PORT",
                expected: "duration"
            }
        ));
    }

    const BROKEN: &[SectionSpec] = &[SectionSpec {
        name: "broken",
        fields: &[FieldSpec::duration("BROKEN_TIMEOUT").with_default("soon")],
    }];

    #[test]
    fn test_malformed_default_aborts() {
        let err = ConfigLoader::new(HashMap::<&str, &str>::new())
            .with_schema(BROKEN)
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conversion {
                section: "broken",
                key: "BROKEN_TIMEOUT",
                ..
            }
        ));

        let env: HashMap<&str, &str> = HashMap::from([("BROKEN_TIMEOUT", "1m")]);
        assert!(ConfigLoader::new(env).with_schema(BROKEN).resolve().is_ok());
    }

    #[test]
    fn test_load_requires_service_sections() {
        let env: HashMap<&str, &str> = HashMap::from([("BROKEN_TIMEOUT", "1m")]);
        let err = ConfigLoader::new(env)
            .with_schema(BROKEN)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredField { section: "app", .. }));
    }
}
