//! The job registry: a fixed map from [`JobName`] to a job constructor.
//!
//! Built once at startup, either explicitly through [`JobRegistry::builder`] or
//! from configuration through [`JobRegistry::from_config`], and shared read-only
//! afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::{describe, BuildSettings, JobSpec};
use crate::config::DispatchConfig;
use crate::{DispatchError, Event, JobDescription, JobName};

/// Builds a job description from an event.
pub type JobConstructor = Arc<dyn Fn(&Event) -> JobDescription + Send + Sync>;

/// Immutable name → constructor map.
#[derive(Clone, Default)]
pub struct JobRegistry {
    entries: BTreeMap<JobName, JobConstructor>,
}

impl JobRegistry {
    /// Starts an empty registry.
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::default()
    }

    /// Registers one job per configured definition.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;

        let settings = Arc::new(BuildSettings::from_config(config));
        let mut builder = Self::builder();
        for definition in &config.jobs {
            let spec = JobSpec::from_definition(definition).ok_or_else(|| {
                DispatchError::configuration(format!("job '{}' is incomplete", definition.name))
            })?;
            let name = spec.name.clone();
            let settings = Arc::clone(&settings);
            builder = builder.register(name, move |event: &Event| describe(&spec, event, &settings))?;
        }
        Ok(builder.build())
    }

    /// Returns the constructor registered under `name`.
    pub fn lookup(&self, name: &JobName) -> Option<&JobConstructor> {
        self.entries.get(name)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &JobName) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &JobName> {
        self.entries.keys()
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects registrations before the registry is frozen.
#[derive(Default)]
pub struct JobRegistryBuilder {
    entries: BTreeMap<JobName, JobConstructor>,
}

impl JobRegistryBuilder {
    /// Registers `constructor` under `name`.
    ///
    /// Registering the same name twice is a configuration error.
    pub fn register<F>(mut self, name: JobName, constructor: F) -> Result<Self, DispatchError>
    where
        F: Fn(&Event) -> JobDescription + Send + Sync + 'static,
    {
        if self.entries.contains_key(&name) {
            return Err(DispatchError::configuration(format!(
                "job '{name}' is registered more than once"
            )));
        }
        self.entries.insert(name, Arc::new(constructor));
        Ok(self)
    }

    /// Freezes the registry.
    pub fn build(self) -> JobRegistry {
        JobRegistry {
            entries: self.entries,
        }
    }
}
