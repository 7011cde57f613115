//! Testing utilities for hookwire.
//!
//! This module provides utilities to make testing generated dispatchers easier.
//!
//! # Features
//!
//! - [`CallLog`]: A shared record of hook invocations
//! - [`ScenarioPlugin`]: A plugin with overlapping hook names and by-reference parameters
//! - [`plugin_fixture`]: The plugin's method table and invokers, built together

use crate::{
    generator::{Generator, GeneratorConfig},
    interp::{Dispatcher, HookTable},
};
use hookwire_core::{
    FrameworkDescriptor, GeneratorError, MethodDescriptor, MethodFlags, Parameter, ReturnType,
    TypeDescriptor, into_object,
};
use std::sync::{Arc, Mutex};

// ============================================================================
// Call Log
// ============================================================================

/// A shared, clonable list of invocation records.
///
/// # Example
///
/// ```rust,ignore
/// let log = CallLog::new();
/// let plugin = ScenarioPlugin::new(log.clone());
///
/// dispatcher.call(&mut plugin, Some("Init"), &mut result, &mut [])?;
/// assert_eq!(log.entries(), ["Init()"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// Get a clone of the records.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of records equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == entry)
            .count()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

// ============================================================================
// Scenario Plugin
// ============================================================================

/// Name of the [`ScenarioPlugin`] type in its method table.
pub const SCENARIO_TYPE: &str = "ScenarioPlugin";

/// A plugin whose hooks exercise prefix overlap, by-reference parameters and
/// return values.
///
/// Hooks: `Init`, `InitUser(String)`, `InitUserGroup(String, String)`,
/// `Increment(&mut i32)`, `Sum(i32, i32) -> i32`. `Describe` is public and
/// untagged, so it is never dispatched.
#[derive(Debug, Clone, Default)]
pub struct ScenarioPlugin {
    log: CallLog,
}

impl ScenarioPlugin {
    /// Create a plugin recording into `log`.
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }

    /// The plugin's log.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    fn init(&mut self) {
        self.log.record("Init()");
    }

    fn init_user(&mut self, user: String) {
        self.log.record(format!("InitUser({user})"));
    }

    fn init_user_group(&mut self, user: String, group: String) {
        self.log.record(format!("InitUserGroup({user}, {group})"));
    }

    fn increment(&mut self, x: &mut i32) {
        *x += 1;
        self.log.record("Increment");
    }

    fn sum(&mut self, a: i32, b: i32) -> i32 {
        self.log.record("Sum");
        a + b
    }
}

/// The [`ScenarioPlugin`] method table together with its invokers.
pub struct PluginFixture {
    /// The method table.
    pub ty: TypeDescriptor,
    /// Invokers for every hook in `ty`.
    pub table: HookTable<ScenarioPlugin>,
}

impl PluginFixture {
    /// Generate and bind a dispatcher with the default configuration.
    pub fn dispatcher(&self) -> Result<Dispatcher<ScenarioPlugin>, GeneratorError> {
        self.dispatcher_with(GeneratorConfig::default())
    }

    /// Generate and bind a dispatcher with `config`.
    pub fn dispatcher_with(
        &self,
        config: GeneratorConfig,
    ) -> Result<Dispatcher<ScenarioPlugin>, GeneratorError> {
        let program = Generator::new(&FrameworkDescriptor::standard())?
            .with_config(config)
            .compile(&self.ty)?;
        Dispatcher::new(program, self.table.clone())
    }
}

/// Build the [`ScenarioPlugin`] fixture.
pub fn plugin_fixture() -> PluginFixture {
    let init = method("Init");
    let init_user = method("InitUser").param(Parameter::value("user", "String"));
    let init_user_group = method("InitUserGroup")
        .param(Parameter::value("user", "String"))
        .param(Parameter::value("group", "String"));
    let increment = method("Increment").param(Parameter::by_ref("x", "i32"));
    let sum = method("Sum")
        .param(Parameter::value("a", "i32"))
        .param(Parameter::value("b", "i32"))
        .returns(ReturnType::Value("i32".into()));
    let describe = method("Describe")
        .flags(MethodFlags::PUBLIC)
        .returns(ReturnType::Value("String".into()));

    let mut table = HookTable::new();
    table
        .bind(&init, |p: &mut ScenarioPlugin, _| {
            p.init();
            Ok(None)
        })
        .bind(&init_user, |p: &mut ScenarioPlugin, f| {
            p.init_user(f.arg(0)?);
            Ok(None)
        })
        .bind(&init_user_group, |p: &mut ScenarioPlugin, f| {
            p.init_user_group(f.arg(0)?, f.arg(1)?);
            Ok(None)
        })
        .bind(&increment, |p: &mut ScenarioPlugin, f| {
            let mut x: i32 = f.arg(0)?;
            p.increment(&mut x);
            f.write_back(0, x)?;
            Ok(None)
        })
        .bind(&sum, |p: &mut ScenarioPlugin, f| {
            let total = p.sum(f.arg(0)?, f.arg(1)?);
            Ok(Some(into_object(total)))
        });

    let ty = TypeDescriptor::new(SCENARIO_TYPE)
        .with_method(init)
        .with_method(init_user)
        .with_method(init_user_group)
        .with_method(increment)
        .with_method(sum)
        .with_method(describe);

    PluginFixture { ty, table }
}

fn method(name: &str) -> MethodDescriptor {
    MethodDescriptor::new(name, SCENARIO_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_log() {
        let log = CallLog::new();
        let other = log.clone();
        log.record("a");
        other.record("b");
        log.record("a");

        assert_eq!(log.entries(), ["a", "b", "a"]);
        assert_eq!(other.count("a"), 2);
        log.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_fixture_binds_every_hook() {
        let fixture = plugin_fixture();
        let dispatcher = fixture.dispatcher().unwrap();
        assert_eq!(dispatcher.program().hooks().len(), 5);
        assert_eq!(fixture.table.len(), 5);
    }
}
