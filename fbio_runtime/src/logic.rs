//! Application logic evaluated inside the RT cycle.
//!
//! Logic is bound once per session: point ids are resolved to table indices
//! up front so [`BoundLogic::evaluate`] is index arithmetic on atomics. No
//! allocation, no lookups, no locks.

use tracing::{info, warn};

use crate::config::LogicConfig;
use crate::error::RuntimeError;
use crate::registry::{IoRegistry, IoTable};

/// Logic factory. Bound against each new session's registry.
pub trait CycleLogic: Send + Sync {
    /// Resolve the points this logic touches.
    fn bind(&self, registry: &IoRegistry) -> Result<Box<dyn BoundLogic>, RuntimeError>;
}

/// Logic bound to one registry.
pub trait BoundLogic: Send + Sync {
    /// Compute outputs from the current input snapshot.
    ///
    /// Runs on the RT thread between read and write.
    fn evaluate(&self, inputs: &IoTable, outputs: &IoTable);
}

/// AND, heartbeat and mirror rules driven by [`LogicConfig`].
#[derive(Debug, Clone)]
pub struct SampleLogic {
    config: LogicConfig,
}

impl SampleLogic {
    /// Logic wired per `config`.
    pub fn new(config: LogicConfig) -> Self {
        Self { config }
    }
}

impl Default for SampleLogic {
    fn default() -> Self {
        Self::new(LogicConfig::default())
    }
}

#[derive(Debug, Default)]
struct SampleRules {
    and_rule: Option<([usize; 2], usize)>,
    heartbeat: Option<usize>,
    mirror: Option<(usize, usize)>,
}

/// Index of a boolean point in `table`, or `None` with a warning.
fn boolean_index(table: &IoTable, id: &str, rule: &str) -> Option<usize> {
    match table.index_of(id) {
        Some(index) if table.get(index).is_some_and(|p| p.is_boolean()) => Some(index),
        Some(_) => {
            warn!("{rule} disabled: {id} is not a boolean point");
            None
        }
        None => {
            warn!("{rule} disabled: {id} is not registered as {}", table.direction());
            None
        }
    }
}

impl CycleLogic for SampleLogic {
    fn bind(&self, registry: &IoRegistry) -> Result<Box<dyn BoundLogic>, RuntimeError> {
        let mut rules = SampleRules::default();

        if let Some(rule) = &self.config.and_rule {
            let a = boolean_index(&registry.inputs, rule.inputs[0].as_str(), "AND rule");
            let b = boolean_index(&registry.inputs, rule.inputs[1].as_str(), "AND rule");
            let out = boolean_index(&registry.outputs, rule.output.as_str(), "AND rule");
            if let (Some(a), Some(b), Some(out)) = (a, b, out) {
                rules.and_rule = Some(([a, b], out));
            }
        }
        if let Some(id) = &self.config.heartbeat {
            rules.heartbeat = boolean_index(&registry.outputs, id.as_str(), "Heartbeat");
        }
        if let Some(rule) = &self.config.mirror {
            let input = boolean_index(&registry.inputs, rule.input.as_str(), "Mirror rule");
            let output = boolean_index(&registry.outputs, rule.output.as_str(), "Mirror rule");
            if let (Some(input), Some(output)) = (input, output) {
                rules.mirror = Some((input, output));
            }
        }

        info!(
            "Sample logic bound: and={} heartbeat={} mirror={}",
            rules.and_rule.is_some(),
            rules.heartbeat.is_some(),
            rules.mirror.is_some()
        );
        Ok(Box::new(rules))
    }
}

impl BoundLogic for SampleRules {
    #[inline]
    fn evaluate(&self, inputs: &IoTable, outputs: &IoTable) {
        if let Some(([a, b], out)) = self.and_rule {
            outputs.set_bool_at(out, inputs.bool_at(a) && inputs.bool_at(b));
        }
        if let Some(out) = self.heartbeat {
            outputs.set_bool_at(out, !outputs.bool_at(out));
        }
        if let Some((input, output)) = self.mirror {
            outputs.set_bool_at(output, inputs.bool_at(input));
        }
    }
}
