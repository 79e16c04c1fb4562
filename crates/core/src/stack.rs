//! Stack definitions and the stack registry
//!
//! A stack definition turns validated configuration into a [`Template`].
//! The [`StackRegistry`] holds every stack of the application so the CLI can
//! list, validate and synthesize them by name.

use crate::error::{Error, Result};
use crate::template::Template;
use indexmap::IndexMap;
use std::sync::Arc;

/// A synthesizable stack.
///
/// Implementations validate their configuration eagerly when they are
/// constructed; [`StackDefinition::validate`] re-checks the assembled
/// structure before synthesis.
///
/// # Example
///
/// ```
/// use blueprints_core::{Result, StackDefinition, Template};
///
/// struct EmptyStack;
///
/// impl StackDefinition for EmptyStack {
///     fn stack_name(&self) -> &str {
///         "empty"
///     }
///
///     fn synthesize(&self) -> Result<Template> {
///         Ok(Template::new("An empty stack"))
///     }
/// }
///
/// let template = EmptyStack.synthesize().unwrap();
/// assert!(template.resources.is_empty());
/// ```
pub trait StackDefinition: Send + Sync {
    /// Deployed stack name; also the assembly file stem
    fn stack_name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &'static str {
        "Stack definition"
    }

    /// Validate the assembled structure before synthesis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every violation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Produce the deployment description.
    ///
    /// # Errors
    ///
    /// Returns an error when the description cannot be assembled; no partial
    /// template is ever returned.
    fn synthesize(&self) -> Result<Template>;
}

/// A stack name paired with its synthesized template
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    /// Stack name
    pub name: String,
    /// Stack description
    pub description: &'static str,
    /// Synthesized template
    pub template: Template,
}

/// Registry of the application's stacks, in registration order.
#[derive(Default, Clone)]
pub struct StackRegistry {
    stacks: IndexMap<String, Arc<dyn StackDefinition>>,
}

impl StackRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stacks: IndexMap::new(),
        }
    }

    /// Register a stack.
    ///
    /// The stack's `stack_name()` is used as the key.
    /// If a stack with the same name already exists, it is replaced.
    pub fn register(&mut self, stack: impl StackDefinition + 'static) {
        let name = stack.stack_name().to_string();
        self.stacks.insert(name, Arc::new(stack));
    }

    /// Get a stack by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn StackDefinition>> {
        self.stacks.get(name).cloned()
    }

    /// Registered stack names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stacks.keys().map(String::as_str).collect()
    }

    /// Get the number of registered stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Look up a stack, failing with the list of available names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStack`] if the name is not registered.
    pub fn require(&self, name: &str) -> Result<Arc<dyn StackDefinition>> {
        self.get(name).ok_or_else(|| Error::UnknownStack {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    /// Validate and synthesize one stack.
    ///
    /// # Errors
    ///
    /// Returns error if the stack is unknown, invalid or fails to synthesize.
    pub fn synthesize(&self, name: &str) -> Result<SynthesizedStack> {
        let stack = self.require(name)?;
        synthesize_one(stack.as_ref())
    }

    /// Validate and synthesize every stack.
    ///
    /// # Errors
    ///
    /// Stops at the first stack that fails; nothing is returned in that case.
    pub fn synthesize_all(&self) -> Result<Vec<SynthesizedStack>> {
        self.stacks
            .values()
            .map(|stack| synthesize_one(stack.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for StackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackRegistry")
            .field("stacks", &self.names())
            .finish()
    }
}

fn synthesize_one(stack: &dyn StackDefinition) -> Result<SynthesizedStack> {
    let span = tracing::info_span!("synthesize", stack = %stack.stack_name());
    let _guard = span.enter();

    stack.validate()?;
    let template = stack.synthesize()?;
    tracing::info!(
        resources = template.resources.len(),
        parameters = template.parameters.len(),
        outputs = template.outputs.len(),
        "Stack synthesized"
    );

    Ok(SynthesizedStack {
        name: stack.stack_name().to_string(),
        description: stack.description(),
        template,
    })
}
