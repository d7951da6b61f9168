//! Command dispatch
//!
//! The executor hands every command of a live unit to a [`CommandsManager`].
//! [`CommandRegistry`] is the stock implementation: one handler per command
//! type, looked up by runtime type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::context::CommandContext;
use crate::errors::{KestrelError, Result};
use crate::payload::Payload;

/// Value returned by a command handler, if any
pub type CommandOutput = Option<Box<dyn Any + Send>>;

/// Type-erased command handler
pub type CommandHandler =
    Box<dyn Fn(&dyn Payload, &mut CommandContext<'_>) -> Result<CommandOutput> + Send + Sync>;

/// Routes a command to the handler that decides which transactions to run
pub trait CommandsManager: Send + Sync {
    /// Run the handler for `command`
    ///
    /// # Errors
    ///
    /// Fails when no handler exists for the command or the handler rejects it.
    fn execute(&self, command: &dyn Payload, ctx: &mut CommandContext<'_>) -> Result<CommandOutput>;
}

struct Entry {
    type_name: &'static str,
    handler: CommandHandler,
}

/// Type-keyed command handler table
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<TypeId, Entry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for commands of type `C`
    ///
    /// The handler's return value becomes the command output. Handlers with
    /// nothing to report return `Ok(())`. Re-registering replaces.
    pub fn register<C, R, F>(&mut self, handler: F)
    where
        C: Payload,
        R: Any + Send,
        F: Fn(&C, &mut CommandContext<'_>) -> Result<R> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<C>();
        let erased: CommandHandler =
            Box::new(move |payload: &dyn Payload, ctx: &mut CommandContext<'_>| {
                let command =
                    payload
                        .downcast_ref::<C>()
                        .ok_or_else(|| KestrelError::PayloadMismatch {
                            expected: type_name.to_string(),
                            actual: payload.type_name().to_string(),
                        })?;
                let output = handler(command, ctx)?;
                Ok(Some(Box::new(output) as Box<dyn Any + Send>))
            });

        let replaced = self
            .handlers
            .insert(
                TypeId::of::<C>(),
                Entry {
                    type_name,
                    handler: erased,
                },
            )
            .is_some();

        tracing::debug!(command = type_name, replaced, "command handler registered");
    }

    pub fn has_handler<C: Payload>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl CommandsManager for CommandRegistry {
    fn execute(&self, command: &dyn Payload, ctx: &mut CommandContext<'_>) -> Result<CommandOutput> {
        match self.handlers.get(&command.payload_type()) {
            Some(entry) => (entry.handler)(command, ctx),
            None => Err(KestrelError::UnregisteredCommand {
                type_name: command.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.handlers.values().map(|e| e.type_name).collect();
        commands.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("commands", &commands)
            .finish()
    }
}
