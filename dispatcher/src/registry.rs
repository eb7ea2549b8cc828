use std::collections::HashMap;
use std::sync::Arc;

use escrow_core::{Catalog, ConversationState, DispatchError, Event, FlowStep, Outcome, Payload};
use tracing::{info, instrument, warn};

use crate::context::{CommandHandler, Context};
use crate::handlers;

/// Command registry. Maps a command name (and its aliases) to its handler.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    /// Empty registry: every command is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the marketplace commands.
    pub fn with_default_commands() -> Self {
        Self::new()
            .register(Arc::new(handlers::StartHandler))
            .register(Arc::new(handlers::SellHandler))
            .register(Arc::new(handlers::ListHandler))
            .register(Arc::new(handlers::BuyHandler))
            .register(Arc::new(handlers::CancelHandler))
            .register(Arc::new(handlers::ConfirmHandler))
            .register(Arc::new(handlers::RateHandler))
            .register(Arc::new(handlers::ChatHandler))
            .register(Arc::new(handlers::ExitHandler))
    }

    /// Adds a handler under its command and aliases. A later registration wins on a name clash.
    pub fn register(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(handler.command(), handler.clone());
        for alias in handler.aliases() {
            self.handlers.insert(*alias, handler.clone());
        }
        self
    }

    pub fn commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Computes the effects and next state for one event.
    ///
    /// Unknown commands, unsupported payloads and free text outside a flow produce no effects and
    /// leave the state unchanged. Empty text inside a flow is [`DispatchError::Malformed`].
    #[instrument(
        skip_all,
        fields(update_id = event.update_id, conversation_id = %event.conversation_id, step = state.step.name())
    )]
    pub async fn dispatch(
        &self,
        event: &Event,
        state: &ConversationState,
        catalog: &dyn Catalog,
    ) -> Result<Outcome, DispatchError> {
        match &event.payload {
            Payload::Command { name, args } => {
                let Some(handler) = self.handlers.get(name.as_str()) else {
                    info!(command = %name, "step: unknown command skipped");
                    return Ok(Outcome::new(state.clone()));
                };
                // A command abandons whatever flow was in progress.
                let base = ConversationState {
                    step: FlowStep::Idle,
                    last_command: Some(name.clone()),
                };
                let ctx = Context {
                    event,
                    state: &base,
                    catalog,
                };
                info!(command = %name, "step: command handler processing");
                let outcome = handler.on_command(&ctx, args).await?;
                info!(
                    command = %name,
                    next_step = outcome.state.step.name(),
                    effects = outcome.effects.len(),
                    "step: command handler done"
                );
                Ok(outcome)
            }
            Payload::Text(text) => {
                let Some(owner) = state.step.owner() else {
                    info!("step: free text outside a flow ignored");
                    return Ok(Outcome::new(state.clone()));
                };
                if text.trim().is_empty() {
                    return Err(DispatchError::Malformed(format!(
                        "empty text at step {}",
                        state.step.name()
                    )));
                }
                let Some(handler) = self.handlers.get(owner) else {
                    warn!(owner, "No handler registered for flow step, resetting flow");
                    return Ok(Outcome::new(state.idle()));
                };
                let ctx = Context {
                    event,
                    state,
                    catalog,
                };
                let outcome = handler.on_input(&ctx, text.trim()).await?;
                info!(
                    owner,
                    next_step = outcome.state.step.name(),
                    effects = outcome.effects.len(),
                    "step: flow input handled"
                );
                Ok(outcome)
            }
            Payload::Unsupported(kind) => {
                info!(kind = %kind, "step: unsupported event skipped");
                Ok(Outcome::new(state.clone()))
            }
        }
    }
}
