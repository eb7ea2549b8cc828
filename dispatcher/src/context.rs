use async_trait::async_trait;
use escrow_core::{Catalog, ConversationState, DispatchError, Event, Outcome};

use crate::replies::with_guide;

/// What a handler sees while handling one event.
pub struct Context<'a> {
    pub event: &'a Event,
    /// State the handler starts from. For a command this is already reset to `Idle`.
    pub state: &'a ConversationState,
    pub catalog: &'a dyn Catalog,
}

impl<'a> Context<'a> {
    pub fn chat_id(&self) -> i64 {
        self.event.chat_id
    }

    pub fn user_id(&self) -> i64 {
        self.event.user.id
    }

    /// Outcome that moves to `state` and answers the sender with `text` plus the command guide.
    pub fn respond(&self, state: ConversationState, text: impl AsRef<str>) -> Outcome {
        Outcome::new(state).reply(self.chat_id(), with_guide(text.as_ref()))
    }

    /// Answers with `text` and keeps the current step (invalid input inside a flow).
    pub fn reprompt(&self, text: impl AsRef<str>) -> Outcome {
        self.respond(self.state.clone(), text)
    }

    /// Answers with `text` and ends the flow.
    pub fn finish(&self, text: impl AsRef<str>) -> Outcome {
        self.respond(self.state.idle(), text)
    }
}

/// A command and, optionally, the flow it starts.
///
/// Adding a command means registering another implementation with
/// [`Dispatcher::register`](crate::Dispatcher::register).
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name without the slash, lowercase.
    fn command(&self) -> &'static str;

    /// Other names routed to this handler.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Handles `/command args`.
    async fn on_command(&self, ctx: &Context<'_>, args: &str) -> Result<Outcome, DispatchError>;

    /// Handles free text while the conversation sits on a step this handler owns.
    async fn on_input(&self, ctx: &Context<'_>, _text: &str) -> Result<Outcome, DispatchError> {
        Ok(Outcome::new(ctx.state.idle()))
    }
}
