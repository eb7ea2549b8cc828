use async_trait::async_trait;
use escrow_core::{DispatchError, FlowStep, Outcome, Write};

use super::parse_id;
use crate::context::{CommandHandler, Context};
use crate::replies;

/// `/rate`: asks who to rate, then a score from 1 to 5 with an optional review after it.
pub struct RateHandler;

#[async_trait]
impl CommandHandler for RateHandler {
    fn command(&self) -> &'static str {
        "rate"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.respond(
            ctx.state.with_step(FlowStep::AwaitingRatedUser),
            replies::ASK_RATED_USER,
        ))
    }

    async fn on_input(&self, ctx: &Context<'_>, text: &str) -> Result<Outcome, DispatchError> {
        match &ctx.state.step {
            FlowStep::AwaitingRatedUser => {
                let Some(user_id) = parse_id(text) else {
                    return Ok(ctx.reprompt(replies::INVALID_USER_ID));
                };
                if user_id == ctx.user_id() {
                    return Ok(ctx.reprompt(replies::SELF_RATING));
                }
                Ok(ctx.respond(
                    ctx.state.with_step(FlowStep::AwaitingScore { user_id }),
                    replies::ASK_SCORE,
                ))
            }
            FlowStep::AwaitingScore { user_id } => {
                let Some((score, review)) = parse_score(text) else {
                    return Ok(ctx.reprompt(replies::INVALID_SCORE));
                };
                Ok(ctx
                    .finish(replies::rating_saved(*user_id, score))
                    .write(Write::RecordRating {
                        user_id: *user_id,
                        rater_id: ctx.user_id(),
                        score,
                        review,
                    }))
            }
            _ => Ok(Outcome::new(ctx.state.idle())),
        }
    }
}

/// `"4 fast delivery"` → `(4, Some("fast delivery"))`.
fn parse_score(text: &str) -> Option<(i64, Option<String>)> {
    let text = text.trim();
    let (head, rest) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    let score = head.parse::<i64>().ok().filter(|s| (1..=5).contains(s))?;
    let review = (!rest.is_empty()).then(|| rest.to_string());
    Some((score, review))
}
