//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{inbound_from_callback, inbound_from_message, HandlerDeps, HandlerError};
use crate::telegram::render::render;

/// Creates the dispatcher schema: private messages and button presses, both
/// handed to the conversation engine.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(inbound) = inbound_from_message(&msg) else {
                    return Ok(());
                };
                let replies = deps.engine.handle(inbound).await;
                render(&bot, msg.chat.id, None, replies).await;
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let toast = match inbound_from_callback(&q) {
                Some(inbound) => {
                    let chat_id = q
                        .message
                        .as_ref()
                        .map(|m| m.chat().id)
                        .unwrap_or(ChatId(inbound.telegram_id));
                    let origin = q.message.as_ref().map(|m| m.id());
                    let replies = deps.engine.handle(inbound).await;
                    render(&bot, chat_id, origin, replies).await
                }
                None => None,
            };

            // The button spinner stops only once the query is answered.
            let mut answer = bot.answer_callback_query(q.id.clone());
            if let Some(text) = toast {
                answer = answer.text(text);
            }
            if let Err(e) = answer.await {
                log::warn!("⚠️ Failed to answer callback from {}: {}", q.from.id, e);
            }
            Ok(())
        }
    })
}
