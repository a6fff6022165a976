//! Turns engine replies into Bot API calls.

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, MessageId,
    ReplyMarkup,
};
use url::Url;

use crate::conversation::{Button, Keyboard, Reply};

pub fn inline_markup(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .filter_map(|button| match button {
                Button::Callback { label, data } => Some(InlineKeyboardButton::callback(label.clone(), data.clone())),
                Button::Url { label, url } => match Url::parse(url) {
                    Ok(url) => Some(InlineKeyboardButton::url(label.clone(), url)),
                    Err(e) => {
                        log::warn!("⚠️ Dropping button {:?} with bad URL {:?}: {}", label, url, e);
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    }))
}

pub fn markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_markup(rows)),
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(|label| KeyboardButton::new(label.clone())).collect::<Vec<_>>()),
            )
            .resize_keyboard(),
        ),
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

/// Sends `replies` in order. `origin` is the message whose button was
/// pressed; without it edits become new messages. Returns the text for the
/// callback answer, if any reply asked for one.
pub async fn render(bot: &Bot, chat_id: ChatId, origin: Option<MessageId>, replies: Vec<Reply>) -> Option<String> {
    let mut toast = None;
    for reply in replies {
        let result = match reply {
            Reply::Toast(text) => {
                toast = Some(text);
                Ok(())
            }
            Reply::Text { text, keyboard } => send_text(bot, chat_id, text, keyboard.as_ref()).await,
            Reply::Edit { text, keyboard } => match (origin, keyboard.as_ref()) {
                (Some(message_id), None) => edit_or_send(bot, chat_id, message_id, text, None).await,
                (Some(message_id), Some(Keyboard::Inline(rows))) => {
                    edit_or_send(bot, chat_id, message_id, text, Some(rows)).await
                }
                _ => send_text(bot, chat_id, text, keyboard.as_ref()).await,
            },
            Reply::Document {
                file_name,
                content,
                caption,
            } => {
                let mut request = bot.send_document(chat_id, InputFile::memory(content).file_name(file_name));
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                request.await.map(|_| ())
            }
        };
        if let Err(e) = result {
            log::error!("❌ Failed to deliver reply to {}: {}", chat_id, e);
        }
    }
    toast
}

async fn send_text(bot: &Bot, chat_id: ChatId, text: String, keyboard: Option<&Keyboard>) -> ResponseResult<()> {
    let mut request = bot.send_message(chat_id, text);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(markup(keyboard));
    }
    request.await.map(|_| ())
}

async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
    rows: Option<&Vec<Vec<Button>>>,
) -> ResponseResult<()> {
    let mut request = bot.edit_message_text(chat_id, message_id, text.clone());
    if let Some(rows) = rows {
        request = request.reply_markup(inline_markup(rows));
    }
    match request.await {
        Ok(_) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            if message.contains("message is not modified") {
                return Ok(());
            }
            log::debug!("Edit of {} in {} failed ({}), sending a new message", message_id.0, chat_id, message);
            let keyboard = rows.map(|rows| Keyboard::Inline(rows.clone()));
            send_text(bot, chat_id, text, keyboard.as_ref()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_urls_are_dropped_from_inline_rows() {
        let markup = inline_markup(&[vec![
            Button::url("Pay", "https://pay.example/i/1"),
            Button::url("Broken", "not a url"),
        ]]);
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0].len(), 1);
    }

    #[test]
    fn remove_maps_to_keyboard_remove() {
        assert!(matches!(markup(&Keyboard::Remove), ReplyMarkup::KeyboardRemove(_)));
        assert!(matches!(
            markup(&Keyboard::Reply(vec![vec!["Да".into()]])),
            ReplyMarkup::Keyboard(_)
        ));
    }
}
