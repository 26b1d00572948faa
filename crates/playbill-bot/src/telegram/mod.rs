use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use playbill_core::config::Config;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod types;

pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};

pub struct TelegramSettings {
    pub bot_token: String,
}

impl TelegramSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var("PLAYBILL_TELEGRAM_BOT_TOKEN")
                    .ok()
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
            })
            .unwrap_or_default();
        if token.is_empty() {
            bail!("telegram.bot_token or PLAYBILL_TELEGRAM_BOT_TOKEN is required");
        }

        Ok(Self { bot_token: token })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

const TELEGRAM_PARSE_MODE: &str = "Markdown";

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, "https://api.telegram.org".to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: Some(vec!["message", "callback_query"]),
        };
        self.post("getUpdates", &request).await
    }

    /// Sends a text message, optionally with an inline keyboard, and returns
    /// the new message's id.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: Some(TELEGRAM_PARSE_MODE),
            reply_markup,
        };
        let message: Message = self.post("sendMessage", &request).await?;
        Ok(message.message_id)
    }

    pub async fn send_photo(&self, chat_id: i64, photo: &str) -> Result<()> {
        let request = SendPhotoRequest { chat_id, photo };
        let _: Message = self.post("sendPhoto", &request).await?;
        Ok(())
    }

    /// Signals the transient "composing" indicator. Best-effort by contract;
    /// callers swallow failures.
    pub async fn send_chat_action(&self, chat_id: i64) -> Result<()> {
        let request = SendChatActionRequest {
            chat_id,
            action: "typing",
        };
        let _: Value = self.post("sendChatAction", &request).await?;
        Ok(())
    }

    /// Replaces a message's inline keyboard; pass an empty markup to strip
    /// the controls. Fails if the message is no longer editable.
    pub async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: &InlineKeyboardMarkup,
    ) -> Result<()> {
        let request = EditReplyMarkupRequest {
            chat_id,
            message_id,
            reply_markup,
        };
        let _: Value = self.post("editMessageReplyMarkup", &request).await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let request = DeleteMessageRequest {
            chat_id,
            message_id,
        };
        let _: Value = self.post("deleteMessage", &request).await?;
        Ok(())
    }

    /// Acknowledges a button press so the client-side affordance doesn't
    /// appear stuck, optionally with toast feedback.
    pub async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: query_id,
            text,
        };
        let _: Value = self.post("answerCallbackQuery", &request).await?;
        Ok(())
    }

    /// Uploads a freshly synthesized clip and returns the file id Telegram
    /// issues for it, reusable to resend without the bytes.
    pub async fn send_audio_bytes(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        title: &str,
        performer: &str,
    ) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("line.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("title", title.to_string())
            .text("performer", performer.to_string())
            .part("audio", part);

        let message: Message = self.post_form("sendAudio", form).await?;
        message
            .audio
            .map(|audio| audio.file_id)
            .ok_or_else(|| anyhow!("Telegram sendAudio response carried no audio"))
    }

    /// Resends a previously delivered clip by its file id.
    pub async fn send_audio_file_id(&self, chat_id: i64, file_id: &str) -> Result<()> {
        let request = SendAudioRequest {
            chat_id,
            audio: file_id,
        };
        let _: Message = self.post("sendAudio", &request).await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommandSpec<'_>]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        let _: Value = self.post("setMyCommands", &request).await?;
        Ok(())
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|_| anyhow!("Telegram request failed"))?;

        Self::decode(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        method: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|_| anyhow!("Telegram request failed"))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let payload: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|_| anyhow!("Failed to decode Telegram response"))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "Telegram API error".to_string());
            bail!("{}", description);
        }

        payload
            .result
            .ok_or_else(|| anyhow!("Telegram response carried no result"))
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
}

#[derive(Debug, Serialize)]
struct SendChatActionRequest {
    chat_id: i64,
    action: &'static str,
}

#[derive(Debug, Serialize)]
struct EditReplyMarkupRequest<'a> {
    chat_id: i64,
    message_id: i64,
    reply_markup: &'a InlineKeyboardMarkup,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SendAudioRequest<'a> {
    chat_id: i64,
    audio: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BotCommandSpec<'a> {
    pub command: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest<'a> {
    commands: &'a [BotCommandSpec<'a>],
}
