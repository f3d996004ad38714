//! Long-polling loop relaying chat messages through the store agent.
//!
//! One message is processed to completion before the next poll; gateway
//! failures are logged and never escape the loop.

use crate::agent::StoreAgent;
use crate::config::ShopkeepConfig;
use crate::etsy::StoreApi;
use crate::llm::ChatBackend;
use crate::telegram::client::{Message, TelegramClient};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reply to `/start` and `/help`, handled without involving the model.
pub const GREETING: &str = "Hi! I'm your AI Etsy shop manager. Tell me what you'd \
like to list, or ask how your store is doing.";

/// Polling gateway owning the Telegram client and the orchestrator.
pub struct BotPoller<L, S> {
    client: TelegramClient,
    agent: StoreAgent<L, S>,
    poll_timeout_secs: u64,
    poll_interval_secs: u64,
    max_consecutive_errors: u32,
}

impl<L, S> BotPoller<L, S>
where
    L: ChatBackend,
    S: StoreApi,
{
    pub fn new(client: TelegramClient, agent: StoreAgent<L, S>, config: &ShopkeepConfig) -> Self {
        Self {
            client,
            agent,
            poll_timeout_secs: config.poll_timeout_secs,
            poll_interval_secs: config.poll_interval_secs,
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }

    /// Run the polling loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!("Polling for messages");

        let mut offset = 0i64;
        let mut consecutive_errors = 0u32;

        loop {
            let batch = tokio::select! {
                batch = self.client.get_updates(offset, self.poll_timeout_secs) => batch,
                _ = cancel.cancelled() => {
                    info!("Poller shutting down");
                    return Ok(());
                }
            };

            match batch {
                Ok(updates) => {
                    consecutive_errors = 0;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            self.handle_message(message).await;
                        }
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(
                        "Poll failed ({}/{}): {}",
                        consecutive_errors, self.max_consecutive_errors, e
                    );

                    let backoff = if consecutive_errors >= self.max_consecutive_errors {
                        warn!("Too many consecutive poll errors, backing off");
                        consecutive_errors = 0;
                        60
                    } else {
                        5
                    };
                    if self.pause(&cancel, backoff).await {
                        return Ok(());
                    }
                    continue;
                }
            }

            // Brief pause between polls to avoid hammering the API
            if self.pause(&cancel, self.poll_interval_secs).await {
                return Ok(());
            }
        }
    }

    /// Sleep for `secs`, returning true if cancelled meanwhile.
    async fn pause(&self, cancel: &CancellationToken, secs: u64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(tokio::time::Duration::from_secs(secs)) => false,
            _ = cancel.cancelled() => {
                info!("Poller shutting down");
                true
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(text) = message.text else { return };
        let chat_id = message.chat.id;

        let sender = message
            .from
            .and_then(|u| u.username)
            .unwrap_or_else(|| "unknown".into());
        info!("Message from '{}' in chat {}", sender, chat_id);

        if is_greeting_command(&text) {
            if let Err(e) = self
                .client
                .send_message(chat_id, GREETING, Some(message.message_id))
                .await
            {
                error!("Failed to send greeting: {e}");
            }
            return;
        }

        // Typing indicator so the user knows the relay is working.
        if let Err(e) = self.client.send_typing(chat_id).await {
            warn!("Failed to send typing action: {e}");
        }

        let reply = self.agent.run(&text).await;

        if let Err(e) = self
            .client
            .send_message(chat_id, &reply, Some(message.message_id))
            .await
        {
            error!("Failed to send reply: {e}");
        }
    }
}

/// `/start` and `/help` (optionally suffixed with @botname) get the greeting.
fn is_greeting_command(text: &str) -> bool {
    let command = text.trim().split_whitespace().next().unwrap_or("");
    let command = command.split('@').next().unwrap_or("");
    matches!(command, "/start" | "/help")
}

#[cfg(test)]
mod tests {
    use super::is_greeting_command;

    #[test]
    fn start_and_help_are_greetings() {
        assert!(is_greeting_command("/start"));
        assert!(is_greeting_command("/help"));
        assert!(is_greeting_command("  /start  "));
        assert!(is_greeting_command("/start@shopkeep_bot"));
        assert!(is_greeting_command("/help extra words"));
    }

    #[test]
    fn ordinary_text_is_not_a_greeting() {
        assert!(!is_greeting_command("hello"));
        assert!(!is_greeting_command("list my candle"));
        assert!(!is_greeting_command("/stats"));
        assert!(!is_greeting_command(""));
    }
}
