mod client;
mod poller;

pub use client::{Message, TelegramClient, Update};
pub use poller::{BotPoller, GREETING};
