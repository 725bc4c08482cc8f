//! Chat channel test utilities

use std::sync::Mutex;

use async_trait::async_trait;

use modwatch::bot::discord::CreateMessage;
use modwatch::bot::error::DeliveryError;
use modwatch::bot::notifier::ChatChannel;

/// Channel that keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<CreateMessage>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.embeds[0].title.clone())
            .collect()
    }

    /// Download links of the sent messages, in send order
    pub fn links(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.components[0].components[0].url.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn send(&self, message: &CreateMessage) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
