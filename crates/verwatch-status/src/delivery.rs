//! Delivery-queue handles
//!
//! Many producers, one consumer per queue. A disconnected handle (after
//! deletion, or never wired) drops messages silently.

use crate::message::{AnnounceMessage, PersistMessage, SaveSignal};
use tokio::sync::mpsc;

/// Sending side of the Announce, Persist and ManualSave queues
#[derive(Debug, Clone, Default)]
pub struct DeliveryChannels {
    announce: Option<mpsc::UnboundedSender<AnnounceMessage>>,
    persist: Option<mpsc::UnboundedSender<PersistMessage>>,
    save: Option<mpsc::UnboundedSender<SaveSignal>>,
}

/// Receiving side of the three queues
#[derive(Debug)]
pub struct DeliveryReceivers {
    /// Announce queue
    pub announce: mpsc::UnboundedReceiver<AnnounceMessage>,
    /// Persist queue
    pub persist: mpsc::UnboundedReceiver<PersistMessage>,
    /// ManualSave queue
    pub save: mpsc::UnboundedReceiver<SaveSignal>,
}

impl DeliveryChannels {
    /// Create connected queues
    #[must_use]
    pub fn unbounded() -> (Self, DeliveryReceivers) {
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let (save_tx, save_rx) = mpsc::unbounded_channel();
        (
            Self {
                announce: Some(announce_tx),
                persist: Some(persist_tx),
                save: Some(save_tx),
            },
            DeliveryReceivers {
                announce: announce_rx,
                persist: persist_rx,
                save: save_rx,
            },
        )
    }

    /// Handles that drop everything
    #[inline]
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Whether any queue is still wired
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.announce.is_some() || self.persist.is_some() || self.save.is_some()
    }

    /// Send to the Announce queue
    pub fn announce(&self, message: AnnounceMessage) {
        if let Some(tx) = &self.announce {
            if tx.send(message).is_err() {
                tracing::trace!("announce queue closed, message dropped");
            }
        }
    }

    /// Send to the Persist queue
    pub fn persist(&self, message: PersistMessage) {
        if let Some(tx) = &self.persist {
            if tx.send(message).is_err() {
                tracing::trace!("persist queue closed, message dropped");
            }
        }
    }

    /// Send to the ManualSave queue
    pub fn request_save(&self) {
        if let Some(tx) = &self.save {
            let _ = tx.send(SaveSignal);
        }
    }
}

impl DeliveryReceivers {
    /// Drain every announce currently queued
    pub fn drain_announce(&mut self) -> Vec<AnnounceMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.announce.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Drain every persist message currently queued
    pub fn drain_persist(&mut self) -> Vec<PersistMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.persist.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Count and discard queued save signals
    pub fn drain_save(&mut self) -> usize {
        let mut count = 0;
        while self.save.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{StatusSummary, SubType};

    #[test]
    fn disconnected_drops_silently() {
        let channels = DeliveryChannels::disconnected();
        assert!(!channels.is_connected());
        channels.announce(AnnounceMessage::version(
            "svc",
            SubType::Query,
            StatusSummary::default(),
        ));
        channels.persist(PersistMessage::delete("svc"));
        channels.request_save();
    }

    #[test]
    fn closed_receiver_drops_silently() {
        let (channels, receivers) = DeliveryChannels::unbounded();
        drop(receivers);
        channels.persist(PersistMessage::delete("svc"));
        channels.request_save();
    }

    #[test]
    fn connected_delivers() {
        let (channels, mut receivers) = DeliveryChannels::unbounded();
        channels.announce(AnnounceMessage::version(
            "svc",
            SubType::Init,
            StatusSummary::default(),
        ));
        channels.request_save();
        channels.request_save();

        let announces = receivers.drain_announce();
        assert_eq!(announces.len(), 1);
        assert_eq!(announces[0].sub_type, SubType::Init);
        assert_eq!(receivers.drain_save(), 2);
        assert!(receivers.drain_persist().is_empty());
    }
}
