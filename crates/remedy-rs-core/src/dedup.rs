//! Drops redelivered or burst-duplicated inbound messages.

use crate::types::{DeliveryMark, Session};
use chrono::Duration;
use log::debug;
use remedy_rs_config::ConversationConfig;
use remedy_rs_protocol::{InboundPayload, InboundTurn};

/// Time-window duplicate filter over the last accepted delivery of a session.
#[derive(Debug, Clone)]
pub struct DeliveryGuard {
    text_window: Duration,
    image_window: Duration,
    same_media_window: Duration,
}

impl DeliveryGuard {
    pub fn new(config: &ConversationConfig) -> Self {
        Self {
            text_window: millis(config.text_window_ms),
            image_window: millis(config.image_window_ms),
            same_media_window: millis(config.same_media_window_ms),
        }
    }

    /// Whether the turn should be processed. Accepted turns become the new mark.
    pub fn admit(&self, session: &mut Session, turn: &InboundTurn) -> bool {
        if let Some(reason) = self.duplicate_reason(session.last_delivery.as_ref(), turn) {
            debug!(
                "dropped duplicate delivery (user_id={}, reason={})",
                session.id, reason
            );
            return false;
        }

        let previous_media = session
            .last_delivery
            .as_ref()
            .and_then(|mark| mark.last_media.clone());
        let (text, last_media) = match &turn.payload {
            InboundPayload::Text { content } => (Some(content.clone()), previous_media),
            InboundPayload::Image(image) => (None, Some((image.media_id.clone(), turn.received_at))),
        };
        session.last_delivery = Some(DeliveryMark {
            at: turn.received_at,
            message_id: turn.message_id.clone(),
            text,
            last_media,
        });
        true
    }

    fn duplicate_reason(&self, mark: Option<&DeliveryMark>, turn: &InboundTurn) -> Option<&'static str> {
        let mark = mark?;
        if turn.message_id.is_some() && turn.message_id == mark.message_id {
            return Some("message_id");
        }
        let elapsed = turn.received_at - mark.at;
        match &turn.payload {
            InboundPayload::Text { content } => (mark.text.as_deref() == Some(content.as_str())
                && elapsed < self.text_window)
                .then_some("same_text"),
            InboundPayload::Image(image) => {
                if elapsed < self.image_window {
                    return Some("image_burst");
                }
                match &mark.last_media {
                    Some((media_id, at))
                        if *media_id == image.media_id
                            && turn.received_at - *at < self.same_media_window =>
                    {
                        Some("same_media")
                    }
                    _ => None,
                }
            }
        }
    }
}

fn millis(value: u64) -> Duration {
    Duration::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::DeliveryGuard;
    use crate::types::Session;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use remedy_rs_config::ConversationConfig;
    use remedy_rs_protocol::{ImageInput, InboundTurn};

    fn image(media_id: &str) -> ImageInput {
        ImageInput {
            media_id: media_id.to_string(),
            bytes: vec![1, 2, 3],
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn identical_text_is_dropped_inside_window_only() {
        let guard = DeliveryGuard::new(&ConversationConfig::default());
        let now = Utc::now();
        let mut session = Session::new("1", now);
        assert!(guard.admit(&mut session, &InboundTurn::text("1", "Cali").at(now)));
        assert_eq!(
            guard.admit(
                &mut session,
                &InboundTurn::text("1", "Cali").at(now + Duration::milliseconds(500))
            ),
            false
        );
        assert!(guard.admit(
            &mut session,
            &InboundTurn::text("1", "Cali").at(now + Duration::seconds(3))
        ));
        assert!(guard.admit(
            &mut session,
            &InboundTurn::text("1", "Medellín").at(now + Duration::milliseconds(3100))
        ));
    }

    #[test]
    fn repeated_message_id_is_dropped() {
        let guard = DeliveryGuard::new(&ConversationConfig::default());
        let now = Utc::now();
        let mut session = Session::new("1", now);
        assert!(guard.admit(
            &mut session,
            &InboundTurn::text("1", "hola").at(now).with_message_id("77")
        ));
        assert_eq!(
            guard.admit(
                &mut session,
                &InboundTurn::text("1", "otra cosa")
                    .at(now + Duration::seconds(30))
                    .with_message_id("77")
            ),
            false
        );
    }

    #[test]
    fn images_respect_burst_and_same_media_windows() {
        let guard = DeliveryGuard::new(&ConversationConfig::default());
        let now = Utc::now();
        let mut session = Session::new("1", now);
        assert!(guard.admit(&mut session, &InboundTurn::image("1", image("a")).at(now)));
        assert_eq!(
            guard.admit(
                &mut session,
                &InboundTurn::image("1", image("b")).at(now + Duration::seconds(1))
            ),
            false
        );
        assert_eq!(
            guard.admit(
                &mut session,
                &InboundTurn::image("1", image("a")).at(now + Duration::seconds(10))
            ),
            false
        );
        assert!(guard.admit(
            &mut session,
            &InboundTurn::image("1", image("b")).at(now + Duration::seconds(10))
        ));
    }
}
