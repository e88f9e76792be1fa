use crossbeam_channel::Sender;

use crate::types::GestureEvent;

/// Receives every gesture that makes it past the cooldown.
pub trait GestureSink: Send + 'static {
    fn dispatch(&mut self, event: &GestureEvent);
}

/// Forwards gestures to the window so it can show them.
pub struct ChannelSink {
    tx: Sender<GestureEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<GestureEvent>) -> Self {
        Self { tx }
    }
}

impl GestureSink for ChannelSink {
    fn dispatch(&mut self, event: &GestureEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!("gesture display closed, dropping {}", event.gesture);
        }
    }
}

pub fn trigger_action<S: GestureSink + ?Sized>(sink: &mut S, gesture: Option<&GestureEvent>) {
    let Some(event) = gesture else {
        return;
    };
    log::debug!("dispatching {} ({})", event.gesture, event.direction.label());
    sink.dispatch(event);
}

#[cfg(test)]
pub(crate) struct RecordingSink(pub std::sync::Arc<std::sync::Mutex<Vec<GestureEvent>>>);

#[cfg(test)]
impl GestureSink for RecordingSink {
    fn dispatch(&mut self, event: &GestureEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScrollGesture, SwipeDirection};
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    fn event(gesture: ScrollGesture, direction: SwipeDirection) -> GestureEvent {
        GestureEvent {
            gesture,
            direction,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn none_dispatches_nothing() {
        let (tx, rx) = unbounded();
        let mut sink = ChannelSink::new(tx);
        trigger_action(&mut sink, None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, rx) = unbounded();
        let mut sink = ChannelSink::new(tx);
        let ev = event(ScrollGesture::ScrollDown, SwipeDirection::Right);
        trigger_action(&mut sink, Some(&ev));
        assert_eq!(rx.try_recv().unwrap(), ev);
    }

    #[test]
    fn closed_display_is_not_fatal() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        trigger_action(
            &mut sink,
            Some(&event(ScrollGesture::ScrollUp, SwipeDirection::Left)),
        );
    }
}
