#[cfg(feature = "rtrb")]
use rtrb::Producer;

use super::midi::MidiEvent;

/// Destination for MIDI events emitted during playback.
///
/// Called from the playback thread, so implementations must not block.
pub trait MidiOutput {
    /// Deliver one event. Returns false if the event was dropped.
    fn send(&mut self, event: MidiEvent) -> bool;
}

/// Records every event; handy for offline rendering and tests.
impl MidiOutput for Vec<MidiEvent> {
    fn send(&mut self, event: MidiEvent) -> bool {
        self.push(event);
        true
    }
}

#[cfg(feature = "rtrb")]
impl MidiOutput for Producer<MidiEvent> {
    fn send(&mut self, event: MidiEvent) -> bool {
        Producer::push(self, event).is_ok()
    }
}

impl<T: MidiOutput + ?Sized> MidiOutput for Box<T> {
    fn send(&mut self, event: MidiEvent) -> bool {
        (**self).send(event)
    }
}

#[cfg(all(test, feature = "rtrb"))]
mod tests {
    use super::*;
    use rtrb::RingBuffer;

    #[test]
    fn test_ring_buffer_output_drops_when_full() {
        let (mut tx, mut rx) = RingBuffer::<MidiEvent>::new(1);
        let ev = MidiEvent::all_notes_off(0);

        assert!(tx.send(ev));
        assert!(!tx.send(ev));
        assert_eq!(rx.pop().ok(), Some(ev));
    }
}
