#[cfg(feature = "rtrb")]
use rtrb::Producer;

/// Transport state reported by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Stopped,
    Finished,
}

/// Snapshot published after every playback step (Copy, no allocations)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// Song position in milliseconds
    pub position_ms: f64,
    /// Song length in milliseconds
    pub duration_ms: f64,
}

/// Receives status snapshots from the playback thread.
pub trait StatusSink {
    fn publish(&mut self, status: PlayerStatus);
}

/// Discards status updates
impl StatusSink for () {
    fn publish(&mut self, _status: PlayerStatus) {}
}

impl StatusSink for Vec<PlayerStatus> {
    fn publish(&mut self, status: PlayerStatus) {
        self.push(status);
    }
}

#[cfg(feature = "rtrb")]
impl StatusSink for Producer<PlayerStatus> {
    fn publish(&mut self, status: PlayerStatus) {
        // A full buffer drops this, the newest snapshot; readers must drain often
        let _ = self.push(status);
    }
}

#[cfg(all(test, feature = "rtrb"))]
mod tests {
    use rtrb::RingBuffer;

    use super::*;

    fn snapshot(position_ms: f64) -> PlayerStatus {
        PlayerStatus {
            state: PlayerState::Playing,
            position_ms,
            duration_ms: 1000.0,
        }
    }

    #[test]
    fn test_full_ring_buffer_drops_newest_snapshot() {
        let (mut tx, mut rx) = RingBuffer::new(1);
        tx.publish(snapshot(10.0));
        tx.publish(snapshot(20.0));

        assert_eq!(rx.pop().unwrap().position_ms, 10.0);
        assert!(rx.pop().is_err());
    }
}
