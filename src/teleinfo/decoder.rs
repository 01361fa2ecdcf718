use log::{debug, trace};

use super::group::Group;
use super::record::TeleinfoRecord;
use super::state::{Event, FrameState};

/// Counters kept by a decoder over its whole lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub checksum_errors: u64,
    pub aborted_frames: u64,
}

/// Byte by byte decoder of a Teleinfo stream.
///
/// Feed every received byte to [`TeleinfoDecoder::decode`]; the call that
/// completes a frame returns the record. A decoder is meant to be owned by
/// the single task reading a given line.
pub struct TeleinfoDecoder {
    group: Group,
    record: TeleinfoRecord,
    state: FrameState,
    stats: DecoderStats,
}

impl TeleinfoDecoder {
    pub fn new() -> Self {
        return TeleinfoDecoder {
            group: Group::new(),
            record: TeleinfoRecord::new(),
            state: FrameState::WaitingStart,
            stats: DecoderStats::default(),
        };
    }

    /// Decodes one character, `None` meaning that no character was available.
    pub fn decode(&mut self, character: Option<u8>) -> Option<TeleinfoRecord> {
        let character = character? & 0x7F; // 7 data bits, the 8th one is parity

        let event = Event::classify(character);
        let previous = self.state;
        let next = previous.next(event, &mut self.group, &mut self.record);
        trace!("{:?}: {} -> {}", event, previous.name(), next.name());

        if next == FrameState::WaitingStart && previous != FrameState::WaitingStart {
            if previous == FrameState::WaitingGroupEnd && event == Event::Cr {
                self.stats.checksum_errors += 1;
            } else {
                self.stats.aborted_frames += 1;
            }
        }

        if next.is_terminal() {
            self.state = FrameState::WaitingStart;
            self.stats.frames += 1;
            debug!("Teleinfo frame complete for meter {}", self.record.adco);
            return Some(self.record.clone());
        }

        self.state = next;
        None
    }

    /// Same as [`TeleinfoDecoder::decode`] for sources reporting "no data"
    /// with a negative value.
    pub fn decode_raw(&mut self, character: i32) -> Option<TeleinfoRecord> {
        if character < 0 {
            return None;
        }
        self.decode(Some((character & 0xFF) as u8))
    }

    /// Decodes a chunk of bytes and returns every frame completed in it
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TeleinfoRecord> {
        bytes.iter().filter_map(|b| self.decode(Some(*b))).collect()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

impl Default for TeleinfoDecoder {
    fn default() -> Self {
        Self::new()
    }
}
