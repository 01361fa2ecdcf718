use log::{debug, warn};

use super::group::Group;
use super::record::TeleinfoRecord;
use super::structs::*;

/// Character classes the frame state machine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Stx,
    Etx,
    Eot,
    Cr,
    Lf,
    Space,
    Other(u8),
}

impl Event {
    /// Classifies an already masked 7 bit character
    pub fn classify(character: u8) -> Self {
        match character {
            TELEINFO_CHAR_STX => Event::Stx,
            TELEINFO_CHAR_ETX => Event::Etx,
            TELEINFO_CHAR_EOT => Event::Eot,
            TELEINFO_CHAR_CR => Event::Cr,
            TELEINFO_CHAR_LF => Event::Lf,
            TELEINFO_CHAR_SPACE => Event::Space,
            c => Event::Other(c),
        }
    }
}

/// States of the frame decoder.
///
/// Each state only handles the events that make sense for it. Any other event
/// sends the machine back to `WaitingStart`, dropping the frame in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    WaitingStart,
    WaitingGroupStart,
    ReadingLabel,
    ReadingValue,
    ReadingChecksum,
    WaitingGroupEnd,
    WaitingFrameEndOrGroupStart,
    Terminated,
}

impl FrameState {
    pub fn next(self, event: Event, group: &mut Group, record: &mut TeleinfoRecord) -> FrameState {
        match (self, event) {
            (FrameState::WaitingStart, Event::Stx) => {
                record.reset();
                FrameState::WaitingGroupStart
            }
            (FrameState::WaitingGroupStart, Event::Lf) => {
                group.reset();
                FrameState::ReadingLabel
            }
            (FrameState::ReadingLabel, Event::Space) => FrameState::ReadingValue,
            (FrameState::ReadingLabel, Event::Other(c)) => {
                group.append_label(c);
                FrameState::ReadingLabel
            }
            (FrameState::ReadingValue, Event::Space) => FrameState::ReadingChecksum,
            (FrameState::ReadingValue, Event::Other(c)) => {
                group.append_value(c);
                FrameState::ReadingValue
            }
            (FrameState::ReadingChecksum, Event::Space) => {
                group.set_checksum(TELEINFO_CHAR_SPACE);
                FrameState::WaitingGroupEnd
            }
            (FrameState::ReadingChecksum, Event::Other(c)) => {
                group.set_checksum(c);
                FrameState::WaitingGroupEnd
            }
            (FrameState::WaitingGroupEnd, Event::Cr) => {
                if group.is_valid() {
                    record.merge(group);
                    FrameState::WaitingFrameEndOrGroupStart
                } else {
                    warn!(
                        "Checksum error on group {} (received 0x{:02x}, expected 0x{:02x}), dropping frame",
                        group.label(),
                        group.checksum(),
                        group.expected_checksum()
                    );
                    FrameState::WaitingStart
                }
            }
            // A new group can follow directly, handled like in WaitingGroupStart
            (FrameState::WaitingFrameEndOrGroupStart, Event::Lf) => {
                FrameState::WaitingGroupStart.next(event, group, record)
            }
            (FrameState::WaitingFrameEndOrGroupStart, Event::Etx) => FrameState::Terminated,
            (state, event) => {
                if state != FrameState::WaitingStart {
                    debug!("Unexpected {:?} in state {}, waiting for next frame", event, state.name());
                }
                FrameState::WaitingStart
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == FrameState::Terminated
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameState::WaitingStart => "WaitingStart",
            FrameState::WaitingGroupStart => "WaitingGroupStart",
            FrameState::ReadingLabel => "ReadingLabel",
            FrameState::ReadingValue => "ReadingValue",
            FrameState::ReadingChecksum => "ReadingChecksum",
            FrameState::WaitingGroupEnd => "WaitingGroupEnd",
            FrameState::WaitingFrameEndOrGroupStart => "WaitingFrameEndOrGroupStart",
            FrameState::Terminated => "Terminated",
        }
    }
}
