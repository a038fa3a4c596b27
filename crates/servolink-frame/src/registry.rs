use crate::codec::{Frame, FrameKind};
use crate::command::Reply;

const SLOTS: usize = 32;

/// Latest decoded value per reply id.
///
/// Only genuine replies are recorded; echoes never overwrite a slot.
#[derive(Debug, Clone)]
pub struct ReplyRegistry {
    values: [Option<i32>; SLOTS],
    recorded: u64,
}

impl Default for ReplyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyRegistry {
    pub fn new() -> Self {
        Self {
            values: [None; SLOTS],
            recorded: 0,
        }
    }

    /// Record `frame` if it is a reply. Returns true when a slot was written.
    pub fn record(&mut self, frame: &Frame) -> bool {
        if frame.kind != FrameKind::Reply {
            return false;
        }
        self.values[usize::from(frame.id & 0x1f)] = Some(frame.value);
        self.recorded += 1;
        true
    }

    /// Most recent value for `reply`.
    pub fn get(&self, reply: Reply) -> Option<i32> {
        self.get_raw(reply.id())
    }

    /// Most recent value for a raw reply id, including ids without a name.
    pub fn get_raw(&self, id: u8) -> Option<i32> {
        self.values[usize::from(id & 0x1f)]
    }

    /// Forget the value for `reply` so the next read can tell a fresh answer.
    pub fn clear(&mut self, reply: Reply) {
        self.values[usize::from(reply.id())] = None;
    }

    /// Replies recorded since creation.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Known replies that currently hold a value.
    pub fn iter(&self) -> impl Iterator<Item = (Reply, i32)> + '_ {
        Reply::ALL
            .into_iter()
            .filter_map(|reply| self.get(reply).map(|value| (reply, value)))
    }
}
