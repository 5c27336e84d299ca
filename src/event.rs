//! The tracking-event record.

use crate::proto;
use serde::{Deserialize, Serialize};

/// One of the three kinds of tracking record a client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvType {
    Load,
    Unload,
    Time,
}

impl EvType {
    fn to_wire(self) -> i32 {
        match self {
            EvType::Load => 0,
            EvType::Unload => 1,
            EvType::Time => 2,
        }
    }

    fn from_wire(v: i32) -> Option<Self> {
        match v {
            0 => Some(EvType::Load),
            1 => Some(EvType::Unload),
            2 => Some(EvType::Time),
            _ => None,
        }
    }
}

/// A single tracking record.
///
/// The optional fields are present exactly for their associated event
/// type. That invariant is enforced here by
/// construction: the only way to build an `Event` is through
/// [`Event::load`], [`Event::unload`] or [`Event::time_on_page`], each of
/// which fixes which optional field is populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ev_type: EvType,
    pub time: u32,
    pub usr: u32,
    pub sess: u32,
    pub cid: u32,
    pub page_seconds: Option<u32>,
    pub scrolled: Option<f32>,
}

impl Event {
    pub fn load(time: u32, usr: u32, sess: u32, cid: u32) -> Self {
        Event {
            ev_type: EvType::Load,
            time,
            usr,
            sess,
            cid,
            page_seconds: None,
            scrolled: None,
        }
    }

    pub fn unload(time: u32, usr: u32, sess: u32, cid: u32, scrolled: f32) -> Self {
        Event {
            ev_type: EvType::Unload,
            time,
            usr,
            sess,
            cid,
            page_seconds: None,
            scrolled: Some(scrolled),
        }
    }

    pub fn time_on_page(time: u32, usr: u32, sess: u32, cid: u32, page_seconds: u32) -> Self {
        Event {
            ev_type: EvType::Time,
            time,
            usr,
            sess,
            cid,
            page_seconds: Some(page_seconds),
            scrolled: None,
        }
    }

    pub(crate) fn to_proto(self) -> proto::Event {
        proto::Event {
            ev_type: self.ev_type.to_wire(),
            time: self.time,
            usr: self.usr,
            sess: self.sess,
            cid: self.cid,
            page_seconds: self.page_seconds,
            scrolled: self.scrolled,
        }
    }

    /// Reconstruct an `Event` from its wire form.
    ///
    /// Returns `None` for an unrecognized `ev_type` — a corrupt or
    /// forward-incompatible record, treated the same as frame corruption
    /// by the reverse reader.
    pub(crate) fn from_proto(e: proto::Event) -> Option<Self> {
        let ev_type = EvType::from_wire(e.ev_type)?;
        Some(Event {
            ev_type,
            time: e.time,
            usr: e.usr,
            sess: e.sess,
            cid: e.cid,
            page_seconds: e.page_seconds,
            scrolled: e.scrolled,
        })
    }
}
