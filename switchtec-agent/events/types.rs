use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use switchtec_raw::{EventFlags, EventHeader, EventKind, EventScope};

/// A summary register position in the event tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryScope {
    Global,
    Partition(usize),
    PortFunction(usize),
}

impl SummaryScope {
    pub fn scope(&self) -> EventScope {
        match self {
            SummaryScope::Global => EventScope::Global,
            SummaryScope::Partition(_) => EventScope::Partition,
            SummaryScope::PortFunction(_) => EventScope::PortFunction,
        }
    }
}

/// Which instance(s) of an event kind an operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIndex {
    One(usize),
    /// Every partition or every PFF, depending on the kind's scope
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSource {
    pub kind: EventKind,
    pub index: EventIndex,
}

impl EventSource {
    pub fn new(kind: EventKind, index: usize) -> Self {
        Self {
            kind,
            index: EventIndex::One(index),
        }
    }

    pub fn all(kind: EventKind) -> Self {
        Self {
            kind,
            index: EventIndex::All,
        }
    }

    pub fn global(kind: EventKind) -> Self {
        Self::new(kind, 0)
    }
}

/// One serviced event, handed to registered handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOccurrence {
    pub kind: EventKind,
    /// Partition or PFF index; 0 for global sources
    pub index: usize,
    pub header: EventHeader,
    pub data: Vec<u32>,
    pub fatal: bool,
}

impl EventOccurrence {
    /// Header bit or a kind that always takes the device down
    pub fn is_fatal(kind: EventKind, header: &EventHeader) -> bool {
        header.flags.contains(EventFlags::FATAL) || kind.is_inherently_fatal()
    }
}

/// Raw summary registers at one instant
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventSummarySnapshot {
    pub global: u32,
    pub part_bitmap: u64,
    pub local_part: u32,
    pub part: Vec<u32>,
    pub pff: Vec<u32>,
    /// Kinds set anywhere in the tree
    pub pending: Vec<&'static str>,
    pub event_count: u64,
}

static KINDS_BY_NAME: Lazy<HashMap<&'static str, EventKind>> =
    Lazy::new(|| EventKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect());

pub fn kind_by_name(name: &str) -> Option<EventKind> {
    KINDS_BY_NAME.get(name).copied()
}

/// Parse `log,cli,irq,fatal` style flag lists
pub fn parse_flags(list: &str) -> Option<EventFlags> {
    let mut flags = EventFlags::empty();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        flags |= match name.to_ascii_lowercase().as_str() {
            "log" => EventFlags::LOG,
            "cli" => EventFlags::CLI,
            "irq" => EventFlags::IRQ,
            "fatal" => EventFlags::FATAL,
            _ => return None,
        };
    }
    Some(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_by_name() {
        assert_eq!(kind_by_name("mrpc_comp"), Some(EventKind::MrpcComp));
        assert_eq!(kind_by_name("link_state"), Some(EventKind::LinkState));
        assert_eq!(kind_by_name("nope"), None);
    }

    #[test]
    fn test_parse_flags() {
        assert_eq!(parse_flags("log, IRQ"), Some(EventFlags::LOG | EventFlags::IRQ));
        assert_eq!(parse_flags(""), Some(EventFlags::empty()));
        assert_eq!(parse_flags("log,bogus"), None);
    }

    #[test]
    fn test_fatal_classification() {
        let plain = EventHeader::default();
        assert!(!EventOccurrence::is_fatal(EventKind::Hotplug, &plain));
        assert!(EventOccurrence::is_fatal(EventKind::FwNmi, &plain));

        let flagged = EventHeader {
            flags: EventFlags::FATAL,
            ..plain
        };
        assert!(EventOccurrence::is_fatal(EventKind::Hotplug, &flagged));
    }
}
