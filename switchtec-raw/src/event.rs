//! Event source definitions
//!
//! Every event source has a 32-bit header followed by data words:
//!
//! | Bit | Field     | Description                                         |
//! |-----|-----------|-----------------------------------------------------|
//! | 0   | occurred  | Read: event pending. Write 1: clear the event       |
//! | 1   | en_log    | Record the event in the switch log                  |
//! | 2   | en_cli    | Surface the event on the management console         |
//! | 3   | en_irq    | Raise an interrupt when the event occurs            |
//! | 4   | fatal     | The device is unusable once this event occurs       |
//!
//! Each scope (global, partition, PFF) has a summary register with one bit
//! per event slot of that scope. [`EventSummary`] renumbers those bits into a
//! single space covering every [`EventKind`], so summaries of different scopes
//! can be OR-ed together.

use bitflags::bitflags;

use crate::layout::{part_cfg, pff_csr, sw_event};
use crate::register::RegisterLayout;

/// Occurred bit, write-one-to-clear
pub const EVENT_OCCURRED: u32 = 1 << 0;
pub const EVENT_CLEAR: u32 = 1 << 0;

bitflags! {
    /// Enable and fatal bits of an event header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const LOG = 1 << 1;
        const CLI = 1 << 2;
        const IRQ = 1 << 3;
        const FATAL = 1 << 4;
    }
}

/// Event header register layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventHeader {
    pub occurred: bool,
    pub flags: EventFlags,
    /// Bits 5-31, preserved across read-modify-write
    pub reserved: u32,
}

impl EventHeader {
    const RESERVED_MASK: u32 = !0x1F;

    /// Value that clears the event while keeping every enable bit as is
    pub fn acknowledge(&self) -> u32 {
        (self.to_reg_value() & !EVENT_OCCURRED) | EVENT_CLEAR
    }

    /// Value that writes the enable bits without touching the occurred bit
    pub fn control_value(&self) -> u32 {
        self.to_reg_value() & !EVENT_OCCURRED
    }
}

impl RegisterLayout for EventHeader {
    fn to_reg_value(&self) -> u32 {
        (if self.occurred { EVENT_OCCURRED } else { 0 })
            | self.flags.bits()
            | (self.reserved & Self::RESERVED_MASK)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            occurred: (value & EVENT_OCCURRED) != 0,
            flags: EventFlags::from_bits_truncate(value),
            reserved: value & Self::RESERVED_MASK,
        }
    }
}

/// Scope an event source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    Global,
    Partition,
    PortFunction,
}

impl EventScope {
    pub fn name(&self) -> &'static str {
        match self {
            EventScope::Global => "global",
            EventScope::Partition => "partition",
            EventScope::PortFunction => "pff",
        }
    }
}

macro_rules! event_kinds {
    (
        $($variant:ident => ($name:literal, $scope:ident, $hdr:expr, $data:expr, $fatal:expr)),* $(,)?
    ) => {
        /// Every event source kind the switch reports
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $($variant,)*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(EventKind::$variant => $name,)*
                }
            }

            pub fn scope(&self) -> EventScope {
                match self {
                    $(EventKind::$variant => EventScope::$scope,)*
                }
            }

            /// Header offset within the scope's block
            pub fn header_offset(&self) -> usize {
                match self {
                    $(EventKind::$variant => $hdr,)*
                }
            }

            /// Number of 32-bit data words following the header
            pub fn data_words(&self) -> usize {
                match self {
                    $(EventKind::$variant => $data,)*
                }
            }

            /// Events after which no mailbox traffic can be trusted
            pub fn is_inherently_fatal(&self) -> bool {
                match self {
                    $(EventKind::$variant => $fatal,)*
                }
            }
        }
    };
}

event_kinds! {
    StackError => ("stack_error", Global, sw_event::STACK_ERROR_HDR, 1, true),
    PpuError => ("ppu_error", Global, sw_event::PPU_ERROR_HDR, 1, true),
    IspError => ("isp_error", Global, sw_event::ISP_ERROR_HDR, 1, true),
    SysReset => ("sys_reset", Global, sw_event::SYS_RESET_HDR, 0, false),
    FwException => ("fw_exc", Global, sw_event::FW_EXCEPTION_HDR, 0, true),
    FwNmi => ("fw_nmi", Global, sw_event::FW_NMI_HDR, 0, true),
    FwNonFatal => ("fw_non_fatal", Global, sw_event::FW_NON_FATAL_HDR, 0, false),
    FwFatal => ("fw_fatal", Global, sw_event::FW_FATAL_HDR, 0, true),
    TwiMrpcComp => ("twi_mrpc_comp", Global, sw_event::TWI_MRPC_COMP_HDR, 1, false),
    TwiMrpcCompAsync => ("twi_mrpc_comp_async", Global, sw_event::TWI_MRPC_COMP_ASYNC_HDR, 1, false),
    CliMrpcComp => ("cli_mrpc_comp", Global, sw_event::CLI_MRPC_COMP_HDR, 1, false),
    CliMrpcCompAsync => ("cli_mrpc_comp_async", Global, sw_event::CLI_MRPC_COMP_ASYNC_HDR, 1, false),
    GpioInterrupt => ("gpio_int", Global, sw_event::GPIO_INTERRUPT_HDR, 1, false),
    PartReset => ("part_reset", Partition, part_cfg::PART_RESET_HDR, 5, false),
    MrpcComp => ("mrpc_comp", Partition, part_cfg::MRPC_COMP_HDR, 5, false),
    MrpcCompAsync => ("mrpc_comp_async", Partition, part_cfg::MRPC_COMP_ASYNC_HDR, 5, false),
    DynPartBindComp => ("dyn_part_bind_comp", Partition, part_cfg::DYN_BINDING_HDR, 5, false),
    AerInP2p => ("aer_in_p2p", PortFunction, pff_csr::AER_IN_P2P_HDR, 5, false),
    AerInVep => ("aer_in_vep", PortFunction, pff_csr::AER_IN_VEP_HDR, 5, false),
    Dpc => ("dpc", PortFunction, pff_csr::DPC_HDR, 5, false),
    Cts => ("cts", PortFunction, pff_csr::CTS_HDR, 5, false),
    Hotplug => ("hotplug", PortFunction, pff_csr::HOTPLUG_HDR, 5, false),
    Ier => ("ier", PortFunction, pff_csr::IER_HDR, 5, false),
    Threshold => ("threshold", PortFunction, pff_csr::THRESHOLD_HDR, 5, false),
    PowerMgmt => ("power_mgmt", PortFunction, pff_csr::POWER_MGMT_HDR, 5, false),
    TlpThrottling => ("tlp_throttling", PortFunction, pff_csr::TLP_THROTTLING_HDR, 5, false),
    ForceSpeed => ("force_speed", PortFunction, pff_csr::FORCE_SPEED_HDR, 5, false),
    CreditTimeout => ("credit_timeout", PortFunction, pff_csr::CREDIT_TIMEOUT_HDR, 5, false),
    LinkState => ("link_state", PortFunction, pff_csr::LINK_STATE_HDR, 5, false),
}

impl EventKind {
    /// Position in the unified summary numbering
    pub fn id(&self) -> u32 {
        *self as u32
    }

    /// Bit of this kind in its scope's hardware summary register
    ///
    /// Summary bits follow the header slots of the block, reserved slots
    /// included.
    pub fn summary_bit(&self) -> u32 {
        let (first, slot) = match self.scope() {
            EventScope::Global => (sw_event::STACK_ERROR_HDR, crate::layout::EVENT_SLOT_SIZE),
            EventScope::Partition => (part_cfg::PART_RESET_HDR, crate::layout::EVENT_SLOT_SIZE),
            EventScope::PortFunction => (pff_csr::AER_IN_P2P_HDR, crate::layout::EVENT_SLOT_SIZE),
        };
        ((self.header_offset() - first) / slot) as u32
    }

    /// Kinds belonging to `scope`
    pub fn in_scope(scope: EventScope) -> impl Iterator<Item = EventKind> {
        Self::ALL.iter().copied().filter(move |kind| kind.scope() == scope)
    }
}

/// Set of event kinds, one bit per [`EventKind::id`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventSummary(u64);

impl EventSummary {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & (1u64 << kind.id()) != 0
    }

    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= 1u64 << kind.id();
    }

    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL.iter().copied().filter(|kind| self.contains(*kind))
    }

    /// Translate a hardware summary register of `scope` into kinds
    ///
    /// Bits without a defined kind (reserved slots) are dropped.
    pub fn from_register(scope: EventScope, raw: u32) -> Self {
        let mut summary = Self::empty();
        for kind in EventKind::in_scope(scope) {
            if raw & (1 << kind.summary_bit()) != 0 {
                summary.insert(kind);
            }
        }
        summary
    }
}

impl std::ops::BitOr for EventSummary {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventSummary {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<EventKind> for EventSummary {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        let mut summary = Self::empty();
        for kind in iter {
            summary.insert(kind);
        }
        summary
    }
}
