// ARMv8 PMUv3 common architectural and microarchitectural events:
// Arm Architecture Reference Manual for A-profile, section D11.11.
super::catalog! {
    InstructionsRetired = 0x08 => "Instructions",
    /// `L1D_CACHE_REFILL`
    L1Misses = 0x03 => "L1 misses",
    /// `LL_CACHE_MISS_RD`
    LlcMisses = 0x37 => "LLC misses",
    BranchMissesRetired = 0x22 => "Branch misses",
    Cycles = 0x11 => "Cycles",
    BranchInstructionsRetired = 0x21 => "Branches",
    /// `L2D_CACHE_REFILL`
    L2Misses = 0x17 => "L2 misses",
    /// `LL_CACHE_RD`
    LlcReferences = 0x36 => "LLC references",
}

pub(super) const DEFAULT: &[Event] = &[
    Event::InstructionsRetired,
    Event::L1Misses,
    Event::LlcMisses,
    Event::BranchMissesRetired,
    Event::Cycles,
    Event::BranchInstructionsRetired,
];
