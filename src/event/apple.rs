// Apple silicon CPMU events, as listed in the kpep database shipped with
// macOS (`/usr/share/kpep/*.plist`).
super::catalog! {
    /// `INST_ALL`
    InstructionsRetired = 0x8c => "Instructions",
    /// `L1D_CACHE_MISS_LD_NONSPEC`
    L1Misses = 0xbf => "L1 misses",
    /// `BRANCH_MISPRED_NONSPEC`
    BranchMissesRetired = 0xcb => "Branch misses",
    /// `CORE_ACTIVE_CYCLE`
    Cycles = 0x02 => "Cycles",
    /// `INST_BRANCH`
    BranchInstructionsRetired = 0x8d => "Branches",
}

pub(super) const DEFAULT: &[Event] = &[
    Event::InstructionsRetired,
    Event::L1Misses,
    Event::BranchMissesRetired,
    Event::Cycles,
    Event::BranchInstructionsRetired,
];
