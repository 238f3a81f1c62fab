// Event select in bits 0..8, unit mask in bits 8..16:
// Intel 64 and IA-32 Architectures Software Developer's Manual, Volume 3B, Chapter 19.
super::catalog! {
    InstructionsRetired = 0x00C0 => "Instructions",
    L1Misses = 0x01CB => "L1 misses",
    LlcMisses = 0x412E => "LLC misses",
    BranchMissesRetired = 0x00C5 => "Branch misses",
    Cycles = 0x003C => "Cycles",
    BranchInstructionsRetired = 0x00C4 => "Branches",
    L2Misses = 0x04CB => "L2 misses",
    LlcReferences = 0x4F2E => "LLC references",
    /// Unhalted cycles at the TSC rate, unaffected by frequency scaling.
    ReferenceCycles = 0x013C => "Reference cycles",
}

pub(super) const DEFAULT: &[Event] = &[
    Event::InstructionsRetired,
    Event::L1Misses,
    Event::LlcMisses,
    Event::BranchMissesRetired,
    Event::Cycles,
    Event::BranchInstructionsRetired,
];
