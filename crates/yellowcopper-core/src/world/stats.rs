//! Simulation statistics collection

/// Trait for collecting automaton statistics
pub trait SimStats {
    /// Record that a cell was moved during simulation
    fn record_cell_moved(&mut self);

    /// Record that a liquid sublimated into its product
    fn record_phase_change(&mut self);
}

/// A no-op implementation for when stats collection is not needed
#[derive(Default)]
pub struct NoopStats;

impl SimStats for NoopStats {
    fn record_cell_moved(&mut self) {}
    fn record_phase_change(&mut self) {}
}

/// Counters for one automaton phase, summed across workers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub cells_moved: u64,
    pub phase_changes: u64,
    pub chunks_processed: u64,
    /// Claims that were pushed back because a neighbour was in flight
    pub blocked_claims: u64,
}

impl TickStats {
    /// Add another worker's counters into this one
    pub fn merge(&mut self, other: &TickStats) {
        self.cells_moved += other.cells_moved;
        self.phase_changes += other.phase_changes;
        self.chunks_processed += other.chunks_processed;
        self.blocked_claims += other.blocked_claims;
    }
}

impl SimStats for TickStats {
    fn record_cell_moved(&mut self) {
        self.cells_moved += 1;
    }

    fn record_phase_change(&mut self) {
        self.phase_changes += 1;
    }
}
