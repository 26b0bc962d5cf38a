use crate::config::{PinningPlan, SkipMask};

/// Outcome of one placement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Pinning is disabled; the thread keeps its inherited affinity.
    Passthrough,
    /// The call index is exempted by the skip mask.
    Skip,
    /// Pin to `core`. `wrapped` is set on the one decision that completes the
    /// first full lap over the plan.
    Pin { core: usize, wrapped: bool },
}

/// Round-robin state shared by every `pthread_create` call in the process.
///
/// Not synchronized on its own; the interposer keeps it behind a mutex and only
/// holds the lock for [`begin_call`](Self::begin_call) and [`place`](Self::place).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementCursor {
    calls_seen: u64,
    pinned_count: usize,
    overflow_threshold: usize,
    overflowed: bool,
}

impl PlacementCursor {
    /// `overflow_threshold` is the pin count at which the first lap completes,
    /// see [`ConfigSnapshot::overflow_threshold`](crate::ConfigSnapshot::overflow_threshold).
    pub fn new(overflow_threshold: usize) -> Self {
        Self {
            calls_seen: 0,
            pinned_count: 0,
            overflow_threshold,
            overflowed: false,
        }
    }

    /// Claims the index of the current call. Runs once per call, before
    /// delegation, whether or not the creation later succeeds.
    pub fn begin_call(&mut self) -> u64 {
        let index = self.calls_seen;
        self.calls_seen = self.calls_seen.wrapping_add(1);
        index
    }

    /// Decides where the thread created by call `call_index` goes and advances
    /// the cursor. Only called after a successful creation.
    pub fn place(&mut self, call_index: u64, plan: &PinningPlan, skip_mask: SkipMask) -> Placement {
        if plan.is_empty() {
            return Placement::Passthrough;
        }
        if skip_mask.skips(call_index) {
            return Placement::Skip;
        }

        let slot = self.pinned_count % plan.len();
        let core = plan.cores()[slot];
        let wrapped = !self.overflowed && self.pinned_count == self.overflow_threshold;

        if wrapped {
            self.overflowed = true;
            self.pinned_count = 0;
        } else {
            self.pinned_count = (self.pinned_count + 1) % plan.len();
        }

        Placement::Pin { core, wrapped }
    }

    pub fn calls_seen(&self) -> u64 {
        self.calls_seen
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned_count
    }

    pub fn overflow_threshold(&self) -> usize {
        self.overflow_threshold
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSnapshot;
    use crossbeam_utils::sync::WaitGroup;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    fn cursor_for(plan: &PinningPlan) -> PlacementCursor {
        let snapshot = ConfigSnapshot {
            plan: plan.clone(),
            skip_mask: SkipMask::default(),
            silent: true,
        };
        PlacementCursor::new(snapshot.overflow_threshold())
    }

    fn run(cursor: &mut PlacementCursor, plan: &PinningPlan, mask: SkipMask, calls: usize) -> Vec<Placement> {
        (0..calls)
            .map(|_| {
                let idx = cursor.begin_call();
                cursor.place(idx, plan, mask)
            })
            .collect()
    }

    fn cores_of(placements: &[Placement]) -> Vec<usize> {
        placements
            .iter()
            .filter_map(|p| match p {
                Placement::Pin { core, .. } => Some(*core),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_three_core_plan_wraps_once() {
        let plan = PinningPlan::parse("2,5,7");
        let mut cursor = cursor_for(&plan);
        let placements = run(&mut cursor, &plan, SkipMask::default(), 5);

        assert_eq!(cores_of(&placements), vec![2, 5, 7, 2, 5]);
        let wrapped: Vec<bool> = placements
            .iter()
            .map(|p| matches!(p, Placement::Pin { wrapped: true, .. }))
            .collect();
        assert_eq!(wrapped, vec![false, false, true, false, false]);
        assert!(cursor.overflowed());
    }

    #[test]
    fn test_kth_pin_follows_plan_modulo_length() {
        for len in 1..=6usize {
            let plan = PinningPlan::new((0..len).map(|i| 10 + i).collect());
            let mut cursor = cursor_for(&plan);
            let cores = cores_of(&run(&mut cursor, &plan, SkipMask::default(), 4 * len + 1));
            for (k, core) in cores.iter().enumerate() {
                assert_eq!(*core, plan.cores()[k % len], "plan length {} pin {}", len, k);
            }
        }
    }

    #[test]
    fn test_overflow_notice_exactly_once() {
        for len in 1..=5usize {
            let plan = PinningPlan::new(vec![0; len]);
            let mut cursor = cursor_for(&plan);
            let placements = run(&mut cursor, &plan, SkipMask::default(), 50);
            let notices = placements
                .iter()
                .filter(|p| matches!(p, Placement::Pin { wrapped: true, .. }))
                .count();
            assert_eq!(notices, 1, "plan length {}", len);
            assert!(matches!(placements[len - 1], Placement::Pin { wrapped: true, .. }));
        }
    }

    #[test]
    fn test_single_core_plan_with_skip() {
        let plan = PinningPlan::parse("4");
        let mut cursor = cursor_for(&plan);
        let placements = run(&mut cursor, &plan, SkipMask::new(0x1), 3);

        assert_eq!(
            placements,
            vec![
                Placement::Skip,
                Placement::Pin { core: 4, wrapped: true },
                Placement::Pin { core: 4, wrapped: false },
            ]
        );
    }

    #[test]
    fn test_skipped_calls_do_not_advance_pins() {
        let plan = PinningPlan::parse("1,2,3");
        let mut cursor = cursor_for(&plan);
        // Skip calls 0, 2 and 3.
        let placements = run(&mut cursor, &plan, SkipMask::new(0b1101), 6);

        assert_eq!(placements[0], Placement::Skip);
        assert_eq!(placements[2], Placement::Skip);
        assert_eq!(placements[3], Placement::Skip);
        assert_eq!(cores_of(&placements), vec![1, 2, 3]);
        assert_eq!(cursor.calls_seen(), 6);
    }

    #[test]
    fn test_indices_past_64_never_skipped() {
        let plan = PinningPlan::parse("9");
        let mut cursor = cursor_for(&plan);
        let placements = run(&mut cursor, &plan, SkipMask::new(u64::MAX), 70);

        assert!(placements[..64].iter().all(|p| *p == Placement::Skip));
        assert!(placements[64..]
            .iter()
            .all(|p| matches!(p, Placement::Pin { core: 9, .. })));
    }

    #[test]
    fn test_failed_creations_still_consume_indices() {
        let plan = PinningPlan::parse("3,4");
        let mut cursor = cursor_for(&plan);
        // Call 0 fails before placement; call 1 is skipped by bit 1.
        let _failed = cursor.begin_call();
        let idx = cursor.begin_call();
        assert_eq!(cursor.place(idx, &plan, SkipMask::new(0b10)), Placement::Skip);
        let idx = cursor.begin_call();
        assert_eq!(
            cursor.place(idx, &plan, SkipMask::new(0b10)),
            Placement::Pin { core: 3, wrapped: false }
        );
    }

    #[test]
    fn test_empty_plan_is_passthrough() {
        let plan = PinningPlan::default();
        let mut cursor = cursor_for(&plan);
        let placements = run(&mut cursor, &plan, SkipMask::new(1), 3);
        assert!(placements.iter().all(|p| *p == Placement::Passthrough));
        assert_eq!(cursor.pinned_count(), 0);
        assert!(!cursor.overflowed());
    }

    #[test]
    fn test_concurrent_placements_cover_full_cycles() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;
        let plan = Arc::new(PinningPlan::parse("0,1,2,3,4,5,6"));
        let cursor = Arc::new(Mutex::new(cursor_for(&plan)));
        let start = WaitGroup::new();
        let mut handles = Vec::new();

        for _ in 0..THREADS {
            let plan = Arc::clone(&plan);
            let cursor = Arc::clone(&cursor);
            let start = start.clone();
            handles.push(thread::spawn(move || {
                start.wait();
                let mut cores = Vec::with_capacity(PER_THREAD);
                for _ in 0..PER_THREAD {
                    let idx = cursor.lock().begin_call();
                    if let Placement::Pin { core, .. } = cursor.lock().place(idx, &plan, SkipMask::default()) {
                        cores.push(core);
                    }
                }
                cores
            }));
        }
        start.wait();

        let mut counts = vec![0usize; plan.len()];
        for handle in handles {
            for core in handle.join().unwrap() {
                counts[core] += 1;
            }
        }

        let total = THREADS * PER_THREAD;
        let full_laps = total / plan.len();
        let remainder = total % plan.len();
        for (slot, count) in counts.iter().enumerate() {
            let expected = full_laps + usize::from(slot < remainder);
            assert_eq!(*count, expected, "core {}", slot);
        }
        assert_eq!(cursor.lock().calls_seen(), total as u64);
    }
}
