pub const NUM_FRETS: usize = 5;

/// State of one fret slot inside a [`ChordShape`].
///
/// `DontCare` is an explicit wildcard and never causes a mismatch on either
/// side of a comparison. It is distinct from `Released`: an open note
/// requires all five slots `Released`, while an anchored or sustain-masked
/// slot is `DontCare`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FretState {
    Pressed,
    Released,
    DontCare,
}

/// An ordered five-slot fret-state vector, green through orange.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ChordShape {
    slots: [FretState; NUM_FRETS],
}

impl ChordShape {
    /// The open-note sentinel: every slot explicitly `Released`.
    pub const OPEN: Self = Self {
        slots: [FretState::Released; NUM_FRETS],
    };

    /// The no-requirement shape: every slot `DontCare`.
    pub const ANY: Self = Self {
        slots: [FretState::DontCare; NUM_FRETS],
    };

    #[inline(always)]
    pub const fn new(slots: [FretState; NUM_FRETS]) -> Self {
        Self { slots }
    }

    /// Shape requiring exactly one fret: that slot `Pressed`, the rest
    /// `Released`.
    #[inline(always)]
    pub fn from_fret(slot: usize) -> Self {
        debug_assert!(slot < NUM_FRETS, "fret slot {slot} out of range");
        let mut shape = Self::OPEN;
        shape.slots[slot] = FretState::Pressed;
        shape
    }

    #[inline(always)]
    pub fn slot(&self, idx: usize) -> FretState {
        self.slots[idx]
    }

    #[inline(always)]
    pub fn set_slot(&mut self, idx: usize, state: FretState) {
        self.slots[idx] = state;
    }

    #[inline(always)]
    pub fn update_fret(&mut self, idx: usize, pressed: bool) {
        self.slots[idx] = if pressed {
            FretState::Pressed
        } else {
            FretState::Released
        };
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.slots.iter().all(|s| *s == FretState::Released)
    }

    #[inline(always)]
    pub fn is_pressed(&self, idx: usize) -> bool {
        self.slots[idx] == FretState::Pressed
    }

    pub fn pressed_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..NUM_FRETS).filter(|&i| self.slots[i] == FretState::Pressed)
    }

    /// Slot-wise comparison where `DontCare` on either side always
    /// satisfies the slot.
    pub fn matches(&self, other: Self) -> bool {
        self.slots.iter().zip(other.slots.iter()).all(|(a, b)| {
            *a == FretState::DontCare || *b == FretState::DontCare || a == b
        })
    }

    /// Superset check: every slot `other` requires pressed must be pressed
    /// here. `DontCare` on either side never fails, and extra pressed slots
    /// are permitted.
    pub fn contains(&self, other: Self) -> bool {
        self.slots
            .iter()
            .zip(other.slots.iter())
            .all(|(a, b)| match (*a, *b) {
                (_, FretState::DontCare) | (FretState::DontCare, _) => true,
                (a, FretState::Pressed) => a == FretState::Pressed,
                (_, FretState::Released) => true,
            })
    }

    /// Slot-wise boolean AND; `DontCare` propagates when either operand is
    /// `DontCare`.
    pub fn and(self, other: Self) -> Self {
        let mut out = Self::ANY;
        for i in 0..NUM_FRETS {
            out.slots[i] = match (self.slots[i], other.slots[i]) {
                (FretState::DontCare, _) | (_, FretState::DontCare) => FretState::DontCare,
                (FretState::Pressed, FretState::Pressed) => FretState::Pressed,
                _ => FretState::Released,
            };
        }
        out
    }

    /// Slot-wise boolean OR; `DontCare` propagates when either operand is
    /// `DontCare`.
    pub fn or(self, other: Self) -> Self {
        let mut out = Self::ANY;
        for i in 0..NUM_FRETS {
            out.slots[i] = match (self.slots[i], other.slots[i]) {
                (FretState::DontCare, _) | (_, FretState::DontCare) => FretState::DontCare,
                (FretState::Released, FretState::Released) => FretState::Released,
                _ => FretState::Pressed,
            };
        }
        out
    }
}

impl std::ops::BitAnd for ChordShape {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl std::ops::BitOr for ChordShape {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl std::fmt::Debug for ChordShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChordShape(")?;
        for s in &self.slots {
            let c = match s {
                FretState::Pressed => 'X',
                FretState::Released => '-',
                FretState::DontCare => '?',
            };
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::{ChordShape, FretState, NUM_FRETS};

    #[test]
    fn dont_care_matches_either_concrete_state() {
        for concrete in [FretState::Pressed, FretState::Released] {
            let mut a = ChordShape::from_fret(2);
            let mut b = a;
            a.set_slot(4, FretState::DontCare);
            b.set_slot(4, concrete);
            assert!(
                a.matches(b) && b.matches(a),
                "DontCare slot must match {concrete:?} from both sides"
            );
        }
    }

    #[test]
    fn matches_rejects_concrete_disagreement() {
        let a = ChordShape::from_fret(0);
        let b = ChordShape::from_fret(1);
        assert!(!a.matches(b));
        assert!(a.matches(a));
    }

    #[test]
    fn contains_is_a_superset_check() {
        let mut live = ChordShape::OPEN;
        live.update_fret(1, true);
        live.update_fret(2, true);
        let req = ChordShape::from_fret(1);
        assert!(live.contains(req), "extra pressed slots are permitted");
        assert!(!req.contains(live), "a missing required fret must fail");
    }

    #[test]
    fn open_is_all_released_and_distinct_from_any() {
        assert!(ChordShape::OPEN.is_open());
        assert!(!ChordShape::ANY.is_open());
        assert!(ChordShape::OPEN.matches(ChordShape::ANY));
    }

    #[test]
    fn combinators_propagate_dont_care() {
        let mut a = ChordShape::from_fret(0);
        a.set_slot(3, FretState::DontCare);
        let b = ChordShape::from_fret(3);
        let and = a.and(b);
        let or = a.or(b);
        assert_eq!(and.slot(3), FretState::DontCare);
        assert_eq!(or.slot(3), FretState::DontCare);
        assert_eq!(and.slot(0), FretState::Released);
        assert_eq!(or.slot(0), FretState::Pressed);
        for i in [1, 2, 4] {
            assert_eq!(and.slot(i), FretState::Released);
            assert_eq!(or.slot(i), FretState::Released);
        }
        assert_eq!(NUM_FRETS, 5);
    }
}
