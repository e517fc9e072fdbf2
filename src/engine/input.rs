/// Logical guitar actions exposed by the input collaborator. Both strum
/// directions feed the same judgment path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GuitarButton {
    Green,
    Red,
    Yellow,
    Blue,
    Orange,
    StrumUp,
    StrumDown,
}

impl GuitarButton {
    /// Shape slot for a fret button; `None` for the strum actions.
    #[inline(always)]
    pub fn fret_slot(self) -> Option<usize> {
        match self {
            GuitarButton::Green => Some(0),
            GuitarButton::Red => Some(1),
            GuitarButton::Yellow => Some(2),
            GuitarButton::Blue => Some(3),
            GuitarButton::Orange => Some(4),
            GuitarButton::StrumUp | GuitarButton::StrumDown => None,
        }
    }

    #[inline(always)]
    pub fn is_strum(self) -> bool {
        matches!(self, GuitarButton::StrumUp | GuitarButton::StrumDown)
    }
}

/// One discrete pressed/released edge, timestamped in chart seconds by the
/// host before it is queued.
#[derive(Copy, Clone, Debug)]
pub struct InputEvent {
    pub time: f32,
    pub button: GuitarButton,
    pub pressed: bool,
}
