use bitflags::bitflags;

bitflags! {
    /// Which passes a model draw request takes part in.
    ///
    /// The bits are independent: a request can cast a shadow without being
    /// lit, be lit without casting a shadow, both, or neither.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderType: u32 {
        const SHADOW = 1 << 0;
        const LIT = 1 << 1;
        const UNLIT = 1 << 2;
    }
}

impl RenderType {
    pub fn is_lit(self) -> bool {
        self.contains(Self::LIT)
    }

    pub fn casts_shadow(self) -> bool {
        self.contains(Self::SHADOW)
    }
}
