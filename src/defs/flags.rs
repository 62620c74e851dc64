use bitflags::bitflags;

bitflags! {
    /// Runtime state bits carried by every mob body.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BodyFlags: u32 {
        // Simulated at all. Inactive bodies keep their sector but never move.
        const ACTIVE         = 0x0000_0001;
        // Resting on a floor this tick.
        const ON_GROUND      = 0x0000_0002;
        // Detached from the map, despawned at the end of the tick.
        const REMOVED        = 0x0000_0004;
        // Standing in an underwater sector.
        const SWIMMING       = 0x0000_0008;
        // Already reported as lost outside every sector.
        const LOST_WARNED    = 0x0000_0010;
    }
}
