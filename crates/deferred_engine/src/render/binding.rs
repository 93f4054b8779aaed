//! Fixed binding-slot convention
//!
//! Uniform/storage block slots and texture units form one process-wide table
//! keyed by number. Every component that binds something uses these
//! constants so that setup and per-frame rebinds agree.
//!
//! | Slot / unit | Contents |
//! |---|---|
//! | block 0 | camera view/projection |
//! | block 1 | packed point-light array |
//! | blocks 2.. | shadow-casting light blocks, in light order |
//! | blocks 12.. | omnidirectional light blocks, in light order |
//! | block 24 | environment probe cube camera |
//! | units 0-2 | G-buffer channels |
//! | units 3.. | shadow maps in light order, then omni cube shadow maps |

/// Camera view/projection block
pub const CAMERA_SLOT: u32 = 0;

/// Packed non-shadow point light array
pub const POINT_LIGHT_SLOT: u32 = 1;

/// First shadow-casting light block
pub const SHADOW_LIGHT_BASE_SLOT: u32 = 2;

/// First omnidirectional light block
pub const OMNI_LIGHT_BASE_SLOT: u32 = 12;

/// Omnidirectional blocks reserved after [`OMNI_LIGHT_BASE_SLOT`]
pub const OMNI_LIGHT_CAPACITY: u32 = 12;

/// Environment probe cube camera block
pub const PROBE_CAMERA_SLOT: u32 = OMNI_LIGHT_BASE_SLOT + OMNI_LIGHT_CAPACITY;

/// Shadow-casting lights that fit before the omni range starts
pub const MAX_SHADOW_LIGHTS_BEFORE_OVERLAP: usize = (OMNI_LIGHT_BASE_SLOT - SHADOW_LIGHT_BASE_SLOT) as usize;

/// G-buffer channel count (texture units 0..3)
pub const GBUFFER_CHANNELS: u32 = 3;

/// First shadow-map texture unit
pub const SHADOW_MAP_UNIT_BASE: u32 = GBUFFER_CHANNELS;

/// Block slot of the shadow-casting light at `index`
pub const fn shadow_light_slot(index: usize) -> u32 {
    SHADOW_LIGHT_BASE_SLOT + index as u32
}

/// Block slot of the omnidirectional light at `index`
pub const fn omni_light_slot(index: usize) -> u32 {
    OMNI_LIGHT_BASE_SLOT + index as u32
}

/// Texture unit of the shadow map of the shadow-casting light at `index`
pub const fn shadow_map_unit(index: usize) -> u32 {
    SHADOW_MAP_UNIT_BASE + index as u32
}

/// Texture unit of the omni cube shadow map at `index`, after `shadow_lights` directional/spot maps
pub const fn omni_shadow_map_unit(shadow_lights: usize, index: usize) -> u32 {
    SHADOW_MAP_UNIT_BASE + (shadow_lights + index) as u32
}

/// Warn when light counts make block slots collide.
///
/// Returns `true` when a collision exists. Slots are not reassigned.
pub fn check_slot_collisions(shadow_lights: usize, omni_lights: usize) -> bool {
    let mut collides = false;
    if shadow_lights > MAX_SHADOW_LIGHTS_BEFORE_OVERLAP {
        log::warn!(
            "{shadow_lights} shadow-casting lights overrun block slots {}..{}; omni light blocks will be overwritten",
            OMNI_LIGHT_BASE_SLOT,
            shadow_light_slot(shadow_lights)
        );
        collides = true;
    }
    if omni_lights > OMNI_LIGHT_CAPACITY as usize {
        log::warn!(
            "{omni_lights} omnidirectional lights overrun block slot {PROBE_CAMERA_SLOT} (probe camera)"
        );
        collides = true;
    }
    collides
}
