use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub heaps: HeapSettings,
    #[serde(default)]
    pub frame: FrameSettings,
    #[serde(default)]
    pub resolution: Resolution,
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub(crate) fn validate(mut self) -> Self {
        let defaults = HeapSettings::default();

        if self.heaps.cbv_srv_uav.regular == 0 {
            warn!("Shader-resource heap budget must be greater than zero. Using default value.");
            self.heaps.cbv_srv_uav.regular = defaults.cbv_srv_uav.regular;
        }

        if self.heaps.cbv_srv_uav.constant == 0 {
            warn!("Constant-buffer heap budget must be greater than zero. Using default value.");
            self.heaps.cbv_srv_uav.constant = defaults.cbv_srv_uav.constant;
        }

        if self.heaps.cbv_srv_uav.total().is_none() {
            warn!(
                "Shader-visible heap budget {:?} overflows the slot count. Using default budget.",
                self.heaps.cbv_srv_uav
            );
            self.heaps.cbv_srv_uav = defaults.cbv_srv_uav;
        }

        if self.heaps.render_targets == 0 {
            warn!("Render-target heap must have at least one slot. Using default value.");
            self.heaps.render_targets = defaults.render_targets;
        }

        if self.heaps.depth_stencils == 0 {
            warn!("Depth-stencil heap must have at least one slot. Using default value.");
            self.heaps.depth_stencils = defaults.depth_stencils;
        }

        if self.frame.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.frame.shadow_map_size = FrameSettings::default_shadow_map_size();
        }

        if self.frame.sprite_mask_register == self.frame.sprite_constant_register {
            warn!(
                "Sprite mask and constant registers are both {}. Using default registers.",
                self.frame.sprite_mask_register
            );
            self.frame.sprite_constant_register = FrameSettings::default_sprite_register();
            self.frame.sprite_mask_register = FrameSettings::default_mask_register();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self
    }
}

/// Slot budget of the shader-visible CBV/SRV/UAV heap.
///
/// The heap is laid out as `[reserved | regular | constant]`: `reserved`
/// slots are left for descriptors managed outside this crate, `regular`
/// slots hold shader-resource views (textures, render-target reads) and
/// `constant` slots are consumed only by the constant-buffer allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapBudget {
    pub regular: u32,
    pub constant: u32,
    #[serde(default)]
    pub reserved: u32,
}

impl HeapBudget {
    /// Slots the whole heap needs, `None` if that does not fit in a `u32`.
    pub const fn total(&self) -> Option<u32> {
        match self.regular.checked_add(self.constant) {
            Some(sum) => sum.checked_add(self.reserved),
            None => None,
        }
    }
}

impl Default for HeapBudget {
    fn default() -> Self {
        Self {
            regular: 1024,
            constant: 4096,
            reserved: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapSettings {
    #[serde(default)]
    pub cbv_srv_uav: HeapBudget,
    #[serde(default = "HeapSettings::default_render_targets")]
    pub render_targets: u32,
    #[serde(default = "HeapSettings::default_depth_stencils")]
    pub depth_stencils: u32,
}

impl HeapSettings {
    const fn default_render_targets() -> u32 {
        16
    }

    const fn default_depth_stencils() -> u32 {
        4
    }
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            cbv_srv_uav: HeapBudget::default(),
            render_targets: Self::default_render_targets(),
            depth_stencils: Self::default_depth_stencils(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSettings {
    /// Root parameter the per-sprite constants are bound to.
    #[serde(default = "FrameSettings::default_sprite_register")]
    pub sprite_constant_register: u32,
    /// Root parameter a sprite's mask texture is bound to.
    #[serde(default = "FrameSettings::default_mask_register")]
    pub sprite_mask_register: u32,
    #[serde(default = "FrameSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
}

impl FrameSettings {
    const fn default_sprite_register() -> u32 {
        0
    }

    const fn default_mask_register() -> u32 {
        1
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            sprite_constant_register: Self::default_sprite_register(),
            sprite_mask_register: Self::default_mask_register(),
            shadow_map_size: Self::default_shadow_map_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            heaps: HeapSettings {
                cbv_srv_uav: HeapBudget {
                    regular: 0,
                    constant: 0,
                    reserved: 3,
                },
                render_targets: 0,
                depth_stencils: 0,
            },
            frame: FrameSettings {
                sprite_constant_register: 2,
                sprite_mask_register: 3,
                shadow_map_size: 0,
            },
            resolution: Resolution {
                width: 0,
                height: 0,
            },
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = HeapSettings::default();

        assert_eq!(
            validated.heaps.cbv_srv_uav.regular,
            defaults.cbv_srv_uav.regular
        );
        assert_eq!(
            validated.heaps.cbv_srv_uav.constant,
            defaults.cbv_srv_uav.constant
        );
        assert_eq!(validated.heaps.render_targets, defaults.render_targets);
        assert_eq!(validated.heaps.depth_stencils, defaults.depth_stencils);
        assert_eq!(
            validated.frame.shadow_map_size,
            FrameSettings::default().shadow_map_size
        );
        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let validated = invalid_settings().validate();

        // A zero reserved prefix or a custom register are legitimate choices.
        assert_eq!(validated.heaps.cbv_srv_uav.reserved, 3);
        assert_eq!(validated.frame.sprite_constant_register, 2);
    }

    #[test]
    fn clashing_sprite_registers_fall_back_to_defaults() {
        let mut settings = RenderSettings::default();
        settings.frame.sprite_constant_register = 5;
        settings.frame.sprite_mask_register = 5;

        let validated = settings.validate();
        assert_eq!(validated.frame.sprite_constant_register, 0);
        assert_eq!(validated.frame.sprite_mask_register, 1);
    }

    #[test]
    fn overflowing_heap_budget_falls_back_to_defaults() {
        let json = r#"{ "heaps": { "cbv_srv_uav": { "regular": 4294967295, "constant": 16 } } }"#;
        let settings: RenderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.heaps.cbv_srv_uav.total(), None);

        let validated = settings.validate();
        assert_eq!(validated.heaps.cbv_srv_uav, HeapBudget::default());
        assert!(validated.heaps.cbv_srv_uav.total().is_some());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{ "heaps": { "cbv_srv_uav": { "regular": 8, "constant": 16 } } }"#;
        let settings: RenderSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.heaps.cbv_srv_uav.regular, 8);
        assert_eq!(settings.heaps.cbv_srv_uav.constant, 16);
        assert_eq!(settings.heaps.cbv_srv_uav.reserved, 0);
        assert_eq!(settings.heaps.cbv_srv_uav.total(), Some(24));
        assert_eq!(
            settings.heaps.render_targets,
            HeapSettings::default().render_targets
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("definitely/not/here/settings.json");
        assert_eq!(settings.heaps.cbv_srv_uav, HeapBudget::default());
    }
}
