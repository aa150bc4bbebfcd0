use super::{ConfigError, RunConfig};
use crate::render::HeightPolicy;

/// Validate configuration
/// Currently validates:
/// - Printer profile is a known one and the canvas fits its head
/// - Canvas has room for text between the margins
/// - Vertical margins and line pitch are within the maximum height
/// - Fixed height is positive and within the hardware maximum
/// - Composer limits are non-zero
/// - Footer interval is at least 1
pub fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let profile = config.profile()?;
    let canvas = &config.canvas;

    if canvas.width == 0 {
        return invalid("canvas.width cannot be 0");
    }
    if canvas.width > profile.width_dots as u32 {
        return invalid(format!(
            "canvas.width {} exceeds {} print head ({} dots)",
            canvas.width, profile.name, profile.width_dots
        ));
    }
    if canvas.margin_x.saturating_mul(2) >= canvas.width {
        return invalid("canvas.margin_x leaves no printable width");
    }
    if canvas.max_height == 0 {
        return invalid("canvas.max_height cannot be 0");
    }
    for (name, value) in [
        ("margin_top", canvas.margin_top),
        ("margin_bottom", canvas.margin_bottom),
        ("line_pitch", canvas.line_pitch),
    ] {
        if value > canvas.max_height {
            return invalid(format!(
                "canvas.{} {} exceeds max_height {}",
                name, value, canvas.max_height
            ));
        }
    }
    if let HeightPolicy::Fixed(height) = canvas.height_policy {
        if height == 0 {
            return invalid("canvas.height_policy fixed height cannot be 0");
        }
        if height > canvas.max_height {
            return invalid(format!(
                "canvas.height_policy fixed height {} exceeds max_height {}",
                height, canvas.max_height
            ));
        }
    }

    if config.composer.max_line_items == 0 {
        return invalid("composer.max_line_items cannot be 0");
    }
    if config.composer.qr_module_px == 0 {
        return invalid("composer.qr_module_px cannot be 0");
    }

    if config.dispatch.ack_timeout_ms == 0 {
        return invalid("dispatch.ack_timeout_ms cannot be 0");
    }

    if config.footers.every == 0 {
        return invalid("footers.every cannot be 0");
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}
