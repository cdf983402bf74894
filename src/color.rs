use std::collections::HashMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct, muted colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            // Start at a blue hue so a two-category outcome reads blue/orange.
            let hue = 210.0 + (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.55, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: outcome category → Color32
// ---------------------------------------------------------------------------

/// Maps outcome categories to colours so a category looks the same in the
/// raw and filtered charts.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: HashMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Assign palette colours to the distinct `labels`, in order of first
    /// appearance. The palette is spread over distinct labels only.
    pub fn new(labels: &[String]) -> Self {
        let mut distinct: Vec<&String> = Vec::with_capacity(labels.len());
        for label in labels {
            if !distinct.contains(&label) {
                distinct.push(label);
            }
        }
        let palette = generate_palette(distinct.len());
        let mapping: HashMap<String, Color32> = distinct
            .into_iter()
            .cloned()
            .zip(palette)
            .collect();
        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a category.
    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let palette = generate_palette(4);
        assert_eq!(palette.len(), 4);
        for i in 0..palette.len() {
            for j in i + 1..palette.len() {
                assert_ne!(palette[i], palette[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_labels_fall_back_to_gray() {
        let map = ColorMap::new(&["no".to_string(), "yes".to_string()]);
        assert_ne!(map.color_for("no"), map.color_for("yes"));
        assert_eq!(map.color_for("maybe"), Color32::GRAY);
    }

    #[test]
    fn repeated_labels_do_not_widen_the_palette() {
        let labels: Vec<String> = ["no", "yes", "no", "yes"].map(String::from).to_vec();
        let map = ColorMap::new(&labels);
        let palette = generate_palette(2);
        assert_eq!(map.color_for("no"), palette[0]);
        assert_eq!(map.color_for("yes"), palette[1]);
    }
}
