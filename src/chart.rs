use std::f64::consts::TAU;

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use crate::color::ColorMap;
use crate::data::aggregate::ProportionTable;

// ---------------------------------------------------------------------------
// Chart kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Pie,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::Bar, ChartKind::Pie];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar",
            ChartKind::Pie => "Pie",
        }
    }
}

/// Percentage label drawn on bars and wedges: two decimals and a `%` sign.
pub fn percent_label(percent: f64) -> String {
    format!("{percent:.2}%")
}

// ---------------------------------------------------------------------------
// Chart model – everything the renderer needs, independent of egui_plot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub label: String,
    pub percent: f64,
    /// Pre-formatted [`percent_label`].
    pub text: String,
    pub color: Color32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub title: String,
    pub kind: ChartKind,
    /// One slice per category, in the proportion table's order.
    pub slices: Vec<ChartSlice>,
}

impl ChartModel {
    pub fn build(
        title: &str,
        kind: ChartKind,
        proportions: &ProportionTable,
        colors: &ColorMap,
    ) -> Self {
        let slices = proportions
            .entries
            .iter()
            .map(|(label, percent)| ChartSlice {
                label: label.clone(),
                percent: *percent,
                text: percent_label(*percent),
                color: colors.color_for(label),
            })
            .collect();
        ChartModel {
            title: title.to_string(),
            kind,
            slices,
        }
    }

    /// Tallest bar, used to leave head-room for the labels above bars.
    pub fn max_percent(&self) -> f64 {
        self.slices.iter().map(|s| s.percent).fold(0.0, f64::max)
    }

    /// Pie wedges, one per slice, in slice order.
    pub fn wedges(&self) -> Vec<Wedge> {
        let total: f64 = self.slices.iter().map(|s| s.percent).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let mut start = 0.0;
        self.slices
            .iter()
            .map(|s| {
                let sweep = s.percent / total * TAU;
                let wedge = Wedge {
                    start,
                    end: start + sweep,
                };
                start += sweep;
                wedge
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pie geometry
// ---------------------------------------------------------------------------

/// Angular extent of a pie wedge in radians, counter-clockwise from 3 o'clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wedge {
    pub start: f64,
    pub end: f64,
}

impl Wedge {
    /// Closed outline of the wedge: centre, then the arc from `start` to `end`.
    pub fn outline(&self, radius: f64) -> Vec<[f64; 2]> {
        let sweep = self.end - self.start;
        // Roughly one point per 2 degrees, at least two so tiny wedges still show.
        let steps = ((sweep / TAU * 180.0).ceil() as usize).max(2);
        let mut points = Vec::with_capacity(steps + 2);
        points.push([0.0, 0.0]);
        for i in 0..=steps {
            let angle = self.start + sweep * i as f64 / steps as f64;
            points.push([radius * angle.cos(), radius * angle.sin()]);
        }
        points
    }

    /// Pieces of at most `max_sweep` radians each. Plot polygons are filled
    /// as convex shapes, so wedges wider than a half turn must be split.
    pub fn split(&self, max_sweep: f64) -> Vec<Wedge> {
        let sweep = self.end - self.start;
        let pieces = ((sweep / max_sweep).ceil() as usize).max(1);
        let step = sweep / pieces as f64;
        (0..pieces)
            .map(|i| Wedge {
                start: self.start + step * i as f64,
                end: if i + 1 == pieces {
                    self.end
                } else {
                    self.start + step * (i + 1) as f64
                },
            })
            .collect()
    }

    /// Where the percentage label goes: mid-angle, 60% of the radius out.
    pub fn label_anchor(&self, radius: f64) -> [f64; 2] {
        let mid = (self.start + self.end) / 2.0;
        [0.6 * radius * mid.cos(), 0.6 * radius * mid.sin()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, f64)]) -> ProportionTable {
        ProportionTable {
            column: "y".into(),
            entries: entries.iter().map(|(l, p)| (l.to_string(), *p)).collect(),
        }
    }

    #[test]
    fn labels_have_two_decimals() {
        assert_eq!(percent_label(40.0), "40.00%");
        assert_eq!(percent_label(100.0 / 3.0), "33.33%");
        assert_eq!(percent_label(0.0), "0.00%");
    }

    #[test]
    fn slices_follow_proportion_order() {
        let p = table(&[("no", 60.0), ("yes", 40.0)]);
        let colors = ColorMap::new(&["no".to_string(), "yes".to_string()]);
        let chart = ChartModel::build("Raw data", ChartKind::Bar, &p, &colors);

        let texts: Vec<(&str, &str)> = chart
            .slices
            .iter()
            .map(|s| (s.label.as_str(), s.text.as_str()))
            .collect();
        assert_eq!(texts, vec![("no", "60.00%"), ("yes", "40.00%")]);
        assert_eq!(chart.max_percent(), 60.0);
        assert_eq!(chart.title, "Raw data");
    }

    #[test]
    fn wedges_cover_the_full_circle() {
        let p = table(&[("no", 75.0), ("yes", 25.0)]);
        let chart = ChartModel::build("t", ChartKind::Pie, &p, &ColorMap::new(&[]));
        let wedges = chart.wedges();

        assert_eq!(wedges.len(), 2);
        assert_eq!(wedges[0].start, 0.0);
        assert!((wedges[0].end - 0.75 * TAU).abs() < 1e-12);
        assert!((wedges[1].end - TAU).abs() < 1e-12);
    }

    #[test]
    fn empty_chart_has_no_wedges() {
        let chart = ChartModel::build("t", ChartKind::Pie, &table(&[]), &ColorMap::new(&[]));
        assert!(chart.wedges().is_empty());
        assert_eq!(chart.max_percent(), 0.0);
    }

    #[test]
    fn outline_starts_at_centre_and_stays_on_radius() {
        let wedge = Wedge {
            start: 0.0,
            end: TAU / 4.0,
        };
        let outline = wedge.outline(1.0);
        assert_eq!(outline[0], [0.0, 0.0]);
        for p in &outline[1..] {
            assert!(((p[0] * p[0] + p[1] * p[1]).sqrt() - 1.0).abs() < 1e-9);
        }
        let [x, y] = wedge.label_anchor(1.0);
        assert!(x > 0.0 && y > 0.0);
    }

    #[test]
    fn wide_wedges_split_into_convex_pieces() {
        let wedge = Wedge {
            start: 0.5,
            end: 0.5 + 0.8 * TAU,
        };
        let pieces = wedge.split(TAU / 4.0);
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[0].start, wedge.start);
        assert_eq!(pieces[3].end, wedge.end);
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(pieces.iter().all(|p| p.end - p.start <= TAU / 4.0 + 1e-12));
    }
}
