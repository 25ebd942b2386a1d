//! Charts describing the exact geometry of curved boundaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a refined mesh is adapted to the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptMode {
    /// Keep the refined vertex positions.
    None,
    /// Project the vertices of every chart-bound mesh part onto its chart.
    #[default]
    Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Chart {
    Circle { center: [f64; 2], radius: f64 },
}

impl Chart {
    /// Closest point of the chart to `p`.
    pub fn project(&self, p: [f64; 2]) -> [f64; 2] {
        match *self {
            Chart::Circle { center, radius } => {
                let d = [p[0] - center[0], p[1] - center[1]];
                let len = d[0].hypot(d[1]);
                if len == 0.0 {
                    // the centre is equidistant to every point
                    return [center[0] + radius, center[1]];
                }
                let s = radius / len;
                [center[0] + s * d[0], center[1] + s * d[1]]
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshAtlas {
    charts: BTreeMap<String, Chart>,
}

impl MeshAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chart; returns `false` if the name was already taken.
    pub fn add_chart(&mut self, name: impl Into<String>, chart: Chart) -> bool {
        let name = name.into();
        if self.charts.contains_key(&name) {
            return false;
        }
        self.charts.insert(name, chart);
        true
    }

    pub fn find_chart(&self, name: &str) -> Option<&Chart> {
        self.charts.get(name)
    }

    pub fn chart_names(&self) -> impl Iterator<Item = &str> {
        self.charts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_projection() {
        let c = Chart::Circle {
            center: [1.0, 1.0],
            radius: 2.0,
        };
        let p = c.project([4.0, 1.0]);
        assert!((p[0] - 3.0).abs() < 1e-15 && (p[1] - 1.0).abs() < 1e-15);
        let q = c.project([1.0, 1.0]);
        assert_eq!(q, [3.0, 1.0]);
    }

    #[test]
    fn duplicate_chart_names_are_refused() {
        let mut atlas = MeshAtlas::new();
        let c = Chart::Circle {
            center: [0.0, 0.0],
            radius: 1.0,
        };
        assert!(atlas.add_chart("outer", c.clone()));
        assert!(!atlas.add_chart("outer", c));
        assert_eq!(atlas.chart_names().collect::<Vec<_>>(), vec!["outer"]);
    }

    #[test]
    fn chart_json_shape() {
        let c: Chart = serde_json::from_str(r#"{"type":"circle","center":[0,0],"radius":0.5}"#).unwrap();
        assert_eq!(
            c,
            Chart::Circle {
                center: [0.0, 0.0],
                radius: 0.5
            }
        );
    }
}
