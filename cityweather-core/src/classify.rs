use serde::{Deserialize, Serialize};

/// Coarse display category derived from a numeric weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Clear,
    Cloudy,
    Rainy,
    Snowy,
    Stormy,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Clear => "clear",
            Category::Cloudy => "cloudy",
            Category::Rainy => "rainy",
            Category::Snowy => "snowy",
            Category::Stormy => "stormy",
        }
    }

    pub const fn all() -> &'static [Category] {
        &[
            Category::Clear,
            Category::Cloudy,
            Category::Rainy,
            Category::Snowy,
            Category::Stormy,
        ]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a weather code to its display category.
///
/// Total over `i32`: anything at or below 3 (negative codes included) is
/// `Clear`, anything at or above 78 is `Stormy`.
pub fn classify(code: i32) -> Category {
    match code {
        i32::MIN..=3 => Category::Clear,
        4..=48 => Category::Cloudy,
        49..=67 => Category::Rainy,
        68..=77 => Category::Snowy,
        78.. => Category::Stormy,
    }
}
