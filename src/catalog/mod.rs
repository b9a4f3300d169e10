use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::error::Error;
use std::sync::OnceLock;

static CATALOG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/catalog/data");

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[strum(serialize = "beginner")]
    Beginner,
    #[strum(serialize = "intermediate")]
    Intermediate,
    #[strum(serialize = "advanced")]
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum PunchCategory {
    #[strum(serialize = "straight")]
    Straight,
    #[strum(serialize = "hook")]
    Hook,
    #[strum(serialize = "uppercut")]
    Uppercut,
    #[strum(serialize = "body")]
    Body,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueCategory {
    #[strum(serialize = "stance")]
    Stance,
    #[strum(serialize = "footwork")]
    Footwork,
    #[strum(serialize = "defense")]
    Defense,
    #[strum(serialize = "offense")]
    Offense,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutCategory {
    #[strum(serialize = "shadowboxing")]
    Shadowboxing,
    #[strum(serialize = "heavy bag")]
    HeavyBag,
    #[strum(serialize = "conditioning")]
    Conditioning,
    #[strum(serialize = "technique")]
    Technique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Punch {
    pub id: String,
    pub number: u8,
    pub name: String,
    pub category: PunchCategory,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combo {
    pub id: String,
    pub name: String,
    pub punches: Vec<String>,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    pub id: String,
    pub name: String,
    pub category: TechniqueCategory,
    pub level: Level,
    pub description: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// One timed block inside a round. `combos` is the call-out pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDef {
    pub name: String,
    pub duration_secs: u32,
    #[serde(default)]
    pub combos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardWorkout {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: WorkoutCategory,
    pub level: Level,
    #[serde(default)]
    pub premium: bool,
    pub calories: u32,
    pub rounds: u32,
    pub rest_secs: u32,
    pub exercises: Vec<ExerciseDef>,
}

/// Read-only content bundled with the binary
#[derive(Debug, Clone)]
pub struct Catalog {
    pub punches: Vec<Punch>,
    pub combos: Vec<Combo>,
    pub techniques: Vec<Technique>,
    pub workouts: Vec<StandardWorkout>,
}

impl Catalog {
    /// The embedded catalog, parsed on first use.
    pub fn builtin() -> &'static Catalog {
        static BUILTIN: OnceLock<Catalog> = OnceLock::new();
        BUILTIN.get_or_init(|| Catalog::load().expect("Unable to deserialize bundled catalog"))
    }

    pub fn load() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            punches: read_catalog_file("punches.json")?,
            combos: read_catalog_file("combos.json")?,
            techniques: read_catalog_file("techniques.json")?,
            workouts: read_catalog_file("workouts.json")?,
        })
    }

    pub fn punch(&self, id: &str) -> Option<&Punch> {
        self.punches.iter().find(|p| p.id == id)
    }

    pub fn combo(&self, id: &str) -> Option<&Combo> {
        self.combos.iter().find(|c| c.id == id)
    }

    pub fn technique(&self, id: &str) -> Option<&Technique> {
        self.techniques.iter().find(|t| t.id == id)
    }

    pub fn workout(&self, id: &str) -> Option<&StandardWorkout> {
        self.workouts.iter().find(|w| w.id == id)
    }

    pub fn workouts_where(
        &self,
        level: Option<Level>,
        category: Option<WorkoutCategory>,
    ) -> Vec<&StandardWorkout> {
        self.workouts
            .iter()
            .filter(|w| level.map_or(true, |l| w.level == l))
            .filter(|w| category.map_or(true, |c| w.category == c))
            .collect()
    }

    pub fn combos_at(&self, level: Option<Level>) -> Vec<&Combo> {
        self.combos
            .iter()
            .filter(|c| level.map_or(true, |l| c.level == l))
            .sorted_by_key(|c| (c.level, c.punches.len()))
            .collect()
    }

    pub fn techniques_where(
        &self,
        level: Option<Level>,
        category: Option<TechniqueCategory>,
    ) -> Vec<&Technique> {
        self.techniques
            .iter()
            .filter(|t| level.map_or(true, |l| t.level == l))
            .filter(|t| category.map_or(true, |c| t.category == c))
            .collect()
    }

    /// Boxing shorthand for a combo, e.g. "1-2-3".
    pub fn combo_numbers(&self, combo: &Combo) -> String {
        combo
            .punches
            .iter()
            .map(|id| {
                self.punch(id)
                    .map_or_else(|| "?".to_string(), |p| p.number.to_string())
            })
            .join("-")
    }

    /// Full call-out for a combo, e.g. "Jab, Cross, Lead Hook".
    pub fn combo_callout(&self, combo: &Combo) -> String {
        combo
            .punches
            .iter()
            .map(|id| self.punch(id).map_or(id.as_str(), |p| p.name.as_str()))
            .join(", ")
    }
}

fn read_catalog_file<T: DeserializeOwned>(file_name: &str) -> Result<T, Box<dyn Error>> {
    let file = CATALOG_DIR
        .get_file(file_name)
        .ok_or_else(|| format!("Catalog file not found: {file_name}"))?;

    let file_as_str = file
        .contents_utf8()
        .ok_or("Unable to interpret catalog file as a string")?;

    Ok(serde_json::from_str(file_as_str)?)
}
