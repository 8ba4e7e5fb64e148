use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Man,
    Woman,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Man => "Man",
            Gender::Woman => "Woman",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Man" => Ok(Gender::Man),
            "Woman" => Ok(Gender::Woman),
            other => Err(format!("unknown gender: {other:?}")),
        }
    }
}

/// Race categories, in the order the race model emits its scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Race {
    #[serde(rename = "asian")]
    Asian,
    #[serde(rename = "indian")]
    Indian,
    #[serde(rename = "black")]
    Black,
    #[serde(rename = "white")]
    White,
    #[serde(rename = "middle eastern")]
    MiddleEastern,
    #[serde(rename = "latino hispanic")]
    LatinoHispanic,
}

impl Race {
    pub const ALL: &'static [Race] = &[
        Race::Asian,
        Race::Indian,
        Race::Black,
        Race::White,
        Race::MiddleEastern,
        Race::LatinoHispanic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Race::Asian => "asian",
            Race::Indian => "indian",
            Race::Black => "black",
            Race::White => "white",
            Race::MiddleEastern => "middle eastern",
            Race::LatinoHispanic => "latino hispanic",
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes estimated for one analyzed face.
///
/// `index` is 1-based and counts records in the order their regions were
/// detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceRecord {
    index: u32,
    age: u32,
    gender: Gender,
    race: Option<Race>,
}

impl FaceRecord {
    pub fn new(index: u32, age: u32, gender: Gender, race: Option<Race>) -> Self {
        Self {
            index,
            age,
            gender,
            race,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn race(&self) -> Option<Race> {
        self.race
    }
}

impl fmt::Display for FaceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Face {}: Age - {}, Gender - {}",
            self.index, self.age, self.gender
        )?;
        if let Some(race) = self.race {
            write!(f, ", Race - {race}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_result_line() {
        let record = FaceRecord::new(1, 31, Gender::Woman, None);
        assert_eq!(record.to_string(), "Face 1: Age - 31, Gender - Woman");
    }

    #[test]
    fn display_includes_race_when_present() {
        let record = FaceRecord::new(2, 40, Gender::Man, Some(Race::MiddleEastern));
        assert_eq!(
            record.to_string(),
            "Face 2: Age - 40, Gender - Man, Race - middle eastern"
        );
    }

    #[test]
    fn gender_parses_its_display_form() {
        for gender in [Gender::Man, Gender::Woman] {
            assert_eq!(gender.to_string().parse::<Gender>().unwrap(), gender);
        }
        assert!("man".parse::<Gender>().is_err());
    }
}
