//! Presence and countdown-stage color mapping

use serde::{Deserialize, Serialize};

use crate::models::{Availability, Rgb};

/// Discrete time buckets used by the coarse countdown overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStage {
    FifteenMinutes,
    FiveMinutes,
    OneMinute,
    Active,
}

/// Total mapping from presence and countdown stage to a color.
///
/// The built-in default covers every input; users may override the whole
/// table in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorMapping {
    pub available: Rgb,
    pub away: Rgb,
    pub busy: Rgb,
    pub do_not_disturb: Rgb,
    pub in_a_call: Rgb,
    pub in_a_meeting: Rgb,
    pub offline: Rgb,
    pub unknown: Rgb,
    pub countdown_fifteen: Rgb,
    pub countdown_five: Rgb,
    pub countdown_one: Rgb,
    pub countdown_active: Rgb,
}

impl Default for ColorMapping {
    fn default() -> Self {
        Self {
            available: Rgb::new(0, 153, 51),
            away: Rgb::new(255, 191, 0),
            busy: Rgb::new(255, 0, 0),
            do_not_disturb: Rgb::new(176, 60, 222),
            in_a_call: Rgb::new(255, 0, 0),
            in_a_meeting: Rgb::new(255, 0, 0),
            offline: Rgb::new(128, 128, 128),
            unknown: Rgb::new(128, 128, 128),
            countdown_fifteen: Rgb::new(255, 255, 0),
            countdown_five: Rgb::new(255, 165, 0),
            countdown_one: Rgb::new(255, 69, 0),
            countdown_active: Rgb::new(255, 0, 0),
        }
    }
}

impl ColorMapping {
    /// Color for a presence value. Total over the enum.
    pub fn presence_color(&self, availability: Availability) -> Rgb {
        match availability {
            Availability::Available | Availability::AvailableIdle => self.available,
            Availability::Away | Availability::BeRightBack => self.away,
            Availability::Busy | Availability::BusyIdle => self.busy,
            Availability::DoNotDisturb => self.do_not_disturb,
            Availability::InACall => self.in_a_call,
            Availability::InAMeeting => self.in_a_meeting,
            Availability::Offline => self.offline,
            Availability::Unknown => self.unknown,
        }
    }

    /// Color for a coarse countdown stage.
    pub fn stage_color(&self, stage: CountdownStage) -> Rgb {
        match stage {
            CountdownStage::FifteenMinutes => self.countdown_fifteen,
            CountdownStage::FiveMinutes => self.countdown_five,
            CountdownStage::OneMinute => self.countdown_one,
            CountdownStage::Active => self.countdown_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_color_total() {
        let mapping = ColorMapping::default();
        let all = [
            Availability::Available,
            Availability::AvailableIdle,
            Availability::Away,
            Availability::BeRightBack,
            Availability::Busy,
            Availability::BusyIdle,
            Availability::DoNotDisturb,
            Availability::InACall,
            Availability::InAMeeting,
            Availability::Offline,
            Availability::Unknown,
        ];
        for a in all {
            // Must never panic; any value yields a color.
            let _ = mapping.presence_color(a);
        }
    }

    #[test]
    fn test_idle_variants_share_base_color() {
        let mapping = ColorMapping::default();
        assert_eq!(
            mapping.presence_color(Availability::AvailableIdle),
            mapping.presence_color(Availability::Available)
        );
        assert_eq!(
            mapping.presence_color(Availability::BusyIdle),
            mapping.presence_color(Availability::Busy)
        );
    }

    #[test]
    fn test_mapping_overridable_in_toml() {
        let toml_src = r#"
            available = { r = 1, g = 2, b = 3 }
        "#;
        let mapping: ColorMapping = toml::from_str(toml_src).unwrap();
        assert_eq!(mapping.available, Rgb::new(1, 2, 3));
        // Unspecified entries keep defaults.
        assert_eq!(mapping.busy, ColorMapping::default().busy);
    }
}
