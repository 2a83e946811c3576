use serde::{Deserialize, Serialize};

/// `<resort>/brief/latest.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MorningBrief {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub computed_insights: ComputedInsights,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputedInsights {
    #[serde(default)]
    pub flags: InsightFlags,
    #[serde(default)]
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightFlags {
    #[serde(default)]
    pub is_powder_day: bool,
    #[serde(default)]
    pub has_fresh_snow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefTag {
    PowderDay,
    FreshSnow,
}

impl BriefTag {
    pub fn label(&self) -> &'static str {
        match self {
            BriefTag::PowderDay => "Powder Day",
            BriefTag::FreshSnow => "Fresh Snow",
        }
    }
}

impl MorningBrief {
    /// Powder day outranks fresh snow.
    pub fn tag(&self) -> Option<BriefTag> {
        let flags = &self.computed_insights.flags;
        if flags.is_powder_day {
            Some(BriefTag::PowderDay)
        } else if flags.has_fresh_snow {
            Some(BriefTag::FreshSnow)
        } else {
            None
        }
    }

    pub fn alerts(&self) -> &[String] {
        &self.computed_insights.alerts
    }
}
